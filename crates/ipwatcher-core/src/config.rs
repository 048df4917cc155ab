//! Configuration types for the IP watcher
//!
//! The configuration is a YAML file loaded once at startup and treated as
//! read-only for the life of the process.
//!
//! ```yaml
//! refresh_rate: 0.1     # IP polls per second
//! sync_rate: 2          # verify sweeps per minute
//! supports_ipv6: true
//! domains:
//!   - zone_name: example.com
//!     records:
//!       - name: "@"
//!         type: A
//!       - name: www
//!         type: AAAA
//!         proxied: true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::record::{DesiredRecord, RecordType};

/// Main watcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// IP polls per second (fractional rates allowed)
    pub refresh_rate: f64,

    /// Verify sweeps per minute
    pub sync_rate: f64,

    /// Whether the host has IPv6 connectivity worth looking up
    #[serde(default)]
    pub supports_ipv6: bool,

    /// Zones and the records to keep in each
    pub domains: Vec<DomainConfig>,
}

impl Config {
    /// Read, parse and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate a configuration document
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw)
            .map_err(|e| Error::config(format!("failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.refresh_rate.is_finite() || self.refresh_rate <= 0.0 {
            return Err(Error::config("refresh_rate must be greater than 0"));
        }
        if !self.sync_rate.is_finite() || self.sync_rate <= 0.0 {
            return Err(Error::config("sync_rate must be greater than 0"));
        }
        if Duration::try_from_secs_f64(1.0 / self.refresh_rate).is_err()
            || Duration::try_from_secs_f64(60.0 / self.sync_rate).is_err()
        {
            return Err(Error::config("refresh_rate and sync_rate are too small"));
        }
        if self.domains.is_empty() {
            return Err(Error::config("at least one domain must be configured"));
        }

        for (i, domain) in self.domains.iter().enumerate() {
            domain.validate(i, self.supports_ipv6)?;
        }

        Ok(())
    }

    /// Period of the refresh trigger
    pub fn refresh_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.refresh_rate).unwrap_or(Duration::MAX)
    }

    /// Period of the verify trigger
    pub fn sync_interval(&self) -> Duration {
        Duration::try_from_secs_f64(60.0 / self.sync_rate).unwrap_or(Duration::MAX)
    }
}

/// One zone and its managed records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Zone name at the provider (e.g. "example.com")
    pub zone_name: String,

    /// Records to keep pointed at this host
    pub records: Vec<RecordConfig>,
}

impl DomainConfig {
    /// Create a domain configuration
    pub fn new(zone_name: impl Into<String>, records: Vec<RecordConfig>) -> Self {
        Self {
            zone_name: zone_name.into(),
            records,
        }
    }

    fn validate(&self, index: usize, supports_ipv6: bool) -> Result<()> {
        if self.zone_name.trim().is_empty() {
            return Err(Error::config(format!("domain {}: zone_name is required", index)));
        }
        if self.records.is_empty() {
            return Err(Error::config(format!(
                "domain {}: at least one record must be configured",
                self.zone_name
            )));
        }

        let mut seen = HashSet::new();
        for (j, record) in self.records.iter().enumerate() {
            if record.name.trim().is_empty() {
                return Err(Error::config(format!(
                    "domain {}, record {}: name is required",
                    self.zone_name, j
                )));
            }
            if record.record_type == RecordType::Aaaa && !supports_ipv6 {
                return Err(Error::config(format!(
                    "domain {}, record {}: AAAA records require supports_ipv6: true",
                    self.zone_name, record.name
                )));
            }

            let key = record.desired(&self.zone_name).key();
            if !seen.insert(key.clone()) {
                return Err(Error::config(format!(
                    "domain {}: duplicate record {}",
                    self.zone_name, key
                )));
            }
        }

        Ok(())
    }

    /// Desired records for this zone
    pub fn desired_records(&self) -> Vec<DesiredRecord> {
        self.records
            .iter()
            .map(|record| record.desired(&self.zone_name))
            .collect()
    }
}

/// DNS record configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    /// "@" for the zone apex, otherwise a label under the zone
    pub name: String,

    /// A or AAAA
    #[serde(rename = "type")]
    pub record_type: RecordType,

    /// Route traffic through the provider's edge
    #[serde(default)]
    pub proxied: bool,
}

impl RecordConfig {
    /// Create a new record configuration
    pub fn new(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
            proxied: false,
        }
    }

    /// Set the proxied flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    fn desired(&self, zone_name: &str) -> DesiredRecord {
        DesiredRecord::new(zone_name, self.name.clone(), self.record_type, self.proxied)
    }
}
