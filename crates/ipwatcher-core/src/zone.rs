//! Zone name → provider zone id resolution
//!
//! Zone ids are the only provider state kept across reconciliation passes.
//! Entries are never evicted; renaming a zone at the provider requires a
//! restart.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::DnsGateway;

/// Concurrency-safe zone name → zone id map
///
/// Lock sections are brief and never span a provider call.
#[derive(Debug, Default)]
pub struct ZoneCache {
    inner: RwLock<HashMap<String, String>>,
}

impl ZoneCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached id for `zone_name`, if any
    pub fn get(&self, zone_name: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize(zone_name))
            .cloned()
    }

    /// Remember the id for `zone_name`; last writer wins
    pub fn store(&self, zone_name: &str, zone_id: impl Into<String>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(zone_name), zone_id.into());
    }

    /// Number of cached zones
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves zone names to provider zone ids, caching every success
pub struct ZoneResolver {
    gateway: Arc<dyn DnsGateway>,
    cache: ZoneCache,
}

impl ZoneResolver {
    /// Create a resolver with an empty cache
    pub fn new(gateway: Arc<dyn DnsGateway>) -> Self {
        Self {
            gateway,
            cache: ZoneCache::new(),
        }
    }

    /// The underlying cache
    pub fn cache(&self) -> &ZoneCache {
        &self.cache
    }

    /// Resolve `zone_name` to its provider id
    ///
    /// A cache hit makes no provider call. On a miss the provider is asked
    /// for zones with this name and only results whose name equals the
    /// requested one are considered:
    ///
    /// - none → [`Error::NotFound`]
    /// - exactly one → cached and returned
    /// - several → [`Error::AmbiguousZone`], nothing cached
    ///
    /// Concurrent misses for the same name may each query the provider.
    pub async fn resolve(&self, zone_name: &str) -> Result<String> {
        if let Some(zone_id) = self.cache.get(zone_name) {
            debug!("Zone {} resolved from cache", zone_name);
            return Ok(zone_id);
        }

        let wanted = normalize(zone_name);
        let zones = self.gateway.list_zones(zone_name).await?;
        let mut matches = zones.into_iter().filter(|zone| normalize(&zone.name) == wanted);

        let zone = matches
            .next()
            .ok_or_else(|| Error::not_found(format!("zone {} not found", zone_name)))?;

        let extra = matches.count();
        if extra > 0 {
            return Err(Error::ambiguous_zone(format!(
                "zone name {} matched {} zones",
                zone_name,
                extra + 1
            )));
        }

        debug!("Zone {} resolved to {}", zone_name, zone.id);
        self.cache.store(zone_name, zone.id.clone());
        Ok(zone.id)
    }
}

fn normalize(zone_name: &str) -> String {
    zone_name.trim_end_matches('.').to_ascii_lowercase()
}
