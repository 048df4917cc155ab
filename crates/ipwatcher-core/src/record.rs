//! DNS record data model
//!
//! - [`DesiredRecord`]: what configuration says should exist
//! - [`ObservedRecord`]: what the provider reports right now
//! - [`ReconciliationKey`]: the identity used to pair the two
//! - [`RecordBatch`]: the creates and updates sent in one provider call

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Host record types managed by the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 host record
    A,
    /// IPv6 host record
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type ("A" or "AAAA")
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Parse a provider-reported type; anything other than A/AAAA is `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A" => Some(RecordType::A),
            "AAAA" => Some(RecordType::Aaaa),
            _ => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity used to match a desired record to an observed one
///
/// Rendered as `fqdn|TYPE`. Names are lowercased and a trailing dot is
/// dropped so provider and configuration spellings compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconciliationKey(String);

impl ReconciliationKey {
    /// Build a key from a fully qualified name and a record type
    pub fn new(fqdn: &str, record_type: RecordType) -> Self {
        let name = fqdn.trim_end_matches('.').to_ascii_lowercase();
        Self(format!("{}|{}", name, record_type))
    }

    /// The rendered key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReconciliationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A declarative target record, sourced from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRecord {
    /// Zone (root domain) the record lives in
    pub root: String,
    /// Record name: "@" for the apex, otherwise a label under the root
    pub name: String,
    /// A or AAAA
    pub record_type: RecordType,
    /// Route traffic through the provider's edge
    pub proxied: bool,
}

impl DesiredRecord {
    /// Create a desired record
    pub fn new(
        root: impl Into<String>,
        name: impl Into<String>,
        record_type: RecordType,
        proxied: bool,
    ) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
            record_type,
            proxied,
        }
    }

    /// Fully qualified name: the root for "@", else `name.root`
    pub fn fqdn(&self) -> String {
        if self.name == "@" {
            self.root.clone()
        } else {
            format!("{}.{}", self.name, self.root)
        }
    }

    /// Key used to look this record up among observed records
    pub fn key(&self) -> ReconciliationKey {
        ReconciliationKey::new(&self.fqdn(), self.record_type)
    }

    /// Attach content, producing the payload for a create or update
    pub fn with_content(&self, content: IpAddr) -> RecordWrite {
        RecordWrite {
            name: self.fqdn(),
            record_type: self.record_type,
            content,
            proxied: self.proxied,
        }
    }
}

/// A record as reported by the provider
///
/// Fetched fresh for each reconciliation and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedRecord {
    /// Provider-assigned record id
    pub id: String,
    /// Fully qualified record name
    pub name: String,
    /// Record type as the provider spells it (may be TXT, MX, ...)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content (an address for A/AAAA)
    pub content: String,
    /// Proxied flag
    #[serde(default)]
    pub proxied: bool,
}

impl ObservedRecord {
    /// The host record type, or `None` for record types the watcher never touches
    pub fn kind(&self) -> Option<RecordType> {
        RecordType::parse(&self.record_type)
    }

    /// Key for this record, if it is an A/AAAA record
    pub fn key(&self) -> Option<ReconciliationKey> {
        self.kind().map(|kind| ReconciliationKey::new(&self.name, kind))
    }

    /// Whether the record already points at `addr`
    ///
    /// Content that does not parse as an address never matches.
    pub fn points_at(&self, addr: IpAddr) -> bool {
        self.content
            .trim()
            .parse::<IpAddr>()
            .map(|current| current == addr)
            .unwrap_or(false)
    }
}

/// A provider zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Provider zone id
    pub id: String,
    /// Zone name
    pub name: String,
}

/// Record payload for a create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordWrite {
    /// Fully qualified record name
    pub name: String,
    /// A or AAAA
    pub record_type: RecordType,
    /// Address to publish
    pub content: IpAddr,
    /// Proxied flag
    pub proxied: bool,
}

/// An update of an existing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    /// Provider id of the record being overwritten
    pub id: String,
    /// New record payload
    pub record: RecordWrite,
}

/// All creates and updates for one zone, sent as a single request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    /// Records to create
    pub creates: Vec<RecordWrite>,
    /// Records to overwrite
    pub updates: Vec<RecordUpdate>,
}

impl RecordBatch {
    /// True when there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty()
    }

    /// Number of operations in the batch
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len()
    }
}
