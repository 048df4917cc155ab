//! Test doubles and common utilities for contract tests
//!
//! - [`FakeGateway`]: in-memory provider that applies batches to its own
//!   record set, so consecutive passes observe earlier writes
//! - [`ScriptedLookup`]: IP lookup whose answers tests set directly

#![allow(dead_code)]

use ipwatcher_core::error::{Error, Result};
use ipwatcher_core::record::{ObservedRecord, RecordBatch, RecordType, Zone};
use ipwatcher_core::traits::{DnsGateway, IpLookup};
use ipwatcher_core::{Config, DomainConfig, RecordConfig};
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory DNS provider
#[derive(Default)]
pub struct FakeGateway {
    zones: Mutex<Vec<Zone>>,
    records: Mutex<HashMap<String, Vec<ObservedRecord>>>,
    batches: Mutex<Vec<(String, RecordBatch)>>,
    next_id: AtomicUsize,
    list_zones_calls: AtomicUsize,
    list_records_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_batches: AtomicBool,
    fail_listing: AtomicBool,
    list_delay: Mutex<Option<Duration>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zone the provider knows about
    pub fn with_zone(self, id: &str, name: &str) -> Self {
        self.zones.lock().unwrap().push(Zone {
            id: id.to_string(),
            name: name.to_string(),
        });
        self.records.lock().unwrap().entry(id.to_string()).or_default();
        self
    }

    /// Seed an existing record in a zone
    pub fn with_record(
        self,
        zone_id: &str,
        id: &str,
        name: &str,
        record_type: &str,
        content: &str,
        proxied: bool,
    ) -> Self {
        self.records
            .lock()
            .unwrap()
            .entry(zone_id.to_string())
            .or_default()
            .push(ObservedRecord {
                id: id.to_string(),
                name: name.to_string(),
                record_type: record_type.to_string(),
                content: content.to_string(),
                proxied,
            });
        self
    }

    /// Make every batch write fail
    pub fn failing_batches(self) -> Self {
        self.fail_batches.store(true, Ordering::SeqCst);
        self
    }

    /// Make record listing fail
    pub fn failing_listing(self) -> Self {
        self.fail_listing.store(true, Ordering::SeqCst);
        self
    }

    /// Delay every record listing (to hold a pass in flight)
    pub fn with_list_delay(self, delay: Duration) -> Self {
        *self.list_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Simulate an edit made outside the watcher (e.g. in the provider console)
    pub fn edit_content(&self, zone_id: &str, record_id: &str, content: &str) {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records
            .get_mut(zone_id)
            .and_then(|zone| zone.iter_mut().find(|r| r.id == record_id))
        {
            record.content = content.to_string();
        }
    }

    pub fn records(&self, zone_id: &str) -> Vec<ObservedRecord> {
        self.records
            .lock()
            .unwrap()
            .get(zone_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every batch written, in order
    pub fn batches(&self) -> Vec<(String, RecordBatch)> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_call_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn list_zones_call_count(&self) -> usize {
        self.list_zones_calls.load(Ordering::SeqCst)
    }

    pub fn list_records_call_count(&self) -> usize {
        self.list_records_calls.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DnsGateway for FakeGateway {
    async fn list_zones(&self, name: &str) -> Result<Vec<Zone>> {
        self.list_zones_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .zones
            .lock()
            .unwrap()
            .iter()
            .filter(|zone| zone.name.eq_ignore_ascii_case(name))
            .cloned()
            .collect())
    }

    async fn list_dns_records(&self, zone_id: &str) -> Result<Vec<ObservedRecord>> {
        self.list_records_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::provider("fake", "listing unavailable"));
        }
        self.records
            .lock()
            .unwrap()
            .get(zone_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("zone {}", zone_id)))
    }

    async fn batch_write(&self, zone_id: &str, batch: &RecordBatch) -> Result<()> {
        self.batches
            .lock()
            .unwrap()
            .push((zone_id.to_string(), batch.clone()));

        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(Error::provider("fake", "batch rejected"));
        }

        let mut records = self.records.lock().unwrap();
        let zone = records.entry(zone_id.to_string()).or_default();

        for update in &batch.updates {
            if let Some(existing) = zone.iter_mut().find(|r| r.id == update.id) {
                existing.name = update.record.name.clone();
                existing.record_type = update.record.record_type.to_string();
                existing.content = update.record.content.to_string();
                existing.proxied = update.record.proxied;
            }
        }
        for create in &batch.creates {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            zone.push(ObservedRecord {
                id: format!("created-{}", n),
                name: create.name.clone(),
                record_type: create.record_type.to_string(),
                content: create.content.to_string(),
                proxied: create.proxied,
            });
        }
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let zone = records
            .get_mut(zone_id)
            .ok_or_else(|| Error::not_found(format!("zone {}", zone_id)))?;
        let before = zone.len();
        zone.retain(|r| r.id != record_id);
        if zone.len() == before {
            return Err(Error::not_found(format!("record {}", record_id)));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// IP lookup whose answers are set by the test; `None` means the lookup fails
#[derive(Default)]
pub struct ScriptedLookup {
    ipv4: Mutex<Option<Ipv4Addr>>,
    ipv6: Mutex<Option<Ipv6Addr>>,
    ipv4_calls: AtomicUsize,
    ipv6_calls: AtomicUsize,
}

impl ScriptedLookup {
    pub fn new(ipv4: Option<Ipv4Addr>, ipv6: Option<Ipv6Addr>) -> Self {
        Self {
            ipv4: Mutex::new(ipv4),
            ipv6: Mutex::new(ipv6),
            ..Default::default()
        }
    }

    pub fn set_ipv4(&self, addr: Option<Ipv4Addr>) {
        *self.ipv4.lock().unwrap() = addr;
    }

    pub fn set_ipv6(&self, addr: Option<Ipv6Addr>) {
        *self.ipv6.lock().unwrap() = addr;
    }

    pub fn ipv4_call_count(&self) -> usize {
        self.ipv4_calls.load(Ordering::SeqCst)
    }

    pub fn ipv6_call_count(&self) -> usize {
        self.ipv6_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpLookup for ScriptedLookup {
    async fn fetch_ipv4(&self) -> Result<Ipv4Addr> {
        self.ipv4_calls.fetch_add(1, Ordering::SeqCst);
        let addr = *self.ipv4.lock().unwrap();
        addr.ok_or_else(|| Error::ip_lookup("ipv4 endpoint unreachable"))
    }

    async fn fetch_ipv6(&self) -> Result<Ipv6Addr> {
        self.ipv6_calls.fetch_add(1, Ordering::SeqCst);
        let addr = *self.ipv6.lock().unwrap();
        addr.ok_or_else(|| Error::ip_lookup("ipv6 endpoint unreachable"))
    }
}

pub fn v4(a: u8, b: u8, c: u8, d: u8) -> Option<Ipv4Addr> {
    Some(Ipv4Addr::new(a, b, c, d))
}

/// One-domain configuration used across tests
pub fn single_domain_config(zone_name: &str, records: Vec<RecordConfig>) -> Config {
    Config {
        refresh_rate: 0.1,
        sync_rate: 1.0,
        supports_ipv6: true,
        domains: vec![DomainConfig::new(zone_name, records)],
    }
}

pub fn a(name: &str, proxied: bool) -> RecordConfig {
    RecordConfig::new(name, RecordType::A).with_proxied(proxied)
}

pub fn aaaa(name: &str, proxied: bool) -> RecordConfig {
    RecordConfig::new(name, RecordType::Aaaa).with_proxied(proxied)
}
