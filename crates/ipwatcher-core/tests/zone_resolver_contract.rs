//! Architectural Contract Test: Zone Resolution
//!
//! Constraints verified:
//! - A resolved zone id is cached and later lookups make no provider call
//! - Only exact (case-insensitive) name matches count
//! - Unknown and ambiguous zones fail and are not cached

mod common;

use common::*;
use ipwatcher_core::error::Error;
use ipwatcher_core::record::{ObservedRecord, RecordBatch, Zone};
use ipwatcher_core::traits::DnsGateway;
use ipwatcher_core::{Result, ZoneResolver};
use std::sync::Arc;

#[tokio::test]
async fn second_resolution_is_served_from_cache() {
    let gateway = Arc::new(FakeGateway::new().with_zone("z-123", "example.com"));
    let resolver = ZoneResolver::new(gateway.clone());

    assert_eq!(resolver.resolve("example.com").await.unwrap(), "z-123");
    assert_eq!(resolver.resolve("example.com").await.unwrap(), "z-123");
    assert_eq!(resolver.resolve("Example.COM").await.unwrap(), "z-123");

    assert_eq!(gateway.list_zones_call_count(), 1);
    assert_eq!(resolver.cache().len(), 1);
}

#[tokio::test]
async fn unknown_zone_is_not_found_and_not_cached() {
    let gateway = Arc::new(FakeGateway::new().with_zone("z-123", "example.com"));
    let resolver = ZoneResolver::new(gateway.clone());

    let err = resolver.resolve("nosuchzone.com").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(resolver.cache().is_empty());

    let _ = resolver.resolve("nosuchzone.com").await;
    assert_eq!(gateway.list_zones_call_count(), 2);
}

/// Provider that answers every zone query with a fixed list, ignoring the name
struct LooseZoneSearch {
    zones: Vec<Zone>,
}

#[async_trait::async_trait]
impl DnsGateway for LooseZoneSearch {
    async fn list_zones(&self, _name: &str) -> Result<Vec<Zone>> {
        Ok(self.zones.clone())
    }

    async fn list_dns_records(&self, _zone_id: &str) -> Result<Vec<ObservedRecord>> {
        Ok(Vec::new())
    }

    async fn batch_write(&self, _zone_id: &str, _batch: &RecordBatch) -> Result<()> {
        Ok(())
    }

    async fn delete_record(&self, _zone_id: &str, _record_id: &str) -> Result<()> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "loose"
    }
}

fn zone(id: &str, name: &str) -> Zone {
    Zone {
        id: id.to_string(),
        name: name.to_string(),
    }
}

#[tokio::test]
async fn near_misses_from_the_provider_are_ignored() {
    let resolver = ZoneResolver::new(Arc::new(LooseZoneSearch {
        zones: vec![
            zone("z-sub", "sub.example.com"),
            zone("z-apex", "example.com."),
            zone("z-other", "example.co"),
        ],
    }));

    assert_eq!(resolver.resolve("example.com").await.unwrap(), "z-apex");
}

#[tokio::test]
async fn duplicate_zone_names_are_ambiguous() {
    let resolver = ZoneResolver::new(Arc::new(LooseZoneSearch {
        zones: vec![zone("z-1", "example.com"), zone("z-2", "EXAMPLE.com")],
    }));

    let err = resolver.resolve("example.com").await.unwrap_err();
    assert!(matches!(err, Error::AmbiguousZone(_)));
    assert!(resolver.cache().is_empty());
}

#[tokio::test]
async fn provider_errors_propagate() {
    struct Down;

    #[async_trait::async_trait]
    impl DnsGateway for Down {
        async fn list_zones(&self, _name: &str) -> Result<Vec<Zone>> {
            Err(Error::auth("token rejected"))
        }
        async fn list_dns_records(&self, _zone_id: &str) -> Result<Vec<ObservedRecord>> {
            unreachable!()
        }
        async fn batch_write(&self, _zone_id: &str, _batch: &RecordBatch) -> Result<()> {
            unreachable!()
        }
        async fn delete_record(&self, _zone_id: &str, _record_id: &str) -> Result<()> {
            unreachable!()
        }
        fn provider_name(&self) -> &'static str {
            "down"
        }
    }

    let resolver = ZoneResolver::new(Arc::new(Down));
    let err = resolver.resolve("example.com").await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
}
