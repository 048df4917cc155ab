// # DNS Gateway Trait
//
// The minimal set of provider operations the reconciler needs.
//
// ## Implementations
//
// - Cloudflare: `ipwatcher-provider-cloudflare` crate
// - In-memory fakes in the core contract tests
//
// ## Usage
//
// ```rust,ignore
// use ipwatcher_core::DnsGateway;
//
// async fn show(gateway: &dyn DnsGateway) -> ipwatcher_core::Result<()> {
//     for zone in gateway.list_zones("example.com").await? {
//         let records = gateway.list_dns_records(&zone.id).await?;
//         println!("{}: {} records", zone.name, records.len());
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::record::{ObservedRecord, RecordBatch, Zone};

/// Capability interface to a DNS provider
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Trust Level: Untrusted
///
/// Gateways are thin transport adapters:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (the scheduler's next tick is the retry)
///
/// ## Forbidden Capabilities
/// - ❌ Decide which records need writing (owned by `Reconciler`)
/// - ❌ Cache zone ids (owned by `ZoneResolver`)
/// - ❌ Retry or back off
/// - ❌ Spawn tasks or threads
#[async_trait]
pub trait DnsGateway: Send + Sync {
    /// List zones whose name matches `name`
    ///
    /// The provider filter is expected to be exact, but callers must still
    /// check the returned names.
    async fn list_zones(&self, name: &str) -> Result<Vec<Zone>, crate::Error>;

    /// List every DNS record in a zone
    ///
    /// May include record types other than A/AAAA; callers filter.
    async fn list_dns_records(&self, zone_id: &str) -> Result<Vec<ObservedRecord>, crate::Error>;

    /// Apply all creates and updates for a zone in one request
    ///
    /// Atomicity is whatever the provider's batch endpoint guarantees; on
    /// error the caller assumes nothing was applied.
    async fn batch_write(&self, zone_id: &str, batch: &RecordBatch) -> Result<(), crate::Error>;

    /// Delete one record by id
    ///
    /// Never called by scheduled reconciliation.
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
