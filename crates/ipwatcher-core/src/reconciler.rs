//! Record reconciliation
//!
//! Given the desired records of one zone and the current addresses, the
//! reconciler works out the smallest set of creates and updates and sends
//! them to the provider as a single batch.
//!
//! ## Flow
//!
//! ```text
//! list_dns_records(zone) ──► keep A/AAAA ──► index by fqdn|TYPE
//!                                                   │
//!            desired records ──► plan() ◄───────────┘
//!                                   │
//!                     empty? ──yes──► no-op, no write
//!                                   │ no
//!                                   ▼
//!                         batch_write(zone, batch)
//! ```
//!
//! ## Guarantees
//!
//! - At most one `batch_write` per [`Reconciler::reconcile`] call
//! - A record with no known address for its type is left alone
//! - A record whose content and proxied flag already match is never written
//! - Records of other types are never considered or modified
//! - Nothing is ever deleted by reconciliation

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::monitor::IpSnapshot;
use crate::record::{DesiredRecord, ObservedRecord, ReconciliationKey, RecordBatch, RecordUpdate};
use crate::traits::DnsGateway;

/// Counts from one reconciliation of one zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Records added to the create batch
    pub created: usize,
    /// Records added to the update batch
    pub updated: usize,
    /// Records that already matched
    pub unchanged: usize,
    /// Records skipped because their address is unknown
    pub skipped: usize,
}

impl ReconcileOutcome {
    /// Whether a write was issued
    pub fn wrote(&self) -> bool {
        self.created + self.updated > 0
    }
}

/// Compute the batch needed to bring `observed` in line with `desired`
///
/// Pure; performs no I/O. `observed` may contain any record types.
pub fn plan(
    desired: &[DesiredRecord],
    observed: &[ObservedRecord],
    addresses: &IpSnapshot,
) -> (RecordBatch, ReconcileOutcome) {
    // Duplicate keys at the provider resolve to the last one listed.
    let existing: HashMap<ReconciliationKey, &ObservedRecord> = observed
        .iter()
        .filter_map(|record| record.key().map(|key| (key, record)))
        .collect();

    let mut batch = RecordBatch::default();
    let mut outcome = ReconcileOutcome::default();

    for record in desired {
        let Some(addr) = addresses.address_for(record.record_type) else {
            debug!(
                "No {} address known, leaving {} alone",
                record.record_type,
                record.fqdn()
            );
            outcome.skipped += 1;
            continue;
        };

        match existing.get(&record.key()) {
            None => {
                debug!("{} {} missing, will create", record.record_type, record.fqdn());
                batch.creates.push(record.with_content(addr));
                outcome.created += 1;
            }
            Some(current) if current.points_at(addr) && current.proxied == record.proxied => {
                outcome.unchanged += 1;
            }
            Some(current) => {
                debug!(
                    "{} {} drifted (content {} -> {}, proxied {} -> {}), will update",
                    record.record_type,
                    record.fqdn(),
                    current.content,
                    addr,
                    current.proxied,
                    record.proxied
                );
                batch.updates.push(RecordUpdate {
                    id: current.id.clone(),
                    record: record.with_content(addr),
                });
                outcome.updated += 1;
            }
        }
    }

    (batch, outcome)
}

/// Applies desired records to a provider zone
pub struct Reconciler {
    gateway: Arc<dyn DnsGateway>,
}

impl Reconciler {
    /// Create a reconciler over a provider gateway
    pub fn new(gateway: Arc<dyn DnsGateway>) -> Self {
        Self { gateway }
    }

    /// Bring the zone's A/AAAA records in line with `desired`
    ///
    /// Issues at most one batched write. On write failure nothing is
    /// assumed to have been applied and the error is returned; the next
    /// scheduled pass retries.
    pub async fn reconcile(
        &self,
        zone_id: &str,
        desired: &[DesiredRecord],
        addresses: &IpSnapshot,
    ) -> Result<ReconcileOutcome> {
        let observed = self.gateway.list_dns_records(zone_id).await.map_err(|e| {
            with_context(e, format!("failed to list DNS records for zone {}", zone_id))
        })?;

        let (batch, outcome) = plan(desired, &observed, addresses);

        if batch.is_empty() {
            info!(
                "No DNS records to create or update in zone {} ({} unchanged, {} skipped)",
                zone_id, outcome.unchanged, outcome.skipped
            );
            return Ok(outcome);
        }

        info!(
            "Sending batch to {} for zone {}: {} create(s), {} update(s)",
            self.gateway.provider_name(),
            zone_id,
            batch.creates.len(),
            batch.updates.len()
        );

        self.gateway
            .batch_write(zone_id, &batch)
            .await
            .map_err(|e| with_context(e, format!("batch write failed for zone {}", zone_id)))?;

        Ok(outcome)
    }

    /// Delete a record by provider id
    ///
    /// Exposed for operators; scheduled reconciliation never calls this.
    pub async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        self.gateway
            .delete_record(zone_id, record_id)
            .await
            .map_err(|e| with_context(e, format!("failed to delete DNS record {}", record_id)))?;
        info!("Deleted DNS record {} from zone {}", record_id, zone_id);
        Ok(())
    }
}

/// Prefix a message while keeping the error's class
fn with_context(err: Error, context: String) -> Error {
    match err {
        Error::Cancelled => Error::Cancelled,
        Error::NotFound(msg) => Error::NotFound(format!("{}: {}", context, msg)),
        Error::Authentication(msg) => Error::Authentication(format!("{}: {}", context, msg)),
        Error::RateLimited(msg) => Error::RateLimited(format!("{}: {}", context, msg)),
        Error::Http(msg) => Error::Http(format!("{}: {}", context, msg)),
        Error::AmbiguousZone(msg) => Error::AmbiguousZone(format!("{}: {}", context, msg)),
        Error::Config(msg) => Error::Config(format!("{}: {}", context, msg)),
        Error::IpLookup(msg) => Error::IpLookup(format!("{}: {}", context, msg)),
        Error::Other(msg) => Error::Other(format!("{}: {}", context, msg)),
        Error::Provider { provider, message } => Error::Provider {
            provider,
            message: format!("{}: {}", context, message),
        },
        // Json carries a source error, not a message
        other @ Error::Json(_) => Error::Other(format!("{}: {}", context, other)),
    }
}
