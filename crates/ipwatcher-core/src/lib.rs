// # ipwatcher-core
//
// Core library for the IP watcher: keeps DNS records pointed at this host's
// public addresses.
//
// ## Architecture Overview
//
// - **IpLookup**: Trait for fetching the public IPv4/IPv6 address
// - **DnsGateway**: Trait for the provider operations reconciliation needs
// - **IpMonitor**: Tracks last known addresses and detects change
// - **ZoneResolver**: Maps zone names to provider ids, cached for the process lifetime
// - **Reconciler**: Diffs desired vs. observed records into one batched write
// - **Scheduler**: Refresh and verify triggers around a single control loop
//
// ## Design Principles
//
// 1. **Minimal writes**: records that already match are never written
// 2. **Best effort across domains**: one failing zone never blocks the others
// 3. **Stale over empty**: a failed lookup keeps the last known address
// 4. **Library-First**: the daemon is a thin shell around `Scheduler`

pub mod config;
pub mod error;
pub mod monitor;
pub mod reconciler;
pub mod record;
pub mod scheduler;
pub mod shutdown;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use config::{Config, DomainConfig, RecordConfig};
pub use error::{Error, Result};
pub use monitor::{IpMonitor, IpSnapshot, IpState, PollOutcome};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use record::{DesiredRecord, ObservedRecord, RecordBatch, RecordType, Zone};
pub use scheduler::{PassTrigger, Scheduler, Trigger, WatchEvent};
pub use shutdown::{Shutdown, ShutdownHandle};
pub use traits::{DnsGateway, IpFamily, IpLookup};
pub use zone::{ZoneCache, ZoneResolver};
