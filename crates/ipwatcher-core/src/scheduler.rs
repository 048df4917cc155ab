//! Control loop
//!
//! The [`Scheduler`] owns the only event loop. Two independent triggers feed
//! it:
//!
//! - **refresh**: polls the public IP; on change, reconciles every domain
//!   and restarts the verify period
//! - **verify**: reconciles every domain unconditionally, correcting drift
//!
//! ## Architecture
//!
//! ```text
//!  refresh ──► IpMonitor::poll ──changed?──► verify.reset_period()
//!                                   │                 │
//!                                   ▼                 ▼
//!  verify ─────────────────────► reconcile_all ─► ZoneResolver ─► Reconciler
//! ```
//!
//! Both triggers are awaited from one `select!`, so passes never overlap.
//! Shutdown is observed at the same wait point, and every pass is guarded
//! so that an in-flight pass is dropped as soon as shutdown is requested.
//!
//! ## States
//!
//! Running (after one unconditional startup pass) until the shutdown signal,
//! then stopped. Failures never leave Running.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::monitor::{IpMonitor, IpSnapshot, IpState};
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::record::DesiredRecord;
use crate::shutdown::Shutdown;
use crate::traits::{DnsGateway, IpFamily, IpLookup};
use crate::zone::{ZoneCache, ZoneResolver};

/// Capacity of the event channel returned by [`Scheduler::new`]
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

const MIN_PERIOD: Duration = Duration::from_millis(1);
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// What started a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTrigger {
    /// The unconditional pass before the triggers are armed
    Startup,
    /// An IP change seen by the refresh trigger
    Change,
    /// The periodic verify sweep
    Verify,
}

/// Events emitted by the Scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Control loop started
    Started { domains: usize },

    /// A public address changed
    IpChanged {
        family: IpFamily,
        previous: Option<std::net::IpAddr>,
        current: std::net::IpAddr,
    },

    /// The verify trigger was restarted after a change-driven pass
    VerifyReset,

    /// One domain was reconciled
    DomainReconciled {
        zone_name: String,
        trigger: PassTrigger,
        outcome: ReconcileOutcome,
    },

    /// One domain failed; the rest of the pass continues
    DomainFailed {
        zone_name: String,
        trigger: PassTrigger,
        error: String,
    },

    /// A pass over all domains finished
    PassCompleted {
        trigger: PassTrigger,
        domains: usize,
        failures: usize,
    },

    /// Control loop stopped
    Stopped { reason: String },
}

/// A periodic trigger whose period can be restarted
///
/// The first fire happens one full period after creation.
#[derive(Debug)]
pub struct Trigger {
    name: &'static str,
    period: Duration,
    interval: Interval,
}

impl Trigger {
    /// Create a trigger; the period is clamped to between 1 ms and one year
    pub fn new(name: &'static str, period: Duration) -> Self {
        let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            name,
            period,
            interval,
        }
    }

    /// Wait for the next fire
    pub async fn fired(&mut self) {
        self.interval.tick().await;
    }

    /// Restart the period from now; the next fire is one full period away
    pub fn reset_period(&mut self) {
        debug!("Resetting {} trigger ({:?})", self.name, self.period);
        self.interval.reset();
    }

    /// The trigger's period
    pub fn period(&self) -> Duration {
        self.period
    }
}

struct DomainTarget {
    zone_name: String,
    records: Vec<DesiredRecord>,
}

/// Drives IP polling and DNS reconciliation for all configured domains
pub struct Scheduler {
    domains: Vec<DomainTarget>,
    monitor: IpMonitor,
    ip_state: IpState,
    resolver: ZoneResolver,
    reconciler: Reconciler,
    refresh_interval: Duration,
    sync_interval: Duration,
    event_tx: mpsc::Sender<WatchEvent>,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields
    /// [`WatchEvent`]s. Dropping the receiver is allowed.
    pub fn new(
        config: &Config,
        gateway: Arc<dyn DnsGateway>,
        lookup: Arc<dyn IpLookup>,
    ) -> Result<(Self, mpsc::Receiver<WatchEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let monitor = IpMonitor::new(lookup, config.supports_ipv6);
        let ip_state = monitor.state();

        let scheduler = Self {
            domains: config
                .domains
                .iter()
                .map(|domain| DomainTarget {
                    zone_name: domain.zone_name.clone(),
                    records: domain.desired_records(),
                })
                .collect(),
            monitor,
            ip_state,
            resolver: ZoneResolver::new(Arc::clone(&gateway)),
            reconciler: Reconciler::new(gateway),
            refresh_interval: config.refresh_interval(),
            sync_interval: config.sync_interval(),
            event_tx: tx,
        };

        Ok((scheduler, rx))
    }

    /// Read handle to the current IP state
    pub fn ip_state(&self) -> IpState {
        self.ip_state.clone()
    }

    /// Cached zone ids
    pub fn zone_cache(&self) -> &ZoneCache {
        self.resolver.cache()
    }

    /// The reconciler, for explicit operations such as record deletion
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Run until `shutdown` is triggered
    ///
    /// Performs one IP poll and one unconditional pass, then arms both
    /// triggers. Pass failures are logged and never stop the loop.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    pub async fn run(&self, shutdown: Shutdown) -> Result<()> {
        self.emit(WatchEvent::Started {
            domains: self.domains.len(),
        });
        info!("Starting IP watcher for {} domain(s)", self.domains.len());

        let startup = shutdown
            .guard(async {
                self.poll_and_announce().await;
                self.reconcile_all(PassTrigger::Startup).await
            })
            .await;
        match startup {
            Err(e) if e.is_cancelled() => {
                self.stopped();
                return Ok(());
            }
            Err(e) => warn!("Initial reconciliation incomplete: {}", e),
            Ok(()) => {}
        }

        let mut refresh = Trigger::new("refresh", self.refresh_interval);
        let mut verify = Trigger::new("verify", self.sync_interval);
        info!("Refresh interval: {:?}", refresh.period());
        info!("Sync interval: {:?}", verify.period());

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                _ = refresh.fired() => {
                    let changed = match shutdown.guard(async { Ok(self.poll_and_announce().await) }).await {
                        Ok(changed) => changed,
                        Err(_) => break,
                    };
                    if !changed {
                        continue;
                    }

                    verify.reset_period();
                    self.emit(WatchEvent::VerifyReset);

                    match shutdown.guard(self.reconcile_all(PassTrigger::Change)).await {
                        Err(e) if e.is_cancelled() => break,
                        Err(e) => error!("Error updating DNS records after IP change: {}", e),
                        Ok(()) => {}
                    }
                }

                _ = verify.fired() => {
                    info!("Verifying DNS records...");
                    match shutdown.guard(self.reconcile_all(PassTrigger::Verify)).await {
                        Err(e) if e.is_cancelled() => break,
                        Err(e) => error!("Error verifying DNS records: {}", e),
                        Ok(()) => {}
                    }
                }
            }
        }

        self.stopped();
        Ok(())
    }

    /// Reconcile every configured domain against the current IP state
    ///
    /// Every domain is attempted. Each failure is logged; the last one is
    /// returned.
    pub async fn reconcile_all(&self, trigger: PassTrigger) -> Result<()> {
        let addresses = self.ip_state.snapshot();
        let mut last_error = None;
        let mut failures = 0;

        for domain in &self.domains {
            match self.reconcile_domain(domain, &addresses).await {
                Ok(outcome) => {
                    info!(
                        "DNS records for {} up to date ({} created, {} updated, {} unchanged, {} skipped)",
                        domain.zone_name,
                        outcome.created,
                        outcome.updated,
                        outcome.unchanged,
                        outcome.skipped
                    );
                    self.emit(WatchEvent::DomainReconciled {
                        zone_name: domain.zone_name.clone(),
                        trigger,
                        outcome,
                    });
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    error!("Failed to reconcile DNS records for {}: {}", domain.zone_name, e);
                    self.emit(WatchEvent::DomainFailed {
                        zone_name: domain.zone_name.clone(),
                        trigger,
                        error: e.to_string(),
                    });
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        self.emit(WatchEvent::PassCompleted {
            trigger,
            domains: self.domains.len(),
            failures,
        });

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn reconcile_domain(
        &self,
        domain: &DomainTarget,
        addresses: &IpSnapshot,
    ) -> Result<ReconcileOutcome> {
        let zone_id = self.resolver.resolve(&domain.zone_name).await?;
        self.reconciler
            .reconcile(&zone_id, &domain.records, addresses)
            .await
    }

    /// Poll the monitor and emit change events; returns whether anything changed
    async fn poll_and_announce(&self) -> bool {
        let outcome = self.monitor.poll().await;
        for change in &outcome.changes {
            self.emit(WatchEvent::IpChanged {
                family: change.family,
                previous: change.previous,
                current: change.current,
            });
        }
        outcome.changed()
    }

    fn stopped(&self) {
        info!("Shutting down IP watcher");
        self.emit(WatchEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
    }

    fn emit(&self, event: WatchEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
            }
            // Nobody is listening; that is allowed.
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("domains", &self.domains.len())
            .field("refresh_interval", &self.refresh_interval)
            .field("sync_interval", &self.sync_interval)
            .finish()
    }
}
