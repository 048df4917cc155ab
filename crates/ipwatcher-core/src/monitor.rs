//! Public IP tracking
//!
//! [`IpMonitor`] is the single writer of the last known addresses. Everything
//! else reads them through an [`IpState`] handle, which has no way to mutate
//! them.
//!
//! A failed lookup never clears a known address: the previous value is kept
//! until a later lookup succeeds with something different.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::record::RecordType;
use crate::traits::{IpFamily, IpLookup};

/// Last successfully observed addresses; `None` means unknown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IpSnapshot {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl IpSnapshot {
    /// Address to publish for a record type, if one is known
    pub fn address_for(&self, record_type: RecordType) -> Option<IpAddr> {
        match record_type {
            RecordType::A => self.ipv4.map(IpAddr::V4),
            RecordType::Aaaa => self.ipv6.map(IpAddr::V6),
        }
    }
}

/// Read-only handle to the process-wide IP state
#[derive(Debug, Clone, Default)]
pub struct IpState {
    inner: Arc<RwLock<IpSnapshot>>,
}

impl IpState {
    /// Current snapshot
    pub fn snapshot(&self) -> IpSnapshot {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, apply: impl FnOnce(&mut IpSnapshot)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut guard);
    }
}

/// A single address change detected by a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpChange {
    pub family: IpFamily,
    pub previous: Option<IpAddr>,
    pub current: IpAddr,
}

/// Result of one [`IpMonitor::poll`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// State after the poll
    pub snapshot: IpSnapshot,
    /// Changes applied by this poll (empty when nothing changed)
    pub changes: Vec<IpChange>,
}

impl PollOutcome {
    /// Whether either family changed
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Tracks the host's public addresses across polling cycles
pub struct IpMonitor {
    lookup: Arc<dyn IpLookup>,
    supports_ipv6: bool,
    state: IpState,
}

impl IpMonitor {
    /// Create a monitor with empty state
    ///
    /// IPv6 is only looked up when `supports_ipv6` is set.
    pub fn new(lookup: Arc<dyn IpLookup>, supports_ipv6: bool) -> Self {
        Self {
            lookup,
            supports_ipv6,
            state: IpState::default(),
        }
    }

    /// Read handle to the state this monitor writes
    pub fn state(&self) -> IpState {
        self.state.clone()
    }

    /// Fetch current addresses and record any change
    ///
    /// Lookup failures are logged and leave the stored value untouched.
    /// New values are stored before this returns, so a reconciliation
    /// started afterwards sees them.
    pub async fn poll(&self) -> PollOutcome {
        let previous = self.state.snapshot();
        let mut changes = Vec::new();

        match self.lookup.fetch_ipv4().await {
            Ok(addr) if previous.ipv4 != Some(addr) => {
                info!(
                    "IPv4 changed: {} -> {}",
                    addr_or_unset(previous.ipv4.map(IpAddr::V4)),
                    addr
                );
                self.state.update(|s| s.ipv4 = Some(addr));
                changes.push(IpChange {
                    family: IpFamily::V4,
                    previous: previous.ipv4.map(IpAddr::V4),
                    current: IpAddr::V4(addr),
                });
            }
            Ok(addr) => debug!("IPv4 unchanged: {}", addr),
            Err(e) => warn!("Failed to fetch IPv4: {}", e),
        }

        if self.supports_ipv6 {
            match self.lookup.fetch_ipv6().await {
                Ok(addr) if previous.ipv6 != Some(addr) => {
                    info!(
                        "IPv6 changed: {} -> {}",
                        addr_or_unset(previous.ipv6.map(IpAddr::V6)),
                        addr
                    );
                    self.state.update(|s| s.ipv6 = Some(addr));
                    changes.push(IpChange {
                        family: IpFamily::V6,
                        previous: previous.ipv6.map(IpAddr::V6),
                        current: IpAddr::V6(addr),
                    });
                }
                Ok(addr) => debug!("IPv6 unchanged: {}", addr),
                // IPv6 may simply be unavailable right now
                Err(e) => warn!("Failed to fetch IPv6: {}", e),
            }
        }

        PollOutcome {
            snapshot: self.state.snapshot(),
            changes,
        }
    }
}

fn addr_or_unset(addr: Option<IpAddr>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_else(|| "<unset>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_for_record_type() {
        let snapshot = IpSnapshot {
            ipv4: Some(Ipv4Addr::new(192, 0, 2, 1)),
            ipv6: None,
        };
        assert_eq!(
            snapshot.address_for(RecordType::A),
            Some(IpAddr::from([192, 0, 2, 1]))
        );
        assert_eq!(snapshot.address_for(RecordType::Aaaa), None);
    }

    #[test]
    fn test_state_starts_empty() {
        assert_eq!(IpState::default().snapshot(), IpSnapshot::default());
    }

    #[test]
    fn test_addr_or_unset() {
        assert_eq!(addr_or_unset(None), "<unset>");
        assert_eq!(
            addr_or_unset(Some(IpAddr::from([198, 51, 100, 4]))),
            "198.51.100.4"
        );
    }

    struct Fixed;

    #[async_trait::async_trait]
    impl IpLookup for Fixed {
        async fn fetch_ipv4(&self) -> crate::Result<Ipv4Addr> {
            Ok(Ipv4Addr::new(198, 51, 100, 4))
        }

        async fn fetch_ipv6(&self) -> crate::Result<Ipv6Addr> {
            Ok(Ipv6Addr::LOCALHOST)
        }
    }

    #[tokio::test]
    async fn test_first_poll_changes_both_families() {
        let monitor = IpMonitor::new(Arc::new(Fixed), true);
        let outcome = monitor.poll().await;

        assert_eq!(outcome.changes.len(), 2);
        assert_eq!(outcome.changes[0].previous, None);
        assert_eq!(outcome.snapshot.ipv6, Some(Ipv6Addr::LOCALHOST));
    }
}
