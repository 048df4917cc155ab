// # IP Lookup Trait
//
// Defines the interface for discovering this host's public addresses.
//
// ## Implementations
//
// - HTTP (ipify): `ipwatcher-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ipwatcher_core::IpLookup;
//
// async fn show(lookup: &dyn IpLookup) -> ipwatcher_core::Result<()> {
//     println!("public IPv4: {}", lookup.fetch_ipv4().await?);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl std::fmt::Display for IpFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpFamily::V4 => f.write_str("IPv4"),
            IpFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// Trait for public IP lookup clients
///
/// Each call is a single blocking request that either yields an address of
/// the requested family or fails. Implementations must enforce their own
/// request timeout so a stuck endpoint cannot stall the control loop.
///
/// # Trust Level: Semi-Trusted
///
/// ## Forbidden Capabilities
/// - ❌ Remember previous answers (owned by `IpMonitor`)
/// - ❌ Retry or poll on their own (owned by `Scheduler`)
#[async_trait]
pub trait IpLookup: Send + Sync {
    /// Fetch the public IPv4 address
    async fn fetch_ipv4(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Fetch the public IPv6 address
    async fn fetch_ipv6(&self) -> Result<Ipv6Addr, crate::Error>;
}
