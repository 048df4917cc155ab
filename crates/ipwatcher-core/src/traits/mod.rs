//! Core traits for the IP watcher
//!
//! This module defines the capability interfaces the core depends on.
//!
//! - [`DnsGateway`]: List zones and records, batch-write and delete records
//! - [`IpLookup`]: Fetch this host's public addresses

pub mod dns_gateway;
pub mod ip_lookup;

pub use dns_gateway::DnsGateway;
pub use ip_lookup::{IpFamily, IpLookup};
