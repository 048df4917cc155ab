// # HTTP IP Lookup
//
// Fetches this host's public addresses from plain-text "what is my IP"
// endpoints (ipify by default).
//
// ## Architecture
//
// One GET per lookup. The body is the address as text; surrounding
// whitespace is ignored. No caching and no polling here: `IpMonitor` keeps
// the last known value and `Scheduler` decides when to ask again.

use ipwatcher_core::traits::{IpFamily, IpLookup};
use ipwatcher_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// Default IPv4 endpoint (answers over IPv4 only)
pub const DEFAULT_IPV4_URL: &str = "https://api.ipify.org";

/// Default IPv6 endpoint (answers over IPv6 only)
pub const DEFAULT_IPV6_URL: &str = "https://api6.ipify.org";

/// Per-request timeout
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based public IP lookup
#[derive(Debug, Clone)]
pub struct HttpIpLookup {
    /// URL returning the IPv4 address
    ipv4_url: String,

    /// URL returning the IPv6 address
    ipv6_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpLookup {
    /// Create a lookup against the default ipify endpoints
    pub fn new() -> Result<Self> {
        Self::with_endpoints(DEFAULT_IPV4_URL, DEFAULT_IPV6_URL)
    }

    /// Create a lookup against custom endpoints
    ///
    /// # Parameters
    ///
    /// - `ipv4_url`: URL whose body is the caller's IPv4 address
    /// - `ipv6_url`: URL whose body is the caller's IPv6 address
    pub fn with_endpoints(ipv4_url: impl Into<String>, ipv6_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            ipv4_url: ipv4_url.into(),
            ipv6_url: ipv6_url.into(),
            client,
        })
    }

    /// Fetch the body of `url` as an address of the given family
    async fn fetch(&self, url: &str, family: IpFamily) -> Result<IpAddr> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ip_lookup(format!("{} request failed: {}", family, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_lookup(format!(
                "{} lookup returned HTTP {}",
                family,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_lookup(format!("Failed to read {} response: {}", family, e)))?;

        let ip_text = body.trim();
        if ip_text.is_empty() {
            return Err(Error::ip_lookup(format!("Empty {} address received", family)));
        }

        let ip: IpAddr = ip_text
            .parse()
            .map_err(|_| Error::ip_lookup(format!("Invalid IP address: {}", ip_text)))?;

        let expected = match ip {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        };
        if expected != family {
            return Err(Error::ip_lookup(format!("Expected {}, got: {}", family, ip)));
        }

        tracing::debug!("Fetched {} address {} from {}", family, ip, url);
        Ok(ip)
    }
}

#[async_trait::async_trait]
impl IpLookup for HttpIpLookup {
    async fn fetch_ipv4(&self) -> Result<Ipv4Addr> {
        match self.fetch(&self.ipv4_url, IpFamily::V4).await? {
            IpAddr::V4(addr) => Ok(addr),
            IpAddr::V6(addr) => Err(Error::ip_lookup(format!("Expected IPv4, got: {}", addr))),
        }
    }

    async fn fetch_ipv6(&self) -> Result<Ipv6Addr> {
        match self.fetch(&self.ipv6_url, IpFamily::V6).await? {
            IpAddr::V6(addr) => Ok(addr),
            IpAddr::V4(addr) => Err(Error::ip_lookup(format!("Expected IPv6, got: {}", addr))),
        }
    }
}
