// # Cloudflare DNS Gateway
//
// Implements `DnsGateway` against the Cloudflare API v4.
//
// ## Implementation Status
//
// - ✅ One HTTP request per gateway call (record listing: one per page)
// - ✅ Full error propagation (the scheduler decides when to try again)
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - ✅ Provider `errors[]` surfaced when `success` is false
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry or backoff (owned by Scheduler)
// - ❌ NO zone caching (owned by ZoneResolver)
// - ❌ NO diffing (owned by Reconciler)
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - API token MUST be provided via environment variables only
// - Gateway MUST fail fast if token is empty
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?page=..&per_page=..`
// - Batch DNS Records: POST `/zones/:zone_id/dns_records/batch`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ipwatcher_core::record::{ObservedRecord, RecordBatch, RecordWrite, Zone};
use ipwatcher_core::traits::DnsGateway;
use ipwatcher_core::{Error, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL value Cloudflare treats as "automatic"
const AUTO_TTL: u32 = 1;

/// Records requested per page when listing
const RECORDS_PER_PAGE: u32 = 100;

/// Cloudflare response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: u32,
    message: String,
}

impl std::fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cloudflare error {}: {}", self.code, self.message)
    }
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    total_pages: u32,
}

/// DNS record as listed by Cloudflare; only the fields reconciliation reads
#[derive(Debug, Deserialize)]
struct RecordResult {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    proxied: bool,
}

impl From<RecordResult> for ObservedRecord {
    fn from(record: RecordResult) -> Self {
        ObservedRecord {
            id: record.id,
            name: record.name,
            record_type: record.kind,
            content: record.content,
            proxied: record.proxied,
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    posts: Vec<RecordBody<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    puts: Vec<PutBody<'a>>,
}

#[derive(Debug, Serialize)]
struct RecordBody<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    content: String,
    proxied: bool,
    ttl: u32,
}

impl<'a> From<&'a RecordWrite> for RecordBody<'a> {
    fn from(record: &'a RecordWrite) -> Self {
        RecordBody {
            name: &record.name,
            kind: record.record_type.as_str(),
            content: record.content.to_string(),
            proxied: record.proxied,
            ttl: AUTO_TTL,
        }
    }
}

#[derive(Debug, Serialize)]
struct PutBody<'a> {
    id: &'a str,
    #[serde(flatten)]
    record: RecordBody<'a>,
}

impl<'a> From<&'a RecordBatch> for BatchRequest<'a> {
    fn from(batch: &'a RecordBatch) -> Self {
        BatchRequest {
            posts: batch.creates.iter().map(RecordBody::from).collect(),
            puts: batch
                .updates
                .iter()
                .map(|update| PutBody {
                    id: &update.id,
                    record: RecordBody::from(&update.record),
                })
                .collect(),
        }
    }
}

/// Cloudflare DNS gateway
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. Zone caching, diffing and scheduling all live
/// in `ipwatcher-core`.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the gateway will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended batch and delete requests
/// - **NOT** actually modify DNS records
pub struct CloudflareGateway {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API root, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareGateway")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareGateway {
    /// Create a new Cloudflare gateway
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    /// - `dry_run`: If true, perform GET requests but skip writes
    ///
    /// # Errors
    ///
    /// - [`Error::Authentication`] if the token is empty
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::auth("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a gateway in live mode
    pub fn new_live(api_token: impl Into<String>) -> Result<Self> {
        Self::new(api_token, false)
    }

    /// Create a gateway in dry-run mode
    ///
    /// Reads go to Cloudflare as usual; writes are only logged.
    pub fn new_dry_run(api_token: impl Into<String>) -> Result<Self> {
        Self::new(api_token, true)
    }

    /// Point the gateway at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether writes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the Cloudflare envelope
    ///
    /// `what` names the operation in error messages.
    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<Envelope<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: HTTP request failed: {}", what, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("{}: failed to read response: {}", what, e)))?;

        if !status.is_success() {
            return Err(status_error(status, &body, what));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            Error::provider("cloudflare", format!("{}: failed to parse response: {}", what, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                "cloudflare",
                format!("{}: {}", what, describe(&envelope.errors)),
            ));
        }

        Ok(envelope)
    }
}

/// Map a non-2xx response to an error
fn status_error(status: StatusCode, body: &str, what: &str) -> Error {
    // Cloudflare usually still sends an envelope on failure
    let detail = serde_json::from_str::<Envelope<Value>>(body)
        .ok()
        .filter(|envelope| !envelope.errors.is_empty())
        .map(|envelope| describe(&envelope.errors))
        .unwrap_or_else(|| body.trim().to_string());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: Invalid API token or insufficient permissions. Status: {} - {}",
            what, status, detail
        )),
        404 => Error::not_found(format!("{}: Status: {} - {}", what, status, detail)),
        409 => Error::provider(
            "cloudflare",
            format!("{}: Conflict. Status: {} - {}", what, status, detail),
        ),
        429 => Error::rate_limited(format!(
            "{}: Rate limit exceeded. Status: {}",
            what, status
        )),
        500..=599 => Error::provider(
            "cloudflare",
            format!(
                "{}: Cloudflare server error (transient): {} - {}",
                what, status, detail
            ),
        ),
        _ => Error::provider("cloudflare", format!("{}: {} - {}", what, status, detail)),
    }
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "request unsuccessful".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl DnsGateway for CloudflareGateway {
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn list_zones(&self, name: &str) -> Result<Vec<Zone>> {
        tracing::debug!("Looking up zones named {}", name);

        let request = self.client.get(self.url("/zones")).query(&[("name", name)]);
        let envelope: Envelope<Vec<Zone>> = self.call(request, "zone lookup").await?;

        Ok(envelope.result.unwrap_or_default())
    }

    /// Follows `result_info.total_pages` until every page is read.
    async fn list_dns_records(&self, zone_id: &str) -> Result<Vec<ObservedRecord>> {
        let url = self.url(&format!("/zones/{}/dns_records", zone_id));
        let mut records = Vec::new();
        let mut page: u32 = 1;

        loop {
            let request = self.client.get(&url).query(&[
                ("page", page.to_string()),
                ("per_page", RECORDS_PER_PAGE.to_string()),
            ]);
            let envelope: Envelope<Vec<RecordResult>> = self.call(request, "record listing").await?;

            let batch = envelope.result.unwrap_or_default();
            let fetched = batch.len();
            records.extend(batch.into_iter().map(ObservedRecord::from));

            let total_pages = envelope.result_info.map_or(0, |info| info.total_pages.max(info.page));
            if fetched == 0 || page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!("Listed {} record(s) in zone {}", records.len(), zone_id);
        Ok(records)
    }

    /// ```http
    /// POST /zones/:zone_id/dns_records/batch
    /// {"posts": [...], "puts": [{"id": ..., ...}]}
    /// ```
    async fn batch_write(&self, zone_id: &str, batch: &RecordBatch) -> Result<()> {
        let url = self.url(&format!("/zones/{}/dns_records/batch", zone_id));
        let payload = BatchRequest::from(batch);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(());
        }

        let request = self.client.post(&url).json(&payload);
        let _: Envelope<Value> = self.call(request, "batch update").await?;

        tracing::info!(
            "Batch applied to zone {}: {} created, {} updated",
            zone_id,
            batch.creates.len(),
            batch.updates.len()
        );
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let url = self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id));

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would send DELETE request to {}", url);
            return Ok(());
        }

        let _: Envelope<Value> = self
            .call(self.client.delete(&url), "record deletion")
            .await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}
