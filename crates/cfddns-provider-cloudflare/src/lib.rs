// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of `DnsProvider` for the cfddns updater.
//
// ## Behavior
//
// - One HTTP request per trait call; no retry, no caching between calls
// - Credentials come from the `ZoneTarget` of each call and are attached to
//   that request only, so zones with different accounts never share state
// - Non-2xx responses and unparsable bodies become `Error::ProviderApi`
//   carrying the status and raw body
// - Transport failures (DNS, connect, timeout) become `Error::Network`
//
// ## Security Requirements
//
// - Tokens and API keys NEVER appear in logs or Debug output
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - Zone details: GET `/zones/:zone_id`
// - List DNS Records: GET `/zones/:zone_id/dns_records?per_page=100&type=A`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfddns_core::config::{ProviderCredential, ZoneTarget};
use cfddns_core::traits::{AddressFamily, DesiredRecord, DnsProvider, ExistingRecord};
use cfddns_core::{Error, Result};
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Page size for record inventory; only the first page is read
const RECORDS_PER_PAGE: usize = 100;

/// Cloudflare DNS provider
///
/// Holds no credentials of its own. The HTTP client is built once by the
/// caller (with the configured timeout) and shared by every request.
#[derive(Clone)]
pub struct CloudflareProvider {
    /// HTTP client for API requests
    client: reqwest::Client,

    /// API base URL, overridable for tests
    base_url: String,
}

// Custom Debug implementation that skips the client internals
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Response envelope shared by every Cloudflare API v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    result: T,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

/// Records the listing reported but did not return
fn invisible_records(total: Option<usize>, returned: usize) -> Option<usize> {
    total.filter(|total| *total > returned).map(|total| total - returned)
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ZoneDetails {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    name: String,
    content: String,
}

impl CloudflareProvider {
    /// Create a provider against the public Cloudflare API
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, CLOUDFLARE_API_BASE)
    }

    /// Create a provider against a different API base URL
    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Attach a zone's credentials to one request
    fn authorize(request: RequestBuilder, credential: &ProviderCredential) -> RequestBuilder {
        match credential {
            ProviderCredential::ApiToken(token) => request.bearer_auth(token),
            ProviderCredential::ApiKey {
                api_key,
                account_email,
            } => request
                .header("X-Auth-Key", api_key)
                .header("X-Auth-Email", account_email),
        }
    }

    /// Send a request and decode the response envelope
    ///
    /// # Errors
    ///
    /// - `Error::Network` if the request never got a response
    /// - `Error::ProviderApi` on a non-2xx status, an unparsable body, or
    ///   an envelope with `success: false`
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        credential: &ProviderCredential,
        what: &str,
    ) -> Result<Envelope<T>> {
        let response = Self::authorize(request, credential)
            .send()
            .await
            .map_err(|e| Error::network(format!("{what}: HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("{what}: failed to read response: {e}")))?;

        if !status.is_success() {
            tracing::debug!("{} failed with status {}", what, status);
            return Err(Error::provider_api(status.as_u16(), body));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            tracing::debug!("{}: unparsable response: {}", what, e);
            Error::provider_api(status.as_u16(), body.clone())
        })?;

        if !envelope.success {
            return Err(Error::provider_api(status.as_u16(), body));
        }

        Ok(envelope)
    }

    fn zone_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}", self.base_url, zone_id)
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone_id)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// Resolve the zone's base domain
    ///
    /// ```http
    /// GET /zones/:zone_id
    /// ```
    async fn zone_name(&self, zone: &ZoneTarget) -> Result<String> {
        let request = self.client.get(self.zone_url(&zone.zone_id));
        let envelope: Envelope<ZoneDetails> =
            self.send(request, &zone.credential, "zone lookup").await?;

        tracing::debug!("Zone {} is {}", zone.zone_id, envelope.result.name);
        Ok(envelope.result.name)
    }

    /// Fetch the first page of records of one type
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?per_page=100&type=A
    /// ```
    async fn list_records(
        &self,
        zone: &ZoneTarget,
        family: AddressFamily,
    ) -> Result<Vec<ExistingRecord>> {
        let per_page = RECORDS_PER_PAGE.to_string();
        let request = self.client.get(self.records_url(&zone.zone_id)).query(&[
            ("per_page", per_page.as_str()),
            ("type", family.record_type()),
        ]);
        let envelope: Envelope<Vec<DnsRecord>> =
            self.send(request, &zone.credential, "record listing").await?;

        let returned = envelope.result.len();
        let total = envelope.result_info.and_then(|info| info.total_count);
        if let Some(unread) = invisible_records(total, returned) {
            tracing::warn!(
                "😡 zone {} has {} more {} records beyond the first {}; they were not read",
                zone.zone_id,
                unread,
                family.record_type(),
                returned
            );
        }

        Ok(envelope
            .result
            .into_iter()
            .map(|record| ExistingRecord {
                id: record.id,
                fqdn: record.name,
                content: record.content,
            })
            .collect())
    }

    /// Create a record
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {"type": "A", "name": "home.example.com", "content": "203.0.113.7", "proxied": false, "ttl": 1}
    /// ```
    async fn create_record(&self, zone: &ZoneTarget, record: &DesiredRecord) -> Result<()> {
        let request = self.client.post(self.records_url(&zone.zone_id)).json(record);
        self.send::<Option<serde_json::Value>>(request, &zone.credential, "record creation")
            .await?;
        Ok(())
    }

    /// Replace a record's content and attributes
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn update_record(
        &self,
        zone: &ZoneTarget,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<()> {
        let url = format!("{}/{}", self.records_url(&zone.zone_id), record_id);
        let request = self.client.put(url).json(record);
        self.send::<Option<serde_json::Value>>(request, &zone.credential, "record update")
            .await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}
