// # DNS Provider Trait
//
// Defines the interface to the managed DNS provider: zone lookup, record
// inventory, and the two write calls the reconciler needs.
//
// ## Implementations
//
// - Cloudflare API v4: `cfddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// let base = provider.zone_name(&zone).await?;
// let inventory = provider.list_records(&zone, AddressFamily::V4).await?;
// ```

use crate::config::ZoneTarget;
use crate::traits::ip_source::AddressFamily;
use async_trait::async_trait;
use serde::Serialize;

/// Provider-side snapshot of one address record, valid for one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRecord {
    /// Provider record identifier
    pub id: String,
    /// Fully-qualified record name
    pub fqdn: String,
    /// Current record content (the address)
    pub content: String,
}

/// A record the reconciler wants to exist
///
/// Serializes to the provider's write body: `{type, name, content, proxied, ttl}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredRecord {
    /// `A` or `AAAA`
    #[serde(rename = "type")]
    pub record_type: &'static str,
    /// Fully-qualified record name
    #[serde(rename = "name")]
    pub fqdn: String,
    /// Address to publish
    pub content: String,
    /// Route through the provider's edge network
    pub proxied: bool,
    /// Record TTL in seconds (1 means provider-automatic)
    pub ttl: u32,
}

/// Trait for DNS provider implementations
///
/// # Contract
///
/// - Stateless and single-shot: one HTTP request per call, no retry, no
///   caching between calls.
/// - Credentials come from the `ZoneTarget` passed to each call and are applied
///   to that request only.
/// - Non-2xx responses and unparsable bodies become `Error::ProviderApi`;
///   transport failures become `Error::Network`.
/// - Deciding whether a write is needed is the reconciler's job, not the provider's.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Resolve the zone's base domain name (e.g. `example.com`)
    async fn zone_name(&self, zone: &ZoneTarget) -> Result<String, crate::Error>;

    /// Fetch the zone's existing records of one address family
    ///
    /// Only the first page of results is returned.
    async fn list_records(
        &self,
        zone: &ZoneTarget,
        family: AddressFamily,
    ) -> Result<Vec<ExistingRecord>, crate::Error>;

    /// Create a new record
    async fn create_record(
        &self,
        zone: &ZoneTarget,
        record: &DesiredRecord,
    ) -> Result<(), crate::Error>;

    /// Replace an existing record, keyed by its provider id
    async fn update_record(
        &self,
        zone: &ZoneTarget,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<(), crate::Error>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
