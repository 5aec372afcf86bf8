// # HTTP IP Source
//
// This crate provides an HTTP echo-service IP source for the cfddns updater.
//
// ## Architecture
//
// One GET per observation against a per-family URL. The echo service answers
// with the caller's public address as plain text; the body is trimmed and
// must parse as an address of the requested family.
//
// Using an IPv4-only URL for IPv4 (and an IPv6-only one for IPv6) is what
// makes the answer family-specific; the client itself is not pinned to a
// family.

use cfddns_core::traits::{AddressFamily, IpSource, ObservedAddress};
use cfddns_core::{Error, Result};

/// HTTP-based IP source
pub struct HttpIpSource {
    /// URL queried for IPv4
    ipv4_url: String,

    /// URL queried for IPv6
    ipv6_url: String,

    /// Shared HTTP client (carries the configured timeout)
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a source with per-family URLs
    pub fn with_urls(
        client: reqwest::Client,
        ipv4_url: impl Into<String>,
        ipv6_url: impl Into<String>,
    ) -> Self {
        Self {
            ipv4_url: ipv4_url.into(),
            ipv6_url: ipv6_url.into(),
            client,
        }
    }

    fn url(&self, family: AddressFamily) -> &str {
        match family {
            AddressFamily::V4 => &self.ipv4_url,
            AddressFamily::V6 => &self.ipv6_url,
        }
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self, family: AddressFamily) -> Result<ObservedAddress> {
        let url = self.url(family);
        tracing::debug!("Fetching {} address from {}", family, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::network(format!(
                "{} answered with HTTP {}",
                url,
                response.status()
            )));
        }

        let ip_text = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response from {}: {}", url, e)))?;

        ObservedAddress::parse(family, &ip_text)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
