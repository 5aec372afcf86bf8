//! Configuration types for the cfddns updater
//!
//! Configuration is read once at startup from a TOML file, overlaid with
//! `DDNS_*` environment variables, validated, and then shared read-only with
//! every component.
//!
//! ```toml
//! a = true
//! aaaa = true
//! repeat = "5m"
//! timeout = "10s"
//! ttl = 1
//!
//! [[cloudflare]]
//! zone_id = "023e105f4ecef8ad9ca31a8372d0c353"
//! authentication = { api_token = "..." }
//! subdomains = [
//!     { name = "home", proxied = true },
//!     { name = "nas", proxied = false },
//! ]
//! ```

use crate::error::{Error, Result};
use crate::traits::AddressFamily;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::time::Duration;

/// Default IPv4-only echo service
pub const DEFAULT_IPV4_URL: &str = "https://4.ipw.cn";

/// Default IPv6-only echo service
pub const DEFAULT_IPV6_URL: &str = "https://6.ipw.cn";

/// Default IPv4 route probe (Cloudflare public resolver)
pub const DEFAULT_IPV4_PROBE: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));

/// Default IPv6 route probe (Cloudflare public resolver)
pub const DEFAULT_IPV6_PROBE: IpAddr =
    IpAddr::V6(Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1111));

/// Main cfddns configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DdnsConfig {
    /// Reconcile `A` records from the IPv4 address
    #[serde(default = "default_a")]
    pub a: bool,

    /// Reconcile `AAAA` records from the IPv6 address
    #[serde(default)]
    pub aaaa: bool,

    /// Wait between the end of one cycle and the start of the next
    #[serde(default = "default_repeat", with = "humantime_serde")]
    pub repeat: Duration,

    /// Timeout applied to every HTTP request
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// TTL written on every record (1 = provider automatic)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Zones to manage
    #[serde(default)]
    pub cloudflare: Vec<ZoneTarget>,

    /// Address detection settings
    #[serde(default)]
    pub detection: DetectionConfig,
}

impl DdnsConfig {
    /// Create a new configuration with defaults and no zones
    pub fn new() -> Self {
        Self {
            a: default_a(),
            aaaa: false,
            repeat: default_repeat(),
            timeout: default_timeout(),
            ttl: default_ttl(),
            cloudflare: Vec::new(),
            detection: DetectionConfig::default(),
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(format!("invalid configuration: {e}")))
    }

    /// Read and parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load the process configuration
    ///
    /// Reads `path` when it exists (defaults otherwise), applies the process
    /// environment on top, and validates the result.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`DdnsConfig::load`] with an explicit environment lookup
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!(
                "{} not found, using defaults and environment",
                path.display()
            );
            Self::new()
        };

        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from environment-style lookups
    ///
    /// Recognised keys: `DDNS_A`, `DDNS_AAAA`, `DDNS_REPEAT`, `DDNS_TIMEOUT`,
    /// `DDNS_TTL`, `DDNS_CLOUDFLARE` (JSON array of zones),
    /// `DDNS_DETECT_IPV4` and `DDNS_DETECT_IPV6` (`http` or `route`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DDNS_A") {
            self.a = parse_bool("DDNS_A", &value)?;
        }
        if let Some(value) = lookup("DDNS_AAAA") {
            self.aaaa = parse_bool("DDNS_AAAA", &value)?;
        }
        if let Some(value) = lookup("DDNS_REPEAT") {
            self.repeat = parse_duration("DDNS_REPEAT", &value)?;
        }
        if let Some(value) = lookup("DDNS_TIMEOUT") {
            self.timeout = parse_duration("DDNS_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("DDNS_TTL") {
            self.ttl = value
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("DDNS_TTL is not an integer: {value:?}")))?;
        }
        if let Some(value) = lookup("DDNS_CLOUDFLARE") {
            self.cloudflare = serde_json::from_str(&value)
                .map_err(|e| Error::config(format!("DDNS_CLOUDFLARE is not valid: {e}")))?;
        }
        if let Some(value) = lookup("DDNS_DETECT_IPV4") {
            self.detection.ipv4 = DetectionStrategy::parse("DDNS_DETECT_IPV4", &value)?;
        }
        if let Some(value) = lookup("DDNS_DETECT_IPV6") {
            self.detection.ipv6 = DetectionStrategy::parse("DDNS_DETECT_IPV6", &value)?;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.a && !self.aaaa {
            return Err(Error::config("neither `a` nor `aaaa` is enabled"));
        }
        if self.repeat.is_zero() {
            return Err(Error::config("`repeat` must be greater than zero"));
        }
        if self.timeout.is_zero() {
            return Err(Error::config("`timeout` must be greater than zero"));
        }
        if self.ttl != 1 && !(30..=86400).contains(&self.ttl) {
            return Err(Error::config(format!(
                "`ttl` must be 1 (automatic) or between 30 and 86400, got {}",
                self.ttl
            )));
        }
        if self.cloudflare.is_empty() {
            return Err(Error::config("no `cloudflare` zones configured"));
        }

        for zone in &self.cloudflare {
            zone.validate()?;
        }

        self.detection.validate()
    }

    /// Families enabled for reconciliation, IPv4 first
    pub fn enabled_families(&self) -> Vec<AddressFamily> {
        let mut families = Vec::with_capacity(2);
        if self.a {
            families.push(AddressFamily::V4);
        }
        if self.aaaa {
            families.push(AddressFamily::V6);
        }
        families
    }
}

impl Default for DdnsConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One provider zone to manage
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneTarget {
    /// Credentials used for every request against this zone
    #[serde(rename = "authentication")]
    pub credential: ProviderCredential,

    /// Opaque provider zone identifier
    pub zone_id: String,

    /// Desired subdomains, reconciled in this order
    #[serde(default)]
    pub subdomains: Vec<SubdomainSpec>,
}

impl ZoneTarget {
    /// Create a zone target
    pub fn new(
        zone_id: impl Into<String>,
        credential: ProviderCredential,
        subdomains: Vec<SubdomainSpec>,
    ) -> Self {
        Self {
            credential,
            zone_id: zone_id.into(),
            subdomains,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.zone_id.trim().is_empty() {
            return Err(Error::config("zone_id cannot be empty"));
        }
        if self.subdomains.is_empty() {
            tracing::warn!("😡 zone {} has no subdomains, nothing will be written", self.zone_id);
        }
        for subdomain in &self.subdomains {
            if !is_relative_name(&subdomain.name) {
                return Err(Error::config(format!(
                    "zone {} has an invalid subdomain name {:?} (expected e.g. \"home\")",
                    self.zone_id, subdomain.name
                )));
            }
        }
        Ok(())
    }
}

/// Desired state of one subdomain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubdomainSpec {
    /// Label relative to the zone's base domain (not an FQDN)
    pub name: String,

    /// Route traffic through the provider's edge network
    #[serde(default)]
    pub proxied: bool,
}

impl SubdomainSpec {
    /// Create a subdomain entry
    pub fn new(name: impl Into<String>, proxied: bool) -> Self {
        Self {
            name: name.into(),
            proxied,
        }
    }
}

/// Provider credentials for one zone group
///
/// Deserialized from `{api_token}` or `{api_key, account_email}`; empty
/// strings count as absent and a token wins when both forms are present.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCredential")]
pub enum ProviderCredential {
    /// Scoped API token, sent as a bearer token
    ApiToken(String),

    /// Legacy global API key with its account email
    ApiKey {
        /// Global API key
        api_key: String,
        /// Account email the key belongs to
        account_email: String,
    },
}

// Custom Debug implementation that hides secrets
impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderCredential::ApiToken(_) => f
                .debug_tuple("ApiToken")
                .field(&"<REDACTED>")
                .finish(),
            ProviderCredential::ApiKey { account_email, .. } => f
                .debug_struct("ApiKey")
                .field("api_key", &"<REDACTED>")
                .field("account_email", account_email)
                .finish(),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCredential {
    #[serde(default)]
    api_token: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    account_email: Option<String>,
}

impl TryFrom<RawCredential> for ProviderCredential {
    type Error = String;

    fn try_from(raw: RawCredential) -> std::result::Result<Self, Self::Error> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        if let Some(token) = present(raw.api_token) {
            return Ok(ProviderCredential::ApiToken(token));
        }

        match (present(raw.api_key), present(raw.account_email)) {
            (Some(api_key), Some(account_email)) => Ok(ProviderCredential::ApiKey {
                api_key,
                account_email,
            }),
            (Some(_), None) => Err("api_key requires account_email".to_string()),
            _ => Err("authentication requires api_token or api_key + account_email".to_string()),
        }
    }
}

/// How an address is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStrategy {
    /// GET a family-specific echo endpoint
    Http,
    /// Ask the kernel which source address routes to a probe address
    Route,
}

impl DetectionStrategy {
    fn parse(key: &str, value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(DetectionStrategy::Http),
            "route" => Ok(DetectionStrategy::Route),
            _ => Err(Error::config(format!(
                "{key} must be `http` or `route`, got {value:?}"
            ))),
        }
    }
}

/// Address detection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionConfig {
    /// Strategy for IPv4
    #[serde(default = "default_ipv4_strategy")]
    pub ipv4: DetectionStrategy,

    /// Strategy for IPv6
    #[serde(default = "default_ipv6_strategy")]
    pub ipv6: DetectionStrategy,

    /// IPv4-only echo endpoint
    #[serde(default = "default_ipv4_url")]
    pub ipv4_url: String,

    /// IPv6-only echo endpoint
    #[serde(default = "default_ipv6_url")]
    pub ipv6_url: String,

    /// Route probe target for IPv4
    #[serde(default = "default_ipv4_probe")]
    pub ipv4_probe: IpAddr,

    /// Route probe target for IPv6
    #[serde(default = "default_ipv6_probe")]
    pub ipv6_probe: IpAddr,
}

impl DetectionConfig {
    /// Strategy configured for `family`
    pub fn strategy(&self, family: AddressFamily) -> DetectionStrategy {
        match family {
            AddressFamily::V4 => self.ipv4,
            AddressFamily::V6 => self.ipv6,
        }
    }

    /// Echo endpoint for `family`
    pub fn url(&self, family: AddressFamily) -> &str {
        match family {
            AddressFamily::V4 => &self.ipv4_url,
            AddressFamily::V6 => &self.ipv6_url,
        }
    }

    /// Route probe target for `family`
    pub fn probe(&self, family: AddressFamily) -> IpAddr {
        match family {
            AddressFamily::V4 => self.ipv4_probe,
            AddressFamily::V6 => self.ipv6_probe,
        }
    }

    fn validate(&self) -> Result<()> {
        for family in [AddressFamily::V4, AddressFamily::V6] {
            let probe = self.probe(family);
            if AddressFamily::of(&probe) != family {
                return Err(Error::config(format!(
                    "{family} probe address {probe} has the wrong family"
                )));
            }

            let url = self.url(family);
            if self.strategy(family) == DetectionStrategy::Http
                && !url.starts_with("https://")
                && !url.starts_with("http://")
            {
                return Err(Error::config(format!(
                    "{family} echo URL must use HTTP or HTTPS, got {url:?}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ipv4: default_ipv4_strategy(),
            ipv6: default_ipv6_strategy(),
            ipv4_url: default_ipv4_url(),
            ipv6_url: default_ipv6_url(),
            ipv4_probe: default_ipv4_probe(),
            ipv6_probe: default_ipv6_probe(),
        }
    }
}

/// A name relative to the zone: dot-separated non-empty labels, no whitespace
fn is_relative_name(name: &str) -> bool {
    !name.contains(char::is_whitespace) && name.split('.').all(|label| !label.is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::config(format!("{key} is not a boolean: {value:?}"))),
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| Error::config(format!("{key} is not a duration ({e}): {value:?}")))
}

fn default_a() -> bool {
    true
}

fn default_repeat() -> Duration {
    Duration::from_secs(300)
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_ttl() -> u32 {
    1
}

fn default_ipv4_strategy() -> DetectionStrategy {
    DetectionStrategy::Http
}

fn default_ipv6_strategy() -> DetectionStrategy {
    DetectionStrategy::Route
}

fn default_ipv4_url() -> String {
    DEFAULT_IPV4_URL.to_string()
}

fn default_ipv6_url() -> String {
    DEFAULT_IPV6_URL.to_string()
}

fn default_ipv4_probe() -> IpAddr {
    DEFAULT_IPV4_PROBE
}

fn default_ipv6_probe() -> IpAddr {
    DEFAULT_IPV6_PROBE
}
