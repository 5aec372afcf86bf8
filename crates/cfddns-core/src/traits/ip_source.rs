// # IP Source Trait
//
// Defines the interface for detecting the host's current address.
//
// ## Implementations
//
// - HTTP echo service: `cfddns-ip-http` crate
// - Local routing table probe: `cfddns-ip-route` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::traits::{AddressFamily, IpSource};
//
// let source = /* IpSource implementation */;
// let observed = source.current(AddressFamily::V4).await?;
// println!("{} {}", observed.family, observed.value);
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

/// Address family of an observation and of the records it drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4, written as `A` records
    V4,
    /// IPv6, written as `AAAA` records
    V6,
}

impl AddressFamily {
    /// DNS record type carrying addresses of this family
    pub fn record_type(self) -> &'static str {
        match self {
            AddressFamily::V4 => "A",
            AddressFamily::V6 => "AAAA",
        }
    }

    /// Family of a parsed address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => f.write_str("IPv4"),
            AddressFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// An address observed for one family during one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedAddress {
    /// Which family this observation belongs to
    pub family: AddressFamily,
    /// Textual address, as written into record content
    pub value: String,
}

impl ObservedAddress {
    /// Create an observation from a parsed address
    pub fn new(ip: IpAddr) -> Self {
        Self {
            family: AddressFamily::of(&ip),
            value: ip.to_string(),
        }
    }

    /// Validate raw text from a detection strategy against the requested family
    ///
    /// Surrounding whitespace is ignored. Text that does not parse, or parses
    /// as the other family, is rejected.
    pub fn parse(family: AddressFamily, raw: &str) -> crate::Result<Self> {
        let text = raw.trim();
        let ip: IpAddr = text
            .parse()
            .map_err(|_| crate::Error::invalid_address(format!("not an IP address: {text:?}")))?;

        if AddressFamily::of(&ip) != family {
            return Err(crate::Error::invalid_address(format!(
                "expected {family} address, got {ip}"
            )));
        }

        Ok(Self::new(ip))
    }
}

/// Trait for address detection strategies
///
/// One implementation per strategy; the engine holds one source per enabled
/// family and asks it once per cycle.
///
/// # Contract
///
/// - Perform exactly one lookup per call and return; no polling, no caching
///   between calls.
/// - Fail instead of guessing: an answer of the wrong family is an error.
/// - No retry logic; recovery happens on the next scheduled cycle.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current address for `family`
    ///
    /// # Returns
    ///
    /// - `Ok(ObservedAddress)`: the detected address
    /// - `Err(Error::Network | Error::Lookup | Error::InvalidAddress)`: detection failed
    async fn current(&self, family: AddressFamily) -> Result<ObservedAddress, crate::Error>;

    /// Short strategy name for logs (e.g. "http", "route")
    fn source_name(&self) -> &'static str;
}
