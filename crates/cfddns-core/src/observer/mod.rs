//! Address observation
//!
//! Holds one [`IpSource`] per enabled family. The strategy behind each source
//! (echo service or local route) is chosen by whoever builds the observer;
//! the engine only sees families and addresses.

use crate::error::{Error, Result};
use crate::traits::{AddressFamily, IpSource, ObservedAddress};
use tracing::{info, warn};

/// Per-family address detection
pub struct AddressObserver {
    sources: Vec<(AddressFamily, Box<dyn IpSource>)>,
}

impl AddressObserver {
    /// Create an observer with no families
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Detect `family` with `source`, replacing any earlier source for it
    pub fn with_source(mut self, family: AddressFamily, source: Box<dyn IpSource>) -> Self {
        self.sources.retain(|(f, _)| *f != family);
        self.sources.push((family, source));
        self
    }

    /// Families this observer can detect, in registration order
    pub fn families(&self) -> Vec<AddressFamily> {
        self.sources.iter().map(|(family, _)| *family).collect()
    }

    /// Observe one family
    ///
    /// Logs the detected address, or a warning on failure. The result is also
    /// checked against `family` so a misbehaving source cannot tag an IPv4
    /// answer as IPv6.
    pub async fn observe(&self, family: AddressFamily) -> Result<ObservedAddress> {
        let source = self
            .sources
            .iter()
            .find(|(f, _)| *f == family)
            .map(|(_, source)| source)
            .ok_or_else(|| Error::config(format!("no address source for {family}")))?;

        let result = source.current(family).await.and_then(|observed| {
            if observed.family == family {
                Ok(observed)
            } else {
                Err(Error::invalid_address(format!(
                    "{} source returned {} address {} for {}",
                    source.source_name(),
                    observed.family,
                    observed.value,
                    family
                )))
            }
        });

        match &result {
            Ok(observed) => info!(
                "🧩 {} {} detected via {}",
                family,
                observed.value,
                source.source_name()
            ),
            Err(e) => warn!(
                "😡 failed to get {} address via {}: {}",
                family,
                source.source_name(),
                e
            ),
        }

        result
    }
}

impl Default for AddressObserver {
    fn default() -> Self {
        Self::new()
    }
}
