//! Core traits for the cfddns updater
//!
//! This module defines the interfaces the engine drives each cycle.
//!
//! - [`IpSource`]: Detect the current address for one family
//! - [`DnsProvider`]: Read and write the provider's address records

pub mod ip_source;
pub mod dns_provider;

pub use ip_source::{AddressFamily, IpSource, ObservedAddress};
pub use dns_provider::{DesiredRecord, DnsProvider, ExistingRecord};
