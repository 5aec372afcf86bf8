// # cfddns-core
//
// Core library for the cfddns dynamic DNS updater.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for detecting the current address of one family
// - **DnsProvider**: Trait for reading and writing address records at the provider
// - **AddressObserver**: One IpSource per enabled family
// - **Reconciler**: Decides and applies insert/update writes per subdomain
// - **DdnsEngine**: Runs observe → reconcile once at startup, then on an interval
//
// ## Design Principles
//
// 1. **Stateless cycles**: provider state is re-read every cycle, nothing is cached
// 2. **Isolated failures**: a family, zone, or subdomain failure never blocks its siblings
// 3. **Explicit dependencies**: configuration and HTTP clients are passed in, never global
// 4. **Library-First**: the daemon is a thin wrapper around this crate

pub mod traits;
pub mod engine;
pub mod observer;
pub mod reconcile;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{
    AddressFamily, DesiredRecord, DnsProvider, ExistingRecord, IpSource, ObservedAddress,
};
pub use engine::{CycleReport, DdnsEngine, EngineEvent};
pub use observer::AddressObserver;
pub use reconcile::{Operation, Reconciler, ZoneOutcome};
pub use config::{DdnsConfig, DetectionStrategy, ProviderCredential, SubdomainSpec, ZoneTarget};
pub use error::{Error, Result};
