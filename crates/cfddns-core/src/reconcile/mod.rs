//! Record reconciliation
//!
//! Given one observed address and a zone's current inventory, decide for each
//! configured subdomain whether to insert a record, update one, or leave it
//! alone, then apply those writes through the [`DnsProvider`].
//!
//! ## Decision table (per subdomain, independent of its siblings)
//!
//! | inventory match for `{name}.{base}` | content vs observed | operation |
//! |-------------------------------------|---------------------|-----------|
//! | none                                | -                   | Insert    |
//! | found                               | differs             | Update    |
//! | found                               | equal               | nothing   |
//!
//! When the inventory holds several records with the same FQDN the last one
//! scanned decides. Records are never deleted.

use crate::config::{SubdomainSpec, ZoneTarget};
use crate::error::Result;
use crate::traits::{AddressFamily, DesiredRecord, DnsProvider, ExistingRecord, ObservedAddress};
use std::net::IpAddr;
use tracing::{debug, info, warn};

/// A write the reconciler has decided on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a record that does not exist yet
    Insert {
        /// Record to create
        record: DesiredRecord,
    },

    /// Repair an existing record whose content is stale
    Update {
        /// Provider id of the record being replaced
        record_id: String,
        /// Content the record had before the update
        previous: String,
        /// Replacement record
        record: DesiredRecord,
    },
}

impl Operation {
    /// The record this operation writes
    pub fn record(&self) -> &DesiredRecord {
        match self {
            Operation::Insert { record } | Operation::Update { record, .. } => record,
        }
    }

    /// FQDN this operation targets
    pub fn fqdn(&self) -> &str {
        &self.record().fqdn
    }
}

/// Result of planning one zone for one observed address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Writes to perform, in configured subdomain order
    pub operations: Vec<Operation>,
    /// FQDNs already pointing at the observed address
    pub unchanged: Vec<String>,
}

/// Join a subdomain label with the zone's base domain
pub fn fqdn(name: &str, base_domain: &str) -> String {
    format!("{name}.{base_domain}")
}

/// Whether a configured label already ends with the zone's base domain
///
/// `home.example.com` in zone `example.com` is almost always a full name
/// given where a label was expected.
pub fn repeats_zone(name: &str, base_domain: &str) -> bool {
    let name = name.to_ascii_lowercase();
    let base = base_domain.to_ascii_lowercase();
    name == base || name.ends_with(&format!(".{base}"))
}

/// Compare record content with an observed address
///
/// Parsed addresses are compared when both sides parse, so `2001:db8::1` and
/// `2001:0db8:0:0:0:0:0:1` are the same; otherwise the strings must match.
pub fn same_address(content: &str, observed: &str) -> bool {
    match (content.trim().parse::<IpAddr>(), observed.trim().parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => content == observed,
    }
}

/// Decide the operations for one zone
///
/// Pure: performs no I/O. Subdomains are evaluated in configured order and
/// each independently of the others.
pub fn plan(
    observed: &ObservedAddress,
    zone: &ZoneTarget,
    base_domain: &str,
    inventory: &[ExistingRecord],
    ttl: u32,
) -> Plan {
    let mut plan = Plan::default();

    for subdomain in &zone.subdomains {
        if repeats_zone(&subdomain.name, base_domain) {
            warn!(
                "😡 subdomain {:?} already names zone {}; writing {}.{}",
                subdomain.name, base_domain, subdomain.name, base_domain
            );
        }
        let name = fqdn(&subdomain.name, base_domain);
        let record = desired_record(observed, subdomain, &name, ttl);

        match find_existing(&name, inventory) {
            None => plan.operations.push(Operation::Insert { record }),
            Some(existing) if !same_address(&existing.content, &observed.value) => {
                plan.operations.push(Operation::Update {
                    record_id: existing.id.clone(),
                    previous: existing.content.clone(),
                    record,
                });
            }
            Some(_) => plan.unchanged.push(name),
        }
    }

    plan
}

fn desired_record(
    observed: &ObservedAddress,
    subdomain: &SubdomainSpec,
    fqdn: &str,
    ttl: u32,
) -> DesiredRecord {
    DesiredRecord {
        record_type: observed.family.record_type(),
        fqdn: fqdn.to_string(),
        content: observed.value.clone(),
        proxied: subdomain.proxied,
        ttl,
    }
}

/// Last inventory record whose name matches `fqdn` (ASCII case-insensitive)
fn find_existing<'a>(fqdn: &str, inventory: &'a [ExistingRecord]) -> Option<&'a ExistingRecord> {
    let mut found = None;
    let mut matches = 0usize;

    for record in inventory {
        if record.fqdn.eq_ignore_ascii_case(fqdn) {
            found = Some(record);
            matches += 1;
        }
    }

    if matches > 1 {
        warn!(
            "⚠️ {} records named {}, using the last one ({})",
            matches,
            fqdn,
            found.map(|r| r.id.as_str()).unwrap_or_default()
        );
    }

    found
}

/// A subdomain write that failed during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// FQDN that could not be written
    pub fqdn: String,
    /// Rendered error
    pub error: String,
}

/// What happened to one zone for one observed address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneOutcome {
    /// Zone identifier
    pub zone_id: String,
    /// Family reconciled
    pub family: AddressFamily,
    /// Resolved base domain
    pub base_domain: String,
    /// FQDNs created
    pub inserted: Vec<String>,
    /// FQDNs repaired
    pub updated: Vec<String>,
    /// FQDNs already correct
    pub unchanged: Vec<String>,
    /// Writes that failed; their siblings were still processed
    pub failures: Vec<WriteFailure>,
}

impl ZoneOutcome {
    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.inserted.len() + self.updated.len()
    }
}

/// Drives one zone through resolve → inventory → plan → apply
pub struct Reconciler<'a> {
    provider: &'a dyn DnsProvider,
    ttl: u32,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler writing through `provider` with a uniform TTL
    pub fn new(provider: &'a dyn DnsProvider, ttl: u32) -> Self {
        Self { provider, ttl }
    }

    /// Reconcile one zone against one observed address
    ///
    /// # Returns
    ///
    /// - `Ok(ZoneOutcome)`: the zone was processed; individual write failures
    ///   are listed in `failures`
    /// - `Err(Error)`: the base domain or the inventory could not be fetched,
    ///   so nothing was written to this zone
    pub async fn reconcile_zone(
        &self,
        observed: &ObservedAddress,
        zone: &ZoneTarget,
    ) -> Result<ZoneOutcome> {
        let base_domain = self.provider.zone_name(zone).await?;
        debug!("Zone {} resolved to {}", zone.zone_id, base_domain);

        let inventory = self.provider.list_records(zone, observed.family).await?;
        debug!(
            "Zone {} has {} {} record(s)",
            zone.zone_id,
            inventory.len(),
            observed.family.record_type()
        );

        let plan = plan(observed, zone, &base_domain, &inventory, self.ttl);

        let mut outcome = ZoneOutcome {
            zone_id: zone.zone_id.clone(),
            family: observed.family,
            base_domain,
            inserted: Vec::new(),
            updated: Vec::new(),
            unchanged: plan.unchanged,
            failures: Vec::new(),
        };

        for name in &outcome.unchanged {
            debug!("{} already points at {}", name, observed.value);
        }

        for operation in plan.operations {
            let fqdn = operation.fqdn().to_string();
            match self.apply(zone, &operation).await {
                Ok(()) => match operation {
                    Operation::Insert { .. } => outcome.inserted.push(fqdn),
                    Operation::Update { .. } => outcome.updated.push(fqdn),
                },
                Err(e) => {
                    warn!("😡 {} {} failed: {}", verb(&operation), fqdn, e);
                    outcome.failures.push(WriteFailure {
                        fqdn,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Perform a single write
    async fn apply(&self, zone: &ZoneTarget, operation: &Operation) -> Result<()> {
        match operation {
            Operation::Insert { record } => {
                self.provider.create_record(zone, record).await?;
                info!(
                    "➕ insert {} {} {}",
                    self.provider.provider_name(),
                    record.fqdn,
                    record.content
                );
            }
            Operation::Update {
                record_id,
                previous,
                record,
            } => {
                self.provider.update_record(zone, record_id, record).await?;
                info!(
                    "📡 update {} {} {} (was {})",
                    self.provider.provider_name(),
                    record.fqdn,
                    record.content,
                    previous
                );
            }
        }
        Ok(())
    }
}

fn verb(operation: &Operation) -> &'static str {
    match operation {
        Operation::Insert { .. } => "insert",
        Operation::Update { .. } => "update",
    }
}
