//! Test doubles and common utilities for engine contract tests
//!
//! The doubles keep an in-memory provider-side view so that writes made in
//! one cycle are visible to the inventory of the next.

#![allow(dead_code)]

use cfddns_core::config::{DdnsConfig, ProviderCredential, SubdomainSpec, ZoneTarget};
use cfddns_core::error::{Error, Result};
use cfddns_core::traits::{
    AddressFamily, DesiredRecord, DnsProvider, ExistingRecord, IpSource, ObservedAddress,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An IP source whose answers the test controls
pub struct ControlledIpSource {
    /// Address per family; `None` makes that family fail
    addresses: Arc<Mutex<HashMap<AddressFamily, Option<String>>>>,
    /// Call counter for current()
    current_call_count: Arc<AtomicUsize>,
}

impl ControlledIpSource {
    pub fn new() -> Self {
        Self {
            addresses: Arc::new(Mutex::new(HashMap::new())),
            current_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set (or clear, with `None`) the address returned for `family`
    pub fn set(&self, family: AddressFamily, address: Option<&str>) {
        self.addresses
            .lock()
            .unwrap()
            .insert(family, address.map(str::to_string));
    }

    /// Get the number of times current() was called
    pub fn current_call_count(&self) -> usize {
        self.current_call_count.load(Ordering::SeqCst)
    }

    /// Create a source that shares addresses and counters with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            addresses: Arc::clone(&other.addresses),
            current_call_count: Arc::clone(&other.current_call_count),
        }
    }
}

#[async_trait::async_trait]
impl IpSource for ControlledIpSource {
    async fn current(&self, family: AddressFamily) -> Result<ObservedAddress> {
        self.current_call_count.fetch_add(1, Ordering::SeqCst);

        let address = self.addresses.lock().unwrap().get(&family).cloned().flatten();
        match address {
            Some(value) => ObservedAddress::parse(family, &value),
            None => Err(Error::network(format!("{family} echo unreachable"))),
        }
    }

    fn source_name(&self) -> &'static str {
        "controlled"
    }
}

/// A write the mock provider received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    Create {
        zone_id: String,
        record: DesiredRecord,
    },
    Update {
        zone_id: String,
        record_id: String,
        record: DesiredRecord,
    },
}

impl WriteCall {
    pub fn fqdn(&self) -> &str {
        match self {
            WriteCall::Create { record, .. } | WriteCall::Update { record, .. } => &record.fqdn,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    record_type: &'static str,
    fqdn: String,
    content: String,
}

#[derive(Debug, Default)]
struct ProviderState {
    base_domains: HashMap<String, String>,
    records: HashMap<String, Vec<StoredRecord>>,
    writes: Vec<WriteCall>,
    credentials_seen: Vec<(String, ProviderCredential)>,
    failing_zone_names: HashSet<String>,
    failing_inventories: HashSet<String>,
    failing_writes: HashSet<String>,
    next_id: usize,
}

/// An in-memory DnsProvider that tracks calls
pub struct MockDnsProvider {
    state: Arc<Mutex<ProviderState>>,
    list_call_count: Arc<AtomicUsize>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState::default())),
            list_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a provider that shares state and counters with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            state: Arc::clone(&other.state),
            list_call_count: Arc::clone(&other.list_call_count),
        }
    }

    /// Register a zone and its base domain
    pub fn add_zone(&self, zone_id: &str, base_domain: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .base_domains
            .insert(zone_id.to_string(), base_domain.to_string());
        state.records.entry(zone_id.to_string()).or_default();
    }

    /// Seed an existing record; returns its id
    pub fn seed_record(
        &self,
        zone_id: &str,
        record_type: &'static str,
        fqdn: &str,
        content: &str,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("rec-{}", state.next_id);
        state
            .records
            .entry(zone_id.to_string())
            .or_default()
            .push(StoredRecord {
                id: id.clone(),
                record_type,
                fqdn: fqdn.to_string(),
                content: content.to_string(),
            });
        id
    }

    /// Make zone_name() fail for `zone_id`
    pub fn fail_zone_name(&self, zone_id: &str) {
        self.state.lock().unwrap().failing_zone_names.insert(zone_id.to_string());
    }

    /// Make list_records() fail for `zone_id`
    pub fn fail_inventory(&self, zone_id: &str) {
        self.state.lock().unwrap().failing_inventories.insert(zone_id.to_string());
    }

    /// Make writes to `fqdn` fail
    pub fn fail_writes_to(&self, fqdn: &str) {
        self.state.lock().unwrap().failing_writes.insert(fqdn.to_string());
    }

    /// Let writes to `fqdn` succeed again
    pub fn heal_writes_to(&self, fqdn: &str) {
        self.state.lock().unwrap().failing_writes.remove(fqdn);
    }

    /// Change a record's content without going through the provider API
    pub fn overwrite_content(&self, zone_id: &str, fqdn: &str, content: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state
            .records
            .get_mut(zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.fqdn == fqdn))
        {
            record.content = content.to_string();
        }
    }

    /// Every successful write so far
    pub fn writes(&self) -> Vec<WriteCall> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    /// Get the number of times list_records() was called
    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    /// Credentials presented on each call, keyed by zone id
    pub fn credentials_seen(&self) -> Vec<(String, ProviderCredential)> {
        self.state.lock().unwrap().credentials_seen.clone()
    }

    /// Current content of `fqdn` in `zone_id`
    pub fn content_of(&self, zone_id: &str, fqdn: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(zone_id)?
            .iter()
            .find(|r| r.fqdn == fqdn)
            .map(|r| r.content.clone())
    }

    fn note_credential(state: &mut ProviderState, zone: &ZoneTarget) {
        state
            .credentials_seen
            .push((zone.zone_id.clone(), zone.credential.clone()));
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn zone_name(&self, zone: &ZoneTarget) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        Self::note_credential(&mut state, zone);

        if state.failing_zone_names.contains(&zone.zone_id) {
            return Err(Error::provider_api(500, "zone lookup failed"));
        }
        state
            .base_domains
            .get(&zone.zone_id)
            .cloned()
            .ok_or_else(|| Error::provider_api(404, format!("unknown zone {}", zone.zone_id)))
    }

    async fn list_records(
        &self,
        zone: &ZoneTarget,
        family: AddressFamily,
    ) -> Result<Vec<ExistingRecord>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        Self::note_credential(&mut state, zone);

        if state.failing_inventories.contains(&zone.zone_id) {
            return Err(Error::provider_api(502, "bad gateway"));
        }
        Ok(state
            .records
            .get(&zone.zone_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.record_type == family.record_type())
                    .map(|r| ExistingRecord {
                        id: r.id.clone(),
                        fqdn: r.fqdn.clone(),
                        content: r.content.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_record(&self, zone: &ZoneTarget, record: &DesiredRecord) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::note_credential(&mut state, zone);

        if state.failing_writes.contains(&record.fqdn) {
            return Err(Error::provider_api(400, "write rejected"));
        }
        state.next_id += 1;
        let id = format!("rec-{}", state.next_id);
        state
            .records
            .entry(zone.zone_id.clone())
            .or_default()
            .push(StoredRecord {
                id,
                record_type: record.record_type,
                fqdn: record.fqdn.clone(),
                content: record.content.clone(),
            });
        state.writes.push(WriteCall::Create {
            zone_id: zone.zone_id.clone(),
            record: record.clone(),
        });
        Ok(())
    }

    async fn update_record(
        &self,
        zone: &ZoneTarget,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::note_credential(&mut state, zone);

        if state.failing_writes.contains(&record.fqdn) {
            return Err(Error::provider_api(400, "write rejected"));
        }
        let stored = state
            .records
            .get_mut(&zone.zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
            .ok_or_else(|| Error::provider_api(404, format!("no record {record_id}")))?;
        stored.content = record.content.clone();

        state.writes.push(WriteCall::Update {
            zone_id: zone.zone_id.clone(),
            record_id: record_id.to_string(),
            record: record.clone(),
        });
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A zone with bearer-token credentials
pub fn zone(zone_id: &str, token: &str, subdomains: &[(&str, bool)]) -> ZoneTarget {
    ZoneTarget::new(
        zone_id,
        ProviderCredential::ApiToken(token.to_string()),
        subdomains
            .iter()
            .map(|(name, proxied)| SubdomainSpec::new(*name, *proxied))
            .collect(),
    )
}

/// Helper to create a minimal DdnsConfig for testing
pub fn minimal_config(zones: Vec<ZoneTarget>) -> DdnsConfig {
    let mut config = DdnsConfig::new();
    config.a = true;
    config.aaaa = false;
    config.repeat = Duration::from_secs(60);
    config.ttl = 1;
    config.cloudflare = zones;
    config
}
