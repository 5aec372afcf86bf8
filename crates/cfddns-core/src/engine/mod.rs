//! Core cfddns engine
//!
//! The DdnsEngine is responsible for:
//! - Observing the current address of every enabled family
//! - Reconciling each observed address against every configured zone
//! - Repeating on a fixed interval until shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ AddressObserver │── ObservedAddress ──┐
//! └─────────────────┘                     │
//!                                         ▼
//!                                ┌──────────────┐
//!                                │  Reconciler  │ (per family, per zone)
//!                                └──────────────┘
//!                                         │
//!              ┌──────────────────────────┼──────────────────────────┐
//!              ▼                          ▼                          ▼
//!      ┌──────────────┐          ┌──────────────┐           ┌─────────────┐
//!      │  zone_name   │          │ list_records │           │ create/     │
//!      │  (resolve)   │          │ (inventory)  │           │ update      │
//!      └──────────────┘          └──────────────┘           └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Observe each enabled family; a failed family is left out of this cycle
//! 2. For each observed address, for each zone: resolve, list, plan, write
//! 3. A zone that cannot be resolved or listed is skipped; the others continue
//! 4. Wait `repeat`, or stop if the shutdown future completes first
//!
//! Cycles never overlap and nothing carries over from one cycle to the next.

use crate::config::{DdnsConfig, ZoneTarget};
use crate::error::{Error, Result};
use crate::observer::AddressObserver;
use crate::reconcile::{Reconciler, ZoneOutcome};
use crate::traits::{AddressFamily, DnsProvider, ObservedAddress};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        zones_count: usize,
    },

    /// A cycle began
    CycleStarted {
        cycle: u64,
    },

    /// Address detected for a family
    AddressObserved {
        family: AddressFamily,
        address: String,
    },

    /// Address detection failed; the family sits this cycle out
    ObservationFailed {
        family: AddressFamily,
        error: String,
    },

    /// Zone could not be resolved or listed this cycle
    ZoneSkipped {
        zone_id: String,
        family: AddressFamily,
        error: String,
    },

    /// Record created
    RecordInserted {
        fqdn: String,
        address: String,
    },

    /// Record content replaced
    RecordUpdated {
        fqdn: String,
        address: String,
    },

    /// Record already correct
    RecordUnchanged {
        fqdn: String,
    },

    /// Record write failed
    WriteFailed {
        fqdn: String,
        error: String,
    },

    /// A cycle finished
    CycleCompleted {
        cycle: u64,
        writes: usize,
        failures: usize,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Zone that was skipped during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneFailure {
    /// Zone that was skipped
    pub zone_id: String,
    /// Family whose pass skipped it
    pub family: AddressFamily,
    /// Rendered error that stopped the zone
    pub error: String,
}

/// Everything one cycle did
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Cycle number, starting at 1
    pub cycle: u64,
    /// When the cycle began
    pub started_at: DateTime<Utc>,
    /// Addresses detected this cycle
    pub observed: Vec<ObservedAddress>,
    /// Families whose detection failed
    pub observation_failures: Vec<(AddressFamily, String)>,
    /// Zones that were processed
    pub zones: Vec<ZoneOutcome>,
    /// Zones that were skipped
    pub zone_failures: Vec<ZoneFailure>,
}

impl CycleReport {
    /// Successful writes across all zones
    pub fn writes(&self) -> usize {
        self.zones.iter().map(ZoneOutcome::writes).sum()
    }

    /// Failures of any kind
    pub fn failures(&self) -> usize {
        self.observation_failures.len()
            + self.zone_failures.len()
            + self.zones.iter().map(|z| z.failures.len()).sum::<usize>()
    }

    /// FQDNs created this cycle
    pub fn inserted(&self) -> Vec<&str> {
        self.zones
            .iter()
            .flat_map(|z| z.inserted.iter().map(String::as_str))
            .collect()
    }

    /// FQDNs repaired this cycle
    pub fn updated(&self) -> Vec<&str> {
        self.zones
            .iter()
            .flat_map(|z| z.updated.iter().map(String::as_str))
            .collect()
    }
}

/// Core cfddns engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run_until()`]; one cycle runs immediately
/// 3. Further cycles run every `repeat` until the shutdown future completes
///
/// Shutdown is only observed between cycles; a running cycle always finishes.
pub struct DdnsEngine {
    /// Address detection, one source per enabled family
    observer: AddressObserver,

    /// DNS provider for reads and writes
    provider: Box<dyn DnsProvider>,

    /// Zones to manage
    zones: Vec<ZoneTarget>,

    /// Families reconciled each cycle
    families: Vec<AddressFamily>,

    /// TTL applied to every written record
    ttl: u32,

    /// Wait between cycles
    repeat: Duration,

    /// Completed cycle counter
    cycles: AtomicU64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

/// Capacity of the monitoring channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

impl DdnsEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `observer`: must hold a source for every family enabled in `config`
    /// - `provider`: DNS provider implementation
    /// - `config`: validated process configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        observer: AddressObserver,
        provider: Box<dyn DnsProvider>,
        config: DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let families = config.enabled_families();
        let available = observer.families();
        if let Some(missing) = families.iter().find(|f| !available.contains(f)) {
            return Err(Error::config(format!("no address source for {missing}")));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let engine = Self {
            observer,
            provider,
            zones: config.cloudflare,
            families,
            ttl: config.ttl,
            repeat: config.repeat,
            cycles: AtomicU64::new(0),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run until `shutdown` completes
    ///
    /// Runs one cycle immediately, then one every `repeat`. The shutdown
    /// future is only raced against the wait between cycles.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.emit_event(EngineEvent::Started {
            zones_count: self.zones.len(),
        });
        info!(
            "🕰️ Updating records every {}...",
            humantime::format_duration(self.repeat)
        );

        self.run_cycle().await;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("🛑 Stopping main loop...");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                _ = tokio::time::sleep(self.repeat) => {
                    self.run_cycle().await;
                }
            }
        }

        Ok(())
    }

    /// Run one full cycle: observe every family, then reconcile every zone
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit_event(EngineEvent::CycleStarted { cycle });
        debug!("Cycle {} started", cycle);

        let mut report = CycleReport {
            cycle,
            started_at: Utc::now(),
            observed: Vec::new(),
            observation_failures: Vec::new(),
            zones: Vec::new(),
            zone_failures: Vec::new(),
        };

        for &family in &self.families {
            match self.observer.observe(family).await {
                Ok(observed) => {
                    self.emit_event(EngineEvent::AddressObserved {
                        family,
                        address: observed.value.clone(),
                    });
                    report.observed.push(observed);
                }
                Err(e) => {
                    self.emit_event(EngineEvent::ObservationFailed {
                        family,
                        error: e.to_string(),
                    });
                    report.observation_failures.push((family, e.to_string()));
                }
            }
        }

        let reconciler = Reconciler::new(self.provider.as_ref(), self.ttl);

        for observed in &report.observed {
            for zone in &self.zones {
                match reconciler.reconcile_zone(observed, zone).await {
                    Ok(outcome) => {
                        self.emit_outcome(&outcome, observed);
                        report.zones.push(outcome);
                    }
                    Err(e) => {
                        warn!(
                            "😡 {} zone {} skipped for {}: {}",
                            self.provider.provider_name(),
                            zone.zone_id,
                            observed.family,
                            e
                        );
                        self.emit_event(EngineEvent::ZoneSkipped {
                            zone_id: zone.zone_id.clone(),
                            family: observed.family,
                            error: e.to_string(),
                        });
                        report.zone_failures.push(ZoneFailure {
                            zone_id: zone.zone_id.clone(),
                            family: observed.family,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        let writes = report.writes();
        let failures = report.failures();
        debug!(
            "Cycle {} finished: {} write(s), {} failure(s)",
            cycle, writes, failures
        );
        self.emit_event(EngineEvent::CycleCompleted {
            cycle,
            writes,
            failures,
        });

        report
    }

    fn emit_outcome(&self, outcome: &ZoneOutcome, observed: &ObservedAddress) {
        for fqdn in &outcome.inserted {
            self.emit_event(EngineEvent::RecordInserted {
                fqdn: fqdn.clone(),
                address: observed.value.clone(),
            });
        }
        for fqdn in &outcome.updated {
            self.emit_event(EngineEvent::RecordUpdated {
                fqdn: fqdn.clone(),
                address: observed.value.clone(),
            });
        }
        for fqdn in &outcome.unchanged {
            self.emit_event(EngineEvent::RecordUnchanged { fqdn: fqdn.clone() });
        }
        for failure in &outcome.failures {
            self.emit_event(EngineEvent::WriteFailed {
                fqdn: failure.fqdn.clone(),
                error: failure.error.clone(),
            });
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
            }
            // Nobody is listening; monitoring is optional
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
