//! Architectural Contract Test: Scheduling and Shutdown Determinism
//!
//! This test verifies when cycles run and how the loop stops.
//!
//! Constraints verified:
//! - The first cycle runs immediately at startup
//! - Later cycles run every `repeat`, never overlapping
//! - Shutdown during the wait stops the loop without another cycle
//! - A cycle already in progress finishes before the loop stops
//!
//! If this test fails, someone has added:
//! - Detached background tasks
//! - A startup delay before the first cycle
//! - Cancellation in the middle of a cycle

mod common;

use cfddns_core::config::ZoneTarget;
use cfddns_core::error::Result;
use cfddns_core::traits::{AddressFamily, DesiredRecord, DnsProvider, ExistingRecord};
use cfddns_core::{AddressObserver, DdnsEngine, EngineEvent};
use common::*;
use std::time::Duration;
use tokio::sync::oneshot;

fn ipv4_observer(source: &ControlledIpSource) -> AddressObserver {
    AddressObserver::new().with_source(
        AddressFamily::V4,
        Box::new(ControlledIpSource::sharing_state_with(source)),
    )
}

#[tokio::test(start_paused = true)]
async fn shutdown_signal_terminates_engine() {
    let source = ControlledIpSource::new();
    source.set(AddressFamily::V4, Some("203.0.113.7"));

    let provider = MockDnsProvider::new();
    provider.add_zone("z1", "example.com");

    let (engine, mut event_rx) = DdnsEngine::new(
        ipv4_observer(&source),
        Box::new(MockDnsProvider::sharing_state_with(&provider)),
        minimal_config(vec![zone("z1", "t", &[("home", false)])]),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let engine_handle = tokio::spawn(async move {
        engine
            .run_until(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(shutdown_tx.send(()).is_ok(), "shutdown signal send succeeds");

    let result = tokio::time::timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate within 5 seconds");

    let engine_result = result.unwrap().unwrap();
    assert!(
        engine_result.is_ok(),
        "Engine should shut down successfully: {:?}",
        engine_result
    );

    let mut stopped = false;
    while let Ok(event) = event_rx.try_recv() {
        if matches!(event, EngineEvent::Stopped { .. }) {
            stopped = true;
        }
    }
    assert!(stopped, "a Stopped event is emitted");
}

#[tokio::test(start_paused = true)]
async fn first_cycle_is_immediate_and_later_cycles_follow_repeat() {
    let source = ControlledIpSource::new();
    source.set(AddressFamily::V4, Some("203.0.113.7"));

    let provider = MockDnsProvider::new();
    provider.add_zone("z1", "example.com");

    let (engine, _event_rx) = DdnsEngine::new(
        ipv4_observer(&source),
        Box::new(MockDnsProvider::sharing_state_with(&provider)),
        minimal_config(vec![zone("z1", "t", &[("home", false)])]),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let engine_handle = tokio::spawn(async move {
        engine
            .run_until(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    // t = 1s: only the startup cycle has run
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.current_call_count(), 1);
    assert_eq!(provider.write_count(), 1);

    // t = 150s: cycles at 0s, 60s and 120s
    tokio::time::sleep(Duration::from_secs(149)).await;
    assert_eq!(source.current_call_count(), 3);
    assert_eq!(provider.list_call_count(), 3);
    assert_eq!(provider.write_count(), 1, "later cycles find nothing to do");

    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_wait_runs_no_further_cycle() {
    let source = ControlledIpSource::new();
    source.set(AddressFamily::V4, Some("203.0.113.7"));

    let provider = MockDnsProvider::new();
    provider.add_zone("z1", "example.com");

    let (engine, _event_rx) = DdnsEngine::new(
        ipv4_observer(&source),
        Box::new(MockDnsProvider::sharing_state_with(&provider)),
        minimal_config(vec![zone("z1", "t", &[("home", false)])]),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let engine_handle = tokio::spawn(async move {
        engine
            .run_until(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    // Halfway through the first wait
    tokio::time::sleep(Duration::from_secs(30)).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(source.current_call_count(), 1, "no cycle after shutdown");
}

/// Provider whose inventory call takes a while
struct SlowInventory {
    inner: MockDnsProvider,
    delay: Duration,
}

#[async_trait::async_trait]
impl DnsProvider for SlowInventory {
    async fn zone_name(&self, zone: &ZoneTarget) -> Result<String> {
        self.inner.zone_name(zone).await
    }

    async fn list_records(
        &self,
        zone: &ZoneTarget,
        family: AddressFamily,
    ) -> Result<Vec<ExistingRecord>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_records(zone, family).await
    }

    async fn create_record(&self, zone: &ZoneTarget, record: &DesiredRecord) -> Result<()> {
        self.inner.create_record(zone, record).await
    }

    async fn update_record(
        &self,
        zone: &ZoneTarget,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<()> {
        self.inner.update_record(zone, record_id, record).await
    }

    fn provider_name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test(start_paused = true)]
async fn cycle_in_progress_completes_before_stop() {
    let source = ControlledIpSource::new();
    source.set(AddressFamily::V4, Some("203.0.113.7"));

    let provider = MockDnsProvider::new();
    provider.add_zone("z1", "example.com");

    let slow = SlowInventory {
        inner: MockDnsProvider::sharing_state_with(&provider),
        delay: Duration::from_secs(5),
    };

    let (engine, _event_rx) = DdnsEngine::new(
        ipv4_observer(&source),
        Box::new(slow),
        minimal_config(vec![zone("z1", "t", &[("home", false)])]),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let engine_handle = tokio::spawn(async move {
        engine
            .run_until(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    // Shutdown arrives while the first inventory call is still pending
    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(30), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate after the cycle finishes");
    result.unwrap().unwrap().unwrap();

    assert_eq!(provider.write_count(), 1, "the in-flight cycle finished its write");
    assert_eq!(source.current_call_count(), 1, "no second cycle was started");
}
