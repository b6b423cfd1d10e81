// tests/scheduler_loop.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reddit_relay::engine::{EngineSettings, PollEngine};
use reddit_relay::error::Result;
use reddit_relay::ingest::scheduler::{run_scheduler, spawn_scheduler, SchedulerCfg};
use reddit_relay::ingest::subscriptions::StaticSubscriptions;
use reddit_relay::ingest::types::{ContentSource, Item};
use reddit_relay::test_utils::{item, FixedClock, RecordingSink, ScriptedSource};
use reddit_relay::watermark::MemoryWatermarkStore;
use tokio::sync::watch;

fn engine_with(source: Box<dyn ContentSource>, sink: &RecordingSink) -> Arc<PollEngine> {
    Arc::new(PollEngine::new(
        source,
        Box::new(sink.clone()),
        Box::new(MemoryWatermarkStore::new()),
        Box::new(StaticSubscriptions(vec!["rust".into()])),
        Box::new(FixedClock::at(1.0)),
        EngineSettings::default(),
    ))
}

fn every_minute(run_on_start: bool) -> SchedulerCfg {
    SchedulerCfg {
        interval: Duration::from_secs(60),
        run_on_start,
    }
}

#[tokio::test(start_paused = true)]
async fn first_cycle_waits_one_interval_then_runs_at_fixed_rate() {
    let source = ScriptedSource::returning(vec![]);
    let sink = RecordingSink::new();
    let (tx, rx) = watch::channel(false);
    let eng = engine_with(Box::new(source.clone()), &sink);
    let handle = spawn_scheduler(eng, every_minute(false), rx);

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(source.calls().len(), 0);

    tokio::time::sleep(Duration::from_secs(126)).await; // t = 185s
    assert_eq!(source.calls().len(), 3);

    tx.send(true).unwrap();
    assert_eq!(handle.await.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn run_on_start_fires_immediately() {
    let source = ScriptedSource::returning(vec![]);
    let sink = RecordingSink::new();
    let (tx, rx) = watch::channel(false);
    let eng = engine_with(Box::new(source.clone()), &sink);
    let handle = spawn_scheduler(eng, every_minute(true), rx);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls().len(), 1);

    tx.send(true).unwrap();
    assert_eq!(handle.await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_cycles_do_not_stop_the_loop() {
    let source = ScriptedSource::default();
    source.push_err("down");
    source.push_err("still down");
    source.push_ok(vec![item("rust", 0.5)]);
    let sink = RecordingSink::new();
    let (tx, rx) = watch::channel(false);
    let eng = engine_with(Box::new(source.clone()), &sink);
    let handle = spawn_scheduler(eng, every_minute(true), rx);

    tokio::time::sleep(Duration::from_secs(121)).await; // cycles at 0, 60, 120
    assert_eq!(source.calls().len(), 3);
    assert_eq!(sink.delivered().len(), 1);

    tx.send(true).unwrap();
    handle.await.unwrap();
}

struct PanickyOnce {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl ContentSource for PanickyOnce {
    async fn fetch_recent(&self, _ids: &[String], _limit: usize) -> Result<Vec<Item>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("collaborator blew up");
        }
        Ok(vec![])
    }

    fn name(&self) -> &'static str {
        "panicky"
    }
}

#[tokio::test(start_paused = true)]
async fn a_panicking_cycle_is_contained() {
    let calls = Arc::new(AtomicUsize::new(0));
    let sink = RecordingSink::new();
    let eng = engine_with(Box::new(PanickyOnce { calls: calls.clone() }), &sink);
    let (tx, rx) = watch::channel(false);
    let handle = spawn_scheduler(eng, every_minute(true), rx);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    tx.send(true).unwrap();
    assert_eq!(handle.await.unwrap(), 2);
}

struct SlowSource {
    in_flight: Arc<AtomicUsize>,
    max_seen: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl ContentSource for SlowSource {
    async fn fetch_recent(&self, _ids: &[String], _limit: usize) -> Result<Vec<Item>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(150)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![])
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test(start_paused = true)]
async fn slow_cycles_never_overlap_and_in_flight_cycle_finishes_on_shutdown() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let sink = RecordingSink::new();
    let eng = engine_with(
        Box::new(SlowSource {
            in_flight: in_flight.clone(),
            max_seen: max_seen.clone(),
            calls: calls.clone(),
        }),
        &sink,
    );
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(run_scheduler(eng, every_minute(true), rx));

    // Cycles start at 0 and 150 (overrun: next starts right away).
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(in_flight.load(Ordering::SeqCst), 1);

    // Shutdown mid-cycle: the loop waits for the cycle to finish.
    tx.send(true).unwrap();
    let cycles = handle.await.unwrap();
    assert_eq!(cycles, 2);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_first_tick_runs_nothing() {
    let source = ScriptedSource::returning(vec![]);
    let sink = RecordingSink::new();
    let (tx, rx) = watch::channel(false);
    let eng = engine_with(Box::new(source.clone()), &sink);
    let handle = spawn_scheduler(eng, every_minute(false), rx);

    tx.send(true).unwrap();
    assert_eq!(handle.await.unwrap(), 0);
    assert!(source.calls().is_empty());
}
