use air_heater_sim::{
    record_channel, spawn_storage_thread, EngineStatus, MemorySink, SampleRecord, SampleSink,
    Scheduler, SchedulerConfig, SimulationEngine, SimulationParameters, StorageError,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn params() -> SimulationParameters {
    SimulationParameters {
        noise_amplitude: 0.0,
        ..SimulationParameters::default()
    }
}

/// Rejects every `fail_every`-th record.
struct FlakySink {
    fail_every: u64,
    inner: MemorySink,
}

impl SampleSink for FlakySink {
    fn record(&mut self, sample: SampleRecord) -> Result<(), StorageError> {
        if sample.sequence % self.fail_every == 0 {
            return Err(StorageError::Unavailable(format!(
                "injected failure at #{}",
                sample.sequence
            )));
        }
        self.inner.record(sample)
    }
}

struct SlowSink {
    delay: Duration,
    inner: MemorySink,
}

impl SampleSink for SlowSink {
    fn record(&mut self, sample: SampleRecord) -> Result<(), StorageError> {
        std::thread::sleep(self.delay);
        self.inner.record(sample)
    }
}

#[test]
fn failing_sink_does_not_halt_the_loop() {
    let (publisher, receiver) = record_channel(1024, Duration::from_millis(50));
    let inner = MemorySink::new();
    let sink = FlakySink {
        fail_every: 2,
        inner: inner.clone(),
    };
    let mut storage = spawn_storage_thread(receiver, sink, publisher.health());
    let engine = Arc::new(SimulationEngine::new(500).with_publisher(publisher));

    let mut scheduler =
        Scheduler::start(engine.clone(), params(), SchedulerConfig::batch(100)).expect("start");
    scheduler.wait();
    storage.shutdown();

    assert_eq!(engine.ticks(), 100, "Every tick must complete despite storage errors");
    let health = engine.storage_health();
    assert_eq!(health.failed, 50);
    assert_eq!(health.persisted, 50);
    assert!(health.degraded());
    assert!(inner.records().iter().all(|r| r.sequence % 2 == 1));
}

#[test]
fn full_queue_drops_records_without_blocking() {
    let (publisher, _receiver) = record_channel(2, Duration::ZERO);
    let engine = SimulationEngine::new(100).with_publisher(publisher);
    engine.start(params()).expect("start");

    for _ in 0..10 {
        engine.tick().expect("tick succeeds with a full queue");
    }

    let health = engine.storage_health();
    assert_eq!(health.dropped, 8);
    assert_eq!(engine.current_status(), EngineStatus::Running);
    assert_eq!(engine.recent_history(100).len(), 10, "History is unaffected by drops");
}

#[test]
fn disconnected_storage_counts_drops() {
    let (publisher, receiver) = record_channel(16, Duration::from_millis(10));
    drop(receiver);
    let engine = SimulationEngine::new(100).with_publisher(publisher);
    engine.start(params()).expect("start");

    for _ in 0..5 {
        engine.tick().expect("tick");
    }
    assert_eq!(engine.storage_health().dropped, 5);
    assert!(engine.storage_health().degraded());
}

#[test]
fn slow_sink_does_not_slow_ticks() {
    let (publisher, receiver) = record_channel(1024, Duration::ZERO);
    let inner = MemorySink::new();
    let sink = SlowSink {
        delay: Duration::from_millis(5),
        inner: inner.clone(),
    };
    let mut storage = spawn_storage_thread(receiver, sink, publisher.health());
    let engine = SimulationEngine::new(500).with_publisher(publisher);
    engine.start(params()).expect("start");

    let started = Instant::now();
    for _ in 0..100 {
        engine.tick().expect("tick");
    }
    let elapsed = started.elapsed();
    assert!(
        elapsed < Duration::from_millis(250),
        "100 ticks took {elapsed:?} behind a 5ms-per-record sink"
    );

    storage.shutdown();
    assert_eq!(inner.len(), 100, "Queued records are drained on shutdown");
    assert!(!engine.storage_health().degraded());
}

#[test]
fn storage_shutdown_is_idempotent() {
    let (publisher, receiver) = record_channel(8, Duration::ZERO);
    let mut storage = spawn_storage_thread(receiver, MemorySink::new(), publisher.health());
    storage.shutdown();
    storage.shutdown();
    assert_eq!(publisher.health().report().persisted, 0);
}
