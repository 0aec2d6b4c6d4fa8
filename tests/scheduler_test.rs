use air_heater_sim::{
    record_channel, spawn_storage_thread, EngineError, EngineStatus, MemorySink, ParameterUpdate,
    Pacing, Scheduler, SchedulerConfig, SimulationEngine, SimulationParameters,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn params(tick_period: f64) -> SimulationParameters {
    SimulationParameters {
        tick_period,
        plant_delay: 0.0,
        ..SimulationParameters::default()
    }
}

// ============================================================================
// BATCH PACING
// ============================================================================

#[test]
fn test_batch_runs_exact_tick_count() {
    let engine = Arc::new(SimulationEngine::new(1000));
    let mut scheduler =
        Scheduler::start(engine.clone(), params(0.1), SchedulerConfig::batch(250)).expect("start");
    scheduler.wait();

    assert!(scheduler.is_finished());
    assert_eq!(scheduler.report().ticks, 250);
    assert_eq!(engine.ticks(), 250);
    assert_eq!(engine.current_status(), EngineStatus::Stopped, "Engine stops with the batch");
    assert_eq!(scheduler.metrics().samples, 250);
}

#[test]
fn test_batch_records_reach_storage() {
    let (publisher, receiver) = record_channel(4096, Duration::from_millis(100));
    let sink = MemorySink::new();
    let mut storage = spawn_storage_thread(receiver, sink.clone(), publisher.health());
    let engine = Arc::new(SimulationEngine::new(100).with_publisher(publisher));

    let mut scheduler =
        Scheduler::start(engine.clone(), params(0.1), SchedulerConfig::batch(200)).expect("start");
    scheduler.wait();
    storage.shutdown();

    let sequences: Vec<u64> = sink.records().iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, (1..=200).collect::<Vec<_>>(), "Every tick is persisted once");
    let health = engine.storage_health();
    assert_eq!(health.persisted, 200);
    assert!(!health.degraded());
}

#[test]
fn test_start_propagates_configuration_error() {
    let engine = Arc::new(SimulationEngine::new(100));
    let bad = SimulationParameters {
        plant_time_constant: 0.0,
        ..params(0.1)
    };
    let result = Scheduler::start(engine.clone(), bad, SchedulerConfig::batch(10));
    assert!(matches!(result, Err(EngineError::Configuration(_))));
    assert_eq!(engine.current_status(), EngineStatus::Stopped);
    assert_eq!(engine.ticks(), 0);
}

#[test]
fn test_external_engine_stop_ends_scheduler() {
    let engine = Arc::new(SimulationEngine::new(100));
    let config = SchedulerConfig {
        pacing: Pacing::Batch { ticks: None },
        ..SchedulerConfig::default()
    };
    let mut scheduler = Scheduler::start(engine.clone(), params(0.1), config).expect("start");

    thread::sleep(Duration::from_millis(20));
    engine.stop();
    scheduler.wait();

    assert!(scheduler.is_finished());
    assert_eq!(engine.current_status(), EngineStatus::Stopped);
    assert_eq!(scheduler.report().ticks, engine.ticks());
}

// ============================================================================
// REAL-TIME PACING
// ============================================================================

#[test]
fn test_real_time_pacing_follows_tick_period() {
    let engine = Arc::new(SimulationEngine::new(100));
    let mut scheduler =
        Scheduler::start(engine.clone(), params(0.01), SchedulerConfig::real_time())
            .expect("start");

    thread::sleep(Duration::from_millis(300));
    scheduler.stop();

    // ~30 ticks expected; loose bounds for loaded CI machines
    let ticks = engine.ticks();
    assert!((5..=60).contains(&ticks), "Unexpected tick count {ticks} for 300ms at 10ms");
    assert_eq!(engine.current_status(), EngineStatus::Stopped);
}

#[test]
fn test_stop_is_prompt_with_long_period() {
    let engine = Arc::new(SimulationEngine::new(100));
    let mut scheduler =
        Scheduler::start(engine.clone(), params(2.0), SchedulerConfig::real_time())
            .expect("start");
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    scheduler.stop();
    let latency = started.elapsed();

    assert!(
        latency < Duration::from_millis(1000),
        "Stop took {latency:?} with a 2s tick period"
    );
    assert_eq!(engine.current_status(), EngineStatus::Stopped);
    assert_eq!(engine.ticks(), 1, "Only the immediate first tick should have run");
}

#[test]
fn test_handle_stop_is_idempotent() {
    let engine = Arc::new(SimulationEngine::new(100));
    let mut scheduler =
        Scheduler::start(engine.clone(), params(0.01), SchedulerConfig::real_time())
            .expect("start");
    thread::sleep(Duration::from_millis(30));

    scheduler.stop();
    let ticks = engine.ticks();
    scheduler.stop();

    assert_eq!(engine.ticks(), ticks);
    assert_eq!(engine.current_status(), EngineStatus::Stopped);
    assert!(scheduler.is_finished());
}

#[test]
fn test_dropping_handle_stops_engine() {
    let engine = Arc::new(SimulationEngine::new(100));
    {
        let _scheduler =
            Scheduler::start(engine.clone(), params(0.01), SchedulerConfig::real_time())
                .expect("start");
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(engine.current_status(), EngineStatus::Stopped);
}

#[test]
fn test_overruns_are_caught_up_within_bound() {
    let engine = Arc::new(SimulationEngine::new(100));
    // 20µs period: thread wake-up latency alone overruns it
    let fast = SimulationParameters {
        plant_delay: 0.0,
        filter_time_constant: 0.0,
        tick_period: 0.000_02,
        ..SimulationParameters::default()
    };
    let config = SchedulerConfig {
        pacing: Pacing::RealTime,
        max_catch_up_ticks: 2,
    };
    let mut scheduler = Scheduler::start(engine.clone(), fast, config).expect("start");
    thread::sleep(Duration::from_millis(100));
    scheduler.stop();

    let report = scheduler.report();
    assert!(report.overruns > 0, "Expected overruns at a 20µs period: {report:?}");
    assert!(report.skipped_ticks > 0, "Catch-up bound should have been hit: {report:?}");
    assert!(
        report.make_up_ticks <= report.overruns * 2,
        "Make-up ticks exceed the bound: {report:?}"
    );
    assert_eq!(report.ticks, engine.ticks());
}

// ============================================================================
// CONCURRENT ACCESS
// ============================================================================

#[test]
fn test_gain_updates_are_never_torn() {
    let engine = Arc::new(SimulationEngine::new(1000));
    let config = SchedulerConfig {
        pacing: Pacing::Batch { ticks: None },
        ..SchedulerConfig::default()
    };
    let consistent = SimulationParameters {
        kp: 1.0,
        ti: 10.0,
        ..params(0.1)
    };
    let mut scheduler = Scheduler::start(engine.clone(), consistent, config).expect("start");

    let done = Arc::new(AtomicBool::new(false));
    let writer = {
        let engine = engine.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut i = 0u32;
            while !done.load(Ordering::Relaxed) {
                let kp = if i % 2 == 0 { 1.0 } else { 2.0 };
                engine
                    .update_parameters(&ParameterUpdate::default().gains(kp, 10.0 * kp))
                    .expect("valid gains");
                i += 1;
            }
        })
    };
    let reader = {
        let engine = engine.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut torn = 0usize;
            while !done.load(Ordering::Relaxed) {
                let params = engine.parameters();
                if params.ti != 10.0 * params.kp {
                    torn += 1;
                }
                let _ = engine.latest_sample();
                let _ = engine.current_status();
            }
            torn
        })
    };

    thread::sleep(Duration::from_millis(100));
    done.store(true, Ordering::Relaxed);
    writer.join().expect("writer thread");
    let torn_reads = reader.join().expect("reader thread");
    scheduler.stop();

    let history = engine.recent_history(1000);
    assert!(!history.is_empty());
    for record in &history {
        assert_eq!(record.ti, 10.0 * record.kp, "Record {} saw a torn gain pair", record.sequence);
    }
    assert_eq!(torn_reads, 0, "Readers saw a half-applied update");
}

#[test]
fn test_concurrent_stops_all_return_stopped() {
    let engine = Arc::new(SimulationEngine::new(100));
    let config = SchedulerConfig {
        pacing: Pacing::Batch { ticks: None },
        ..SchedulerConfig::default()
    };
    let mut scheduler = Scheduler::start(engine.clone(), params(0.1), config).expect("start");
    thread::sleep(Duration::from_millis(10));

    let stoppers: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                engine.stop();
                engine.current_status()
            })
        })
        .collect();

    for stopper in stoppers {
        let status = stopper.join().expect("stopper thread");
        assert_eq!(status, EngineStatus::Stopped, "stop() returned before the engine halted");
    }
    scheduler.wait();
    assert!(scheduler.is_finished());
}
