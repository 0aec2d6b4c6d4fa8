use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use air_heater_sim::{
    load_config, read_last_record, record_channel, spawn_storage_thread, JsonLinesSink,
    MemorySink, Pacing, ParameterUpdate, Scheduler, SchedulerConfig, SimulationEngine,
    StorageWorker,
};

#[derive(Parser, Debug)]
#[command(about = "Air heater simulation under closed-loop PI control")]
struct Args {
    /// TOML configuration file; defaults are used if it does not exist
    #[arg(long, default_value = "config/air_heater.toml")]
    config: PathBuf,

    /// Run this many ticks back-to-back instead of pacing in real time
    #[arg(long, value_name = "TICKS")]
    batch: Option<u64>,

    /// Wall-clock run time in real-time mode
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Append samples as JSON lines to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Start from the setpoint and gains of the last sample in the output file
    #[arg(long)]
    resume: bool,

    #[arg(long)]
    setpoint: Option<f64>,

    #[arg(long)]
    kp: Option<f64>,

    #[arg(long)]
    ti: Option<f64>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();
}

fn main() -> eyre::Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = load_config(&args.config)
        .wrap_err_with(|| format!("loading {}", args.config.display()))?;
    let output_path = args.output.or(config.runtime.output_path.take());

    if args.resume {
        let path = output_path
            .as_ref()
            .ok_or_else(|| eyre::eyre!("--resume needs --output or runtime.output_path"))?;
        let last = read_last_record(path)
            .wrap_err_with(|| format!("reading last sample from {}", path.display()))?;
        match last {
            Some(record) => {
                info!(
                    sequence = record.sequence,
                    setpoint = record.setpoint,
                    kp = record.kp,
                    ti = record.ti,
                    "resuming from last recorded sample"
                );
                config.simulation = ParameterUpdate::resume_from(&record).apply_to(&config.simulation);
            }
            None => info!(path = %path.display(), "no recorded samples, nothing to resume"),
        }
    }

    let params = &mut config.simulation;
    params.setpoint = args.setpoint.unwrap_or(params.setpoint);
    params.kp = args.kp.unwrap_or(params.kp);
    params.ti = args.ti.unwrap_or(params.ti);
    let runtime = config.runtime;

    let (publisher, receiver) = record_channel(
        runtime.record_queue_capacity,
        Duration::from_millis(runtime.enqueue_timeout_ms),
    );
    let health = publisher.health();
    let mut storage: StorageWorker = match output_path {
        Some(path) => {
            let sink = JsonLinesSink::create(&path)
                .wrap_err_with(|| format!("opening {}", path.display()))?;
            info!(path = %path.display(), "recording samples");
            spawn_storage_thread(receiver, sink, health)
        }
        None => spawn_storage_thread(receiver, MemorySink::new(), health),
    };

    let engine = Arc::new(SimulationEngine::new(runtime.history_capacity).with_publisher(publisher));
    let pacing = match args.batch {
        Some(ticks) => Pacing::Batch { ticks: Some(ticks) },
        None => Pacing::RealTime,
    };
    let scheduler_config = SchedulerConfig {
        pacing,
        max_catch_up_ticks: runtime.max_catch_up_ticks,
    };

    let mut scheduler = Scheduler::start(engine.clone(), config.simulation, scheduler_config)?;
    match pacing {
        Pacing::Batch { .. } => scheduler.wait(),
        Pacing::RealTime => {
            info!(seconds = args.duration_secs, "running in real time");
            std::thread::sleep(Duration::from_secs(args.duration_secs));
        }
    }
    scheduler.stop();
    storage.shutdown();

    let report = scheduler.report();
    let metrics = scheduler.metrics();
    let health = engine.storage_health();

    println!("===========================================");
    println!("AIR HEATER SIMULATION RESULTS");
    println!("===========================================");
    println!("Ticks: {}", report.ticks);
    println!(
        "Overruns: {} ({} make-up ticks, {} skipped)",
        report.overruns, report.make_up_ticks, report.skipped_ticks
    );
    println!(
        "Storage: {} persisted, {} failed, {} dropped{}",
        health.persisted,
        health.failed,
        health.dropped,
        if health.degraded() { " [DEGRADED]" } else { "" }
    );
    println!(
        "Tick execution P50: {:?}, P99: {:?}, max: {:?}",
        metrics.execution_p50, metrics.execution_p99, metrics.execution_max
    );
    println!(
        "Tick lateness P50: {:?}, P99: {:?}",
        metrics.lateness_p50, metrics.lateness_p99
    );
    if let Some(sample) = engine.latest_sample() {
        println!(
            "Final sample #{} at {:.1}s: raw {:.2}°C, filtered {:.2}°C, setpoint {:.2}°C, u {:.3}",
            sample.sequence,
            sample.timestamp,
            sample.raw_temperature,
            sample.filtered_temperature,
            sample.setpoint,
            sample.control_signal
        );
    }
    println!("===========================================");

    Ok(())
}
