//! presence-sim entrypoint: synthesises training logs, then either continues one
//! of them with the configured models, evaluates every configured model, or
//! times model fitting.
//! Results are written to stdout as ndjson; diagnostics go through tracing.

use chrono::Utc;
use presence_sim::{
    config::{RunMode, SimulationConfig},
    data::{Log, LogKind, RandomLogGenerator},
    error::SimError,
    evaluation::{evaluate_runs, EvaluationDataGenerator, RuntimeEvaluator, SummaryRow},
    logging::StructuredLogger,
    simulation::Simulator,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

type MainResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Serialize)]
struct TimestampRow<'a> {
    model: &'a str,
    #[serde(flatten)]
    row: &'a SummaryRow,
}

fn log_generator(config: &SimulationConfig) -> RandomLogGenerator {
    RandomLogGenerator::new(config.evaluation.seed).with_max_waiting_time(config.evaluation.max_waiting_time_ms)
}

fn synthetic_log(generator: &mut RandomLogGenerator, kind: LogKind, config: &SimulationConfig) -> Option<Log> {
    let log = generator.log_of_kind(kind, &config.evaluation);
    if log.is_none() {
        warn!(kind = %kind, "no synthetic form for log kind, skipping");
    }
    log
}

fn run_simulation(config: &SimulationConfig, out: &mut impl Write) -> MainResult<()> {
    let kind = config.simulation.source_log;
    let mut generator = log_generator(config);
    let log = synthetic_log(&mut generator, kind, config)
        .ok_or_else(|| SimError::InvalidParameter(format!("source_log {kind} cannot be synthesised")))?;

    let start = Utc::now();
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || handler_stop.store(true, Ordering::Relaxed)) {
        warn!(error = %e, "could not install Ctrl+C handler");
    }

    let mut simulator = Simulator::from_config(config.clone(), start)?.with_stop_flag(stop);
    let events = simulator.simulate(&log, start)?;
    for event in &events {
        StructuredLogger::emit_json("event", event, out)?;
    }
    Ok(())
}

fn run_evaluation(config: &SimulationConfig, out: &mut impl Write) -> MainResult<()> {
    let eval = &config.evaluation;
    let mut generator = log_generator(config);
    let harness = EvaluationDataGenerator::new(config.clone());

    let mut runs = Vec::new();
    for &kind in &eval.log_kinds {
        for index in 0..eval.number_of_logs {
            let Some(log) = synthetic_log(&mut generator, kind, config) else {
                break;
            };
            runs.push(harness.generate(&log, kind, index)?);
        }
    }
    info!(runs = runs.len(), "evaluation data complete");

    let report = evaluate_runs(&runs, eval.gap_cost)?;
    for summary in &report.labels {
        StructuredLogger::emit_json("label_summary", summary, out)?;
    }
    for summary in &report.timestamps {
        for row in &summary.rows {
            let record = TimestampRow {
                model: &summary.model,
                row,
            };
            StructuredLogger::emit_json("timestamp_summary", &record, out)?;
        }
    }
    Ok(())
}

fn run_runtime(config: &SimulationConfig, out: &mut impl Write) -> MainResult<()> {
    let records = RuntimeEvaluator::new(config.clone()).measure()?;
    for record in &records {
        info!(model = %record.model, average_ms = record.average_ms, "fit time");
        StructuredLogger::emit_json("runtime", record, out)?;
    }
    Ok(())
}

fn main() -> MainResult<()> {
    let config_path = std::env::var("PRESENCE_SIM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = SimulationConfig::load(&config_path);
    config.validate()?;

    StructuredLogger::init(config.log.json, &config.log.level)?;
    info!(config = ?config_path, mode = ?config.mode, "presence-sim starting");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match config.mode {
        RunMode::Simulate => run_simulation(&config, &mut out)?,
        RunMode::Evaluate => run_evaluation(&config, &mut out)?,
        RunMode::Runtime => run_runtime(&config, &mut out)?,
    }
    out.flush()?;
    info!("presence-sim done");
    Ok(())
}
