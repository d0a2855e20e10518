//! Global tracing subscriber management and pipeline metric names.

use std::any::type_name_of_val;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// Counter: plan actions written by the applier, labelled by `action`.
pub const METRIC_PLAN_APPLIED: &str = "seo_plan_actions_applied_total";
/// Counter: plan actions skipped by the applier, labelled by `action`.
pub const METRIC_PLAN_SKIPPED: &str = "seo_plan_actions_skipped_total";
/// Counter: indexing submissions, labelled by `outcome`.
pub const METRIC_SUBMISSIONS: &str = "seo_indexing_submissions_total";
/// Counter: processor runs refused by a precondition.
pub const METRIC_RUNS_BLOCKED: &str = "seo_indexing_runs_blocked_total";
/// Gauge: 1 when the queue is healthy, 0 otherwise.
pub const METRIC_QUEUE_HEALTHY: &str = "seo_indexing_queue_healthy";
/// Gauge: pending + retrying rows observed by the last health read.
pub const METRIC_QUEUE_BACKLOG: &str = "seo_indexing_queue_backlog";
pub const METRIC_RUN_DURATION: &str = "seo_indexing_run_duration_ms";
pub const METRIC_WORKER_TICK: &str = "seo_indexing_worker_tick_duration_ms";

/// Registers units and help text for every pipeline metric with whichever
/// recorder is installed. A no-op when none is.
pub fn describe_metrics() {
    describe_counter!(METRIC_PLAN_APPLIED, "Plan actions written to the registry or queue");
    describe_counter!(METRIC_PLAN_SKIPPED, "Plan actions that were already in effect or failed");
    describe_counter!(METRIC_SUBMISSIONS, "URL_UPDATED notifications by outcome");
    describe_counter!(METRIC_RUNS_BLOCKED, "Queue runs refused before any submission");
    describe_gauge!(METRIC_QUEUE_HEALTHY, "1 when the indexing queue is healthy");
    describe_gauge!(METRIC_QUEUE_BACKLOG, Unit::Count, "Pending plus retrying queue rows");
    describe_histogram!(METRIC_RUN_DURATION, Unit::Milliseconds, "Queue processor run time");
    describe_histogram!(METRIC_WORKER_TICK, Unit::Milliseconds, "Worker tick time");
}

/// Errors that can occur while initializing global telemetry.
#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install log tracer bridge: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Installs the global subscriber once per process. Later calls are no-ops, which
/// lets tests and the CLI share the same entry point.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if TELEMETRY_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }
    describe_metrics();

    // sqlx still logs through `log::`
    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        let logger_type = type_name_of_val(log::logger());
        if !logger_type.contains("LogTracer") {
            eprintln!(
                "seo-pipeline: log bridge not installed ({err}); sqlx output will be unstructured"
            );
        }
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().boxed(),
        _ => fmt::layer().json().boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        eprintln!("seo-pipeline: tracing subscriber not installed ({err})");
    }

    Ok(())
}
