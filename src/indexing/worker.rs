//! # Indexing worker
//!
//! Background loop that re-runs the [`QueueProcessor`] on a jittered interval
//! until the shutdown token fires.

use metrics::histogram;
use rand::Rng;
use tokio::time::{Duration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::processor::QueueProcessor;
use crate::config::IndexingConfig;
use crate::telemetry::METRIC_WORKER_TICK;

pub struct IndexingWorker {
    processor: QueueProcessor,
    tick_seconds: u64,
    jitter_pct: f64,
}

impl IndexingWorker {
    pub fn new(processor: QueueProcessor, config: &IndexingConfig) -> Self {
        Self {
            processor,
            tick_seconds: config.worker_tick_seconds,
            jitter_pct: config.jitter_pct,
        }
    }

    /// Runs until `shutdown` is cancelled. The first run happens immediately.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(tick_seconds = self.tick_seconds, "Starting indexing worker");
        let mut next_delay = Duration::ZERO;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Indexing worker shutdown requested");
                    break;
                }
                _ = sleep(next_delay) => {
                    let started = Instant::now();
                    let summary = self.processor.run().await;
                    histogram!(METRIC_WORKER_TICK)
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                    debug!(
                        processed = summary.processed,
                        skipped = summary.skipped,
                        blocked = summary.blocked,
                        reason = ?summary.reason,
                        "Indexing worker tick completed"
                    );

                    next_delay = Duration::from_secs(jittered_interval(
                        self.tick_seconds,
                        self.jitter_pct,
                        &mut rand::thread_rng(),
                    ));
                }
            }
        }

        info!("Indexing worker stopped");
    }
}

/// `base` ± `jitter_pct`, so that several workers drift apart instead of
/// hitting the queue in lockstep.
fn jittered_interval<R: Rng + ?Sized>(base_seconds: u64, jitter_pct: f64, rng: &mut R) -> u64 {
    let pct = jitter_pct.clamp(0.0, 1.0);
    if pct == 0.0 || base_seconds == 0 {
        return base_seconds;
    }

    let spread = base_seconds as f64 * pct;
    let offset = rng.gen_range(-spread..=spread);
    (base_seconds as f64 + offset).round().max(1.0) as u64
}
