//! Periodic system status report

use crate::audio::output::{AudioOutputWriter, OutputStats};
use crate::feedback::{FeedbackDispatcher, FeedbackStats, QueueMonitor, QueueStats};
use crate::playback::{PlaybackEngine, PlaybackStats};
use crate::transport::OutputRoute;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, info};

/// Point-in-time view of the pipeline
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub started_at: DateTime<Utc>,
    pub uptime: Duration,
    pub route: OutputRoute,
    pub queue: QueueStats,
    pub feedback: FeedbackStats,
    pub output: OutputStats,
    pub playback: PlaybackStats,
}

impl StatusReport {
    pub fn log(&self) {
        info!("=== CVIS STATUS (up {}s, since {}) ===", self.uptime.as_secs(), self.started_at.to_rfc3339());
        info!("Audio route: {}", self.route);
        info!(
            "Detections: {} queued of {}, {} accepted, {} dropped",
            self.queue.queued, self.queue.capacity, self.queue.pushed, self.queue.dropped
        );
        info!(
            "Feedback: {} handled, {} fallbacks, {} failures",
            self.feedback.handled, self.feedback.fallbacks, self.feedback.failures
        );
        info!(
            "Output: {} bytes in {} blocks, {} write errors",
            self.output.bytes_written, self.output.blocks_written, self.output.write_errors
        );
        info!(
            "Playback: {} ({} sessions, {} bytes streamed, {} blocks dropped)",
            self.playback.state,
            self.playback.sessions,
            self.playback.bytes_streamed,
            self.playback.blocks_dropped
        );
    }
}

/// Collects counters from every pipeline component
pub struct StatusReporter {
    started_at: DateTime<Utc>,
    route: OutputRoute,
    queue: QueueMonitor,
    dispatcher: Arc<FeedbackDispatcher>,
    output: Arc<AudioOutputWriter>,
    engine: Arc<PlaybackEngine>,
}

impl StatusReporter {
    pub fn new(
        route: OutputRoute,
        queue: QueueMonitor,
        dispatcher: Arc<FeedbackDispatcher>,
        output: Arc<AudioOutputWriter>,
        engine: Arc<PlaybackEngine>,
    ) -> Self {
        Self {
            started_at: Utc::now(),
            route,
            queue,
            dispatcher,
            output,
            engine,
        }
    }

    pub fn snapshot(&self) -> StatusReport {
        let uptime = (Utc::now() - self.started_at).to_std().unwrap_or_default();
        StatusReport {
            started_at: self.started_at,
            uptime,
            route: self.route,
            queue: self.queue.stats(),
            feedback: self.dispatcher.stats(),
            output: self.output.stats(),
            playback: self.engine.stats(),
        }
    }

    /// Log a report every `period` until `shutdown` flips to true.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(period);
        // First tick completes immediately; skip it so the first report has data
        interval.tick().await;
        info!("Status reporter started ({}s interval)", period.as_secs());

        loop {
            tokio::select! {
                _ = interval.tick() => self.snapshot().log(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.snapshot().log();
        debug!("Status reporter stopped");
    }
}
