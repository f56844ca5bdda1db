//! Bounded detection queue between the recognition stage and feedback
//!
//! Drop-newest on overflow: a push against a full queue is rejected and the
//! results already queued stay untouched. The consumer blocks without a
//! timeout; `pop` returns `None` only after every sender is gone.

use crate::error::{Error, Result};
use cvis_common::DetectionResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{trace, warn};

/// Default number of results the queue holds
pub const DEFAULT_CAPACITY: usize = 5;

/// Queue counters shared by both ends
#[derive(Debug, Default)]
struct Counters {
    pushed: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub capacity: usize,
    pub queued: usize,
    pub pushed: u64,
    pub dropped: u64,
}

/// Constructor namespace for the queue's two ends
pub struct DetectionQueue;

impl DetectionQueue {
    /// Create a queue holding at most `capacity` results (at least 1)
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity: usize) -> (DetectionSender, DetectionReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let counters = Arc::new(Counters::default());

        (
            DetectionSender {
                tx,
                capacity,
                counters: Arc::clone(&counters),
            },
            DetectionReceiver { rx, counters },
        )
    }
}

/// Producer end; cheap to clone
#[derive(Clone)]
pub struct DetectionSender {
    tx: mpsc::Sender<DetectionResult>,
    capacity: usize,
    counters: Arc<Counters>,
}

impl DetectionSender {
    /// Enqueue without blocking.
    ///
    /// Fails with [`Error::QueueFull`] when the queue is at capacity (the new
    /// result is dropped) and [`Error::InvalidState`] when the consumer is gone.
    pub fn push(&self, result: DetectionResult) -> Result<()> {
        match self.tx.try_send(result) {
            Ok(()) => {
                self.counters.pushed.fetch_add(1, Ordering::Relaxed);
                trace!("Detection queued ({} of {})", self.len(), self.capacity);
                Ok(())
            }
            Err(TrySendError::Full(dropped)) => {
                let total = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "Detection queue full, dropped '{}' (total dropped: {})",
                    dropped.text, total
                );
                Err(Error::QueueFull(self.capacity))
            }
            Err(TrySendError::Closed(_)) => Err(Error::InvalidState(
                "detection queue consumer has shut down".to_string(),
            )),
        }
    }

    /// Results currently queued
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            capacity: self.capacity,
            queued: self.len(),
            pushed: self.counters.pushed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Read-only view of the counters that does not keep the queue open
    pub fn monitor(&self) -> QueueMonitor {
        QueueMonitor {
            capacity: self.capacity,
            counters: Arc::clone(&self.counters),
        }
    }
}

/// Counter view for status reporting
#[derive(Clone)]
pub struct QueueMonitor {
    capacity: usize,
    counters: Arc<Counters>,
}

impl QueueMonitor {
    pub fn stats(&self) -> QueueStats {
        let pushed = self.counters.pushed.load(Ordering::Relaxed);
        let popped = self.counters.popped.load(Ordering::Relaxed);
        QueueStats {
            capacity: self.capacity,
            queued: pushed.saturating_sub(popped) as usize,
            pushed,
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Consumer end
pub struct DetectionReceiver {
    rx: mpsc::Receiver<DetectionResult>,
    counters: Arc<Counters>,
}

impl DetectionReceiver {
    /// Block the calling thread until a result is available.
    ///
    /// Must not be called from inside an async runtime. Returns `None` once all
    /// senders are dropped and the queue is empty.
    pub fn pop(&mut self) -> Option<DetectionResult> {
        let result = self.rx.blocking_recv()?;
        self.counters.popped.fetch_add(1, Ordering::Relaxed);
        Some(result)
    }

    /// Take the next result if one is queued
    pub fn try_pop(&mut self) -> Option<DetectionResult> {
        match self.rx.try_recv() {
            Ok(result) => {
                self.counters.popped.fetch_add(1, Ordering::Relaxed);
                Some(result)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Results dropped at the producer side so far
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}
