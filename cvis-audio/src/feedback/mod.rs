//! Detection queue and audio feedback dispatch

pub mod dispatcher;
pub mod queue;

pub use dispatcher::{FeedbackDispatcher, FeedbackOutcome, FeedbackStats, Language, TonePattern};
pub use queue::{DetectionQueue, DetectionReceiver, DetectionSender, QueueMonitor, QueueStats};
