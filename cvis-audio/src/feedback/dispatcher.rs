//! Feedback dispatcher
//!
//! Turns each detection result into a short beep pattern keyed by its language
//! tag. Failures never leave the dispatcher: a failed pattern is replaced by a
//! single generic beep, and if that fails too the outcome is only reported.

use crate::audio::tone::{ToneRequest, ToneSynthesizer};
use crate::feedback::queue::DetectionReceiver;
use cvis_common::DetectionResult;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Generic beep played when a pattern cannot be produced
pub const FALLBACK_TONE: ToneRequest = ToneRequest {
    frequency_hz: 800,
    duration_ms: 300,
};

/// Frequency step between consecutive beeps of a pattern
const BEEP_STEP_HZ: u32 = 100;

/// Language of a detection result, parsed from its tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Hindi,
    Gujarati,
    English,
}

impl Language {
    /// Exact, case-sensitive match; anything unrecognized is English.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "hindi" => Language::Hindi,
            "gujarati" => Language::Gujarati,
            _ => Language::English,
        }
    }

    pub fn pattern(self) -> TonePattern {
        let (base_hz, beeps) = match self {
            Language::Hindi => (600, 3),
            Language::Gujarati => (1000, 2),
            Language::English => (800, 1),
        };
        TonePattern {
            base_hz,
            beeps,
            tone_ms: 200,
            gap_ms: 100,
        }
    }
}

/// Beep sequence announcing one result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TonePattern {
    pub base_hz: u32,
    pub beeps: u32,
    pub tone_ms: u32,
    /// Silence between beeps; none after the last
    pub gap_ms: u32,
}

impl TonePattern {
    /// The tones of the pattern in playing order
    pub fn tones(&self) -> impl Iterator<Item = ToneRequest> + '_ {
        (0..self.beeps).map(move |i| ToneRequest::new(self.base_hz + i * BEEP_STEP_HZ, self.tone_ms))
    }
}

/// What one dispatch produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// Every beep of the pattern played
    Pattern { beeps: u32 },
    /// The pattern failed and the generic beep played instead
    Fallback,
    /// Neither the pattern nor the generic beep could be played
    Failed,
}

/// Dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackStats {
    pub handled: u64,
    pub fallbacks: u64,
    pub failures: u64,
}

/// Plays feedback for detection results on the consumer thread
pub struct FeedbackDispatcher {
    synthesizer: ToneSynthesizer,
    handled: AtomicU64,
    fallbacks: AtomicU64,
    failures: AtomicU64,
}

impl FeedbackDispatcher {
    pub fn new(synthesizer: ToneSynthesizer) -> Self {
        Self {
            synthesizer,
            handled: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Announce one result. Blocks until the audio has been written.
    pub fn handle(&self, result: &DetectionResult) -> FeedbackOutcome {
        let language = Language::from_tag(result.language.as_str());
        let pattern = language.pattern();
        info!(
            "Detected '{}' ({:?}, confidence {:.2}, {} ms)",
            result.text, language, result.confidence, result.processing_time_ms
        );
        self.handled.fetch_add(1, Ordering::Relaxed);

        let outcome = match self.play_pattern(&pattern) {
            Ok(()) => FeedbackOutcome::Pattern {
                beeps: pattern.beeps,
            },
            Err(e) => {
                warn!("Feedback pattern failed, playing generic beep: {}", e);
                match self
                    .synthesizer
                    .generate(FALLBACK_TONE.frequency_hz, FALLBACK_TONE.duration_ms)
                {
                    Ok(_) => {
                        self.fallbacks.fetch_add(1, Ordering::Relaxed);
                        FeedbackOutcome::Fallback
                    }
                    Err(e) => {
                        self.failures.fetch_add(1, Ordering::Relaxed);
                        error!("Generic beep failed, no feedback for '{}': {}", result.text, e);
                        FeedbackOutcome::Failed
                    }
                }
            }
        };

        debug!("Feedback outcome: {:?}", outcome);
        outcome
    }

    fn play_pattern(&self, pattern: &TonePattern) -> crate::error::Result<()> {
        for (i, tone) in pattern.tones().enumerate() {
            if i > 0 && pattern.gap_ms > 0 {
                self.synthesizer.pause(pattern.gap_ms)?;
            }
            self.synthesizer.generate(tone.frequency_hz, tone.duration_ms)?;
        }
        Ok(())
    }

    /// Handle results until every producer has gone away.
    ///
    /// Returns the number of results handled.
    pub fn run(&self, mut receiver: DetectionReceiver) -> u64 {
        info!("Feedback dispatcher running");
        let mut count = 0;
        while let Some(result) = receiver.pop() {
            self.handle(&result);
            count += 1;
        }
        info!("Detection queue closed, dispatcher exiting after {} results", count);
        count
    }

    pub fn stats(&self) -> FeedbackStats {
        FeedbackStats {
            handled: self.handled.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::{AudioOutputWriter, AudioSink};
    use crate::error::{Error, Result};
    use crate::feedback::queue::DetectionQueue;
    use std::sync::{Arc, Mutex};

    /// Sink failing its first `fail_first` writes, logging the size of the rest
    struct FlakySink {
        fail_first: usize,
        calls: usize,
        sizes: Arc<Mutex<Vec<usize>>>,
    }

    impl AudioSink for FlakySink {
        fn write(&mut self, block: &[u8]) -> Result<usize> {
            self.calls += 1;
            if self.calls <= self.fail_first {
                return Err(Error::AudioOutput("bus error".to_string()));
            }
            self.sizes.lock().unwrap().push(block.len());
            Ok(block.len())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn dispatcher(fail_first: usize) -> (FeedbackDispatcher, Arc<Mutex<Vec<usize>>>) {
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = FlakySink {
            fail_first,
            calls: 0,
            sizes: Arc::clone(&sizes),
        };
        let output = Arc::new(AudioOutputWriter::new(Box::new(sink)));
        (
            FeedbackDispatcher::new(ToneSynthesizer::new(output, 16_000)),
            sizes,
        )
    }

    #[test]
    fn test_language_tags_are_exact() {
        assert_eq!(Language::from_tag("hindi"), Language::Hindi);
        assert_eq!(Language::from_tag("gujarati"), Language::Gujarati);
        assert_eq!(Language::from_tag("Hindi"), Language::English);
        assert_eq!(Language::from_tag(""), Language::English);
        assert_eq!(Language::from_tag("tamil"), Language::English);
    }

    #[test]
    fn test_pattern_frequencies() {
        let hindi: Vec<u32> = Language::Hindi.pattern().tones().map(|t| t.frequency_hz).collect();
        assert_eq!(hindi, vec![600, 700, 800]);

        let gujarati: Vec<u32> = Language::Gujarati
            .pattern()
            .tones()
            .map(|t| t.frequency_hz)
            .collect();
        assert_eq!(gujarati, vec![1000, 1100]);

        let english = Language::English.pattern();
        assert_eq!(english.tones().count(), 1);
        assert!(english.tones().all(|t| t.duration_ms == 200));
    }

    #[test]
    fn test_english_result_plays_one_beep() {
        let (dispatcher, sizes) = dispatcher(0);
        let outcome = dispatcher.handle(&DetectionResult::new("BPM", "english", 0.91, 40));

        assert_eq!(outcome, FeedbackOutcome::Pattern { beeps: 1 });
        // 200ms at 44.1kHz = 8820 stereo frames
        assert_eq!(*sizes.lock().unwrap(), vec![8820 * 4]);
    }

    #[test]
    fn test_gaps_are_written_between_beeps_only() {
        let (dispatcher, sizes) = dispatcher(0);
        dispatcher.handle(&DetectionResult::new("SpO2", "hindi", 0.9, 40));

        let beep = 8820 * 4;
        let gap = 4410 * 4;
        assert_eq!(*sizes.lock().unwrap(), vec![beep, gap, beep, gap, beep]);
    }

    #[test]
    fn test_failed_pattern_falls_back_to_generic_beep() {
        let (dispatcher, sizes) = dispatcher(1);
        let outcome = dispatcher.handle(&DetectionResult::new("SpO2", "hindi", 0.9, 40));

        assert_eq!(outcome, FeedbackOutcome::Fallback);
        // 300ms at 44.1kHz = 13230 stereo frames
        assert_eq!(*sizes.lock().unwrap(), vec![13230 * 4]);
        assert_eq!(dispatcher.stats().fallbacks, 1);
    }

    #[test]
    fn test_double_failure_is_reported_not_propagated() {
        let (dispatcher, sizes) = dispatcher(2);
        let outcome = dispatcher.handle(&DetectionResult::new("BPM", "english", 0.9, 40));

        assert_eq!(outcome, FeedbackOutcome::Failed);
        assert!(sizes.lock().unwrap().is_empty());
        assert_eq!(dispatcher.stats().failures, 1);
    }

    #[test]
    fn test_run_drains_queue_until_closed() {
        let (dispatcher, sizes) = dispatcher(0);
        let (tx, rx) = DetectionQueue::new(5);
        tx.push(DetectionResult::new("BPM", "english", 0.9, 10)).unwrap();
        tx.push(DetectionResult::new("SpO2", "gujarati", 0.9, 10)).unwrap();
        drop(tx);

        assert_eq!(dispatcher.run(rx), 2);
        // One beep, then beep, gap, beep
        assert_eq!(*sizes.lock().unwrap(), vec![8820 * 4, 8820 * 4, 4410 * 4, 8820 * 4]);
        assert_eq!(dispatcher.stats().handled, 2);
    }
}
