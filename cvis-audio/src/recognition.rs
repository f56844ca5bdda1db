//! Placeholder recognition stage
//!
//! Drives the producer side of the detection queue so the pipeline runs end to
//! end without a camera or a trained model. [`SyntheticCamera`] produces
//! JPEG-sized frames of random bytes; [`TextRecognizer`] derives a label from
//! frame content the same way the device firmware's demo mode does.

use crate::error::{Error, Result};
use crate::feedback::queue::DetectionSender;
use cvis_common::detection::DEFAULT_LANGUAGE;
use cvis_common::DetectionResult;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// QVGA frame dimensions
pub const FRAME_WIDTH: u32 = 320;
pub const FRAME_HEIGHT: u32 = 240;

/// Wait before retrying after a failed capture
const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Only every Nth frame is analysed
const ANALYSIS_STRIDE: u64 = 3;

/// Frames at or below this size are treated as blank
const MIN_TEXT_FRAME_BYTES: usize = 2000;

/// Bytes sampled (every other one) for the content checksum
const CHECKSUM_WINDOW: usize = 500;

/// Labels with their base confidence, indexed by `pattern / 2`
const LABELS: [(&str, f32); 6] = [
    ("SpO2", 0.92),
    ("PULSE", 0.89),
    ("OXIMETER", 0.87),
    ("BPM", 0.91),
    ("FINGER TIP", 0.85),
    ("PULSE OXIMETER", 0.93),
];

/// One captured image
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded image bytes
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: Instant,
}

/// Source of camera frames
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<Frame>;
}

/// Camera stand-in emitting random JPEG-shaped frames
pub struct SyntheticCamera {
    rng: StdRng,
    min_bytes: usize,
    max_bytes: usize,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic frame sequence
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            min_bytes: 1_500,
            max_bytes: 9_000,
        }
    }

    /// Override the frame size range (inclusive)
    pub fn with_size_range(mut self, min_bytes: usize, max_bytes: usize) -> Self {
        self.min_bytes = min_bytes.max(4);
        self.max_bytes = max_bytes.max(self.min_bytes);
        self
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SyntheticCamera {
    fn capture(&mut self) -> Result<Frame> {
        let len = self.rng.gen_range(self.min_bytes..=self.max_bytes);
        let mut data = vec![0u8; len];
        self.rng.fill(&mut data[..]);

        // SOI / EOI markers
        data[0] = 0xFF;
        data[1] = 0xD8;
        data[len - 2] = 0xFF;
        data[len - 1] = 0xD9;

        Ok(Frame {
            data,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            captured_at: Instant::now(),
        })
    }
}

/// Region of the frame searched for text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOfInterest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            width: 440,
            height: 280,
        }
    }
}

/// Content-derived label picker standing in for the OCR model
pub struct TextRecognizer {
    frame_counter: u64,
    roi: RegionOfInterest,
    rng: StdRng,
}

impl TextRecognizer {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic confidence jitter
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        let roi = RegionOfInterest::default();
        info!(
            "Text recognizer ready (placeholder model), ROI x={} y={} w={} h={}",
            roi.x, roi.y, roi.width, roi.height
        );
        Self {
            frame_counter: 0,
            roi,
            rng,
        }
    }

    pub fn roi(&self) -> RegionOfInterest {
        self.roi
    }

    pub fn set_roi(&mut self, roi: RegionOfInterest) {
        self.roi = roi;
    }

    /// Frames seen so far
    pub fn frames_seen(&self) -> u64 {
        self.frame_counter
    }

    /// Analyse one frame.
    ///
    /// Returns an empty result (no text) for skipped or blank frames.
    pub fn recognize(&mut self, frame: &[u8]) -> DetectionResult {
        let started = Instant::now();
        self.frame_counter += 1;

        if self.frame_counter % 30 == 0 {
            debug!("Frame #{}: {} bytes", self.frame_counter, frame.len());
        }

        if self.frame_counter % ANALYSIS_STRIDE != 0 || frame.len() <= MIN_TEXT_FRAME_BYTES {
            return DetectionResult::empty(elapsed_ms(started));
        }

        let checksum = content_checksum(frame);
        let pattern = pattern_index(checksum, self.frame_counter);
        let (label, base_confidence) = LABELS[pattern / 2];

        let jitter = self.rng.gen_range(-4i32..4) as f32 / 100.0;
        let confidence = clamp_detection_confidence(base_confidence + jitter);

        if self.frame_counter % 30 == 0 {
            debug!("Frame analysis: checksum={}, pattern={}", checksum, pattern);
        }

        let result = DetectionResult::new(label, DEFAULT_LANGUAGE, confidence, elapsed_ms(started));
        debug!(
            "Recognized '{}' (lang: {}, conf: {:.2})",
            result.text, result.language, result.confidence
        );
        result
    }
}

impl Default for TextRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Sum of every other byte in the first 500 bytes
pub fn content_checksum(frame: &[u8]) -> u32 {
    frame
        .iter()
        .take(CHECKSUM_WINDOW)
        .step_by(2)
        .map(|&b| b as u32)
        .sum()
}

/// Label selector in 0..12
pub fn pattern_index(checksum: u32, frame_counter: u64) -> usize {
    ((checksum as u64 + frame_counter) % 12) as usize
}

/// Keep confidence within the range the recognizer reports
fn clamp_detection_confidence(confidence: f32) -> f32 {
    if confidence > 1.0 {
        0.99
    } else if confidence < 0.75 {
        0.75
    } else {
        confidence
    }
}

fn elapsed_ms(started: Instant) -> u32 {
    started.elapsed().as_millis().min(u32::MAX as u128) as u32
}

/// Capture, recognize and enqueue until `running` is cleared.
///
/// Results without text are not queued. A full queue drops the new result and
/// the loop carries on. Returns the number of results queued.
pub fn run_producer<S: FrameSource + ?Sized>(
    source: &mut S,
    recognizer: &mut TextRecognizer,
    sender: &DetectionSender,
    interval: Duration,
    running: &Arc<AtomicBool>,
) -> Result<u64> {
    info!("Producer running, frame interval {} ms", interval.as_millis());
    let mut queued = 0;

    while running.load(Ordering::Relaxed) {
        let frame = match source.capture() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Frame capture failed: {}", e);
                thread::sleep(CAPTURE_RETRY_DELAY);
                continue;
            }
        };

        let result = recognizer.recognize(&frame.data);
        if result.has_text() {
            info!("Detected: {} (language: {})", result.text, result.language);
            match sender.push(result) {
                Ok(()) => queued += 1,
                Err(Error::QueueFull(_)) => {}
                Err(e) => {
                    warn!("Detection consumer gone, producer exiting: {}", e);
                    return Err(e);
                }
            }
        }

        thread::sleep(interval);
    }

    info!("Producer stopped after queueing {} results", queued);
    Ok(queued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::queue::DetectionQueue;

    fn frame_of(len: usize, fill: u8) -> Vec<u8> {
        vec![fill; len]
    }

    #[test]
    fn test_only_every_third_frame_analysed() {
        let mut recognizer = TextRecognizer::with_seed(7);
        let frame = frame_of(4000, 1);

        let hits: Vec<bool> = (0..6).map(|_| recognizer.recognize(&frame).has_text()).collect();
        assert_eq!(hits, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_small_frames_have_no_text() {
        let mut recognizer = TextRecognizer::with_seed(7);
        let frame = frame_of(2000, 1);
        for _ in 0..9 {
            assert!(!recognizer.recognize(&frame).has_text());
        }
    }

    #[test]
    fn test_label_follows_checksum() {
        // 250 sampled bytes of value 1 -> checksum 250; counter 3 -> (253 % 12) = 1 -> "SpO2"
        let frame = frame_of(3000, 1);
        assert_eq!(content_checksum(&frame), 250);
        assert_eq!(pattern_index(250, 3), 1);

        let mut recognizer = TextRecognizer::with_seed(1);
        recognizer.recognize(&frame);
        recognizer.recognize(&frame);
        let result = recognizer.recognize(&frame);

        assert_eq!(result.text.as_str(), "SpO2");
        assert_eq!(result.language.as_str(), "english");
        assert!((0.87..=0.96).contains(&result.confidence));
    }

    #[test]
    fn test_confidence_stays_in_range() {
        let mut recognizer = TextRecognizer::with_seed(99);
        let mut camera = SyntheticCamera::with_seed(99).with_size_range(2_500, 6_000);
        for _ in 0..300 {
            let frame = camera.capture().unwrap();
            let result = recognizer.recognize(&frame.data);
            if result.has_text() {
                assert!((0.75..=0.99).contains(&result.confidence));
                assert!(LABELS.iter().any(|(label, _)| *label == result.text.as_str()));
            }
        }
    }

    #[test]
    fn test_synthetic_frames_look_like_jpeg() {
        let mut camera = SyntheticCamera::with_seed(3);
        let frame = camera.capture().unwrap();
        assert_eq!(&frame.data[..2], &[0xFF, 0xD8]);
        assert_eq!(&frame.data[frame.data.len() - 2..], &[0xFF, 0xD9]);
        assert!((1_500..=9_000).contains(&frame.data.len()));
    }

    #[test]
    fn test_producer_stops_and_queues_text_results() {
        let (tx, mut rx) = DetectionQueue::new(5);
        let running = Arc::new(AtomicBool::new(true));

        let producer = {
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut camera = SyntheticCamera::with_seed(5).with_size_range(3_000, 4_000);
                let mut recognizer = TextRecognizer::with_seed(5);
                run_producer(&mut camera, &mut recognizer, &tx, Duration::from_millis(5), &running)
            })
        };

        thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::Relaxed);
        let queued = producer.join().unwrap().unwrap();

        assert!(queued >= 1);
        let mut seen = 0;
        while let Some(result) = rx.try_pop() {
            assert!(result.has_text());
            seen += 1;
        }
        assert_eq!(seen, queued);
    }
}
