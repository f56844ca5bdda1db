//! Hardware audio sink using cpal
//!
//! Samples written by [`CpalSink::write`] go into a lock-free ring buffer
//! drained by the cpal callback. `write` blocks while the ring is full, which
//! gives callers the same "blocks until the hardware accepts the block"
//! behavior as a DMA-backed output channel.

use crate::audio::output::AudioSink;
use crate::config::OUTPUT_CHANNELS;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig, SupportedStreamConfigRange};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Device-side sample ring (~93ms of stereo audio @ 44.1kHz)
const DEVICE_RING_SAMPLES: usize = 8192;

/// Sleep between retries while the device ring is full
const FULL_RING_BACKOFF: Duration = Duration::from_millis(2);

/// How often the device thread checks whether the sink was dropped
const KEEPALIVE_POLL: Duration = Duration::from_millis(500);

/// Output sink on the default (or named) cpal device.
///
/// `cpal::Stream` is not `Send`, so the stream is built and kept alive on a
/// dedicated device thread; the sink itself only owns the producer half of the
/// sample ring.
pub struct CpalSink {
    producer: HeapProd<i16>,
    sample_rate: u32,
    device_name: String,
    underruns: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    device_thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open the named device (or the default one) at `sample_rate`.
    pub fn open(device_name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let (producer, consumer) = HeapRb::<i16>::new(DEVICE_RING_SAMPLES).split();
        let underruns = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();

        let requested = device_name.map(str::to_string);
        let thread_underruns = Arc::clone(&underruns);
        let thread_running = Arc::clone(&running);
        let device_thread = std::thread::Builder::new()
            .name("audio-device".to_string())
            .spawn(move || {
                let stream = match Self::start_stream(requested.as_deref(), sample_rate, consumer, thread_underruns) {
                    Ok((stream, rate, name)) => {
                        let _ = ready_tx.send(Ok((rate, name)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while thread_running.load(Ordering::Relaxed) {
                    std::thread::sleep(KEEPALIVE_POLL);
                }
                drop(stream);
                info!("Audio device stream closed");
            })?;

        let (sample_rate, name) = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio device thread exited during setup".to_string()))??;

        Ok(Self {
            producer,
            sample_rate,
            device_name: name,
            underruns,
            running,
            device_thread: Some(device_thread),
        })
    }

    /// Runs on the device thread: pick the device, build and start the stream.
    fn start_stream(
        device_name: Option<&str>,
        sample_rate: u32,
        consumer: HeapCons<i16>,
        underruns: Arc<AtomicU64>,
    ) -> Result<(Stream, u32, String)> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(dev) => dev,
                    None => {
                        warn!("Requested device '{}' not found, falling back to default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let (config, sample_format) = Self::get_best_config(&device, sample_rate)?;

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let stream = Self::build_stream(&device, &config, sample_format, consumer, underruns)?;
        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        info!("Audio device opened: {}", name);
        Ok((stream, config.sample_rate.0, name))
    }

    fn get_best_config(device: &Device, sample_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let supported_configs = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        choose_config(supported_configs, sample_rate).ok_or_else(|| {
            Error::AudioOutput(format!("Device does not support {}Hz stereo output", sample_rate))
        })
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        mut consumer: HeapCons<i16>,
        underruns: Arc<AtomicU64>,
    ) -> Result<Stream> {
        let on_error = |err| error!("Audio stream error: {}", err);

        let stream = match sample_format {
            SampleFormat::I16 => device.build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let filled = consumer.pop_slice(data);
                    if filled < data.len() {
                        data[filled..].fill(0);
                        underruns.fetch_add(1, Ordering::Relaxed);
                    }
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => device.build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for slot in data.iter_mut() {
                        *slot = match consumer.try_pop() {
                            Some(sample) => sample as f32 / i16::MAX as f32,
                            None => 0.0,
                        };
                    }
                    if consumer.is_empty() {
                        underruns.fetch_add(1, Ordering::Relaxed);
                    }
                },
                on_error,
                None,
            ),
            other => {
                return Err(Error::AudioOutput(format!("Unsupported sample format: {:?}", other)));
            }
        };

        stream.map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    /// Callbacks that found the ring empty
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

/// Pick a stereo config at `sample_rate`, preferring i16 over f32 samples.
fn choose_config(
    ranges: impl IntoIterator<Item = SupportedStreamConfigRange>,
    sample_rate: u32,
) -> Option<(StreamConfig, SampleFormat)> {
    let mut fallback = None;
    for range in ranges {
        let rate_ok =
            range.min_sample_rate().0 <= sample_rate && range.max_sample_rate().0 >= sample_rate;
        if !rate_ok || range.channels() != OUTPUT_CHANNELS {
            continue;
        }
        let format = range.sample_format();
        let config = range.with_sample_rate(cpal::SampleRate(sample_rate)).config();
        match format {
            SampleFormat::I16 => return Some((config, format)),
            SampleFormat::F32 if fallback.is_none() => fallback = Some((config, format)),
            _ => {}
        }
    }
    fallback
}

impl AudioSink for CpalSink {
    fn write(&mut self, block: &[u8]) -> Result<usize> {
        let mut pending = block
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .peekable();

        while pending.peek().is_some() {
            let pushed = self.producer.push_iter(&mut pending);
            if pushed == 0 {
                std::thread::sleep(FULL_RING_BACKOFF);
            }
        }

        Ok(block.len() - block.len() % 2)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.device_thread.take() {
            if handle.join().is_err() {
                warn!("Audio device thread panicked");
            }
        }
    }
}
