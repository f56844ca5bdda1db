//! Playback engine
//!
//! Streams a WAV file into the byte ring buffer from the caller's thread while
//! a dedicated drain thread moves buffered bytes to the shared audio output.
//!
//! # Sessions
//!
//! Every `play` call opens a new session, identified by a generation counter.
//! `stop` bumps the generation and drains the ring, so a streamer or drain
//! loop belonging to an older session notices and backs off. A second `play`
//! always stops the first before taking the play lock, so the newest call
//! wins.

use crate::audio::output::AudioOutputWriter;
use crate::audio::wav::{upmix_mono_to_stereo, AudioHeader};
use crate::config::AudioConfig;
use crate::error::{Error, Result};
use crate::playback::ring_buffer::{ByteRingBuffer, OfferResult};
use crate::playback::state::{PlaybackState, PlaybackStats};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Largest span the drain thread takes from the ring per output write
const DRAIN_SPAN_BYTES: usize = 4096;

#[derive(Debug)]
struct Control {
    state: PlaybackState,
    /// Bumped on every play, stop and shutdown
    generation: u64,
    shutdown: bool,
}

struct Shared {
    control: Mutex<Control>,
    /// Signalled on every state or generation change
    changed: Condvar,
    ring: ByteRingBuffer,
    output: Arc<AudioOutputWriter>,
    bytes_streamed: AtomicU64,
    blocks_dropped: AtomicU64,
    sessions: AtomicU64,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// WAV playback through the bounded ring buffer
pub struct PlaybackEngine {
    shared: Arc<Shared>,
    /// Serializes streamers; held for the whole file
    play_lock: Mutex<()>,
    drain_thread: Mutex<Option<JoinHandle<()>>>,
    read_block_bytes: usize,
    offer_timeout: Duration,
}

impl PlaybackEngine {
    /// Create the engine and start its drain thread.
    ///
    /// The drain thread is pinned to `config.consumer_core` when available and
    /// stays parked until the first `play`.
    pub fn new(output: Arc<AudioOutputWriter>, config: &AudioConfig) -> Result<Self> {
        info!(
            "Creating playback engine (ring {} bytes, read block {} bytes)",
            config.ring_capacity_bytes, config.read_block_bytes
        );

        let shared = Arc::new(Shared {
            control: Mutex::new(Control {
                state: PlaybackState::Idle,
                generation: 0,
                shutdown: false,
            }),
            changed: Condvar::new(),
            ring: ByteRingBuffer::new(config.ring_capacity_bytes),
            output,
            bytes_streamed: AtomicU64::new(0),
            blocks_dropped: AtomicU64::new(0),
            sessions: AtomicU64::new(0),
        });

        let drain_shared = Arc::clone(&shared);
        let consumer_core = config.consumer_core;
        let handle = std::thread::Builder::new()
            .name("playback-drain".to_string())
            .spawn(move || {
                crate::affinity::pin_current_thread(consumer_core, "Playback drain");
                drain_loop(drain_shared);
            })?;

        Ok(Self {
            shared,
            play_lock: Mutex::new(()),
            drain_thread: Mutex::new(Some(handle)),
            read_block_bytes: (config.read_block_bytes & !1).max(2),
            offer_timeout: config.ring_offer_timeout(),
        })
    }

    /// Play a WAV file, stopping anything already playing.
    ///
    /// Streams the payload from the calling thread and returns once every block
    /// has been offered to the ring (or the session was superseded). Audio keeps
    /// draining after return; poll [`Self::state`] or use [`Self::wait_idle`].
    pub fn play(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidInput("empty audio file path".to_string()));
        }
        self.ensure_running()?;

        // Interrupt a streamer holding the play lock, then re-check once we own it
        self.stop()?;
        let _streaming = self.play_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.stop()?;

        let file = File::open(path).map_err(|e| {
            error!("Failed to open audio file {}: {}", path.display(), e);
            Error::Io(e)
        })?;
        let mut reader = BufReader::new(file);

        let header = AudioHeader::read_from(&mut reader).map_err(|e| {
            error!("Rejected audio file {}: {}", path.display(), e);
            e
        })?;
        self.check_format(&header);

        let session = self.begin_session()?;
        info!(
            "Playing {} ({} ch, {} Hz, {} bit, {} bytes, ~{} ms)",
            path.display(),
            header.channels,
            header.sample_rate,
            header.bits_per_sample,
            header.data_len,
            header.duration_ms()
        );

        let streamed = self.stream_payload(&mut reader, &header, session);
        self.end_session(session);

        let streamed = streamed?;
        debug!("Session {} streamed {} payload bytes", session, streamed);
        Ok(())
    }

    /// Stop playback and discard pending audio.
    ///
    /// No-op when idle; safe to call repeatedly and from any thread.
    pub fn stop(&self) -> Result<()> {
        let session = {
            let mut control = self.shared.control();
            if control.state == PlaybackState::Idle {
                return Ok(());
            }
            control.state = PlaybackState::Stopping;
            control.generation += 1;
            control.generation
        };
        self.shared.changed.notify_all();

        let discarded = self.shared.ring.drain();

        {
            let mut control = self.shared.control();
            if control.generation == session {
                control.state = PlaybackState::Idle;
            }
        }
        self.shared.changed.notify_all();

        info!("Playback stopped ({} buffered bytes discarded)", discarded);
        Ok(())
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.control().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Block until the engine is idle or `timeout` passes.
    ///
    /// Returns true if the engine is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let control = self.shared.control();
        let (control, _) = self
            .shared
            .changed
            .wait_timeout_while(control, timeout, |c| c.state != PlaybackState::Idle)
            .unwrap_or_else(PoisonError::into_inner);
        control.state == PlaybackState::Idle
    }

    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            state: self.state(),
            bytes_streamed: self.shared.bytes_streamed.load(Ordering::Relaxed),
            blocks_dropped: self.shared.blocks_dropped.load(Ordering::Relaxed),
            sessions: self.shared.sessions.load(Ordering::Relaxed),
        }
    }

    /// Stop playback and join the drain thread.
    ///
    /// Later `play` calls fail with [`Error::InvalidState`].
    pub fn shutdown(&self) {
        {
            let mut control = self.shared.control();
            if control.shutdown {
                return;
            }
            control.shutdown = true;
            control.generation += 1;
            control.state = PlaybackState::Idle;
        }
        self.shared.ring.drain();
        self.shared.changed.notify_all();

        let handle = self
            .drain_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Playback drain thread panicked");
            }
        }
        info!("Playback engine shut down");
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shared.control().shutdown {
            return Err(Error::InvalidState("playback engine is shut down".to_string()));
        }
        Ok(())
    }

    /// Log format mismatches. Playback continues regardless; the output has no
    /// resampler or bit-depth conversion.
    fn check_format(&self, header: &AudioHeader) {
        let output_rate = self.shared.output.sample_rate();
        if header.sample_rate != output_rate {
            warn!(
                "Audio file is {} Hz, output runs at {} Hz; playing without resampling",
                header.sample_rate, output_rate
            );
        }
        if header.bits_per_sample != 16 {
            warn!(
                "Audio file is {}-bit, output expects 16-bit samples",
                header.bits_per_sample
            );
        }
        if header.channels != 1 && header.channels != 2 {
            warn!(
                "Audio file has {} channels, payload passed through as stereo",
                header.channels
            );
        }
    }

    /// Open the ring and publish a new playing session.
    fn begin_session(&self) -> Result<u64> {
        let session = {
            let mut control = self.shared.control();
            if control.shutdown {
                return Err(Error::InvalidState("playback engine is shut down".to_string()));
            }
            // Stream must be open before the drain thread can observe the session
            self.shared.ring.begin_stream();
            control.state = PlaybackState::Playing;
            control.generation += 1;
            control.generation
        };
        self.shared.sessions.fetch_add(1, Ordering::Relaxed);
        self.shared.changed.notify_all();
        Ok(session)
    }

    /// Let the drain thread finish the buffered tail, unless superseded.
    fn end_session(&self, session: u64) {
        let control = self.shared.control();
        if control.generation == session {
            self.shared.ring.finish_stream();
        }
    }

    fn is_current(&self, session: u64) -> bool {
        let control = self.shared.control();
        control.generation == session && control.state == PlaybackState::Playing
    }

    /// Read the payload in blocks and offer each to the ring.
    ///
    /// Returns the number of source payload bytes consumed.
    fn stream_payload<R: Read>(
        &self,
        reader: &mut R,
        header: &AudioHeader,
        session: u64,
    ) -> Result<u64> {
        let upmix = header.channels == 1;
        let mut remaining = header.data_len as usize;
        let mut block = vec![0u8; self.read_block_bytes];
        let mut stereo = Vec::with_capacity(self.read_block_bytes * 2);
        let mut consumed = 0u64;

        while remaining > 0 {
            if !self.is_current(session) {
                debug!("Session {} superseded, abandoning stream", session);
                break;
            }

            let want = remaining.min(block.len());
            let read = fill_block(reader, &mut block[..want])?;
            if read == 0 {
                warn!(
                    "Audio file ended unexpectedly, {} declared payload bytes missing",
                    remaining
                );
                break;
            }

            let payload: &[u8] = if upmix {
                upmix_mono_to_stereo(&block[..read], &mut stereo);
                &stereo
            } else {
                &block[..read]
            };

            match self.shared.ring.offer(payload, self.offer_timeout) {
                OfferResult::Accepted => {}
                OfferResult::Dropped => {
                    self.shared.blocks_dropped.fetch_add(1, Ordering::Relaxed);
                }
                OfferResult::Closed => {
                    debug!("Ring closed during session {}", session);
                    break;
                }
            }

            remaining -= read;
            consumed += read as u64;
            self.shared
                .bytes_streamed
                .fetch_add(read as u64, Ordering::Relaxed);
        }

        Ok(consumed)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Read until `buf` is full or the source is exhausted.
///
/// Keeps blocks sample-aligned even when the reader returns short reads.
fn fill_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(filled)
}

/// Drain thread body: park until a session starts, then move bytes to the output.
fn drain_loop(shared: Arc<Shared>) {
    debug!("Playback drain thread started");
    let mut seen = 0u64;

    loop {
        let session = {
            let mut control = shared.control();
            loop {
                if control.shutdown {
                    debug!("Playback drain thread exiting");
                    return;
                }
                if control.generation != seen && control.state == PlaybackState::Playing {
                    break control.generation;
                }
                control = shared
                    .changed
                    .wait(control)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };
        seen = session;

        let started = Instant::now();
        let mut written = 0u64;
        while let Some(span) = shared.ring.receive(DRAIN_SPAN_BYTES) {
            match shared.output.write(&span) {
                Ok(n) => written += n as u64,
                Err(e) => warn!("Playback write failed, {} bytes lost: {}", span.len(), e),
            }
        }

        let finished = {
            let mut control = shared.control();
            if control.generation == session && control.state == PlaybackState::Playing {
                control.state = PlaybackState::Idle;
                true
            } else {
                false
            }
        };
        if finished {
            shared.changed.notify_all();
            info!(
                "Playback finished: {} bytes in {:.1}s",
                written,
                started.elapsed().as_secs_f64()
            );
        }
    }
}
