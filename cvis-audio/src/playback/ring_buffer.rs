//! Bounded byte ring buffer between the file streamer and the drain task
//!
//! Single producer, single consumer. The producer offers whole blocks with a
//! short bounded wait and the block is dropped if it still does not fit; the
//! consumer waits without a timeout for the next run of bytes.
//!
//! A stream is bracketed by [`ByteRingBuffer::begin_stream`] and
//! [`ByteRingBuffer::finish_stream`]. Once finished, the consumer receives the
//! remaining bytes and then `None`. [`ByteRingBuffer::drain`] discards pending
//! bytes and closes the stream immediately.

use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Default capacity in bytes (16 KiB)
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Result of offering a block to the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferResult {
    /// The whole block was stored
    Accepted,
    /// No room within the bounded wait; the block was discarded
    Dropped,
    /// No stream is open (never begun, finished, or drained)
    Closed,
}

struct RingState {
    ring: HeapRb<u8>,
    /// Producer side is active; the consumer keeps waiting while this is set
    open: bool,
}

/// Bounded SPSC byte ring with blocking reads and timed writes
pub struct ByteRingBuffer {
    state: Mutex<RingState>,
    /// Signalled when bytes arrive or the stream closes
    data_ready: Condvar,
    /// Signalled when bytes are consumed or discarded
    space_ready: Condvar,
    capacity: usize,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    dropped_blocks: AtomicU64,
}

impl ByteRingBuffer {
    /// Create a ring buffer holding `capacity` bytes (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        debug!("Creating playback ring buffer with capacity: {} bytes", capacity);

        Self {
            state: Mutex::new(RingState {
                ring: HeapRb::new(capacity),
                open: false,
            }),
            data_ready: Condvar::new(),
            space_ready: Condvar::new(),
            capacity,
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            dropped_blocks: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new stream for the producer
    pub fn begin_stream(&self) {
        self.lock().open = true;
    }

    /// Mark the end of the producer's stream.
    ///
    /// The consumer still receives every buffered byte before seeing `None`.
    pub fn finish_stream(&self) {
        self.lock().open = false;
        self.data_ready.notify_all();
        self.space_ready.notify_all();
    }

    /// Offer a whole block, waiting at most `timeout` for free space.
    ///
    /// A block that cannot fit (including one larger than the whole ring) is
    /// dropped rather than partially written.
    pub fn offer(&self, block: &[u8], timeout: Duration) -> OfferResult {
        if block.is_empty() {
            return OfferResult::Accepted;
        }

        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if !state.open {
                return OfferResult::Closed;
            }
            if block.len() <= self.capacity && state.ring.vacant_len() >= block.len() {
                break;
            }

            let now = Instant::now();
            if now >= deadline || block.len() > self.capacity {
                let count = self.dropped_blocks.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "Ring buffer full, {} bytes lost (total dropped blocks: {})",
                    block.len(),
                    count
                );
                return OfferResult::Dropped;
            }

            let (guard, _) = self
                .space_ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }

        let pushed = state.ring.push_slice(block);
        drop(state);

        self.bytes_in.fetch_add(pushed as u64, Ordering::Relaxed);
        self.data_ready.notify_one();
        OfferResult::Accepted
    }

    /// Take up to `max_len` buffered bytes, waiting without a timeout.
    ///
    /// Returns `None` once the stream is closed and nothing is buffered.
    pub fn receive(&self, max_len: usize) -> Option<Vec<u8>> {
        let mut state = self.lock();

        loop {
            let occupied = state.ring.occupied_len();
            if occupied > 0 {
                let mut run = vec![0u8; occupied.min(max_len.max(1))];
                let popped = state.ring.pop_slice(&mut run);
                run.truncate(popped);
                drop(state);

                self.bytes_out.fetch_add(popped as u64, Ordering::Relaxed);
                self.space_ready.notify_one();
                trace!("Ring buffer delivered {} bytes", popped);
                return Some(run);
            }

            if !state.open {
                return None;
            }

            state = self
                .data_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Discard all buffered bytes and close the stream.
    ///
    /// Wakes a waiting consumer (which then sees `None`) and a waiting producer
    /// (which then sees [`OfferResult::Closed`]). Returns the bytes discarded.
    pub fn drain(&self) -> usize {
        let mut state = self.lock();
        let discarded = state.ring.occupied_len();
        state.ring.clear();
        state.open = false;
        drop(state);

        self.data_ready.notify_all();
        self.space_ready.notify_all();

        if discarded > 0 {
            debug!("Ring buffer drained, {} bytes discarded", discarded);
        }
        discarded
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn stats(&self) -> RingBufferStats {
        RingBufferStats {
            capacity: self.capacity,
            occupied: self.lock().ring.occupied_len(),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            dropped_blocks: self.dropped_blocks.load(Ordering::Relaxed),
        }
    }
}

/// Ring buffer statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingBufferStats {
    /// Capacity in bytes
    pub capacity: usize,

    /// Bytes currently buffered
    pub occupied: usize,

    /// Total bytes accepted from the producer
    pub bytes_in: u64,

    /// Total bytes delivered to the consumer
    pub bytes_out: u64,

    /// Blocks discarded because they did not fit in time
    pub dropped_blocks: u64,
}

impl RingBufferStats {
    /// Fill level (0.0 to 1.0)
    pub fn fill_percent(&self) -> f32 {
        self.occupied as f32 / self.capacity as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn test_offer_and_receive_in_order() {
        let rb = ByteRingBuffer::new(64);
        rb.begin_stream();

        assert_eq!(rb.offer(&[1, 2, 3], SHORT), OfferResult::Accepted);
        assert_eq!(rb.offer(&[4, 5], SHORT), OfferResult::Accepted);

        assert_eq!(rb.receive(4), Some(vec![1, 2, 3, 4]));
        assert_eq!(rb.receive(4), Some(vec![5]));
    }

    #[test]
    fn test_offer_without_stream_is_closed() {
        let rb = ByteRingBuffer::new(64);
        assert_eq!(rb.offer(&[1], SHORT), OfferResult::Closed);
    }

    #[test]
    fn test_full_ring_drops_after_timeout() {
        let rb = ByteRingBuffer::new(8);
        rb.begin_stream();
        assert_eq!(rb.offer(&[0; 6], SHORT), OfferResult::Accepted);

        let start = Instant::now();
        assert_eq!(rb.offer(&[0; 4], SHORT), OfferResult::Dropped);
        assert!(start.elapsed() >= SHORT);

        // Dropped block left the buffered bytes alone
        let stats = rb.stats();
        assert_eq!(stats.occupied, 6);
        assert_eq!(stats.dropped_blocks, 1);
    }

    #[test]
    fn test_oversized_block_dropped_immediately() {
        let rb = ByteRingBuffer::new(8);
        rb.begin_stream();

        let start = Instant::now();
        assert_eq!(rb.offer(&[0; 9], Duration::from_secs(5)), OfferResult::Dropped);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_offer_waits_for_consumer_space() {
        let rb = Arc::new(ByteRingBuffer::new(8));
        rb.begin_stream();
        assert_eq!(rb.offer(&[1; 8], SHORT), OfferResult::Accepted);

        let consumer = {
            let rb = Arc::clone(&rb);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                rb.receive(8)
            })
        };

        assert_eq!(rb.offer(&[2; 4], Duration::from_secs(2)), OfferResult::Accepted);
        assert_eq!(consumer.join().unwrap(), Some(vec![1; 8]));
    }

    #[test]
    fn test_finish_delivers_remaining_then_none() {
        let rb = ByteRingBuffer::new(16);
        rb.begin_stream();
        rb.offer(&[7; 5], SHORT);
        rb.finish_stream();

        assert_eq!(rb.receive(16), Some(vec![7; 5]));
        assert_eq!(rb.receive(16), None);
    }

    #[test]
    fn test_receive_blocks_until_data() {
        let rb = Arc::new(ByteRingBuffer::new(16));
        rb.begin_stream();

        let consumer = {
            let rb = Arc::clone(&rb);
            thread::spawn(move || rb.receive(16))
        };

        thread::sleep(Duration::from_millis(20));
        rb.offer(&[9, 9], SHORT);
        assert_eq!(consumer.join().unwrap(), Some(vec![9, 9]));
    }

    #[test]
    fn test_drain_discards_and_wakes_consumer() {
        let rb = Arc::new(ByteRingBuffer::new(16));
        rb.begin_stream();
        rb.offer(&[1; 10], SHORT);
        assert_eq!(rb.drain(), 10);
        assert_eq!(rb.receive(16), None);

        rb.begin_stream();
        let consumer = {
            let rb = Arc::clone(&rb);
            thread::spawn(move || rb.receive(16))
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(rb.drain(), 0);
        assert_eq!(consumer.join().unwrap(), None);
        assert!(!rb.is_open());
    }

    #[test]
    fn test_byte_conservation_across_threads() {
        let rb = Arc::new(ByteRingBuffer::new(64));
        rb.begin_stream();

        let consumer = {
            let rb = Arc::clone(&rb);
            thread::spawn(move || {
                let mut received = Vec::new();
                while let Some(run) = rb.receive(16) {
                    received.extend(run);
                }
                received
            })
        };

        let mut sent = Vec::new();
        for i in 0..200u32 {
            let block: Vec<u8> = (0..24).map(|j| (i * 24 + j) as u8).collect();
            assert_eq!(rb.offer(&block, Duration::from_secs(2)), OfferResult::Accepted);
            sent.extend(block);
        }
        rb.finish_stream();

        assert_eq!(consumer.join().unwrap(), sent);
    }
}
