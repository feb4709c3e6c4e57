//! Live PCM ring buffer
//!
//! A fixed-capacity byte store written by the audio listener and read by any
//! number of live HTTP consumers. Each consumer owns a `ReaderCursor` holding
//! an absolute position in the stream; the buffer itself only tracks how many
//! bytes have ever been written.
//!
//! Blocking readers park on a condvar; async readers await a `Notify`, so
//! live HTTP bodies never hold a thread of the blocking pool.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::constants::READ_POLL_INTERVAL;

/// Result of a bounded read attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes copied into the caller's slice
    Data(usize),
    /// Nothing new arrived within the wait
    TimedOut,
    /// Buffer closed; end of stream
    Closed,
}

/// Per-consumer read position
#[derive(Debug)]
pub struct ReaderCursor {
    position: u64,
    /// Bytes skipped by catch-up jumps
    skipped: u64,
}

impl ReaderCursor {
    /// Absolute stream position of the next byte to read
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total bytes this reader lost to catch-up jumps
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

struct Inner {
    store: Box<[u8]>,
    /// Monotonic count of bytes ever written
    total_written: u64,
    closed: bool,
}

/// Multi-reader circular byte buffer
pub struct RingBuffer {
    inner: Mutex<Inner>,
    data_arrived: Condvar,
    data_notify: Notify,
    capacity: usize,
}

impl RingBuffer {
    /// Create a buffer holding `capacity` bytes of history
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            inner: Mutex::new(Inner {
                store: vec![0u8; capacity].into_boxed_slice(),
                total_written: 0,
                closed: false,
            }),
            data_arrived: Condvar::new(),
            data_notify: Notify::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_written(&self) -> u64 {
        self.inner.lock().total_written
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Append bytes at the write cursor, wrapping at capacity.
    /// Writes after `close` are discarded.
    pub fn write(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }

        // Only the trailing `capacity` bytes of an oversized write survive
        let skip = data.len().saturating_sub(self.capacity);
        inner.total_written += skip as u64;

        let mut offset = skip;
        while offset < data.len() {
            let write_pos = (inner.total_written % self.capacity as u64) as usize;
            let chunk = (data.len() - offset).min(self.capacity - write_pos);
            inner.store[write_pos..write_pos + chunk].copy_from_slice(&data[offset..offset + chunk]);
            offset += chunk;
            inner.total_written += chunk as u64;
        }

        drop(inner);
        self.data_arrived.notify_all();
        self.data_notify.notify_waiters();
    }

    /// Append `len` zero bytes
    pub fn write_silence(&self, len: usize) {
        // Chunked so a huge request never allocates more than the store
        let zeros = vec![0u8; len.min(self.capacity)];
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(zeros.len());
            self.write(&zeros[..n]);
            remaining -= n;
        }
    }

    /// Open a cursor at the live edge, or at the oldest retained byte
    pub fn open_reader(&self, live: bool) -> ReaderCursor {
        let inner = self.inner.lock();
        let position = if live {
            inner.total_written
        } else {
            inner.total_written.saturating_sub(self.capacity as u64)
        };
        ReaderCursor { position, skipped: 0 }
    }

    /// Block until data is available or the buffer closes.
    /// Returns `None` at end of stream.
    pub fn read(&self, cursor: &mut ReaderCursor, out: &mut [u8]) -> Option<usize> {
        loop {
            match self.read_timeout(cursor, out, READ_POLL_INTERVAL) {
                ReadOutcome::Data(n) => return Some(n),
                ReadOutcome::Closed => return None,
                ReadOutcome::TimedOut => continue,
            }
        }
    }

    /// Single bounded wait for data
    pub fn read_timeout(
        &self,
        cursor: &mut ReaderCursor,
        out: &mut [u8],
        timeout: Duration,
    ) -> ReadOutcome {
        if out.is_empty() {
            return ReadOutcome::Data(0);
        }

        let mut inner = self.inner.lock();
        let mut waited = false;
        loop {
            if inner.closed {
                return ReadOutcome::Closed;
            }
            let copied = self.copy_available(&inner, cursor, out);
            if copied > 0 {
                return ReadOutcome::Data(copied);
            }

            if waited {
                return ReadOutcome::TimedOut;
            }
            let result = self.data_arrived.wait_for(&mut inner, timeout);
            waited = result.timed_out();
        }
    }

    /// Await data without blocking a thread. Returns `None` at end of stream.
    pub async fn read_async(&self, cursor: &mut ReaderCursor, out: &mut [u8]) -> Option<usize> {
        if out.is_empty() {
            return Some(0);
        }

        loop {
            // Registered before the state check so a write in between is not lost
            let notified = self.data_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let inner = self.inner.lock();
                if inner.closed {
                    return None;
                }
                let copied = self.copy_available(&inner, cursor, out);
                if copied > 0 {
                    return Some(copied);
                }
            }

            notified.await;
        }
    }

    /// Copy whatever the cursor has not yet seen, applying catch-up first
    fn copy_available(&self, inner: &Inner, cursor: &mut ReaderCursor, out: &mut [u8]) -> usize {
        let capacity = self.capacity as u64;
        if inner.total_written - cursor.position > capacity {
            // Writer lapped this reader; jump close to live
            let target = inner.total_written - capacity / 4;
            cursor.skipped += target - cursor.position;
            cursor.position = target;
        }

        let available = inner.total_written - cursor.position;
        let to_read = (available as usize).min(out.len());
        let mut copied = 0;
        while copied < to_read {
            let p = (cursor.position % capacity) as usize;
            let chunk = (to_read - copied).min(self.capacity - p);
            out[copied..copied + chunk].copy_from_slice(&inner.store[p..p + chunk]);
            copied += chunk;
            cursor.position += chunk as u64;
        }
        to_read
    }

    /// Mark the buffer closed and wake every blocked reader
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.data_arrived.notify_all();
        self.data_notify.notify_waiters();
    }
}

/// Thread-safe handle to a ring buffer
pub type SharedRingBuffer = Arc<RingBuffer>;

/// Create a new shared ring buffer
pub fn create_shared_buffer(capacity: usize) -> SharedRingBuffer {
    Arc::new(RingBuffer::new(capacity))
}
