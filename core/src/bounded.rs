//! Fixed-capacity byte buffer for processing unbounded streams.
//!
//! # Design
//! The buffer never reallocates past its capacity. Bytes offered after it is
//! full are counted in `total_seen` and dropped. The generator uses a full
//! buffer as its reusable write chunk; the response capture uses an empty one
//! as a truncating sink.

/// A byte buffer that holds at most `capacity` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedBuffer {
    data: Vec<u8>,
    capacity: usize,
    total_seen: u64,
}

impl BoundedBuffer {
    /// Create an empty buffer. Memory for `capacity` bytes is reserved up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            total_seen: 0,
        }
    }

    /// Create a full buffer where the byte at index `i` is `fill(i)`.
    pub fn filled(capacity: usize, fill: impl Fn(usize) -> u8) -> Self {
        let data: Vec<u8> = (0..capacity).map(fill).collect();
        Self {
            data,
            capacity,
            total_seen: capacity as u64,
        }
    }

    /// Append as much of `chunk` as fits and return how many bytes were kept.
    ///
    /// The full length of `chunk` is always added to [`total_seen`](Self::total_seen).
    pub fn absorb(&mut self, chunk: &[u8]) -> usize {
        let room = self.capacity - self.data.len();
        let kept = room.min(chunk.len());
        self.data.extend_from_slice(&chunk[..kept]);
        self.total_seen += chunk.len() as u64;
        kept
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Every byte ever offered, including the ones that were dropped.
    pub fn total_seen(&self) -> u64 {
        self.total_seen
    }

    /// True once bytes have been discarded.
    pub fn is_truncated(&self) -> bool {
        self.total_seen > self.data.len() as u64
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}
