//! Progress and response hooks invoked by a transport during one transfer.
//!
//! # Design
//! A transport calls [`TransferHooks`] synchronously on its own thread, as
//! often as it likes. All state lives in a [`TransferObservers`] value built
//! fresh for each upload, so two transfers never share counters.

use std::fmt;

use tracing::{debug, info};

use crate::bounded::BoundedBuffer;
use crate::types::ResponseSummary;

/// At most this many response bytes are kept.
pub const RESPONSE_CAPTURE_LIMIT: usize = 1024;

/// What a progress hook asks the transport to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    Continue,
    /// Cancel the transfer. The transport reports it as an aborted transfer.
    Abort,
}

/// Callbacks a [`Transport`](crate::Transport) drives during a transfer.
pub trait TransferHooks {
    /// Called with cumulative upload byte counts. `total` may be 0 when unknown.
    fn on_progress(&mut self, uploaded: u64, total: u64) -> HookAction;

    /// Called with each newly received response chunk. Must return the number
    /// of bytes consumed; anything less than `chunk.len()` fails the transfer.
    fn on_response_data(&mut self, chunk: &[u8]) -> usize;
}

/// Cumulative upload counters for one transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub uploaded: u64,
    pub total: u64,
}

impl TransferProgress {
    /// Percentage complete, or `None` while the total is unknown.
    pub fn percent(&self) -> Option<f64> {
        (self.total > 0).then(|| self.uploaded as f64 / self.total as f64 * 100.0)
    }
}

type ProgressListener<'a> = Box<dyn FnMut(&TransferProgress) -> HookAction + 'a>;

/// Tracks upload progress and forwards it to an optional listener.
///
/// `uploaded` never decreases and `total` is fixed by the first non-zero
/// report. The listener may borrow from the caller for the observer's lifetime.
#[derive(Default)]
pub struct ProgressObserver<'a> {
    progress: TransferProgress,
    last_logged_percent: Option<u64>,
    listener: Option<ProgressListener<'a>>,
}

impl<'a> ProgressObserver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward every accepted report to `listener`. Its answer is returned to
    /// the transport.
    pub fn with_listener(listener: impl FnMut(&TransferProgress) -> HookAction + 'a) -> Self {
        Self {
            listener: Some(Box::new(listener)),
            ..Self::default()
        }
    }

    pub fn progress(&self) -> TransferProgress {
        self.progress
    }

    pub fn on_progress(&mut self, uploaded: u64, total: u64) -> HookAction {
        if total == 0 {
            return HookAction::Continue;
        }
        if self.progress.total == 0 {
            self.progress.total = total;
        }
        self.progress.uploaded = self.progress.uploaded.max(uploaded.min(self.progress.total));

        if let Some(percent) = self.progress.percent() {
            let whole = percent as u64;
            if self.last_logged_percent != Some(whole) {
                self.last_logged_percent = Some(whole);
                debug!(
                    uploaded = self.progress.uploaded,
                    total = self.progress.total,
                    "upload progress {percent:.2}%"
                );
            }
        }

        match self.listener.as_mut() {
            Some(listener) => listener(&self.progress),
            None => HookAction::Continue,
        }
    }
}

impl fmt::Debug for ProgressObserver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressObserver")
            .field("progress", &self.progress)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

/// Keeps the first [`RESPONSE_CAPTURE_LIMIT`] bytes of a response and counts the rest.
///
/// Counts are of the bytes the transport hands over. [`UreqTransport`](crate::UreqTransport)
/// does not request compression, so those are the bytes the server sent.
#[derive(Debug, Clone)]
pub struct ResponseCapture {
    buffer: BoundedBuffer,
}

impl Default for ResponseCapture {
    fn default() -> Self {
        Self::with_limit(RESPONSE_CAPTURE_LIMIT)
    }
}

impl ResponseCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: BoundedBuffer::with_capacity(limit),
        }
    }

    /// Absorb a chunk. Always reports the whole chunk as consumed.
    pub fn on_data(&mut self, chunk: &[u8]) -> usize {
        if self.buffer.total_seen() == 0 && !chunk.is_empty() {
            info!("receiving response");
        }
        let was_truncated = self.buffer.is_truncated();
        self.buffer.absorb(chunk);
        if !was_truncated && self.buffer.is_truncated() {
            debug!(limit = self.buffer.capacity(), "response truncated");
        }
        chunk.len()
    }

    pub fn captured(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn total_received(&self) -> u64 {
        self.buffer.total_seen()
    }

    pub fn is_truncated(&self) -> bool {
        self.buffer.is_truncated()
    }

    pub fn into_summary(self) -> ResponseSummary {
        let total_received = self.buffer.total_seen();
        let truncated = self.buffer.is_truncated();
        ResponseSummary {
            captured: self.buffer.into_vec(),
            total_received,
            truncated,
        }
    }
}

/// Per-transfer hook state: one progress observer and one response capture.
#[derive(Debug, Default)]
pub struct TransferObservers<'a> {
    pub progress: ProgressObserver<'a>,
    pub capture: ResponseCapture,
}

impl<'a> TransferObservers<'a> {
    pub fn new(progress: ProgressObserver<'a>) -> Self {
        Self {
            progress,
            capture: ResponseCapture::new(),
        }
    }
}

impl TransferHooks for TransferObservers<'_> {
    fn on_progress(&mut self, uploaded: u64, total: u64) -> HookAction {
        self.progress.on_progress(uploaded, total)
    }

    fn on_response_data(&mut self, chunk: &[u8]) -> usize {
        self.capture.on_data(chunk)
    }
}
