//! The narrow contract between the orchestrator and an HTTP engine.
//!
//! # Design
//! The core describes a request as plain data plus a borrowed body reader and
//! leaves connection handling, TLS and protocol negotiation to the
//! implementation. One `perform` call is one blocking attempt; hooks are
//! invoked on the calling thread while it runs.

use std::io::Read;
use std::time::Duration;

use crate::error::TransportError;
use crate::observer::TransferHooks;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// 256 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

/// Smallest buffer a transport is given. Must hold a full response header block.
pub const MIN_BUFFER_SIZE: usize = 64 * 1024;

pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Transport-level policies applied before a transfer starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPolicy {
    pub connect_timeout: Duration,
    /// Limit on the whole transfer. `None` means unbounded, which also means a
    /// stalled transfer is never cut off.
    pub transfer_timeout: Option<Duration>,
    /// I/O buffer size the transport should use for the body. Clamped to
    /// [`MIN_BUFFER_SIZE`]..=[`MAX_BUFFER_SIZE`] when applied.
    pub buffer_size: usize,
}

impl TransferPolicy {
    /// `buffer_size` clamped to the range a transport accepts.
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE)
    }
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            transfer_timeout: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// A POST the transport should perform.
pub struct TransportRequest<'a> {
    pub url: &'a str,
    pub content_type: &'a str,
    /// Extra request headers, sent in order.
    pub headers: &'a [(String, String)],
    /// Exact number of bytes `body` will yield.
    pub content_length: u64,
    pub body: &'a mut dyn Read,
    pub policy: &'a TransferPolicy,
}

/// Post-transfer statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferStats {
    pub http_status: u16,
    pub bytes_uploaded: u64,
    pub elapsed: Duration,
}

impl TransferStats {
    /// Bytes per second over the whole transfer, 0 when no time elapsed.
    pub fn average_upload_speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_uploaded as f64 / secs
        } else {
            0.0
        }
    }
}

/// A blocking HTTP engine.
pub trait Transport {
    fn perform(
        &mut self,
        request: TransportRequest<'_>,
        hooks: &mut dyn TransferHooks,
    ) -> Result<TransferStats, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn perform(
        &mut self,
        request: TransportRequest<'_>,
        hooks: &mut dyn TransferHooks,
    ) -> Result<TransferStats, TransportError> {
        (**self).perform(request, hooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let policy = TransferPolicy::default();
        assert_eq!(policy.connect_timeout, Duration::from_secs(30));
        assert_eq!(policy.transfer_timeout, None);
        assert_eq!(policy.buffer_size, 256 * 1024);
    }

    #[test]
    fn buffer_size_is_clamped() {
        let tiny = TransferPolicy {
            buffer_size: 0,
            ..TransferPolicy::default()
        };
        assert_eq!(tiny.effective_buffer_size(), MIN_BUFFER_SIZE);

        let huge = TransferPolicy {
            buffer_size: usize::MAX,
            ..TransferPolicy::default()
        };
        assert_eq!(huge.effective_buffer_size(), MAX_BUFFER_SIZE);

        assert_eq!(
            TransferPolicy::default().effective_buffer_size(),
            DEFAULT_BUFFER_SIZE
        );
    }

    #[test]
    fn speed_over_elapsed_time() {
        let stats = TransferStats {
            http_status: 200,
            bytes_uploaded: 4096,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(stats.average_upload_speed(), 2048.0);
    }

    #[test]
    fn speed_is_zero_without_elapsed_time() {
        let stats = TransferStats {
            http_status: 200,
            bytes_uploaded: 10,
            elapsed: Duration::ZERO,
        };
        assert_eq!(stats.average_upload_speed(), 0.0);
    }
}
