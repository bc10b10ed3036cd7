//! `ureq`-backed [`Transport`].
//!
//! # Design
//! The body reader is wrapped in a counting reader that reports to the
//! progress hook after every read, which is how upload progress is observed
//! without ureq exposing a callback. An `Abort` answer fails the read; ureq
//! then gives up on the request and the error is reported as
//! [`TransportError::Aborted`]. HTTP error statuses are returned as data.
//!
//! Redirects are not followed: a 3xx is the result of the one request sent.
//! Response compression is not negotiated (ureq's `gzip` feature is off), so
//! the response hook sees the bytes exactly as the server sent them.

use std::io::{self, Read};
use std::time::Instant;

use tracing::{debug, info};
use ureq::{Agent, SendBody};

use crate::error::TransportError;
use crate::observer::{HookAction, TransferHooks};
use crate::transport::{TransferPolicy, TransferStats, Transport, TransportRequest};

/// Size of each read from the response body.
const RESPONSE_READ_SIZE: usize = 16 * 1024;

/// Performs transfers with a blocking `ureq` agent configured per request.
#[derive(Debug, Clone, Default)]
pub struct UreqTransport;

impl UreqTransport {
    pub fn new() -> Self {
        Self
    }

    fn agent(policy: &TransferPolicy) -> Agent {
        Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .timeout_connect(Some(policy.connect_timeout))
            .timeout_global(policy.transfer_timeout)
            .input_buffer_size(policy.effective_buffer_size())
            .output_buffer_size(policy.effective_buffer_size())
            .build()
            .new_agent()
    }
}

impl Transport for UreqTransport {
    fn perform(
        &mut self,
        request: TransportRequest<'_>,
        hooks: &mut dyn TransferHooks,
    ) -> Result<TransferStats, TransportError> {
        let agent = Self::agent(request.policy);
        let started = Instant::now();

        if hooks.on_progress(0, request.content_length) == HookAction::Abort {
            return Err(TransportError::Aborted);
        }

        info!(url = request.url, bytes = request.content_length, "sending request");
        let mut body = ProgressReader {
            inner: request.body,
            hooks: &mut *hooks,
            uploaded: 0,
            total: request.content_length,
            aborted: false,
        };
        let mut builder = agent
            .post(request.url)
            .header("content-type", request.content_type)
            .header("content-length", request.content_length.to_string());
        for (name, value) in request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let sent = builder.send(SendBody::from_reader(&mut body));
        let (uploaded, aborted) = (body.uploaded, body.aborted);

        let mut response = match sent {
            Ok(response) => response,
            Err(_) if aborted => return Err(TransportError::Aborted),
            Err(e) => return Err(map_error(e)),
        };

        let http_status = response.status().as_u16();
        debug!(status = http_status, uploaded, "request sent, reading response");

        let mut reader = response.body_mut().as_reader();
        let mut buf = vec![0u8; RESPONSE_READ_SIZE];
        loop {
            let n = reader.read(&mut buf).map_err(map_io_error)?;
            if n == 0 {
                break;
            }
            let consumed = hooks.on_response_data(&buf[..n]);
            if consumed != n {
                return Err(TransportError::WriteRejected {
                    received: n,
                    consumed,
                });
            }
        }

        Ok(TransferStats {
            http_status,
            bytes_uploaded: uploaded,
            elapsed: started.elapsed(),
        })
    }
}

/// Counts bytes handed to ureq and reports them to the progress hook.
struct ProgressReader<'a> {
    inner: &'a mut dyn Read,
    hooks: &'a mut dyn TransferHooks,
    uploaded: u64,
    total: u64,
    aborted: bool,
}

impl Read for ProgressReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.aborted {
            return Err(io::Error::other("transfer aborted by progress callback"));
        }
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.uploaded += n as u64;
            if self.hooks.on_progress(self.uploaded, self.total) == HookAction::Abort {
                self.aborted = true;
                return Err(io::Error::other("transfer aborted by progress callback"));
            }
        }
        Ok(n)
    }
}

fn map_error(e: ureq::Error) -> TransportError {
    let message = e.to_string();
    match e {
        ureq::Error::Timeout(_) => TransportError::Timeout(message),
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            TransportError::Connect(message)
        }
        ureq::Error::Io(io) => map_io_error(io),
        _ => TransportError::Failed(message),
    }
}

fn map_io_error(e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => TransportError::Connect(e.to_string()),
        io::ErrorKind::TimedOut => TransportError::Timeout(e.to_string()),
        _ => TransportError::Failed(e.to_string()),
    }
}
