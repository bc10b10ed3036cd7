//! Upload orchestration: measure, frame, hand off to the transport.
//!
//! # Design
//! `UploadClient` owns a [`Transport`] and a [`TransferPolicy`] and keeps no
//! per-transfer state. Each upload opens the source, measures it by seeking,
//! wraps it in a [`MultipartBody`] and performs exactly one attempt with a
//! fresh [`TransferObservers`]. The file handle is owned by the body and is
//! dropped when `upload` returns, on every path.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use tracing::{info, warn};

use crate::error::UploadError;
use crate::multipart::MultipartBody;
use crate::observer::{ProgressObserver, TransferObservers};
use crate::transport::{TransferPolicy, Transport, TransportRequest};
use crate::types::{TransferRequest, TransferResult};

/// Drives multipart file uploads through a transport.
#[derive(Debug)]
pub struct UploadClient<T> {
    transport: T,
    policy: TransferPolicy,
}

impl<T: Transport> UploadClient<T> {
    pub fn new(transport: T, policy: TransferPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    /// Upload with a progress observer that only logs.
    pub fn upload(&mut self, request: &TransferRequest) -> Result<TransferResult, UploadError> {
        self.upload_with(request, ProgressObserver::new())
    }

    /// Upload, reporting progress through `progress`.
    ///
    /// Fails with [`UploadError::FileOpen`] before any network activity if the
    /// source cannot be opened or measured. HTTP error statuses are a
    /// successful result; only transport failures are [`UploadError::Transfer`].
    pub fn upload_with(
        &mut self,
        request: &TransferRequest,
        progress: ProgressObserver<'_>,
    ) -> Result<TransferResult, UploadError> {
        let (file, file_len) = open_measured(&request.file.path)?;
        let mut body = MultipartBody::new(request, file, file_len);
        let content_type = body.content_type();
        let content_length = body.content_length();

        info!(
            url = %request.url,
            file = %request.file.path.display(),
            file_bytes = file_len,
            "starting upload of {}MB",
            file_len / (1024 * 1024)
        );

        let mut hooks = TransferObservers::new(progress);
        let outcome = self.transport.perform(
            TransportRequest {
                url: &request.url,
                content_type: &content_type,
                headers: &request.headers,
                content_length,
                body: &mut body,
                policy: &self.policy,
            },
            &mut hooks,
        );

        let stats = match outcome {
            Ok(stats) => stats,
            Err(e) => {
                warn!(url = %request.url, error = %e, "upload failed");
                return Err(e.into());
            }
        };

        let result = TransferResult {
            http_status: stats.http_status,
            average_speed: stats.average_upload_speed(),
            bytes_uploaded: stats.bytes_uploaded,
            response: hooks.capture.into_summary(),
        };
        info!(
            status = result.http_status,
            bytes = result.bytes_uploaded,
            speed_kib_s = result.average_speed / 1024.0,
            "upload finished"
        );
        Ok(result)
    }
}

/// Open `path` and measure it by seeking to the end and back.
fn open_measured(path: &Path) -> Result<(File, u64), UploadError> {
    let open_error = |source| UploadError::FileOpen {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(open_error)?;
    let len = file.seek(SeekFrom::End(0)).map_err(open_error)?;
    file.seek(SeekFrom::Start(0)).map_err(open_error)?;
    Ok((file, len))
}
