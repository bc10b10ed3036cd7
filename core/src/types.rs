//! Upload request and result types.
//!
//! # Design
//! `TransferRequest` is plain data; the orchestrator turns it into a
//! streaming multipart body. Results derive `Serialize` so a caller can
//! print them as JSON without a parallel DTO.

use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

/// A scalar multipart form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

/// The single file attachment of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name the file is sent under.
    pub field_name: String,
    pub path: PathBuf,
    /// Filename declared in the part's `Content-Disposition`.
    pub filename: String,
    pub content_type: String,
}

impl FilePart {
    /// A binary part whose declared filename is the last path component.
    pub fn octet_stream(field_name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            field_name: field_name.into(),
            path: path.to_path_buf(),
            filename,
            content_type: "application/octet-stream".to_string(),
        }
    }
}

/// Target URL, ordered scalar fields, and one file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub url: String,
    /// Extra request headers such as `authorization`.
    pub headers: Vec<(String, String)>,
    pub fields: Vec<FormField>,
    pub file: FilePart,
}

impl TransferRequest {
    pub fn new(url: impl Into<String>, file: FilePart) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            fields: Vec::new(),
            file,
        }
    }

    /// Append a scalar field. Fields are sent in insertion order.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Authenticate with `Authorization: Bearer <token>`.
    pub fn bearer_token(self, token: &str) -> Self {
        self.header("authorization", format!("Bearer {token}"))
    }
}

/// The bounded view of the server's response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSummary {
    /// The earliest received bytes, at most the capture limit.
    #[serde(serialize_with = "lossy_text")]
    pub captured: Vec<u8>,
    pub total_received: u64,
    pub truncated: bool,
}

impl ResponseSummary {
    /// The captured bytes as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.captured).into_owned()
    }
}

fn lossy_text<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

/// Outcome of a completed transfer, whatever the HTTP status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferResult {
    pub http_status: u16,
    /// Average upload speed in bytes per second.
    pub average_speed: f64,
    pub bytes_uploaded: u64,
    pub response: ResponseSummary,
}
