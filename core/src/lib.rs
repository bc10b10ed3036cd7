//! Streaming large-file upload core.
//!
//! # Overview
//! Generates a large synthetic file with bounded memory, then uploads it as a
//! multipart form through a narrow [`Transport`] contract while two observers
//! track upload progress and capture the first kilobyte of the response.
//!
//! # Design
//! - The orchestrator ([`UploadClient`]) never talks to the network itself;
//!   it prepares a streaming [`MultipartBody`] and hands it to a transport.
//!   [`UreqTransport`] is the default implementation.
//! - Hooks are per-transfer values ([`TransferObservers`]), never globals, so
//!   repeated uploads in one process stay independent.
//! - [`BoundedBuffer`] is the single fixed-memory primitive shared by the
//!   generator's chunk and the response capture.

pub mod bounded;
pub mod client;
pub mod error;
pub mod generate;
pub mod http;
pub mod multipart;
pub mod observer;
pub mod transport;
pub mod types;

pub use bounded::BoundedBuffer;
pub use client::UploadClient;
pub use error::{GenerateError, TransportError, UploadError};
pub use generate::{current_date, FileGenerator, GeneratedFile, CHUNK_SIZE};
pub use http::UreqTransport;
pub use multipart::MultipartBody;
pub use observer::{
    HookAction, ProgressObserver, ResponseCapture, TransferHooks, TransferObservers,
    TransferProgress, RESPONSE_CAPTURE_LIMIT,
};
pub use transport::{TransferPolicy, TransferStats, Transport, TransportRequest};
pub use types::{FilePart, FormField, ResponseSummary, TransferRequest, TransferResult};
