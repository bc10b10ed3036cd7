//! Synthetic test file generation with bounded memory.
//!
//! # Design
//! One [`CHUNK_SIZE`] pattern buffer is computed once and written repeatedly,
//! so peak memory is a single chunk regardless of the requested size. The
//! textual footer is appended after the data region and is not counted in the
//! declared size.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::bounded::BoundedBuffer;
use crate::error::GenerateError;

/// Size of one write, and the unit of the requested size: 1 MiB.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// A progress line is logged every this many chunks.
pub const PROGRESS_EVERY_CHUNKS: u64 = 5;

/// Today's local date as `YYYY-MM-DD`.
pub fn current_date() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// A file produced by [`FileGenerator::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    /// Length of the repeating pattern region. Excludes the footer.
    pub data_len: u64,
    pub footer_len: u64,
}

impl GeneratedFile {
    /// Bytes actually on disk.
    pub fn total_len(&self) -> u64 {
        self.data_len + self.footer_len
    }
}

/// Writes files made of a repeating 256-byte pattern plus a metadata footer.
#[derive(Debug, Clone)]
pub struct FileGenerator {
    chunk: BoundedBuffer,
    origin: String,
}

impl FileGenerator {
    /// `origin` is the label recorded in the footer.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            chunk: BoundedBuffer::filled(CHUNK_SIZE, |i| (i % 256) as u8),
            origin: origin.into(),
        }
    }

    /// The footer text for a file generated today.
    pub fn footer(&self) -> String {
        format!(
            "File created on {} from workspace: {}",
            current_date(),
            self.origin
        )
    }

    /// Write `size_mb` chunks to `path`, then the footer.
    ///
    /// On failure the partially written file is left in place.
    pub fn generate(&self, path: &Path, size_mb: u64) -> Result<GeneratedFile, GenerateError> {
        info!(path = %path.display(), size_mb, "creating test file");

        let mut file = File::create(path).map_err(|source| GenerateError::Create {
            path: path.to_path_buf(),
            source,
        })?;

        write_chunks(&mut file, self.chunk.as_slice(), size_mb, path)?;

        let footer = self.footer();
        file.write_all(footer.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| GenerateError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), size_mb, "finished creating test file");
        Ok(GeneratedFile {
            path: path.to_path_buf(),
            data_len: size_mb * CHUNK_SIZE as u64,
            footer_len: footer.len() as u64,
        })
    }
}

/// Write `chunk` to `out` `count` times, rejecting short writes.
fn write_chunks(
    out: &mut impl Write,
    chunk: &[u8],
    count: u64,
    path: &Path,
) -> Result<(), GenerateError> {
    for i in 0..count {
        let written = out.write(chunk).map_err(|source| GenerateError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        if written != chunk.len() {
            return Err(GenerateError::ShortWrite {
                path: path.to_path_buf(),
                expected: chunk.len(),
                written,
            });
        }
        if i % PROGRESS_EVERY_CHUNKS == 0 {
            info!("written {i}MB of {count}MB");
        }
    }
    Ok(())
}
