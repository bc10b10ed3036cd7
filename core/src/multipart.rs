//! Streaming `multipart/form-data` body.
//!
//! # Design
//! The scalar fields and part headers are small and built up front. The file
//! is chained in between as a `Take<File>` bounded by the measured length, so
//! the body never holds more than the two framing buffers in memory and its
//! declared length always matches what is read.

use std::fs::File;
use std::io::{self, Chain, Cursor, Read, Take};

use uuid::Uuid;

use crate::types::TransferRequest;

type BodyReader = Chain<Chain<Cursor<Vec<u8>>, Take<File>>, Cursor<Vec<u8>>>;

/// A multipart body that reads its file part from disk on demand.
pub struct MultipartBody {
    boundary: String,
    content_length: u64,
    reader: BodyReader,
}

impl MultipartBody {
    /// `file_len` must be the measured length of `file`; exactly that many
    /// bytes of it are streamed.
    pub fn new(request: &TransferRequest, file: File, file_len: u64) -> Self {
        let boundary = format!("------------------------{}", Uuid::new_v4().simple());
        let head = encode_head(&boundary, request);
        let tail = encode_tail(&boundary);
        let content_length = head.len() as u64 + file_len + tail.len() as u64;

        Self {
            boundary,
            content_length,
            reader: Cursor::new(head)
                .chain(file.take(file_len))
                .chain(Cursor::new(tail)),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

impl Read for MultipartBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Scalar fields in insertion order, then the file part headers.
fn encode_head(boundary: &str, request: &TransferRequest) -> Vec<u8> {
    let mut head = String::new();
    for field in &request.fields {
        head.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            escape(&field.name),
            field.value
        ));
    }
    let part = &request.file;
    head.push_str(&format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
        escape(&part.field_name),
        escape(&part.filename),
        part.content_type
    ));
    head.into_bytes()
}

fn encode_tail(boundary: &str) -> Vec<u8> {
    format!("\r\n--{boundary}--\r\n").into_bytes()
}

/// Percent-escape characters that would break a quoted header parameter.
fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::types::FilePart;

    fn temp_file(data: &[u8]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(data).unwrap();
        f
    }

    fn request_for(path: &std::path::Path) -> TransferRequest {
        let mut part = FilePart::octet_stream("file", path);
        part.filename = "upload.dat".to_string();
        TransferRequest::new("http://localhost/post", part)
            .field("date", "2024-05-01")
            .field("workspace", "simengine")
    }

    #[test]
    fn body_layout_and_length() {
        let tmp = temp_file(b"PAYLOAD");
        let req = request_for(tmp.path());
        let mut body = MultipartBody::new(&req, File::open(tmp.path()).unwrap(), 7);

        let declared = body.content_length();
        let boundary = body.boundary().to_string();
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        assert_eq!(out.len() as u64, declared);

        let text = String::from_utf8(out).unwrap();
        let expected = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"date\"\r\n\r\n2024-05-01\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"workspace\"\r\n\r\nsimengine\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload.dat\"\r\n\
             Content-Type: application/octet-stream\r\n\r\nPAYLOAD\r\n--{b}--\r\n",
            b = boundary
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn file_is_cut_at_measured_length() {
        let tmp = temp_file(b"0123456789");
        let req = request_for(tmp.path());
        let mut body = MultipartBody::new(&req, File::open(tmp.path()).unwrap(), 4);

        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        assert_eq!(out.len() as u64, body.content_length());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\r\n\r\n0123\r\n--"));
        assert!(!text.contains("0123456789"));
    }

    #[test]
    fn content_type_carries_boundary() {
        let tmp = temp_file(b"");
        let req = request_for(tmp.path());
        let body = MultipartBody::new(&req, File::open(tmp.path()).unwrap(), 0);
        assert_eq!(
            body.content_type(),
            format!("multipart/form-data; boundary={}", body.boundary())
        );
    }

    #[test]
    fn boundaries_differ_between_bodies() {
        let tmp = temp_file(b"x");
        let req = request_for(tmp.path());
        let a = MultipartBody::new(&req, File::open(tmp.path()).unwrap(), 1);
        let b = MultipartBody::new(&req, File::open(tmp.path()).unwrap(), 1);
        assert_ne!(a.boundary(), b.boundary());
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        assert_eq!(escape("a\"b"), "a%22b");
        assert_eq!(escape("line\r\nbreak"), "line%0D%0Abreak");
    }
}
