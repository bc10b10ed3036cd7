//! Command-line surface for the large-file upload core.
//!
//! # Overview
//! Generates the test file, uploads it with the `ureq` transport, and prints
//! progress plus a truncated view of the server's reply.
//!
//! # Design
//! - `run` writes user-facing text, progress lines included, to the writer it
//!   is given; diagnostics go through `tracing` to stderr. A failing progress
//!   write is logged once and the upload carries on without progress output.
//! - Exit code 1 means no transfer happened (generation failed or the source
//!   could not be opened). Every completed attempt exits 0, including
//!   transport failures and HTTP error statuses.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use bigupload_core::{
    current_date, FileGenerator, FilePart, HookAction, ProgressObserver, TransferPolicy,
    TransferProgress, TransferRequest, TransferResult, UploadClient, UploadError, UreqTransport,
};
use clap::Parser;
use tracing::{error, warn};

pub const DEFAULT_URL: &str = "http://httpbin.org/post";

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "bigupload",
    version,
    about = "Generate a large file and upload it as a multipart form"
)]
pub struct Cli {
    /// Endpoint receiving the multipart POST.
    #[arg(long, default_value = DEFAULT_URL)]
    pub url: String,

    /// File to generate and upload.
    #[arg(long, default_value = "large_test_file.dat")]
    pub file: PathBuf,

    /// Size of the generated data region in MiB.
    #[arg(long, default_value_t = 35)]
    pub size_mb: u64,

    /// Value of the `workspace` form field.
    #[arg(long, default_value = "simengine")]
    pub workspace: String,

    /// Optional `label` form field, sent after `workspace`.
    #[arg(long)]
    pub label: Option<String>,

    /// Bearer token for endpoints that require authentication.
    #[arg(long)]
    pub token: Option<String>,

    /// Label written into the generated file's footer.
    #[arg(long, default_value = "bigupload")]
    pub origin: String,

    /// Upload `--file` as it is instead of generating it.
    #[arg(long)]
    pub skip_generate: bool,

    #[arg(long, default_value_t = 30)]
    pub connect_timeout_secs: u64,

    /// Limit on the whole transfer. Unbounded when omitted.
    #[arg(long)]
    pub transfer_timeout_secs: Option<u64>,

    /// Transport I/O buffer size in KiB.
    #[arg(long, default_value_t = 256, value_parser = clap::value_parser!(u64).range(64..=65536))]
    pub buffer_kib: u64,

    /// Print the result as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn policy(&self) -> TransferPolicy {
        TransferPolicy {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            transfer_timeout: self.transfer_timeout_secs.map(Duration::from_secs),
            buffer_size: usize::try_from(self.buffer_kib.saturating_mul(1024))
                .unwrap_or(usize::MAX),
        }
    }

    /// `date`, `workspace` and optional `label` fields followed by the file
    /// under `file`.
    pub fn transfer_request(&self) -> TransferRequest {
        let mut request = TransferRequest::new(&self.url, FilePart::octet_stream("file", &self.file))
            .field("date", current_date())
            .field("workspace", &self.workspace);
        if let Some(label) = &self.label {
            request = request.field("label", label);
        }
        if let Some(token) = &self.token {
            request = request.bearer_token(token);
        }
        request
    }
}

/// Generate, upload and report. Returns the process exit code.
pub fn run(cli: &Cli, out: &mut dyn Write) -> io::Result<u8> {
    if !cli.skip_generate {
        writeln!(out, "Creating {}MB test file: {}", cli.size_mb, cli.file.display())?;
        if let Err(e) = FileGenerator::new(&cli.origin).generate(&cli.file, cli.size_mb) {
            error!(error = %e, "file generation failed");
            writeln!(out, "Failed to create test file: {e}")?;
            return Ok(1);
        }
        writeln!(out, "Finished creating {}MB test file.", cli.size_mb)?;
    }

    let request = cli.transfer_request();
    writeln!(out, "Starting upload to {}...", cli.url)?;

    let mut progress_error = None;
    let result = {
        let observer = if cli.json {
            ProgressObserver::new()
        } else {
            let sink = &mut *out;
            let failed = &mut progress_error;
            ProgressObserver::with_listener(move |p| print_progress(sink, failed, p))
        };
        let mut client = UploadClient::new(UreqTransport::new(), cli.policy());
        client.upload_with(&request, observer)
    };
    if let Some(e) = progress_error {
        warn!(error = %e, "progress output failed");
    }

    if cli.json {
        writeln!(out, "{}", render_json(&result))?;
    } else {
        write!(out, "{}", render_text(&result))?;
    }
    Ok(exit_code(&result))
}

/// 1 only when the upload could not start because the source was unreadable.
pub fn exit_code(result: &Result<TransferResult, UploadError>) -> u8 {
    match result {
        Err(e) if e.is_fatal() => 1,
        _ => 0,
    }
}

pub fn format_progress(progress: &TransferProgress) -> Option<String> {
    let percent = progress.percent()?;
    Some(format!(
        "Upload progress: {percent:.2}% ({}MB / {}MB)",
        progress.uploaded / MIB,
        progress.total / MIB
    ))
}

/// Overwrite the current line with `progress`. After the first write error
/// nothing more is written.
fn print_progress(
    out: &mut dyn Write,
    failed: &mut Option<io::Error>,
    progress: &TransferProgress,
) -> HookAction {
    if failed.is_none() {
        if let Some(line) = format_progress(progress) {
            if let Err(e) = write!(out, "\r{line}").and_then(|()| out.flush()) {
                *failed = Some(e);
            }
        }
    }
    HookAction::Continue
}

pub fn render_text(result: &Result<TransferResult, UploadError>) -> String {
    match result {
        Ok(r) => {
            let mut text = String::from("\n");
            if r.response.total_received > 0 {
                text.push_str("Receiving response (showing first part only)...\n");
                text.push_str(&r.response.text());
                if r.response.truncated {
                    text.push_str("\n...(response truncated)...");
                }
                text.push('\n');
            }
            text.push_str(&format!(
                "File uploaded successfully! HTTP response code: {}\n",
                r.http_status
            ));
            text.push_str(&format!(
                "Average upload speed: {:.2} KB/s\n",
                r.average_speed / 1024.0
            ));
            text
        }
        Err(e) => format!("\nUpload failed: {e}\n"),
    }
}

pub fn render_json(result: &Result<TransferResult, UploadError>) -> String {
    let value = match result {
        Ok(r) => serde_json::json!({ "ok": true, "result": r }),
        Err(e) => serde_json::json!({
            "ok": false,
            "fatal": e.is_fatal(),
            "error": e.to_string(),
        }),
    };
    value.to_string()
}

#[cfg(test)]
mod tests {
    use bigupload_core::{ResponseSummary, TransportError};
    use tempfile::TempDir;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["bigupload"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    fn success(captured: &[u8], total: u64) -> Result<TransferResult, UploadError> {
        Ok(TransferResult {
            http_status: 200,
            average_speed: 2048.0,
            bytes_uploaded: 10,
            response: ResponseSummary {
                captured: captured.to_vec(),
                total_received: total,
                truncated: total > captured.len() as u64,
            },
        })
    }

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}/post", listener.local_addr().unwrap())
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.url, DEFAULT_URL);
        assert_eq!(cli.size_mb, 35);
        assert_eq!(cli.file, PathBuf::from("large_test_file.dat"));
        let policy = cli.policy();
        assert_eq!(policy, TransferPolicy::default());
    }

    #[test]
    fn transfer_timeout_is_configurable() {
        let cli = parse(&["--transfer-timeout-secs", "600", "--buffer-kib", "64"]);
        let policy = cli.policy();
        assert_eq!(policy.transfer_timeout, Some(Duration::from_secs(600)));
        assert_eq!(policy.buffer_size, 64 * 1024);
    }

    #[test]
    fn buffer_size_out_of_range_is_rejected() {
        for kib in ["0", "63", "65537", "18446744073709551615"] {
            assert!(
                Cli::try_parse_from(["bigupload", "--buffer-kib", kib]).is_err(),
                "{kib} accepted"
            );
        }
        let cli = parse(&["--buffer-kib", "65536"]);
        assert_eq!(cli.policy().buffer_size, 64 * 1024 * 1024);
    }

    #[test]
    fn request_has_date_then_workspace() {
        let cli = parse(&["--workspace", "lab"]);
        let req = cli.transfer_request();
        assert_eq!(req.fields[0].name, "date");
        assert_eq!(req.fields[0].value, current_date());
        assert_eq!(req.fields[1].name, "workspace");
        assert_eq!(req.fields[1].value, "lab");
        assert_eq!(req.file.field_name, "file");
        assert_eq!(req.file.filename, "large_test_file.dat");
        assert_eq!(req.fields.len(), 2);
        assert!(req.headers.is_empty());
    }

    #[test]
    fn label_and_token_reach_request() {
        let cli = parse(&["--label", "nightly", "--token", "abc"]);
        let req = cli.transfer_request();
        assert_eq!(req.fields[2].name, "label");
        assert_eq!(req.fields[2].value, "nightly");
        assert_eq!(
            req.headers,
            [("authorization".to_string(), "Bearer abc".to_string())]
        );
    }

    #[test]
    fn exit_codes() {
        assert_eq!(exit_code(&success(b"ok", 2)), 0);
        let transfer: Result<TransferResult, UploadError> =
            Err(TransportError::Failed("boom".into()).into());
        assert_eq!(exit_code(&transfer), 0);
        let open: Result<TransferResult, UploadError> = Err(UploadError::FileOpen {
            path: PathBuf::from("x"),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        assert_eq!(exit_code(&open), 1);
    }

    #[test]
    fn progress_line_format() {
        let p = TransferProgress {
            uploaded: 3 * MIB,
            total: 12 * MIB,
        };
        assert_eq!(
            format_progress(&p).unwrap(),
            "Upload progress: 25.00% (3MB / 12MB)"
        );
        assert!(format_progress(&TransferProgress::default()).is_none());
    }

    #[test]
    fn text_marks_truncation() {
        let text = render_text(&success(b"{\"a\":1}", 5000));
        assert!(text.contains("{\"a\":1}\n...(response truncated)..."));
        assert!(text.contains("HTTP response code: 200"));
        assert!(text.contains("Average upload speed: 2.00 KB/s"));

        let text = render_text(&success(b"short", 5));
        assert!(!text.contains("truncated"));
    }

    #[test]
    fn json_reports_errors() {
        let failed: Result<TransferResult, UploadError> =
            Err(TransportError::Timeout("connect".into()).into());
        let value: serde_json::Value = serde_json::from_str(&render_json(&failed)).unwrap();
        assert_eq!(value["ok"], false);
        assert_eq!(value["fatal"], false);
        assert!(value["error"].as_str().unwrap().contains("timed out"));

        let value: serde_json::Value =
            serde_json::from_str(&render_json(&success(b"hi", 2))).unwrap();
        assert_eq!(value["result"]["http_status"], 200);
        assert_eq!(value["result"]["response"]["captured"], "hi");
    }

    #[test]
    fn missing_source_exits_one() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("absent.dat");
        let cli = parse(&["--skip-generate", "--file", file.to_str().unwrap()]);
        let mut out = Vec::new();
        assert_eq!(run(&cli, &mut out).unwrap(), 1);
        assert!(String::from_utf8(out).unwrap().contains("Upload failed"));
    }

    #[test]
    fn transport_failure_exits_zero() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("gen.dat");
        let url = closed_port_url();
        let cli = parse(&[
            "--url",
            &url,
            "--size-mb",
            "1",
            "--json",
            "--file",
            file.to_str().unwrap(),
        ]);
        let mut out = Vec::new();
        assert_eq!(run(&cli, &mut out).unwrap(), 0);
        assert!(file.exists());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"ok\":false"));
    }

    #[test]
    fn progress_goes_to_output() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("gen.dat");
        let url = closed_port_url();
        let cli = parse(&["--url", &url, "--size-mb", "1", "--file", file.to_str().unwrap()]);
        let mut out = Vec::new();
        assert_eq!(run(&cli, &mut out).unwrap(), 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\rUpload progress: 0.00% (0MB / 1MB)"), "{text}");
        assert!(text.contains("Upload failed"));
    }

    /// Rejects progress lines, accepts everything else.
    struct NoProgress(Vec<u8>);

    impl Write for NoProgress {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.starts_with(b"\r") {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.0.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn progress_write_error_does_not_stop_run() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("gen.dat");
        let url = closed_port_url();
        let cli = parse(&["--url", &url, "--size-mb", "1", "--file", file.to_str().unwrap()]);
        let mut out = NoProgress(Vec::new());
        assert_eq!(run(&cli, &mut out).unwrap(), 0);
        let text = String::from_utf8(out.0).unwrap();
        assert!(!text.contains("Upload progress"));
        assert!(text.contains("Upload failed"));
    }

    #[test]
    fn print_progress_stops_after_error() {
        let mut failed = None;
        let p = TransferProgress { uploaded: 1, total: 2 };
        let mut broken = NoProgress(Vec::new());
        assert_eq!(print_progress(&mut broken, &mut failed, &p), HookAction::Continue);
        assert!(failed.is_some());

        let mut fine = Vec::new();
        print_progress(&mut fine, &mut failed, &p);
        assert!(fine.is_empty());
    }

    #[test]
    fn generation_failure_exits_one() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("no-such-dir").join("gen.dat");
        let cli = parse(&["--file", file.to_str().unwrap(), "--size-mb", "1"]);
        let mut out = Vec::new();
        assert_eq!(run(&cli, &mut out).unwrap(), 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Failed to create test file"));
        assert!(!text.contains("Starting upload"));
    }
}
