use std::process::ExitCode;

use bigupload::Cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed arguments");

    match bigupload::run(&cli, &mut std::io::stdout()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("failed to write output: {e}");
            ExitCode::FAILURE
        }
    }
}
