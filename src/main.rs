use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "appbundle",
    version,
    about = "Pack a JSON descriptor, icons and a binary payload into an app bundle"
)]
struct Cli {
    /// Bundle file to write
    output: PathBuf,
    /// JSON descriptor
    json: PathBuf,
    /// Binary payload, stored verbatim
    binary: PathBuf,
    /// Directory holding icon_0.png, icon_1.png, ...
    icon_dir: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match appbundle::assemble(&cli.output, &cli.json, &cli.binary, &cli.icon_dir) {
        Ok(summary) => {
            println!(
                "Created: {} ({} icons, {} bytes)",
                cli.output.display(),
                summary.icon_count,
                summary.header.total_len()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
