use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use duplex_expand::{DEFAULT_MARKER, Strategy, TransformConfig, transform_file};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duplex-expand")]
#[command(
    about = "Uppercase letters and expand digits into markers using two cooperating units.",
    long_about = None
)]
struct Cli {
    /// File to read.
    input: PathBuf,

    /// File to create or truncate.
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = Strategy::Threads)]
    strategy: Strategy,

    /// Single ASCII character written for each unit of a digit.
    #[arg(long, default_value_t = DEFAULT_MARKER as char)]
    marker: char,

    /// Skip the synchronous flush of the summary record.
    #[arg(long)]
    no_sync: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if !cli.marker.is_ascii() {
        anyhow::bail!("--marker must be a single ASCII character, got {:?}", cli.marker);
    }

    let config = TransformConfig::default()
        .with_marker(cli.marker as u8)
        .with_strategy(cli.strategy)
        .with_sync(!cli.no_sync);

    transform_file(&cli.input, &cli.output, &config).with_context(|| {
        format!(
            "transform {} -> {}",
            cli.input.display(),
            cli.output.display()
        )
    })?;

    println!("Result saved in {}", cli.output.display());
    Ok(ExitCode::SUCCESS)
}
