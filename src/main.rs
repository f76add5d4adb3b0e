//! Main entry point for the zipdoc CLI application.
//!
//! Writes the transcript of one ZIP file to stdout, suitable for use as a
//! git `textconv` driver.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::process::ExitCode;
use tokio::io::BufWriter;

use zipdoc::Cli;

/// Exit status for a failure that carries no conversion error
const EXIT_FAILURE: u8 = 2;

/// Exit status when the argument count is wrong
const EXIT_USAGE: u8 = 1;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version land here too, on stdout
            if let Err(print_err) = err.print() {
                warn!("failed to print usage: {print_err}");
            }
            return if err.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("zipdoc: {err:#}");
            let code = err
                .downcast_ref::<zipdoc::Error>()
                .map_or(EXIT_FAILURE, zipdoc::Error::exit_code);
            ExitCode::from(code)
        }
    }
}

/// Convert the archive named on the command line to stdout.
async fn run(cli: &Cli) -> Result<()> {
    let mut stdout = BufWriter::new(tokio::io::stdout());

    let summary = zipdoc::convert_path(&cli.file, &mut stdout)
        .await
        .with_context(|| format!("failed to convert {}", cli.file.display()))?;

    info!(
        "{}: {} entries ({} xml, {} text, {} binary), {} bytes",
        cli.file.display(),
        summary.entries(),
        summary.xml_entries,
        summary.text_entries,
        summary.binary_entries,
        summary.total_bytes
    );

    Ok(())
}
