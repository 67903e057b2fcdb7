use avif_transcoder::{
    ConversionRequest, ConvertError, DefaultConverter, InitError, Stage, config, logging,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "avif-transcoder")]
#[command(about = "Convert stored images to AVIF")]
#[command(long_about = "\
Convert stored images to AVIF

Each event names one object. The object is fetched, checked, and if it is
not already AVIF, re-encoded with a fixed profile and written back under the
same key with an .avif extension:

  photos/2024/dawn.jpg  →  photos/2024/dawn.avif

Objects that are already AVIF are left alone and nothing is written.

Results are printed to stdout as JSON, one line per event:

  {\"status\":\"CONVERTED\",\"originalKey\":\"2024/dawn.jpg\",\"newKey\":\"2024/dawn.avif\"}
  {\"status\":\"SKIPPED_ALREADY_AVIF\",\"originalKey\":\"2024/dusk.avif\",\"message\":\"...\"}
  {\"error\":\"failed to fetch ...\",\"stage\":\"fetch\"}

Logs go to stderr. Run 'avif-transcoder gen-config' for a documented config file.")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a single object
    Convert {
        /// Bucket holding the object
        #[arg(long)]
        bucket: String,
        /// Object key, optionally URL-escaped as in storage events
        #[arg(long)]
        key: String,
    },
    /// Handle newline-delimited JSON events from stdin until EOF
    Serve,
    /// Print a stock config file with all options documented
    GenConfig,
}

/// Printed in place of a result record when an event fails.
#[derive(Serialize)]
struct FailureRecord {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<Stage>,
}

impl From<&ConvertError> for FailureRecord {
    fn from(err: &ConvertError) -> Self {
        Self {
            error: err.to_string(),
            stage: Some(err.stage()),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }

    // Cold start: nothing is handled unless this succeeds.
    let converter = match init(cli.config.as_deref()).await {
        Ok(converter) => converter,
        Err(e) => {
            eprintln!("initialization failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match cli.command {
        Command::Convert { bucket, key } => {
            convert_one(&converter, &ConversionRequest::new(bucket, key)).await
        }
        Command::Serve => serve(&converter).await,
        Command::GenConfig => Ok(()),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn init(config_path: Option<&Path>) -> Result<DefaultConverter, InitError> {
    let config = config::load_config(config_path)?;
    logging::init_logging(&config.logging).map_err(InitError::Logging)?;
    DefaultConverter::from_config(&config).await
}

/// Handle one event. A failed conversion is a failed run.
async fn convert_one(
    converter: &DefaultConverter,
    request: &ConversionRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    match converter.handle(request).await {
        Ok(result) => {
            println!("{}", serde_json::to_string(&result)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string(&FailureRecord::from(&e))?);
            Err(e.into())
        }
    }
}

/// Handle events from stdin with one converter (warm invocations). Event
/// failures are reported per line and do not stop the loop.
async fn serve(converter: &DefaultConverter) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = match serde_json::from_str::<ConversionRequest>(line) {
            Ok(request) => match converter.handle(&request).await {
                Ok(result) => serde_json::to_string(&result)?,
                Err(e) => {
                    error!(stage = %e.stage(), error = %e, "conversion failed");
                    serde_json::to_string(&FailureRecord::from(&e))?
                }
            },
            Err(e) => {
                warn!(error = %e, "malformed event");
                serde_json::to_string(&FailureRecord {
                    error: format!("malformed event: {e}"),
                    stage: None,
                })?
            }
        };
        println!("{record}");
    }
    Ok(())
}
