//! Scoresheet CLI - binary entry point.
//!
//! ```text
//! main() -> load config -> build recognizer -> Pipeline::run() -> JSON on stdout
//!                                                   ^
//!                                        Ctrl-C / --timeout-secs cancel
//! ```
//!
//! Logs go to stderr so stdout carries only the consolidated result.

mod input;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use scoresheet_engine::{
    CONFIG_PATH_ENV, CancelHandle, ChessRules, ConsolidatedResult, GeminiRecognizer, Pipeline,
    PipelineConfig, ScoresheetConfig, ScoresheetImage, ScriptedRecognizer, cancel_pair,
};

#[derive(Parser)]
#[command(name = "scoresheet")]
#[command(about = "Transcribe and validate handwritten chess scoresheets", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = CONFIG_PATH_ENV, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "SCORESHEET_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "SCORESHEET_LOG_JSON", global = true)]
    log_json: bool,

    /// Print the result on one line instead of pretty JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe a scoresheet photo with the Gemini recognizer
    Transcribe {
        /// Image file (jpeg, png, webp, heic, heif)
        image: PathBuf,

        /// MIME type of the image when the file extension is missing or wrong
        #[arg(long)]
        media_type: Option<String>,

        /// Cancel the run after this many seconds and print what was read
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Run the stages one after another
        #[arg(long)]
        sequential: bool,
    },
    /// Validate a typed move list against the rules of chess, offline
    Validate {
        /// Moves in reading order, e.g. `e4 e5 Nf3`
        #[arg(required = true)]
        moves: Vec<String>,

        /// Override [matching].max_edit_distance
        #[arg(long)]
        max_edit_distance: Option<usize>,
    },
}

fn init_tracing(log_level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn load_config(path: Option<&Path>) -> Result<ScoresheetConfig> {
    let config = match path {
        Some(path) => Some(ScoresheetConfig::load_from(path)?),
        None => ScoresheetConfig::load()?,
    };
    Ok(config.unwrap_or_default())
}

/// Cancel `handle` on the first Ctrl-C.
fn cancel_on_ctrl_c(handle: CancelHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing with partial results");
            handle.cancel();
        }
    })
}

async fn run(pipeline: &Pipeline, image: &ScoresheetImage) -> ConsolidatedResult {
    let (handle, signal) = cancel_pair();
    let ctrl_c = cancel_on_ctrl_c(handle);
    let result = pipeline.run(image, signal).await;
    ctrl_c.abort();
    result
}

async fn transcribe(
    config: &ScoresheetConfig,
    image_path: &Path,
    media_type: Option<&str>,
    timeout_secs: Option<u64>,
    sequential: bool,
) -> Result<ConsolidatedResult> {
    let Some(gemini) = config.gemini_config() else {
        bail!("no Google API key: set GEMINI_API_KEY or [api_keys].google in the config file");
    };
    let recognizer =
        GeminiRecognizer::new(gemini).context("failed to set up the Gemini recognizer")?;
    let image = input::load_image(image_path, media_type)?;

    let mut pipeline_config = PipelineConfig::from_config(config);
    if let Some(secs) = timeout_secs {
        pipeline_config.timeout = Some(Duration::from_secs(secs));
    }
    if sequential {
        pipeline_config.concurrent_stages = false;
    }

    let pipeline = Pipeline::new(Arc::new(recognizer), Arc::new(ChessRules), pipeline_config);
    Ok(run(&pipeline, &image).await)
}

async fn validate(
    config: &ScoresheetConfig,
    moves: Vec<String>,
    max_edit_distance: Option<usize>,
) -> ConsolidatedResult {
    let mut pipeline_config = PipelineConfig::from_config(config);
    if let Some(distance) = max_edit_distance {
        pipeline_config.max_edit_distance = distance;
    }
    let pipeline = Pipeline::new(
        Arc::new(ScriptedRecognizer::from_moves(moves)),
        Arc::new(ChessRules),
        pipeline_config,
    );
    run(&pipeline, &input::placeholder_image()).await
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let config = load_config(cli.config.as_deref())?;

    let result = match cli.command {
        Command::Transcribe {
            image,
            media_type,
            timeout_secs,
            sequential,
        } => {
            transcribe(
                &config,
                &image,
                media_type.as_deref(),
                timeout_secs,
                sequential,
            )
            .await?
        }
        Command::Validate {
            moves,
            max_edit_distance,
        } => validate(&config, moves, max_edit_distance).await,
    };

    let rendered = if cli.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{rendered}");

    Ok(if result.error.is_none() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
