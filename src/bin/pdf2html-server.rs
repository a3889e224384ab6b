//! Server binary for edgequake-pdf2html.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig`, wires the pdfium reader and the LLM client into an
//! orchestrator, and serves the router.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use edgequake_pdf2html::{
    router, AppState, LlmModelClient, Orchestrator, PdfiumReader, ServiceConfig, StorageManager,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on localhost:8080 with Gemini (default provider)
  GEMINI_API_KEY=... pdf2html-server

  # Listen on all interfaces, keep files for 30 minutes
  pdf2html-server --bind 0.0.0.0:8080 --retention-minutes 30

  # Use another provider and model
  pdf2html-server --provider openai --model gpt-4.1

  # Structured logs for a log collector
  pdf2html-server --json-logs

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Log filter (overrides --verbose)
"#;

/// Convert uploaded PDFs into multilingual HTML using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2html-server",
    version,
    about = "Web front-end converting uploaded PDFs into multilingual HTML using Vision LLMs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "PDF2HTML_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Directory holding one sub-directory per job.
    #[arg(long, env = "PDF2HTML_STORAGE_ROOT", default_value = "data")]
    storage_root: PathBuf,

    /// Minutes a job's files are kept before cleanup.
    #[arg(long, env = "PDF2HTML_RETENTION_MINUTES", default_value_t = 60)]
    retention_minutes: u64,

    /// Maximum upload size in MiB.
    #[arg(long, env = "PDF2HTML_MAX_UPLOAD_MB", default_value_t = 30)]
    max_upload_mb: usize,

    /// Conversions allowed to run at once.
    #[arg(long, env = "PDF2HTML_MAX_CONCURRENT_JOBS", default_value_t = 2)]
    max_concurrent_jobs: usize,

    /// Refuse new jobs while stored files exceed this many MiB (0 disables).
    #[arg(long, env = "PDF2HTML_MAX_STORAGE_MB", default_value_t = 1024)]
    max_storage_mb: u64,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "PDF2HTML_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gemini-2.5-flash).
    #[arg(long, env = "PDF2HTML_MODEL")]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2HTML_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max LLM output tokens per HTML document.
    #[arg(long, env = "PDF2HTML_MAX_TOKENS", default_value_t = 16384)]
    max_tokens: usize,

    /// Retries per LLM call.
    #[arg(long, env = "PDF2HTML_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDF2HTML_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// Alt text used when an image cannot be described (default: fail the job).
    #[arg(long, env = "PDF2HTML_ALT_TEXT_FALLBACK")]
    alt_text_fallback: Option<String>,

    /// Pause between alt-text calls in milliseconds.
    #[arg(long, env = "PDF2HTML_REQUEST_SPACING_MS", default_value_t = 0)]
    request_spacing_ms: u64,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2HTML_VERBOSE")]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "PDF2HTML_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = build_config(&cli)?;
    info!("Starting with {:?}", config);

    let reader = PdfiumReader::new(cli.pdfium_lib_path.clone(), config.render_max_pixels);
    reader
        .check_binding()
        .context("PDFium is not available")?;

    let client = LlmModelClient::from_config(&config).context("Failed to initialise LLM provider")?;

    let storage = StorageManager::new(&config.storage_root, config.retention);
    storage
        .initialize()
        .await
        .with_context(|| format!("Failed to create {}", config.storage_root.display()))?;
    let report = storage.sweep().await;
    info!(
        "Startup cleanup: {} removed, {} retained",
        report.removed.len(),
        report.retained
    );

    let orchestrator = Orchestrator::new(storage, Arc::new(reader), Arc::new(client), &config);
    let state = AppState::new(orchestrator, &config).context("Failed to build application state")?;

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!("Listening on http://{}", cli.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info,tower_http=debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

const MIB: usize = 1024 * 1024;

fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let retention_secs = cli
        .retention_minutes
        .checked_mul(60)
        .ok_or_else(|| anyhow!("--retention-minutes {} is too large", cli.retention_minutes))?;
    let max_upload_bytes = cli
        .max_upload_mb
        .checked_mul(MIB)
        .ok_or_else(|| anyhow!("--max-upload-mb {} is too large", cli.max_upload_mb))?;
    let max_storage_bytes = match cli.max_storage_mb {
        0 => None,
        mb => Some(
            mb.checked_mul(MIB as u64)
                .ok_or_else(|| anyhow!("--max-storage-mb {} is too large", mb))?,
        ),
    };

    let mut builder = ServiceConfig::builder()
        .storage_root(&cli.storage_root)
        .retention(Duration::from_secs(retention_secs))
        .max_upload_bytes(max_upload_bytes)
        .max_concurrent_jobs(cli.max_concurrent_jobs)
        .max_storage_bytes(max_storage_bytes)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .request_spacing_ms(cli.request_spacing_ms);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref fallback) = cli.alt_text_fallback {
        builder = builder.alt_text_fallback(fallback);
    }

    builder.build().context("Invalid configuration")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Shutting down");
}
