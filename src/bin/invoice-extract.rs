//! CLI binary for invoice-extract.
//!
//! `serve` runs the HTTP API; `extract` runs one pipeline over a local file
//! and prints the extracted fields as JSON.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use invoice_extract::{
    extract_file, serve, ExtractionConfig, ExtractionMethod, ServerConfig,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP API on port 8000
  invoice-extract serve

  # Allow a second front-end origin
  invoice-extract serve --cors-origin http://localhost:3000 --cors-origin https://app.example.com

  # OCR a scanned invoice
  invoice-extract extract invoice.pdf

  # Use the vision model and write JSON to a file
  invoice-extract extract --ai invoice.png -o invoice.json

ENDPOINTS (serve):
  GET  /health               Liveness check
  POST /process-invoice      multipart field 'file' → OCR pipeline
  POST /process-invoice-ai   multipart field 'file' → vision-model pipeline

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY        Google Gemini API key (default AI provider)
  INVOICE_AI_PROVIDER   Override provider (gemini, openai, anthropic, ollama, …)
  INVOICE_AI_MODEL      Override model ID
  TESSERACT_PATH        Path to the tesseract binary
  PDFTOPPM_PATH         Path to the pdftoppm binary (poppler-utils)
  RUST_LOG              Log filter, e.g. invoice_extract=debug

  A .env file in the working directory is loaded at start-up.
"#;

/// Extract structured fields from invoice PDFs and images.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-extract",
    version,
    about = "Extract structured fields from invoice PDFs and images (OCR or vision model)",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "INVOICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "INVOICE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Extract fields from a local file and print them as JSON.
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Allowed CORS origin (repeatable; `*` allows any).
    #[arg(long = "cors-origin", env = "INVOICE_CORS_ORIGINS", value_delimiter = ',',
          default_value = "http://localhost:3000")]
    cors_origins: Vec<String>,

    /// Maximum upload size in bytes.
    #[arg(long, env = "INVOICE_MAX_UPLOAD_BYTES", default_value_t = invoice_extract::server::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Invoice file (PDF, PNG, JPEG, TIFF, BMP, WebP, GIF).
    input: PathBuf,

    /// Use the vision-model pipeline instead of OCR.
    #[arg(long)]
    ai: bool,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Single-line JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

/// Settings shared by both subcommands.
#[derive(Args, Debug)]
struct EngineArgs {
    /// Path to the tesseract binary.
    #[arg(long, env = "TESSERACT_PATH", default_value = "tesseract")]
    tesseract_path: PathBuf,

    /// Path to the pdftoppm binary.
    #[arg(long, env = "PDFTOPPM_PATH", default_value = "pdftoppm")]
    pdftoppm_path: PathBuf,

    /// PDF rasterisation DPI (72–600).
    #[arg(long, env = "INVOICE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Tesseract language pack(s), e.g. eng or eng+deu.
    #[arg(long, env = "TESSERACT_LANG", default_value = "eng")]
    language: String,

    /// Send pages to tesseract as-is (skip grayscale and thresholding).
    #[arg(long, env = "INVOICE_NO_PREPROCESS")]
    no_preprocess: bool,

    /// LLM provider for the AI pipeline.
    #[arg(long, env = "INVOICE_AI_PROVIDER", default_value = "gemini")]
    provider: String,

    /// LLM model ID for the AI pipeline.
    #[arg(long, env = "INVOICE_AI_MODEL", default_value = "gemini-2.0-flash")]
    model: String,

    /// Maximum number of pages sent to the model.
    #[arg(long, env = "INVOICE_AI_MAX_PAGES", default_value_t = 5)]
    max_ai_pages: usize,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "INVOICE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal; any other problem is worth a warning below.
    let dotenv_result = dotenvy::dotenv();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = dotenv_result {
        if !e.not_found() {
            tracing::warn!("Failed to load .env: {}", e);
        }
    }

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Extract(args) => run_extract(args, cli.quiet).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = build_config(&args.engine).await?;
    let server = ServerConfig {
        host: args.host,
        port: args.port,
        cors_origins: args.cors_origins,
        max_upload_bytes: args.max_upload_bytes,
    };

    serve(config, &server).await.context("Server failed")?;
    Ok(())
}

async fn run_extract(args: ExtractArgs, quiet: bool) -> Result<()> {
    let config = build_config(&args.engine).await?;
    let method = if args.ai {
        ExtractionMethod::Ai
    } else {
        ExtractionMethod::Ocr
    };

    let spinner = if quiet {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Extracting");
        bar.set_message(format!("{} ({})", args.input.display(), method));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    };

    let result = extract_file(&args.input, method, &config).await;
    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }
    let output = result.with_context(|| format!("Extraction failed for {}", args.input.display()))?;

    let json = if args.compact {
        serde_json::to_string(&output.invoice)
    } else {
        serde_json::to_string_pretty(&output.invoice)
    }
    .context("Failed to serialise output")?;

    if let Some(ref path) = args.output {
        tokio::fs::write(path, format!("{json}\n"))
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    }

    if !quiet {
        eprintln!(
            "{} {}/12 fields from {} page(s) via {}  {}",
            green("✔"),
            bold(&output.invoice.populated_fields().to_string()),
            output.page_count,
            output.method,
            dim(&format!("{}ms", output.stats.total_duration_ms)),
        );
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(args: &EngineArgs) -> Result<ExtractionConfig> {
    let system_prompt = if let Some(ref path) = args.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    if args.provider == "gemini" && std::env::var_os("GEMINI_API_KEY").is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; the AI pipeline will fail with an authentication error");
    }

    let mut builder = ExtractionConfig::builder()
        .tesseract_path(&args.tesseract_path)
        .pdftoppm_path(&args.pdftoppm_path)
        .dpi(args.dpi)
        .tesseract_language(&args.language)
        .ocr_preprocess(!args.no_preprocess)
        .provider_name(&args.provider)
        .model(&args.model)
        .ai_max_pages(args.max_ai_pages);

    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}
