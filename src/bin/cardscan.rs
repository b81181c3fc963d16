//! CLI binary for edgequake-cardscan.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScanConfig` and prints the outcome.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_cardscan::{
    check_provider, format_outcome, scan, ProcessingOutcome, ProgressCallback, ScanConfig,
    ScanProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner on stderr with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading card images…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage_started: Mutex::new(None),
        })
    }

    fn elapsed(&self) -> String {
        let secs = self
            .stage_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, image_count: usize) {
        if let Ok(mut t) = self.stage_started.lock() {
            *t = Some(Instant::now());
        }
        let (prefix, msg) = match stage {
            Stage::Validate => ("Validating", "checking the front of the card…".to_string()),
            Stage::Extract => ("Extracting", format!("reading {image_count} image(s)…")),
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
    }

    fn on_stage_complete(&self, stage: Stage) {
        let elapsed = self.elapsed();
        self.bar
            .println(format!("  {} {:<9} {}", green("✓"), stage, elapsed));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let elapsed = self.elapsed();
        // Keep the log line on one terminal row.
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<9} {}  {}",
            red("✗"),
            stage,
            red(&msg),
            elapsed
        ));
    }

    fn on_scan_complete(&self, _outcome: &ProcessingOutcome) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan the front of a card
  cardscan front.jpg

  # Front and back, JSON on stdout
  cardscan --json front.jpg back.jpg

  # Write the JSON outcome to a file
  cardscan front.png back.png -o card.json

  # A PDF scan (one image per page)
  cardscan card.pdf

  # Skip the "is this an insurance card?" check
  cardscan --skip-validation front.jpg

  # Use a specific model
  cardscan --provider anthropic --model claude-sonnet-4-20250514 front.jpg

  # Check that a provider is configured (no model call)
  cardscan --check

EXIT CODES:
  0  card extracted
  2  scan finished but no data (not a card, validation or extraction failed)
  1  fatal error (bad input, no provider, write failure)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (only needed for PDF cards)
"#;

/// Validate insurance cards and extract their fields using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "cardscan",
    version,
    about = "Validate insurance cards and extract their fields using Vision LLMs",
    long_about = "Check that an image shows a health-insurance card, then extract the insurer, \
member name, member ID, group number, effective date and any other printed details. Accepts \
PNG, JPEG or PDF scans as local files or URLs. Supports OpenAI, Anthropic, Google Gemini, \
Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Front of the card: local file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "check")]
    front: Option<String>,

    /// Back of the card (optional).
    back: Option<String>,

    /// Skip the validation stage and extract directly.
    #[arg(long, env = "CARDSCAN_SKIP_VALIDATION")]
    skip_validation: bool,

    /// Write the JSON outcome to this file.
    #[arg(short, long, env = "CARDSCAN_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the JSON outcome instead of Markdown.
    #[arg(long, env = "CARDSCAN_JSON")]
    json: bool,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "CARDSCAN_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "CARDSCAN_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Rendering DPI for PDF cards (72–600).
    #[arg(long, env = "CARDSCAN_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Max LLM output tokens per stage.
    #[arg(long, env = "CARDSCAN_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "CARDSCAN_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per model call on failure.
    #[arg(long, env = "CARDSCAN_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "CARDSCAN_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "CARDSCAN_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Resolve the provider and exit without scanning.
    #[arg(long)]
    check: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "CARDSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CARDSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long, env = "CARDSCAN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters, so library INFO logs
    // are muted while it runs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    match run(&cli, show_progress).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<ExitCode> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ScanProgressCallback>)
    } else {
        None
    };

    let config = build_config(cli, progress_cb)?;

    // ── Check-only mode ──────────────────────────────────────────────────
    if cli.check {
        let info = check_provider(&config).context("Provider check failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialise provider info")?
            );
        } else {
            println!("Provider:  {}", info.provider);
            println!("Model:     {}", info.model);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let inputs: Vec<&str> = cli
        .front
        .iter()
        .chain(cli.back.iter())
        .map(String::as_str)
        .collect();

    // ── Run scan ─────────────────────────────────────────────────────────
    let started = Instant::now();
    let outcome = match &cli.output {
        Some(path) => edgequake_cardscan::scan_to_file(&inputs, path, &config, cli.skip_validation)
            .await
            .context("Scan failed")?,
        None => scan(&inputs, &config, cli.skip_validation)
            .await
            .context("Scan failed")?,
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
        println!("{json}");
    } else if cli.output.is_none() || !cli.quiet {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(format_outcome(&outcome).as_bytes())
            .context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        let mark = if outcome.success { green("✔") } else { red("✘") };
        let target = cli
            .output
            .as_ref()
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default();
        eprintln!(
            "{}  {} image(s)  {}{}",
            mark,
            inputs.len(),
            dim(&format!("{}ms", started.elapsed().as_millis())),
            target,
        );
    }

    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

/// Map CLI args to `ScanConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .dpi(cli.dpi)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
