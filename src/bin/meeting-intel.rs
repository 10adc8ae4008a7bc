//! CLI binary for meeting-intel.
//!
//! A thin shim over the library crate: `analyze` maps flags to
//! `AnalysisConfig` and prints the result, `render` maps flags to
//! `RenderConfig` and writes the PDF.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use meeting_intel::{
    AnalysisConfig, AnalysisPipeline, AnalysisResult, PageRenderer, RenderConfig, RenderRequest,
};
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse notes from a file
  meeting-intel analyze --notes standup.txt --attendees "John Smith, Sarah Johnson, Mike Chen"

  # Analyse notes from stdin, JSON output
  pbpaste | meeting-intel analyze --notes - --attendees "Ana, Ben" --json

  # Render a front-end page to a single-page PDF
  meeting-intel render http://localhost:5173/meetings/42/print -o meeting.pdf

  # Relative path against a base URL, custom width
  meeting-intel render /meetings/42/print --base-url http://localhost:5173 --width 1280 -o m.pdf

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY          Anthropic API key (default provider)
  OPENAI_API_KEY             OpenAI API key
  EDGEQUAKE_LLM_PROVIDER     Override provider (anthropic, openai, gemini, ollama)
  EDGEQUAKE_MODEL            Override model ID
  MEETING_INTEL_BASE_URL     Front-end origin for relative render targets
  MEETING_INTEL_CHROME       Chrome/Chromium executable
  RUST_LOG                   Log filter (overrides --verbose / --quiet)
"#;

#[derive(Parser, Debug)]
#[command(
    name = "meeting-intel",
    version,
    about = "Extract action items from meeting notes and render meeting pages to PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging.
    #[arg(short, long, global = true, env = "MEETING_INTEL_VERBOSE")]
    verbose: bool,

    /// Only print results and errors.
    #[arg(short, long, global = true, env = "MEETING_INTEL_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise meeting notes and extract action items.
    Analyze(AnalyzeArgs),
    /// Render a web page to a single continuous-page PDF.
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Notes file, or `-` for stdin.
    #[arg(long)]
    notes: String,

    /// Comma-separated attendee names.
    #[arg(long, env = "MEETING_INTEL_ATTENDEES")]
    attendees: String,

    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    #[arg(long, env = "MEETING_INTEL_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    #[arg(long, env = "MEETING_INTEL_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    #[arg(long, env = "MEETING_INTEL_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    #[arg(long, env = "MEETING_INTEL_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Date the model treats as "today" (YYYY-MM-DD).
    #[arg(long, env = "MEETING_INTEL_TODAY")]
    today: Option<chrono::NaiveDate>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Absolute URL, or a path relative to --base-url.
    target: String,

    #[arg(short, long, default_value = "meeting.pdf")]
    output: PathBuf,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long, env = "MEETING_INTEL_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "MEETING_INTEL_CHROME")]
    chrome: Option<PathBuf>,

    #[arg(long, env = "MEETING_INTEL_NAVIGATION_TIMEOUT", default_value_t = 30)]
    navigation_timeout: u64,

    #[arg(long, env = "MEETING_INTEL_READINESS_TIMEOUT", default_value_t = 15)]
    readiness_timeout: u64,

    #[arg(long, env = "MEETING_INTEL_READY_SELECTOR")]
    ready_selector: Option<String>,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers progress; library INFO logs would only fight it.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let show_spinner = !cli.quiet && !cli.verbose;
    match cli.command {
        Command::Analyze(args) => run_analyze(args, show_spinner, &cancel).await,
        Command::Render(args) => run_render(args, show_spinner, &cancel).await,
    }
}

// ── analyze ──────────────────────────────────────────────────────────────

async fn run_analyze(
    args: AnalyzeArgs,
    show_spinner: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let notes = read_notes(&args.notes).await?;

    let mut builder = AnalysisConfig::builder()
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout);
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(today) = args.today {
        builder = builder.reference_date(today);
    }
    let config = builder.build().context("Invalid configuration")?;
    let pipeline = AnalysisPipeline::from_config(config).context("LLM provider setup failed")?;

    let progress = show_spinner.then(|| spinner("Analyzing", "Waiting for the model…"));
    let start = Instant::now();
    let result = pipeline
        .analyze_with_cancel(&notes, &args.attendees, cancel)
        .await
        .context("Analysis failed")?;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise result")?
        );
    } else {
        print_analysis(&result);
    }

    if show_spinner {
        let mark = if result.is_degraded() {
            yellow("⚠")
        } else {
            green("✔")
        };
        eprintln!(
            "{} {} action items  {}",
            mark,
            bold(&result.action_items.len().to_string()),
            dim(&format!("{:.1}s", start.elapsed().as_secs_f64()))
        );
    }
    Ok(())
}

async fn read_notes(source: &str) -> Result<String> {
    if source == "-" {
        return tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read notes from stdin")?;
            Ok::<_, anyhow::Error>(buf)
        })
        .await
        .context("stdin reader panicked")?;
    }
    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("Failed to read notes from {:?}", source))
}

fn print_analysis(result: &AnalysisResult) {
    println!("{}", bold("Summary"));
    println!("  {}", result.summary);
    println!();
    if result.action_items.is_empty() {
        println!("{}", dim("No action items."));
        return;
    }
    println!("{}", bold("Action items"));
    for item in &result.action_items {
        let due = item
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "—".to_string());
        println!(
            "  • {:<18} {}  {}",
            item.assignee,
            item.task,
            dim(&format!("[{} | due {}]", item.priority, due))
        );
    }
}

// ── render ───────────────────────────────────────────────────────────────

async fn run_render(
    args: RenderArgs,
    show_spinner: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut builder = RenderConfig::builder()
        .navigation_timeout_secs(args.navigation_timeout)
        .readiness_timeout_secs(args.readiness_timeout)
        .headless(!args.headed);
    if let Some(ref base) = args.base_url {
        builder = builder.base_url(base);
    }
    if let Some(ref chrome) = args.chrome {
        builder = builder.chrome_executable(chrome);
    }
    if let Some(ref selector) = args.ready_selector {
        builder = builder.readiness_selector(selector);
    }
    let config = builder.build().context("Invalid configuration")?;
    let renderer = PageRenderer::chromium(config);

    let mut request = RenderRequest::new(&args.target);
    request.viewport_width = args.width;
    request.viewport_height = args.height;

    let progress = show_spinner.then(|| spinner("Rendering", &args.target));
    let start = Instant::now();
    // Cancellation goes through the renderer so the context is still closed.
    let outcome = renderer
        .render_to_file_with_cancel(&request, &args.output, cancel)
        .await;
    renderer.pool().dispose().await;

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    let bytes = outcome.context("Render failed")?;
    if show_spinner {
        eprintln!(
            "{} {}  {}  →  {}",
            green("✔"),
            dim(&format!("{} KiB", bytes.div_ceil(1024))),
            dim(&format!("{:.1}s", start.elapsed().as_secs_f64())),
            bold(&args.output.display().to_string())
        );
    }
    Ok(())
}

fn spinner(prefix: &str, msg: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix(prefix.to_string());
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
