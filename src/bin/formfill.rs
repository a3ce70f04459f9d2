//! CLI binary for edgequake-formfill.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `FillConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_formfill::{
    fill_form, DetectionConfig, EmptinessConfig, FillConfig, FillProgressCallback, OutputFormat,
    OverlayConfig, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over pages, one log line per cell.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_fill_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Filling");
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

impl FillProgressCallback for CliProgressCallback {
    fn on_fill_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_pages} pages for empty fields…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_cell_filled(&self, page_num: usize, label: &str, answer: &str) {
        let label = if label.is_empty() { "(no label)" } else { label };
        self.bar.println(format!(
            "  {} p{:<3} {}  {}",
            green("✓"),
            page_num,
            dim(&truncate(label, 40)),
            truncate(answer, 60),
        ));
    }

    fn on_cell_error(&self, page_num: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} p{:<3} {}",
            red("✗"),
            page_num,
            red(&truncate(error, 80)),
        ));
    }

    fn on_page_complete(&self, _page_num: usize, _total: usize, _filled: usize) {
        self.bar.inc(1);
    }

    fn on_fill_complete(&self, total_pages: usize, filled_cells: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if errors == 0 {
            eprintln!(
                "{} {} fields filled across {} pages",
                green("✔"),
                bold(&filled_cells.to_string()),
                total_pages
            );
        } else {
            eprintln!(
                "{} {} fields filled across {} pages  ({} left blank)",
                cyan("⚠"),
                bold(&filled_cells.to_string()),
                total_pages,
                red(&errors.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Fill a form using a local Ollama server (default)
  formfill application.pdf filled/ about_me.txt

  # Another local model, 200 dpi rendering
  formfill --model mistral --dpi 200 application.pdf filled/ about_me.txt

  # Hosted provider through edgequake-llm
  formfill --provider openai --model gpt-4.1-mini form.pdf out/ context.txt

  # JPEG pages and a machine-readable summary
  formfill --format jpeg --json form.pdf out/ context.txt > summary.json

OUTPUT:
  <OUTPUT_DIR>/<stem>_page_001.png ...   one annotated image per page
  <OUTPUT_DIR>/<stem>_fields.json        every detected cell, its label and answer

ENVIRONMENT VARIABLES:
  FORMFILL_ENDPOINT       Generate endpoint (default http://localhost:11434/api/generate)
  FORMFILL_MODEL          Model ID
  FORMFILL_PROVIDER       Hosted provider (openai, anthropic, gemini, ...)
  OPENAI_API_KEY          OpenAI API key (with --provider openai)
  ANTHROPIC_API_KEY       Anthropic API key (with --provider anthropic)
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter, overrides -v / -q

REQUIREMENTS:
  pdfium shared library, the tesseract executable, and a TrueType font
  (DejaVu Sans or Liberation Sans are found automatically; else use --font).
"#;

/// Fill empty fields on PDF forms using OCR and a language model.
#[derive(Parser, Debug)]
#[command(
    name = "formfill",
    version,
    about = "Fill empty fields on PDF forms using OCR and a language model",
    long_about = "Render each page of a PDF form, find the empty answer boxes, read each \
box's printed label with OCR, ask a language model for the answer using a context document, \
and draw the answers into the boxes.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source PDF form.
    input: PathBuf,

    /// Directory for the filled pages (created if absent).
    output_dir: PathBuf,

    /// Plain-text document the answers are drawn from.
    context: PathBuf,

    /// Ollama-compatible generate endpoint.
    #[arg(long, env = "FORMFILL_ENDPOINT")]
    endpoint: Option<String>,

    /// Model ID (default: llama3, or gpt-4.1-nano with --provider).
    #[arg(long, env = "FORMFILL_MODEL")]
    model: Option<String>,

    /// Hosted provider via edgequake-llm: openai, anthropic, gemini, ...
    #[arg(long, env = "FORMFILL_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "FORMFILL_DPI", default_value_t = 144,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "FORMFILL_PASSWORD")]
    password: Option<String>,

    /// TrueType font for the answers.
    #[arg(long, env = "FORMFILL_FONT")]
    font: Option<PathBuf>,

    /// Page image format.
    #[arg(long, env = "FORMFILL_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// Do not write <stem>_fields.json.
    #[arg(long)]
    no_report: bool,

    /// Path or name of the tesseract executable.
    #[arg(long, env = "FORMFILL_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Tesseract language code(s), e.g. eng or eng+deu.
    #[arg(long, env = "FORMFILL_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Path to a text file with a custom prompt ({label} and {context} placeholders).
    #[arg(long, env = "FORMFILL_PROMPT")]
    prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "FORMFILL_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max output tokens per answer (hosted providers).
    #[arg(long, env = "FORMFILL_MAX_TOKENS", default_value_t = 256)]
    max_tokens: usize,

    /// Per-request timeout in seconds (default: none).
    #[arg(long, env = "FORMFILL_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Minimum cell area in px².
    #[arg(long)]
    min_cell_area: Option<u64>,

    /// A cell with more than this fraction of ink pixels counts as filled.
    #[arg(long)]
    max_ink: Option<f32>,

    /// Largest font size tried for answers, in px.
    #[arg(long)]
    font_size: Option<f32>,

    /// Smallest font size before giving up on fitting, in px.
    #[arg(long)]
    min_font_size: Option<f32>,

    /// Output structured JSON (FillOutput) on stdout.
    #[arg(long, env = "FORMFILL_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "FORMFILL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FORMFILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FORMFILL_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Jpeg => OutputFormat::Jpeg,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn FillProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = fill_form(&cli.input, &cli.output_dir, &cli.context, &config)
        .await
        .context("Form filling failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let s = &output.stats;
        eprintln!(
            "{}  {}/{} empty fields filled  {} pages  {}ms  →  {}",
            if s.failed_cells == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            s.filled_cells,
            s.empty_cells,
            s.total_pages,
            s.total_duration_ms,
            bold(&cli.output_dir.display().to_string()),
        );
        eprintln!(
            "   {} cells detected  /  {} already filled  /  {} ms waiting on the model",
            dim(&s.detected_cells.to_string()),
            dim(&(s.detected_cells - s.empty_cells).to_string()),
            dim(&s.llm_duration_ms.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `FillConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<FillConfig> {
    let mut builder = FillConfig::builder()
        .dpi(cli.dpi)
        .output_format(cli.format.into())
        .write_report(!cli.no_report)
        .tesseract_path(cli.tesseract.clone())
        .ocr_language(cli.ocr_lang.clone())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens);

    if let Some(ref url) = cli.endpoint {
        builder = builder.endpoint_url(url.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref font) = cli.font {
        builder = builder.font_path(font.clone());
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref path) = cli.prompt {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        builder = builder.prompt_template(template);
    }

    let mut detection = DetectionConfig::default();
    if let Some(area) = cli.min_cell_area {
        detection.min_area = area;
    }
    let mut emptiness = EmptinessConfig::default();
    if let Some(ink) = cli.max_ink {
        emptiness.max_ink_fraction = ink;
    }
    let mut overlay = OverlayConfig::default();
    if let Some(size) = cli.font_size {
        overlay.preferred_font_size = size;
    }
    if let Some(size) = cli.min_font_size {
        overlay.min_font_size = size;
    }
    builder = builder
        .detection(detection)
        .emptiness(emptiness)
        .overlay(overlay);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
