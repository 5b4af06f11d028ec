//! CLI binary for pdf-layout-translate.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `TranslationConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_layout_translate::pipeline::lines::group_pages;
use pdf_layout_translate::{
    document_text, inspect, translate_to_file, ProgressCallback, ScriptFonts,
    TranslationConfig, TranslationProgressCallback, TranslationService,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

/// Terminal progress callback: one bar over all batches plus a log line per
/// batch. Batches may complete out of order when `--max-in-flight > 1`.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_job_start` tells us how many batches there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} batches  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Translating");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, batch: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&batch))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TranslationProgressCallback for CliProgressCallback {
    fn on_job_start(&self, total_batches: usize, total_fragments: usize) {
        self.activate_bar(total_batches);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Translating {total_fragments} fragments in {total_batches} batches…"
            ))
        ));
    }

    fn on_batch_start(&self, batch: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(batch, Instant::now());
        }
        self.bar.set_message(format!("batch {batch}"));
    }

    fn on_batch_complete(&self, batch: usize, total: usize, items: usize) {
        let secs = self.elapsed_secs(batch);
        self.bar.println(format!(
            "  {} Batch {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            batch,
            total,
            dim(&format!("{items:>3} strings")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_error(&self, batch: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(batch);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Batch {:>3}/{:<3}  {}  {}",
            red("✗"),
            batch,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, total_batches: usize, failed_batches: usize) {
        self.bar.finish_and_clear();
        let ok = total_batches.saturating_sub(failed_batches);

        if failed_batches == 0 {
            eprintln!(
                "{} {} batches translated",
                green("✔"),
                bold(&ok.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} batches translated  ({} kept source text)",
                if ok == 0 { red("✘") } else { cyan("⚠") },
                bold(&ok.to_string()),
                total_batches,
                red(&failed_batches.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Marathi → Hindi through Bhashini (the defaults)
  pdftranslate notice.pdf -o notice.hi.pdf

  # Hindi → English through an LLM provider
  pdftranslate --source hi --target en --service llm --model gpt-4.1-mini form.pdf

  # Translate straight from a URL
  pdftranslate https://example.org/circular.pdf -o circular.hi.pdf

  # Show fragments and page sizes (no service, no fonts needed)
  pdftranslate --inspect-only document.pdf
  pdftranslate --inspect-only --json document.pdf > fragments.json

  # Print the reading-order text of a PDF
  pdftranslate --text translated.pdf

SERVICES:
  bhashini  Dhruva inference pipeline (default). Needs BHASHINI_API_KEY.
  llm       Any edgequake-llm provider: openai, anthropic, gemini, ollama, …

FONTS:
  Non-English targets are drawn with Noto Sans Devanagari, downloaded once on
  first use and cached (override the directory with --font-dir or
  ASSET_CACHE_DIR). English targets use the built-in Helvetica family.

ENVIRONMENT VARIABLES:
  BHASHINI_API_KEY        Bhashini pipeline API key
  BHASHINI_ENDPOINT       Override the pipeline endpoint
  EDGEQUAKE_LLM_PROVIDER  LLM provider for --service llm
  EDGEQUAKE_MODEL         LLM model ID for --service llm
  OPENAI_API_KEY          Picked up by LLM provider auto-detection
  PDFIUM_LIB_PATH         Path to an existing libpdfium (skips auto-download)
  ASSET_CACHE_DIR         Override the asset cache directory
  RUST_LOG                Override the log filter
"#;

#[derive(clap::ValueEnum, Clone, Debug, PartialEq)]
enum ServiceArg {
    Bhashini,
    Llm,
}

/// Translate PDF text in place, keeping every run at its original position.
#[derive(Parser, Debug)]
#[command(
    name = "pdftranslate",
    version,
    about = "Translate PDF files and URLs while preserving page layout",
    long_about = "Translate the text of a PDF (local file or URL) and redraw every translated \
run at its original coordinates on a page of the original size. Uses the Bhashini pipeline \
by default, or any LLM provider supported by edgequake-llm.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Output PDF path. Default: `<input stem>.<target>.pdf`.
    #[arg(short, long, env = "PDFTRANSLATE_OUTPUT")]
    output: Option<PathBuf>,

    /// Source language code.
    #[arg(long, env = "PDFTRANSLATE_SOURCE", default_value = "mr")]
    source: String,

    /// Target language code.
    #[arg(long, env = "PDFTRANSLATE_TARGET", default_value = "hi")]
    target: String,

    /// Translation service.
    #[arg(long, env = "PDFTRANSLATE_SERVICE", value_enum, default_value = "bhashini")]
    service: ServiceArg,

    /// Bhashini API key.
    #[arg(long, env = "BHASHINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Bhashini pipeline endpoint.
    #[arg(long, env = "BHASHINI_ENDPOINT")]
    endpoint: Option<String>,

    /// LLM provider for `--service llm`.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID for `--service llm`.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Strings per translation call (1–100).
    #[arg(long, env = "PDFTRANSLATE_BATCH_SIZE", default_value_t = 20)]
    batch_size: usize,

    /// Minimum delay between batch dispatches, in ms.
    #[arg(long, env = "PDFTRANSLATE_DELAY_MS", default_value_t = 300)]
    delay_ms: u64,

    /// Batches in flight at once.
    #[arg(long, env = "PDFTRANSLATE_MAX_IN_FLIGHT", default_value_t = 1)]
    max_in_flight: usize,

    /// Retries per batch before keeping the source text.
    #[arg(long, env = "PDFTRANSLATE_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call translation timeout in seconds.
    #[arg(long, env = "PDFTRANSLATE_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Download timeout for URL inputs and fonts, in seconds.
    #[arg(long, env = "PDFTRANSLATE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Vertical tolerance for grouping fragments into lines, in points.
    #[arg(long, env = "PDFTRANSLATE_Y_TOLERANCE", default_value_t = 5.0)]
    y_tolerance: f32,

    /// Draw every run at its line's baseline.
    #[arg(long, env = "PDFTRANSLATE_SNAP_TO_LINE")]
    snap_to_line: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFTRANSLATE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Directory for downloaded script fonts.
    #[arg(long, env = "PDFTRANSLATE_FONT_DIR")]
    font_dir: Option<PathBuf>,

    /// Print fragments and page sizes only, no translation.
    #[arg(long)]
    inspect_only: bool,

    /// Print the reading-order text of the input, no translation.
    #[arg(long, conflicts_with = "inspect_only")]
    text: bool,

    /// JSON output for `--inspect-only`.
    #[arg(long, env = "PDFTRANSLATE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFTRANSLATE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFTRANSLATE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFTRANSLATE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let read_only = cli.inspect_only || cli.text;

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !read_only;
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

    // ── Ensure PDFium engine is available ────────────────────────────────
    if !asset_cache::is_pdfium_cached() {
        if !cli.quiet {
            let dl_bar = ProgressBar::new(0);
            dl_bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  \
                     [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(TICKS),
            );
            dl_bar.set_prefix("PDF engine");
            dl_bar.enable_steady_tick(Duration::from_millis(80));

            let bar = dl_bar.clone();
            tokio::task::block_in_place(|| {
                asset_cache::ensure_pdfium_library(Some(&|downloaded, total| {
                    if let Some(t) = total {
                        if bar.length().unwrap_or(0) != t {
                            bar.set_length(t);
                        }
                    }
                    bar.set_position(downloaded);
                }))
            })
            .context("Failed to download PDFium engine")?;

            dl_bar.finish_with_message("ready ✓");
        } else {
            tokio::task::block_in_place(|| asset_cache::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
        }
    }

    // ── Read-only modes ──────────────────────────────────────────────────
    if read_only {
        let config = build_config(&cli, None)?;
        let inspection = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.text {
            println!("{}", document_text(&inspection.fragments, cli.y_tolerance));
        } else if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&inspection)
                    .context("Failed to serialise inspection")?
            );
        } else {
            let dims = &inspection.dimensions;
            println!("File:         {}", cli.input);
            println!("Pages:        {}", dims.num_pages);
            println!("Page size:    {} × {} pt", dims.width, dims.height);
            if !dims.is_uniform() {
                println!("Mixed sizes:  yes");
            }
            println!("Fragments:    {}", inspection.fragments.len());
            for (page, lines) in group_pages(&inspection.fragments, cli.y_tolerance) {
                println!();
                println!("{}", bold(&format!("── Page {page} ({} lines)", lines.len())));
                for line in &lines {
                    println!("{}  {}", dim(&format!("{:>7.1}", line.y)), line.text());
                }
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn TranslationProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let output_path = match cli.output {
        Some(ref p) => p.clone(),
        None => default_output_path(&cli.input, &cli.target),
    };

    // ── Run translation ──────────────────────────────────────────────────
    let stats = translate_to_file(&cli.input, &output_path, &config)
        .await
        .context("Translation failed")?;

    if !cli.quiet {
        eprintln!(
            "{}  {} pages  {}/{} runs drawn  {}ms  →  {}",
            if stats.fully_translated() {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.total_pages,
            stats.drawn_fragments,
            stats.translatable_fragments,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if stats.skipped_fragments > 0 {
            eprintln!(
                "   {}",
                dim(&format!("{} fragments skipped", stats.skipped_fragments))
            );
        }
        if stats.blank_translations > 0 {
            eprintln!(
                "   {}",
                dim(&format!(
                    "{} blank translations kept their source text",
                    stats.blank_translations
                ))
            );
        }
        if !show_progress {
            for (batch, err) in &stats.batch_errors {
                eprintln!("   {} batch {}: {}", red("✗"), batch, err);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `TranslationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<TranslationConfig> {
    let service = match cli.service {
        ServiceArg::Bhashini => TranslationService::Bhashini {
            endpoint: cli
                .endpoint
                .clone()
                .unwrap_or_else(|| pdf_layout_translate::config::DEFAULT_BHASHINI_ENDPOINT.into()),
            api_key: cli.api_key.clone(),
        },
        ServiceArg::Llm => TranslationService::Llm {
            provider: cli.provider.clone(),
            model: cli.model.clone(),
        },
    };

    let mut builder = TranslationConfig::builder()
        .languages(&cli.source, &cli.target)
        .service(service)
        .batch_size(cli.batch_size)
        .inter_batch_delay_ms(cli.delay_ms)
        .max_in_flight(cli.max_in_flight)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .y_tolerance(cli.y_tolerance)
        .snap_to_line(cli.snap_to_line)
        .script_fonts(ScriptFonts::default());

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref dir) = cli.font_dir {
        builder = builder.asset_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `report.pdf` + `hi` → `report.hi.pdf` in the current directory.
fn default_output_path(input: &str, target: &str) -> PathBuf {
    let name = input
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(input);
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("translated");
    PathBuf::from(format!("{stem}.{target}.pdf"))
}
