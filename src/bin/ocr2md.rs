//! CLI binary for edgequake-ocr2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `OcrConfig` and prints the page-indexed result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ocr2md::{
    acquire, AcquisitionProgressCallback, AcquisitionSource, ApplyOutcome, CacheStore, Document,
    DocumentSession, OcrConfig, OcrError, OcrService, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner for one acquisition: attempt counter while OCR runs, one log line
/// per scheduled retry.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("OCR");
        bar.set_message("Checking cache…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AcquisitionProgressCallback for CliProgressCallback {
    fn on_cache_hit(&self, cache_path: &Path) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Loaded from cache {}",
            cyan("◆"),
            dim(&cache_path.display().to_string())
        );
    }

    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        self.bar
            .set_message(format!("Recognising… attempt {attempt}/{max_attempts}"));
    }

    fn on_retry_scheduled(&self, attempt: u32, delay_ms: u64, error: &OcrError) {
        let msg = error.to_string();
        let msg: String = if msg.chars().count() > 80 {
            format!("{}\u{2026}", msg.chars().take(79).collect::<String>())
        } else {
            msg
        };
        self.bar.println(format!(
            "  {} attempt {}  {}  {}",
            red("✗"),
            attempt,
            red(&msg),
            dim(&format!("retry in {:.1}s", delay_ms as f64 / 1000.0)),
        ));
    }

    fn on_complete(&self, page_count: usize, markdown_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages recognised  {}",
            green("✔"),
            bold(&page_count.to_string()),
            dim(&format!("{markdown_len} chars"))
        );
    }

    fn on_failure(&self, error: &OcrError) {
        self.bar.finish_and_clear();
        eprintln!("{} {} {}", red("✘"), bold(error.kind().code()), error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise a scan, print Markdown to stdout (reuses scan_ocr.md if present)
  ocr2md scan.pdf

  # Write the result to a file
  ocr2md scan.pdf -o scan.md

  # Save next to the input as scan_ocr.md, with a metadata header
  ocr2md --save --metadata scan.pdf

  # Ignore the cache and call OCR again
  ocr2md --no-cache scan.pdf

  # Only page 2 of a 3-page PDF
  ocr2md --pages 3 --page 2 scan.pdf

  # Is there a cached result? (no API key needed)
  ocr2md --check-cache scan.pdf

  # Structured output
  ocr2md --json photo.jpg > photo.json

SUPPORTED INPUTS:
  .pdf  .png  .jpg  .jpeg

CACHE:
  Results are cached as <name>_ocr.md next to the input. Files that differ
  only by extension (scan.pdf, scan.png) share one cache file.
  A header written by --save --metadata is read back as part of page 1, so
  repeating --save --metadata on a cached document stacks headers.

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY         Mistral API key
  RUST_LOG                Override log filter (e.g. edgequake_ocr2md=debug)
"#;

/// Convert scanned PDFs and images to Markdown using remote OCR.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2md",
    version,
    about = "Convert scanned PDFs and images to Markdown using remote OCR",
    long_about = "Convert scanned documents (PDF, PNG, JPEG) to page-indexed Markdown using \
the Mistral OCR service. Results are cached next to the input so re-opening a document is free.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to recognise (.pdf, .png, .jpg, .jpeg).
    input: PathBuf,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "OCR2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Also save the result as <name>_ocr.md next to the input.
    #[arg(long, env = "OCR2MD_SAVE")]
    save: bool,

    /// Skip the cache lookup and always call OCR.
    #[arg(long, env = "OCR2MD_NO_CACHE")]
    no_cache: bool,

    /// Report whether a cached result exists, then exit.
    #[arg(long)]
    check_cache: bool,

    /// OCR model identifier.
    #[arg(long, env = "OCR2MD_MODEL", default_value = edgequake_ocr2md::config::DEFAULT_MODEL)]
    model: String,

    /// OCR API key.
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OCR endpoint URL.
    #[arg(long, env = "OCR2MD_ENDPOINT", default_value = edgequake_ocr2md::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Per-attempt timeout in milliseconds.
    #[arg(long, env = "OCR2MD_TIMEOUT_MS", default_value_t = 30_000)]
    timeout_ms: u64,

    /// Total attempts, including the first.
    #[arg(long, env = "OCR2MD_MAX_RETRIES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,

    /// Base backoff delay in milliseconds (doubles per attempt).
    #[arg(long, env = "OCR2MD_BACKOFF_MS", default_value_t = 1000)]
    backoff_ms: u64,

    /// Cache file suffix.
    #[arg(long, env = "OCR2MD_CACHE_SUFFIX", default_value = edgequake_ocr2md::config::DEFAULT_CACHE_SUFFIX)]
    cache_suffix: String,

    /// Known page count of a PDF input. Images always have one page.
    #[arg(long, env = "OCR2MD_PAGES")]
    pages: Option<usize>,

    /// Print only this page (1-indexed).
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    page: Option<usize>,

    /// Prepend a front-matter header when writing files.
    #[arg(long, env = "OCR2MD_METADATA")]
    metadata: bool,

    /// Output structured JSON instead of Markdown.
    #[arg(long, env = "OCR2MD_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "OCR2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2MD_QUIET")]
    quiet: bool,
}

#[derive(Serialize)]
struct PageOut<'a> {
    page: usize,
    markdown: &'a str,
}

#[derive(Serialize)]
struct CliOutput<'a> {
    input: &'a Path,
    source: &'a AcquisitionSource,
    page_count: usize,
    pages: Vec<PageOut<'a>>,
    #[serde(skip_serializing_if = "nothing_saved")]
    saved_to: &'a [PathBuf],
}

fn nothing_saved(paths: &&[PathBuf]) -> bool {
    paths.is_empty()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level library logs while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check_cache;
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

    // ── Cache probe only ─────────────────────────────────────────────────
    if cli.check_cache {
        let check = CacheStore::new(cli.cache_suffix.clone())
            .check(&cli.input)
            .await;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&check).context("Failed to serialise cache check")?
            );
        } else if check.exists {
            println!("cached: {}", check.cache_path.display());
        } else {
            println!("not cached (would be {})", check.cache_path.display());
        }
        return Ok(());
    }

    // ── Build service ────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AcquisitionProgressCallback>)
    } else {
        None
    };
    let service = OcrService::new(build_config(&cli, progress_cb)?);

    // ── Acquire ──────────────────────────────────────────────────────────
    let document = Document::from_path(&cli.input, cli.pages)
        .await
        .context("Cannot open input")?;

    let mut session = DocumentSession::new();
    let ticket = if cli.no_cache {
        session.open_uncached(document)
    } else {
        session.open(document)
    };
    let result = acquire(&service, &ticket, None).await;
    let source = match session
        .complete(&ticket, result)
        .with_context(|| format!("OCR failed for {}", cli.input.display()))?
    {
        ApplyOutcome::Applied { source, .. } => source,
        ApplyOutcome::Stale => anyhow::bail!("Acquisition was superseded"),
    };

    // ── Persist ──────────────────────────────────────────────────────────
    let mut saved_to = Vec::new();
    if cli.save {
        let path = session
            .save(&service, None, cli.metadata)
            .await
            .context("Failed to save cache file")?;
        saved_to.push(path);
    }
    if let Some(ref output) = cli.output {
        let path = session
            .save(&service, Some(output.as_path()), cli.metadata)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;
        saved_to.push(path);
    }

    // ── Print ────────────────────────────────────────────────────────────
    let selected: Vec<(usize, &str)> = match cli.page {
        Some(n) => {
            if n > session.pages().total_pages() {
                anyhow::bail!(
                    "Page {} out of range (document has {} pages)",
                    n,
                    session.pages().total_pages()
                );
            }
            vec![(n, session.page(n))]
        }
        None => session.pages().iter().collect(),
    };

    if cli.json {
        let out = CliOutput {
            input: cli.input.as_path(),
            source: &source,
            page_count: session.pages().total_pages(),
            pages: selected
                .iter()
                .map(|&(page, markdown)| PageOut { page, markdown })
                .collect(),
            saved_to: &saved_to,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialise output")?
        );
    } else if cli.output.is_none() || cli.page.is_some() {
        let text = match cli.page {
            Some(_) => selected
                .first()
                .map(|&(_, md)| md.to_string())
                .unwrap_or_default(),
            None => session.all_markdown(),
        };
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        for path in &saved_to {
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .model(cli.model.clone())
        .endpoint(cli.endpoint.clone())
        .timeout_ms(cli.timeout_ms)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.backoff_ms)
        .cache_suffix(cli.cache_suffix.clone());

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
