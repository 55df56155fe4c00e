//! CLI binary for pluma.
//!
//! A thin shim over the library crate: maps flags to `TranscriptionConfig`,
//! drives the pipeline and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use pluma::{
    compare_files, enhance, enhance_page, inspect_with_password, transcribe, transcribe_stream,
    transcribe_to_file, Language, LatexOptions, Metric, OutputFormat, PageError, PageSelection,
    PageSeparator, ProgressCallback, TranscriptionConfig, TranscriptionOutput,
    TranscriptionProgressCallback,
};
use pluma::latex::escape_latex;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished page. Pages finish out
/// of order when concurrency is above 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner only; the bar length is set by `on_transcription_start`.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TranscriptionProgressCallback for CliProgressCallback {
    fn on_transcription_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: String) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_transcription_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages transcribed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages transcribed  ({} failed)",
                if failed == total_pages { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown to stdout
  pluma transcribe notes.pdf

  # A compilable LaTeX document
  pluma transcribe --format latex --title "Analisi I" notes.pdf -o analisi.tex

  # Plain text, pages 3 to 8, keep going if a page fails
  pluma transcribe --format plain --pages 3-8 --allow-partial notes.pdf

  # Ask the model to rework an excerpt, using the page it came from
  pluma transcribe --json notes.pdf > notes.json
  pluma enhance notes.pdf --text "integrale di f(x)" --transcription notes.json

  # Score a generated transcription against a manual one
  pluma compare manual.md generated.md --metric both --language italian

  # Inspect PDF metadata (no API key needed)
  pluma inspect notes.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY       Google Gemini API key (GOOGLE_API_KEY is accepted too)
  OPENAI_API_KEY       OpenAI API key
  ANTHROPIC_API_KEY    Anthropic API key
  PLUMA_LLM_PROVIDER   Override provider (gemini, openai, anthropic, ollama)
  PLUMA_MODEL          Override model ID
  PDFIUM_LIB_PATH      Path to an existing libpdfium (skips auto-download)

  A .env file in the working directory is loaded on start-up.
"#;

/// Transcribe handwritten-notes PDFs with Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pluma",
    version,
    about = "Transcribe handwritten-notes PDFs to Markdown, plain text or LaTeX",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PLUMA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PLUMA_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribe a PDF file or URL.
    Transcribe(TranscribeArgs),
    /// Print PDF metadata without transcribing.
    Inspect {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
        /// PDF user password for encrypted documents.
        #[arg(long, env = "PLUMA_PASSWORD")]
        password: Option<String>,
        /// Print metadata as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Rework an excerpt of a transcription with its page image as context.
    Enhance(EnhanceArgs),
    /// Score a generated transcription against a manual one.
    Compare {
        /// The manual (reference) transcription.
        manual: PathBuf,
        /// The generated transcription.
        generated: PathBuf,
        /// jaccard, cosine or both.
        #[arg(long, default_value = "both")]
        metric: String,
        /// Stop words and stemming: italian or english.
        #[arg(long, env = "PLUMA_LANGUAGE", default_value = "italian")]
        language: String,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Model and rendering flags shared by `transcribe` and `enhance`.
#[derive(Args, Debug)]
struct ModelArgs {
    /// Output format: plain, markdown or latex.
    #[arg(short, long, env = "PLUMA_FORMAT", default_value = "markdown")]
    format: String,

    /// LLM model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "PLUMA_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "PLUMA_LLM_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PLUMA_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PLUMA_PASSWORD")]
    password: Option<String>,

    /// Max model output tokens per page.
    #[arg(long, env = "PLUMA_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PLUMA_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per page on a retryable model failure.
    #[arg(long, env = "PLUMA_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PLUMA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "PLUMA_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(Args, Debug)]
struct TranscribeArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the transcription to this file instead of stdout.
    #[arg(short, long, env = "PLUMA_OUTPUT")]
    output: Option<PathBuf>,

    #[command(flatten)]
    model: ModelArgs,

    /// Number of concurrent model calls.
    #[arg(short, long, env = "PLUMA_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PLUMA_PAGES", default_value = "all")]
    pages: String,

    /// Page separator: none, hr, comment, or a custom string.
    #[arg(long, env = "PLUMA_SEPARATOR", default_value = "none")]
    separator: String,

    /// Path to a text file holding a custom transcription prompt.
    #[arg(long, env = "PLUMA_PROMPT")]
    prompt: Option<PathBuf>,

    /// Keep successful pages when some pages fail.
    #[arg(long, env = "PLUMA_ALLOW_PARTIAL")]
    allow_partial: bool,

    /// LaTeX document title, as plain text (special characters are escaped).
    #[arg(long)]
    title: Option<String>,

    /// LaTeX document author, as plain text (special characters are escaped).
    #[arg(long)]
    author: Option<String>,

    /// LaTeX document date, as plain text (default \today).
    #[arg(long)]
    date: Option<String>,

    /// Print pages to stdout as they finish, in page order.
    #[arg(long, conflicts_with_all = ["output", "json"])]
    stream: bool,

    /// Output the structured TranscriptionOutput as JSON.
    #[arg(long, env = "PLUMA_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PLUMA_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct EnhanceArgs {
    /// The PDF the excerpt was transcribed from.
    input: String,

    /// The excerpt to improve.
    #[arg(long)]
    text: String,

    /// 1-indexed page to send as context.
    #[arg(long, conflicts_with = "transcription")]
    page: Option<usize>,

    /// JSON output of an earlier `pluma transcribe --json`, used to find the
    /// page the excerpt came from.
    #[arg(long)]
    transcription: Option<PathBuf>,

    #[command(flatten)]
    model: ModelArgs,

    /// Print the enhancement as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; a missing file is not an error.
    dotenvy::dotenv().ok();
    alias_google_api_key();

    let cli = Cli::parse();

    let show_progress = match &cli.command {
        Command::Transcribe(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    init_tracing(cli.verbose, cli.quiet || show_progress);

    match cli.command {
        Command::Transcribe(ref args) => {
            ensure_pdfium(cli.quiet)?;
            run_transcribe(args, cli.quiet, show_progress).await
        }
        Command::Inspect {
            ref input,
            ref password,
            json,
        } => {
            ensure_pdfium(cli.quiet)?;
            run_inspect(input, password.as_deref(), json).await
        }
        Command::Enhance(ref args) => {
            ensure_pdfium(cli.quiet)?;
            run_enhance(args).await
        }
        Command::Compare {
            ref manual,
            ref generated,
            ref metric,
            ref language,
            json,
        } => run_compare(manual, generated, metric, language, json),
    }
}

/// Gemini keys are often exported as GOOGLE_API_KEY.
fn alias_google_api_key() {
    let has_gemini = std::env::var("GEMINI_API_KEY").is_ok_and(|v| !v.trim().is_empty());
    if has_gemini {
        return;
    }
    if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
        if !key.trim().is_empty() {
            std::env::set_var("GEMINI_API_KEY", key);
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        "debug"
    } else if quiet {
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
}

/// Download pdfium on first run, with a byte-count bar unless quiet.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }

    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

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
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
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
    Ok(())
}

async fn run_transcribe(args: &TranscribeArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn TranscriptionProgressCallback>)
    } else {
        None
    };
    let config = build_transcribe_config(args, progress_cb).await?;

    if args.stream {
        if config.format == OutputFormat::Latex {
            anyhow::bail!("--stream is not available for LaTeX output (the document is assembled at the end)");
        }
        let mut pages = transcribe_stream(&args.input, &config)
            .await
            .context("Transcription failed")?;
        let stdout = io::stdout();
        let mut first = true;
        let mut total = 0;
        let mut failed = Vec::new();
        while let Some(page) = pages.next().await {
            total += 1;
            if let Some(error) = page.error {
                failed.push(error);
                continue;
            }
            let text = page.text.trim();
            if text.is_empty() {
                continue;
            }
            let mut handle = stdout.lock();
            if !first {
                let sep = config.page_separator.render(page.page_num, config.format);
                handle.write_all(sep.as_bytes())?;
            }
            handle.write_all(text.as_bytes())?;
            handle.flush()?;
            first = false;
        }
        if !first {
            println!();
        }
        return check_streamed(&failed, total, args.allow_partial);
    }

    if let Some(ref output_path) = args.output {
        let stats = transcribe_to_file(&args.input, output_path, &config)
            .await
            .context("Transcription failed")?;

        if !quiet {
            let selected = stats.processed_pages + stats.failed_pages;
            eprintln!(
                "{}  {}/{} pages  {}ms  →  {}",
                if stats.failed_pages == 0 { green("✔") } else { cyan("⚠") },
                stats.processed_pages,
                selected,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.total_input_tokens.to_string()),
                dim(&stats.total_output_tokens.to_string()),
            );
        }
        return Ok(());
    }

    let output = transcribe(&args.input, &config)
        .await
        .context("Transcription failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.text.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !quiet && !show_progress && !args.json {
        eprintln!(
            "Transcribed {}/{} pages in {}ms",
            output.stats.processed_pages,
            output.stats.processed_pages + output.stats.failed_pages,
            output.stats.total_duration_ms
        );
    } else if show_progress {
        eprintln!(
            "   {} tokens in  /  {} tokens out  ({}ms total)",
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
            output.stats.total_duration_ms,
        );
    }
    Ok(())
}

async fn run_inspect(input: &str, password: Option<&str>, json: bool) -> Result<()> {
    let meta = inspect_with_password(input, password)
        .await
        .context("Failed to inspect PDF")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", input);
    if let Some(ref t) = meta.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = meta.author {
        println!("Author:       {}", a);
    }
    if let Some(ref s) = meta.subject {
        println!("Subject:      {}", s);
    }
    println!("Pages:        {}", meta.page_count);
    println!("PDF Version:  {}", meta.pdf_version);
    println!("Encrypted:    {}", meta.is_encrypted);
    if let Some(ref p) = meta.producer {
        println!("Producer:     {}", p);
    }
    if let Some(ref c) = meta.creator {
        println!("Creator:      {}", c);
    }
    Ok(())
}

async fn run_enhance(args: &EnhanceArgs) -> Result<()> {
    let config = model_config(&args.model)?.build().context("Invalid configuration")?;

    let enhancement = if let Some(page) = args.page {
        enhance_page(&args.input, page, &args.text, &config).await
    } else {
        let previous = match args.transcription {
            Some(ref path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read transcription from {:?}", path))?;
                let output: TranscriptionOutput = serde_json::from_str(&raw)
                    .with_context(|| format!("{:?} is not a `pluma transcribe --json` output", path))?;
                Some(output)
            }
            None => None,
        };
        enhance(&args.input, &args.text, previous.as_ref(), &config).await
    }
    .context("Enhancement failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&enhancement).context("Failed to serialise output")?
        );
    } else {
        println!("{}", enhancement.enhanced.trim_end());
    }
    Ok(())
}

fn run_compare(
    manual: &std::path::Path,
    generated: &std::path::Path,
    metric: &str,
    language: &str,
    json: bool,
) -> Result<()> {
    let metric: Metric = metric.parse()?;
    let language: Language = language.parse()?;
    let report = compare_files(manual, generated, metric, language)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
        return Ok(());
    }

    println!("Language:     {}", report.language);
    if let Some(j) = report.jaccard {
        println!("Jaccard:      {:.4}", j);
    }
    if let Some(c) = report.cosine {
        println!("Cosine:       {:.4}", c);
    }
    Ok(())
}

/// Builder pre-filled with the flags shared by every model-backed command.
fn model_config(args: &ModelArgs) -> Result<pluma::TranscriptionConfigBuilder> {
    let format: OutputFormat = args.format.parse()?;
    let mut builder = TranscriptionConfig::builder()
        .format(format)
        .dpi(args.dpi)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .download_timeout_secs(args.download_timeout)
        .api_timeout_secs(args.api_timeout);

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = args.password {
        builder = builder.password(password.clone());
    }
    Ok(builder)
}

async fn build_transcribe_config(
    args: &TranscribeArgs,
    progress: Option<ProgressCallback>,
) -> Result<TranscriptionConfig> {
    let pages: PageSelection = args.pages.parse()?;
    let separator: PageSeparator = args.separator.parse()?;

    let latex = latex_options(
        args.title.as_deref(),
        args.author.as_deref(),
        args.date.as_deref(),
    );

    let mut builder = model_config(&args.model)?
        .concurrency(args.concurrency)
        .pages(pages)
        .page_separator(separator)
        .allow_partial(args.allow_partial)
        .latex(latex);

    if let Some(ref path) = args.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Template options from the plain-text `--title`, `--author` and `--date`.
fn latex_options(title: Option<&str>, author: Option<&str>, date: Option<&str>) -> LatexOptions {
    let mut latex = LatexOptions {
        title: title.map(escape_latex),
        ..LatexOptions::default()
    };
    if let Some(author) = author {
        latex.author = escape_latex(author);
    }
    if let Some(date) = date {
        latex.date = escape_latex(date);
    }
    latex
}

/// Applies the failure policy once a `--stream` run has printed its pages.
fn check_streamed(failed: &[PageError], total: usize, allow_partial: bool) -> Result<()> {
    let Some(first) = failed.first() else {
        return Ok(());
    };
    if allow_partial && failed.len() < total {
        tracing::warn!("{}/{} pages failed (first: {})", failed.len(), total, first);
        return Ok(());
    }
    let pages = failed
        .iter()
        .map(|e| e.page().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if failed.len() == total {
        anyhow::bail!("All {total} pages failed (first: {first})");
    }
    anyhow::bail!(
        "{}/{} pages failed: {} (first: {})\nRe-run with --allow-partial to accept partial output.",
        failed.len(),
        total,
        pages,
        first
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout(page: usize) -> PageError {
        PageError::Timeout { page, secs: 60 }
    }

    #[test]
    fn streamed_failures_need_allow_partial() {
        assert!(check_streamed(&[], 3, false).is_ok());

        let err = check_streamed(&[timeout(2), timeout(5)], 6, false).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("2/6 pages failed: 2, 5"), "got: {msg}");
        assert!(msg.contains("--allow-partial"), "got: {msg}");

        assert!(check_streamed(&[timeout(2)], 6, true).is_ok());
    }

    #[test]
    fn streamed_run_with_no_successful_page_fails() {
        let err = check_streamed(&[timeout(1), timeout(2)], 2, true).unwrap_err();
        assert!(err.to_string().starts_with("All 2 pages failed"));
    }

    #[test]
    fn latex_flags_are_escaped() {
        let latex = latex_options(Some("Fisica & Chimica"), Some("M. Rossi_2"), None);
        assert_eq!(latex.title.as_deref(), Some("Fisica \\& Chimica"));
        assert_eq!(latex.author, "M. Rossi\\_2");
        assert_eq!(latex.date, "\\today");

        let latex = latex_options(None, None, Some("100% marzo"));
        assert_eq!(latex.title, None);
        assert_eq!(latex.date, "100\\% marzo");
    }
}
