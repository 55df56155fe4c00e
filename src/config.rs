//! Configuration types for handwritten-notes transcription.
//!
//! All transcription behaviour is controlled through [`TranscriptionConfig`],
//! built via its [`TranscriptionConfigBuilder`]. One struct holds every knob
//! so a config can be cloned into concurrent page tasks and logged as a whole.

use crate::error::PlumaError;
use crate::pipeline::recognize::PageRecognizer;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for a PDF transcription.
///
/// Built via [`TranscriptionConfig::builder()`] or using
/// [`TranscriptionConfig::default()`].
///
/// # Example
/// ```rust
/// use pluma::{OutputFormat, TranscriptionConfig};
///
/// let config = TranscriptionConfig::builder()
///     .format(OutputFormat::Latex)
///     .concurrency(10)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TranscriptionConfig {
    /// Output format of the assembled transcription. Default: Markdown.
    pub format: OutputFormat,

    /// Rendering DPI used when rasterising each page. Range: 72–400. Default: 150.
    ///
    /// Handwriting needs more pixels than print: pen strokes at 72 DPI blur
    /// into each other and the model starts guessing.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Number of model calls in flight at once. Default: 10.
    pub concurrency: usize,

    /// Model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed page recognizer. Takes precedence over every provider
    /// setting; used to plug in non-LLM backends and test doubles.
    pub recognizer: Option<Arc<dyn PageRecognizer>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a retryable model failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom transcription prompt. If None, uses the built-in prompt for `format`.
    pub prompt: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Page separator in assembled output. Default: blank line.
    pub page_separator: PageSeparator,

    /// Keep the successful pages when some pages fail. Default: false.
    ///
    /// When false, any failed page turns the whole run into
    /// [`PlumaError::PartialFailure`].
    pub allow_partial: bool,

    /// Options for the LaTeX document template.
    pub latex: LatexOptions,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-model-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            dpi: 150,
            max_rendered_pixels: 2000,
            concurrency: 10,
            model: None,
            provider_name: None,
            provider: None,
            recognizer: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            password: None,
            prompt: None,
            pages: PageSelection::default(),
            page_separator: PageSeparator::default(),
            allow_partial: false,
            latex: LatexOptions::default(),
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionConfig")
            .field("format", &self.format)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "recognizer",
                &self.recognizer.as_ref().map(|r| r.name().to_string()),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("pages", &self.pages)
            .field("page_separator", &self.page_separator)
            .field("allow_partial", &self.allow_partial)
            .field("latex", &self.latex)
            .finish()
    }
}

impl TranscriptionConfig {
    /// Create a new builder for `TranscriptionConfig`.
    pub fn builder() -> TranscriptionConfigBuilder {
        TranscriptionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`TranscriptionConfig`].
pub struct TranscriptionConfigBuilder {
    config: TranscriptionConfig,
}

impl fmt::Debug for TranscriptionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl TranscriptionConfigBuilder {
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn PageRecognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn allow_partial(mut self, v: bool) -> Self {
        self.config.allow_partial = v;
        self
    }

    pub fn latex(mut self, options: LatexOptions) -> Self {
        self.config.latex = options;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranscriptionConfig, PlumaError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(PlumaError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(PlumaError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(PlumaError::InvalidConfig(
                "API timeout must be at least 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Format of the assembled transcription.
///
/// LaTeX is produced in two steps: the model is asked for Markdown, and the
/// assembled Markdown is translated and wrapped in the document template
/// (see [`crate::latex`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Plain text with no markup at all.
    PlainText,
    /// Structured Markdown (default).
    #[default]
    Markdown,
    /// A complete, compilable LaTeX document.
    Latex,
}

impl OutputFormat {
    /// The markup the model is asked to produce for this format.
    pub fn requested_markup(self) -> OutputFormat {
        match self {
            OutputFormat::PlainText => OutputFormat::PlainText,
            OutputFormat::Markdown | OutputFormat::Latex => OutputFormat::Markdown,
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            OutputFormat::PlainText => "txt",
            OutputFormat::Markdown => "md",
            OutputFormat::Latex => "tex",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::PlainText => "text/plain",
            OutputFormat::Markdown => "text/markdown",
            OutputFormat::Latex => "application/x-tex",
        }
    }

    /// File name offered for download: `transcription.<ext>`.
    pub fn default_file_name(self) -> String {
        format!("transcription.{}", self.file_extension())
    }

    /// Human-readable name, as used inside prompts.
    pub fn label(self) -> &'static str {
        match self {
            OutputFormat::PlainText => "Plain Text",
            OutputFormat::Markdown => "Markdown",
            OutputFormat::Latex => "LaTeX",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputFormat {
    type Err = PlumaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" | "text" | "txt" | "plain text" | "plain_text" | "plaintext" => {
                Ok(OutputFormat::PlainText)
            }
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "latex" | "tex" => Ok(OutputFormat::Latex),
            other => Err(PlumaError::InvalidConfig(format!(
                "Unknown output format '{other}' (expected plain, markdown or latex)"
            ))),
        }
    }
}

/// Specifies which pages of the PDF to transcribe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl FromStr for PageSelection {
    type Err = PlumaError;

    /// Parse `all`, `5`, `3-15` or `1,3,5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let parse = |p: &str| -> Result<usize, PlumaError> {
            let n: usize = p
                .trim()
                .parse()
                .map_err(|_| PlumaError::InvalidConfig(format!("Invalid page number: '{}'", p.trim())))?;
            if n < 1 {
                return Err(PlumaError::InvalidConfig(format!(
                    "Pages are 1-indexed, minimum is 1 (got {n})"
                )));
            }
            Ok(n)
        };

        if s == "all" {
            return Ok(PageSelection::All);
        }
        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (parse(start)?, parse(end)?);
            if start > end {
                return Err(PlumaError::InvalidConfig(format!(
                    "Invalid page range '{start}-{end}': start must be <= end"
                )));
            }
            return Ok(PageSelection::Range(start, end));
        }
        if s.contains(',') {
            let pages = s.split(',').map(parse).collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }
        Ok(PageSelection::Single(parse(&s)?))
    }
}

/// How to separate pages in the assembled output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Pages joined with a blank line. (default)
    #[default]
    None,
    /// Horizontal rule between pages.
    HorizontalRule,
    /// Comment carrying the page number.
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator placed before page `page_num` (1-indexed),
    /// in the syntax of `format`.
    pub fn render(&self, page_num: usize, format: OutputFormat) -> String {
        match (self, format) {
            (PageSeparator::None, _) => "\n\n".to_string(),
            (PageSeparator::HorizontalRule, OutputFormat::Latex) => {
                "\n\n\\begin{center}\\rule{0.5\\linewidth}{0.5pt}\\end{center}\n\n".to_string()
            }
            (PageSeparator::HorizontalRule, _) => "\n\n---\n\n".to_string(),
            (PageSeparator::Comment, OutputFormat::Latex) => format!("\n\n% page {}\n\n", page_num),
            (PageSeparator::Comment, OutputFormat::Markdown) => {
                format!("\n\n<!-- page {} -->\n\n", page_num)
            }
            (PageSeparator::Comment, OutputFormat::PlainText) => {
                format!("\n\n[page {}]\n\n", page_num)
            }
            (PageSeparator::Custom(s), _) => format!("\n\n{}\n\n", s),
        }
    }
}

impl FromStr for PageSeparator {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "none" => PageSeparator::None,
            "hr" | "---" => PageSeparator::HorizontalRule,
            "comment" => PageSeparator::Comment,
            _ => PageSeparator::Custom(s.to_string()),
        })
    }
}

/// Options for the LaTeX document template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatexOptions {
    /// Document title, as LaTeX source. When None, the first `\title` the
    /// model emitted is used, then the PDF metadata title, then
    /// "Transcribed Notes".
    pub title: Option<String>,
    /// Contents of `\author{}`, as LaTeX source. Default: empty.
    pub author: String,
    /// Contents of `\date{}`, as LaTeX source. Default: `\today`, which a
    /// `\date` in the model output overrides.
    pub date: String,
}

impl Default for LatexOptions {
    fn default() -> Self {
        Self {
            title: None,
            author: String::new(),
            date: crate::latex::DEFAULT_DATE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_and_validates() {
        let config = TranscriptionConfig::builder()
            .dpi(1000)
            .concurrency(0)
            .temperature(5.0)
            .build()
            .expect("clamped values are valid");
        assert_eq!(config.dpi, 400);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn direct_invalid_dpi_is_rejected() {
        let mut builder = TranscriptionConfig::builder();
        builder.config.dpi = 10;
        assert!(matches!(builder.build(), Err(PlumaError::InvalidConfig(_))));
    }

    #[test]
    fn defaults_match_original_worker_count() {
        let config = TranscriptionConfig::default();
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.format, OutputFormat::Markdown);
        assert!(!config.allow_partial);
    }

    #[test]
    fn latex_asks_model_for_markdown() {
        assert_eq!(OutputFormat::Latex.requested_markup(), OutputFormat::Markdown);
        assert_eq!(OutputFormat::PlainText.requested_markup(), OutputFormat::PlainText);
    }

    #[test]
    fn format_download_metadata() {
        assert_eq!(OutputFormat::Latex.default_file_name(), "transcription.tex");
        assert_eq!(OutputFormat::PlainText.default_file_name(), "transcription.txt");
        assert_eq!(OutputFormat::Markdown.default_file_name(), "transcription.md");
        assert_eq!(OutputFormat::Latex.mime_type(), "application/x-tex");
        assert_eq!(OutputFormat::Markdown.mime_type(), "text/markdown");
    }

    #[test]
    fn format_parses_aliases() {
        assert_eq!("tex".parse::<OutputFormat>().unwrap(), OutputFormat::Latex);
        assert_eq!("Plain Text".parse::<OutputFormat>().unwrap(), OutputFormat::PlainText);
        assert_eq!("MD".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("docx".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(PageSelection::Range(3, 10).to_indices(4), vec![2, 3]);
        assert_eq!(PageSelection::Set(vec![3, 1, 3]).to_indices(5), vec![0, 2]);
    }

    #[test]
    fn page_selection_parses() {
        assert!(matches!("all".parse::<PageSelection>(), Ok(PageSelection::All)));
        assert!(matches!("4".parse::<PageSelection>(), Ok(PageSelection::Single(4))));
        assert!(matches!("2-5".parse::<PageSelection>(), Ok(PageSelection::Range(2, 5))));
        match "1, 3,5".parse::<PageSelection>() {
            Ok(PageSelection::Set(v)) => assert_eq!(v, vec![1, 3, 5]),
            other => panic!("unexpected: {other:?}"),
        }
        assert!("5-2".parse::<PageSelection>().is_err());
        assert!("0".parse::<PageSelection>().is_err());
        assert!("x".parse::<PageSelection>().is_err());
    }

    #[test]
    fn separator_renders_per_format() {
        let sep = PageSeparator::Comment;
        assert_eq!(sep.render(3, OutputFormat::Markdown), "\n\n<!-- page 3 -->\n\n");
        assert_eq!(sep.render(3, OutputFormat::Latex), "\n\n% page 3\n\n");
        assert_eq!(PageSeparator::None.render(2, OutputFormat::Latex), "\n\n");
        assert!(PageSeparator::HorizontalRule
            .render(2, OutputFormat::Latex)
            .contains("\\rule"));
    }
}
