//! Error types for the pluma library.
//!
//! Three error types reflect three failure scopes:
//!
//! * [`PlumaError`]: **Fatal**: the transcription cannot proceed at all
//!   (bad input file, wrong password, provider not configured, every page
//!   failed). Returned as `Err(PlumaError)` from the top-level entry points.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed but its siblings are
//!   fine. Stored inside [`crate::output::PageResult`] so callers can inspect
//!   partial success.
//!
//! * [`RecognitionError`]: a single attempt of a single model call. The
//!   retry loop in [`crate::pipeline::recognize`] decides from
//!   [`RecognitionError::is_retryable`] whether another attempt is worthwhile.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pluma library.
#[derive(Debug, Error)]
pub enum PlumaError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The document has no pages at all.
    #[error("PDF '{path}' contains no pages")]
    EmptyDocument { path: PathBuf },

    /// The page selection matched none of the document's pages.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page failed after all retries; output would be empty.
    #[error("All {total} pages failed after {retries} retries each.\nFirst error: {first_error}")]
    AllPagesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    /// Some pages succeeded but at least one failed.
    #[error("{failed}/{total} pages failed during transcription (first: {first_error})")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
        first_error: String,
    },

    /// A single model request outside the page fan-out (enhancement) failed.
    #[error("Model request failed: {0}")]
    Recognition(#[from] RecognitionError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read a text file handed to the similarity metrics.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation or encoding failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Model call failed after retries.
    #[error("Page {page}: model call failed after {retries} retries: {detail}")]
    RecognitionFailed {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// Model call timed out on the last attempt.
    #[error("Page {page}: model call timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::RecognitionFailed { page, .. }
            | PageError::Timeout { page, .. } => *page,
        }
    }
}

/// Failure of one attempt of one model call.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    /// The provider rejected the credentials. Retrying will not help.
    #[error("authentication rejected by '{provider}': {detail}")]
    Auth { provider: String, detail: String },

    /// HTTP 429 from the provider.
    #[error("rate limit exceeded for '{provider}'")]
    RateLimited { provider: String },

    /// The call did not finish within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Any other provider failure (5xx, network, malformed response).
    #[error("{0}")]
    Provider(String),
}

impl RecognitionError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RecognitionError::Auth { .. })
    }

    /// Classify a provider error message.
    ///
    /// Providers surface HTTP failures as text; status codes and well-known
    /// phrases are the only stable signal.
    pub fn classify(provider: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("invalid api key")
            || lower.contains("api key not valid")
            || lower.contains("authentication")
        {
            RecognitionError::Auth {
                provider: provider.to_string(),
                detail: message,
            }
        } else if lower.contains("429") || lower.contains("rate limit") {
            RecognitionError::RateLimited {
                provider: provider.to_string(),
            }
        } else {
            RecognitionError::Provider(message)
        }
    }
}

impl From<PageError> for RecognitionError {
    /// Final outcome of a single request that ran through the retry loop.
    fn from(error: PageError) -> Self {
        match error {
            PageError::Timeout { secs, .. } => RecognitionError::Timeout { secs },
            other => RecognitionError::Provider(other.to_string()),
        }
    }
}
