//! Result types returned by the transcription entry points.

use crate::config::OutputFormat;
use crate::error::{PageError, PlumaError};
use serde::{Deserialize, Serialize};

/// The outcome of transcribing one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number in the source PDF.
    pub page_num: usize,
    /// Transcribed text (cleaned). Empty when `error` is set.
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Attempts beyond the first.
    pub retries: u8,
    pub error: Option<PageError>,
}

impl PageResult {
    /// A page that failed before or during recognition.
    pub fn failed(page_num: usize, error: PageError) -> Self {
        Self {
            page_num,
            text: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
            retries: 0,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionStats {
    /// Pages in the document.
    pub total_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    /// Selected pages that never reached the model.
    pub skipped_pages: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub recognition_duration_ms: u64,
}

/// Document-level metadata read from the PDF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
}

/// A complete transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOutput {
    /// The assembled document in `format`.
    pub text: String,
    pub format: OutputFormat,
    /// Per-page results, in page order.
    pub pages: Vec<PageResult>,
    pub metadata: DocumentMetadata,
    pub stats: TranscriptionStats,
}

impl TranscriptionOutput {
    /// Turn any page failure into an error.
    pub fn into_result(self) -> Result<Self, PlumaError> {
        let failed: Vec<&PageError> = self.pages.iter().filter_map(|p| p.error.as_ref()).collect();
        if failed.is_empty() {
            return Ok(self);
        }
        let first_error = failed[0].to_string();
        let failed = failed.len();
        Err(PlumaError::PartialFailure {
            success: self.pages.len() - failed,
            failed,
            total: self.pages.len(),
            first_error,
        })
    }

    /// Page number of the first successful page whose text contains
    /// `needle`, or `None` when nothing matches.
    pub fn page_for_text(&self, needle: &str) -> Option<usize> {
        let needle = needle.trim();
        if needle.is_empty() {
            return None;
        }
        self.pages
            .iter()
            .find(|p| p.is_ok() && p.text.contains(needle))
            .map(|p| p.page_num)
    }

    /// File name offered when saving this transcription.
    pub fn file_name(&self) -> String {
        self.format.default_file_name()
    }
}
