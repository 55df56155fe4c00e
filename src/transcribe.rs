//! Whole-document entry points.
//!
//! [`transcribe`] waits for every page and returns the assembled document.
//! Use [`crate::stream::transcribe_stream`] to receive pages as they finish.

use crate::config::{OutputFormat, PageSelection, TranscriptionConfig};
use crate::error::{PageError, PlumaError, RecognitionError};
use crate::latex;
use crate::output::{DocumentMetadata, PageResult, TranscriptionOutput, TranscriptionStats};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::recognize::{self, PageRecognizer};
use crate::pipeline::{assemble, encode, postprocess, render};
use crate::prompts;
use edgequake_llm::ImageData;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A page ready for the model, or the reason it never got there.
pub(crate) type PreparedPage = (usize, Result<ImageData, PageError>);

/// Everything done before the first model call.
pub(crate) struct Prepared {
    /// Keeps downloaded or buffered input alive.
    pub _input: Option<ResolvedInput>,
    pub metadata: DocumentMetadata,
    pub recognizer: Arc<dyn PageRecognizer>,
    pub pages: Vec<PreparedPage>,
    pub selected: usize,
    pub render_duration_ms: u64,
}

fn first_requested_page(selection: &PageSelection) -> usize {
    match selection {
        PageSelection::All => 1,
        PageSelection::Single(p) | PageSelection::Range(p, _) => *p,
        PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(1),
    }
}

/// The prompt a page is sent with.
pub(crate) fn page_prompt(config: &TranscriptionConfig) -> String {
    config
        .prompt
        .clone()
        .unwrap_or_else(|| prompts::transcription_prompt(config.format))
}

/// Resolve, inspect, rasterise and encode the selected pages.
pub(crate) async fn prepare(
    input_str: &str,
    config: &TranscriptionConfig,
) -> Result<Prepared, PlumaError> {
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    prepare_resolved(resolved, config).await
}

pub(crate) async fn prepare_resolved(
    resolved: ResolvedInput,
    config: &TranscriptionConfig,
) -> Result<Prepared, PlumaError> {
    let pdf_path = resolved.path().to_path_buf();

    // Fail on a missing API key before spending time on rendering.
    let recognizer = recognize::resolve_recognizer(config)?;

    let metadata = render::extract_metadata(&pdf_path, config.password.as_deref()).await?;
    let total_pages = metadata.page_count;
    if total_pages == 0 {
        return Err(PlumaError::EmptyDocument { path: pdf_path });
    }
    info!("PDF has {} pages", total_pages);

    let indices = config.pages.to_indices(total_pages);
    if indices.is_empty() {
        return Err(PlumaError::PageOutOfRange {
            page: first_requested_page(&config.pages),
            total: total_pages,
        });
    }
    debug!("Selected {} pages", indices.len());

    let render_start = Instant::now();
    let rendered = render::render_pages(&pdf_path, config, &indices).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", rendered.len(), render_duration_ms);

    let pages = rendered
        .into_iter()
        .map(|(idx, img)| {
            let encoded = img.and_then(|img| {
                encode::encode_page(&img).map_err(|e| {
                    warn!("Failed to encode page {}: {}", idx + 1, e);
                    PageError::RenderFailed {
                        page: idx + 1,
                        detail: format!("image encoding failed: {e}"),
                    }
                })
            });
            (idx, encoded)
        })
        .collect();

    Ok(Prepared {
        _input: Some(resolved),
        metadata,
        recognizer,
        pages,
        selected: indices.len(),
        render_duration_ms,
    })
}

/// Transcribe a PDF file or URL.
///
/// # Errors
/// Fatal problems with the input (missing file, not a PDF, wrong password),
/// no configured provider, [`PlumaError::AllPagesFailed`] when nothing could
/// be transcribed, and [`PlumaError::PartialFailure`] when some pages failed
/// and `config.allow_partial` is false.
pub async fn transcribe(
    input_str: impl AsRef<str>,
    config: &TranscriptionConfig,
) -> Result<TranscriptionOutput, PlumaError> {
    let input_str = input_str.as_ref();
    info!("Starting transcription: {}", input_str);
    let total_start = Instant::now();
    let prepared = prepare(input_str, config).await?;
    finish(prepared, config, total_start).await
}

/// Transcribe PDF bytes held in memory.
///
/// The bytes are spilled to a managed temp file that is removed on return.
pub async fn transcribe_from_bytes(
    bytes: &[u8],
    config: &TranscriptionConfig,
) -> Result<TranscriptionOutput, PlumaError> {
    let total_start = Instant::now();
    let resolved = input::resolve_bytes(bytes)?;
    let prepared = prepare_resolved(resolved, config).await?;
    finish(prepared, config, total_start).await
}

/// Transcribe already-encoded page images.
///
/// `pages` holds `(page_index_0based, image)` pairs; `metadata` is carried
/// into the output and supplies the fallback LaTeX title. Useful for scans
/// that never were a PDF, and for driving the pipeline without pdfium.
pub async fn transcribe_images(
    pages: Vec<(usize, ImageData)>,
    metadata: DocumentMetadata,
    config: &TranscriptionConfig,
) -> Result<TranscriptionOutput, PlumaError> {
    let total_start = Instant::now();
    if pages.is_empty() {
        return Err(PlumaError::InvalidConfig("no page images supplied".into()));
    }
    let prepared = Prepared {
        _input: None,
        metadata,
        recognizer: recognize::resolve_recognizer(config)?,
        selected: pages.len(),
        pages: pages.into_iter().map(|(idx, img)| (idx, Ok(img))).collect(),
        render_duration_ms: 0,
    };
    finish(prepared, config, total_start).await
}

async fn finish(
    prepared: Prepared,
    config: &TranscriptionConfig,
    total_start: Instant,
) -> Result<TranscriptionOutput, PlumaError> {
    let Prepared {
        metadata,
        recognizer,
        pages: prepared_pages,
        selected,
        render_duration_ms,
        ..
    } = prepared;

    if let Some(ref cb) = config.progress_callback {
        cb.on_transcription_start(selected);
    }

    let mut ready = Vec::with_capacity(prepared_pages.len());
    let mut pages: Vec<PageResult> = Vec::new();
    for (idx, outcome) in prepared_pages {
        match outcome {
            Ok(image) => ready.push((idx, image)),
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(idx + 1, selected, e.to_string());
                }
                pages.push(PageResult::failed(idx + 1, e));
            }
        }
    }
    let attempted = ready.len() + pages.len();

    let prompt = page_prompt(config);
    let recognition_start = Instant::now();
    let recognized = recognize::recognize_pages(recognizer.as_ref(), &ready, &prompt, config).await?;
    let recognition_duration_ms = recognition_start.elapsed().as_millis() as u64;

    pages.extend(recognized.into_iter().map(|mut page| {
        if page.is_ok() {
            page.text = postprocess::clean_transcription(&page.text, config.format);
        }
        page
    }));
    pages.sort_by_key(|p| p.page_num);

    let processed = pages.iter().filter(|p| p.is_ok()).count();
    let failed = pages.len() - processed;

    if let Some(ref cb) = config.progress_callback {
        cb.on_transcription_complete(selected, processed);
    }

    if processed == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(PlumaError::AllPagesFailed {
            total: pages.len(),
            retries: config.max_retries,
            first_error,
        });
    }

    let text = match config.format {
        OutputFormat::Latex => latex::render_document(
            &pages,
            &config.latex,
            &config.page_separator,
            metadata.title.as_deref(),
        ),
        format => assemble::join_pages(&pages, &config.page_separator, format),
    };

    let stats = TranscriptionStats {
        total_pages: metadata.page_count,
        processed_pages: processed,
        failed_pages: failed,
        skipped_pages: selected.saturating_sub(attempted),
        total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
        total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        recognition_duration_ms,
    };

    info!(
        "Transcription complete: {}/{} pages, {}ms total",
        processed, selected, stats.total_duration_ms
    );

    let output = TranscriptionOutput {
        text,
        format: config.format,
        pages,
        metadata,
        stats,
    };

    if failed > 0 && !config.allow_partial {
        return output.into_result();
    }
    Ok(output)
}

/// Transcribe and write the document to `output_path`.
///
/// The file is written to a sibling temp file and renamed into place, so a
/// failed run never leaves a truncated document behind.
pub async fn transcribe_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &TranscriptionConfig,
) -> Result<TranscriptionStats, PlumaError> {
    let output = transcribe(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.text).await?;
    Ok(output.stats)
}

pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), PlumaError> {
    let failed = |source: std::io::Error| PlumaError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)
}

/// Blocking wrapper around [`transcribe`] on a private tokio runtime.
pub fn transcribe_sync(
    input_str: impl AsRef<str>,
    config: &TranscriptionConfig,
) -> Result<TranscriptionOutput, PlumaError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PlumaError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(transcribe(input_str, config))
}

/// Read PDF metadata. Needs no model provider.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, PlumaError> {
    inspect_with_password(input_str, None).await
}

/// [`inspect`] for encrypted documents.
pub async fn inspect_with_password(
    input_str: impl AsRef<str>,
    password: Option<&str>,
) -> Result<DocumentMetadata, PlumaError> {
    let resolved = input::resolve_input(input_str.as_ref(), 120).await?;
    render::extract_metadata(resolved.path(), password).await
}

// ── Enhancement ──────────────────────────────────────────────────────────

/// A model rewrite of an excerpt of a transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enhancement {
    /// 1-indexed page whose image was sent as context.
    pub page_num: usize,
    pub original: String,
    pub enhanced: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Ask the model to improve `text`, an excerpt of an earlier transcription.
///
/// The page image sent as context is the first page of `previous` whose text
/// contains `text`; page 1 when there is no earlier transcription or no page
/// matches.
pub async fn enhance(
    input_str: impl AsRef<str>,
    text: &str,
    previous: Option<&TranscriptionOutput>,
    config: &TranscriptionConfig,
) -> Result<Enhancement, PlumaError> {
    let page_num = context_page(previous, text);
    enhance_page(input_str, page_num, text, config).await
}

/// 1-indexed page sent as context for `text`.
fn context_page(previous: Option<&TranscriptionOutput>, text: &str) -> usize {
    previous.and_then(|out| out.page_for_text(text)).unwrap_or(1)
}

/// [`enhance`] with an explicit 1-indexed context page.
pub async fn enhance_page(
    input_str: impl AsRef<str>,
    page_num: usize,
    text: &str,
    config: &TranscriptionConfig,
) -> Result<Enhancement, PlumaError> {
    if text.trim().is_empty() {
        return Err(PlumaError::InvalidConfig("nothing to enhance: text is empty".into()));
    }

    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let recognizer = recognize::resolve_recognizer(config)?;

    let metadata = render::extract_metadata(resolved.path(), config.password.as_deref()).await?;
    if page_num == 0 || page_num > metadata.page_count {
        return Err(PlumaError::PageOutOfRange {
            page: page_num,
            total: metadata.page_count,
        });
    }

    info!("Enhancing excerpt with page {} as context", page_num);
    let image = render::render_page(resolved.path(), config, page_num - 1).await?;
    let image = encode::encode_page(&image).map_err(|e| PlumaError::RasterisationFailed {
        page: page_num,
        detail: format!("image encoding failed: {e}"),
    })?;

    enhance_image(recognizer.as_ref(), page_num, &image, text, config).await
}

/// Send one enhancement request for an encoded page.
pub async fn enhance_image(
    recognizer: &dyn PageRecognizer,
    page_num: usize,
    image: &ImageData,
    text: &str,
    config: &TranscriptionConfig,
) -> Result<Enhancement, PlumaError> {
    let prompt = prompts::enhancement_prompt(config.format, text);
    let result = recognize::recognize_page(recognizer, page_num, image, &prompt, config).await;
    if let Some(error) = result.error {
        return Err(RecognitionError::from(error).into());
    }

    // An enhanced LaTeX excerpt is LaTeX, not Markdown: only the shared
    // cleanup rules apply.
    let clean_as = match config.format {
        OutputFormat::Latex => OutputFormat::PlainText,
        format => format,
    };

    Ok(Enhancement {
        page_num,
        original: text.to_string(),
        enhanced: postprocess::clean_transcription(&result.text, clean_as),
        input_tokens: result.input_tokens,
        output_tokens: result.output_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_reports_first_requested_page() {
        assert_eq!(first_requested_page(&PageSelection::All), 1);
        assert_eq!(first_requested_page(&PageSelection::Range(7, 9)), 7);
        assert_eq!(first_requested_page(&PageSelection::Set(vec![9, 4])), 4);
    }

    #[test]
    fn custom_prompt_overrides_builtin() {
        let config = TranscriptionConfig::builder().prompt("Leggi.").build().unwrap();
        assert_eq!(page_prompt(&config), "Leggi.");
        let config = TranscriptionConfig::default();
        assert!(page_prompt(&config).contains("handwritten notes"));
    }

    #[test]
    fn context_page_falls_back_to_page_one() {
        let ok = |n: usize, text: &str| PageResult {
            text: text.to_string(),
            error: None,
            ..PageResult::failed(n, PageError::Timeout { page: n, secs: 1 })
        };
        let previous = TranscriptionOutput {
            text: String::new(),
            format: OutputFormat::Markdown,
            pages: vec![ok(3, "serie numeriche"), ok(4, "serie di potenze")],
            metadata: DocumentMetadata::default(),
            stats: TranscriptionStats::default(),
        };
        assert_eq!(context_page(Some(&previous), "potenze"), 4);
        assert_eq!(context_page(Some(&previous), "equazioni differenziali"), 1);
        assert_eq!(context_page(None, "potenze"), 1);
    }

    #[tokio::test]
    async fn atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/transcription.md");
        write_atomic(&path, "# Appunti\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Appunti\n");
        assert!(!path.with_file_name("transcription.md.tmp").exists());
    }
}
