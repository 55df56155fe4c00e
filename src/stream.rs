//! Streaming transcription: pages are yielded as soon as they are ready.
//!
//! Recognition still runs `concurrency` pages at a time, but the stream is
//! ordered: page N is yielded once it and every page before it have finished.
//! A slow page 1 therefore holds back a finished page 2; callers that write
//! pages to disk as they arrive get a file that is always a valid prefix of
//! the document.

use crate::config::TranscriptionConfig;
use crate::error::PlumaError;
use crate::output::{DocumentMetadata, PageResult};
use crate::pipeline::{input, postprocess, recognize};
use crate::transcribe::{self, Prepared};
use edgequake_llm::ImageData;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed, ordered stream of cleaned page results.
///
/// Failed pages are yielded too, with [`PageResult::error`] set.
pub type PageStream = Pin<Box<dyn Stream<Item = PageResult> + Send>>;

/// Transcribe a PDF file or URL, yielding pages in page order.
///
/// Input resolution, rendering and encoding finish before this returns, so
/// fatal input errors surface here rather than inside the stream.
pub async fn transcribe_stream(
    input_str: impl AsRef<str>,
    config: &TranscriptionConfig,
) -> Result<PageStream, PlumaError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming transcription: {}", input_str);
    let prepared = transcribe::prepare(input_str, config).await?;
    Ok(page_stream(prepared, config))
}

/// [`transcribe_stream`] for PDF bytes held in memory.
pub async fn transcribe_stream_from_bytes(
    bytes: &[u8],
    config: &TranscriptionConfig,
) -> Result<PageStream, PlumaError> {
    let resolved = input::resolve_bytes(bytes)?;
    let prepared = transcribe::prepare_resolved(resolved, config).await?;
    Ok(page_stream(prepared, config))
}

/// Stream already-encoded page images (`(page_index_0based, image)`).
pub fn stream_images(
    pages: Vec<(usize, ImageData)>,
    config: &TranscriptionConfig,
) -> Result<PageStream, PlumaError> {
    let prepared = Prepared {
        _input: None,
        metadata: DocumentMetadata {
            page_count: pages.len(),
            ..DocumentMetadata::default()
        },
        recognizer: recognize::resolve_recognizer(config)?,
        selected: pages.len(),
        pages: pages.into_iter().map(|(idx, img)| (idx, Ok(img))).collect(),
        render_duration_ms: 0,
    };
    Ok(page_stream(prepared, config))
}

fn page_stream(prepared: Prepared, config: &TranscriptionConfig) -> PageStream {
    let Prepared {
        recognizer,
        pages,
        selected,
        ..
    } = prepared;

    let config = Arc::new(config.clone());
    let prompt: Arc<str> = transcribe::page_prompt(&config).into();
    let concurrency = config.concurrency.max(1);

    if let Some(ref cb) = config.progress_callback {
        cb.on_transcription_start(selected);
    }
    let on_end = config.progress_callback.clone();
    let succeeded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&succeeded);

    let pages = stream::iter(pages)
        .map(move |(idx, outcome)| {
            let recognizer = Arc::clone(&recognizer);
            let config = Arc::clone(&config);
            let prompt = Arc::clone(&prompt);
            async move {
                let page_num = idx + 1;
                let callback = config.progress_callback.as_ref();
                let image = match outcome {
                    Ok(image) => image,
                    Err(e) => {
                        if let Some(cb) = callback {
                            cb.on_page_error(page_num, selected, e.to_string());
                        }
                        return PageResult::failed(page_num, e);
                    }
                };

                if let Some(cb) = callback {
                    cb.on_page_start(page_num, selected);
                }
                let mut result =
                    recognize::recognize_page(recognizer.as_ref(), page_num, &image, &prompt, &config)
                        .await;
                match &result.error {
                    None => {
                        if let Some(cb) = callback {
                            cb.on_page_complete(page_num, selected, result.text.len());
                        }
                        result.text = postprocess::clean_transcription(&result.text, config.format);
                    }
                    Some(e) => {
                        if let Some(cb) = callback {
                            cb.on_page_error(page_num, selected, e.to_string());
                        }
                    }
                }
                result
            }
        })
        .buffered(concurrency)
        .inspect(move |page: &PageResult| {
            if page.is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

    // Fires once the last page has been yielded; emits no item of its own.
    let finished = stream::once(async move {
        let success = succeeded.load(Ordering::SeqCst);
        info!("Streaming transcription finished: {}/{} pages", success, selected);
        if let Some(cb) = on_end {
            cb.on_transcription_complete(selected, success);
        }
    })
    .filter_map(|()| async { None::<PageResult> });

    Box::pin(pages.chain(finished))
}
