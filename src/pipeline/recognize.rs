//! Per-page recognition: the model call, its retry policy, and the fan-out.
//!
//! [`PageRecognizer`] is one attempt of one call. [`recognize_page`] wraps it
//! with a timeout and exponential backoff (`retry_backoff_ms * 2^(attempt-1)`,
//! so 500 ms → 1 s → 2 s with the defaults). [`recognize_pages`] runs at most
//! `concurrency` pages at once and hands results back in submission order,
//! whatever order the calls finish in.

use crate::config::TranscriptionConfig;
use crate::error::{PageError, PlumaError, RecognitionError};
use crate::output::PageResult;
use crate::pipeline::assemble;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Default Gemini model, the provider family the tool was built around.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default model for every other provider.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Text returned for one page.
#[derive(Debug, Clone, Default)]
pub struct Recognition {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Something that can read a page image.
///
/// One call is one attempt; retries and timeouts are applied by
/// [`recognize_page`].
#[async_trait]
pub trait PageRecognizer: Send + Sync {
    /// Short label used in logs and errors.
    fn name(&self) -> &str;

    async fn recognize(&self, prompt: &str, image: &ImageData)
        -> Result<Recognition, RecognitionError>;
}

/// [`PageRecognizer`] backed by an `edgequake-llm` chat provider.
///
/// The request is a system message holding the prompt followed by a user
/// message holding the page image. The user text is empty: the image carries
/// all the content.
pub struct LlmRecognizer {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
}

impl LlmRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &TranscriptionConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            options: build_options(config),
        }
    }
}

#[async_trait]
impl PageRecognizer for LlmRecognizer {
    fn name(&self) -> &str {
        &self.label
    }

    async fn recognize(
        &self,
        prompt: &str,
        image: &ImageData,
    ) -> Result<Recognition, RecognitionError> {
        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_with_images("", vec![image.clone()]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| RecognitionError::classify(&self.label, e.to_string()))?;

        Ok(Recognition {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

fn build_options(config: &TranscriptionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "gemini" | "google" | "vertex" => DEFAULT_GEMINI_MODEL,
        _ => DEFAULT_MODEL,
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn llm_recognizer(
    provider_name: &str,
    model: &str,
    config: &TranscriptionConfig,
) -> Result<Arc<dyn PageRecognizer>, PlumaError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PlumaError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    info!("Using {} / {}", provider_name, model);
    Ok(Arc::new(LlmRecognizer::new(
        provider,
        provider_name,
        config,
    )))
}

/// Pick the recognizer for a run, most specific setting first:
///
/// 1. `config.recognizer`
/// 2. `config.provider`
/// 3. `config.provider_name` (+ `config.model`)
/// 4. `PLUMA_LLM_PROVIDER` + `PLUMA_MODEL`
/// 5. `GEMINI_API_KEY` or `GOOGLE_API_KEY` → gemini
/// 6. `ProviderFactory::from_env()` auto-detection
pub fn resolve_recognizer(
    config: &TranscriptionConfig,
) -> Result<Arc<dyn PageRecognizer>, PlumaError> {
    if let Some(ref recognizer) = config.recognizer {
        return Ok(Arc::clone(recognizer));
    }

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(LlmRecognizer::new(
            Arc::clone(provider),
            "custom",
            config,
        )));
    }

    if let Some(ref name) = config.provider_name {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| default_model_for(name));
        return llm_recognizer(name, model, config);
    }

    if let (Some(provider), Some(model)) =
        (non_empty_env("PLUMA_LLM_PROVIDER"), non_empty_env("PLUMA_MODEL"))
    {
        return llm_recognizer(&provider, &model, config);
    }

    if non_empty_env("GEMINI_API_KEY")
        .or_else(|| non_empty_env("GOOGLE_API_KEY"))
        .is_some()
    {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return llm_recognizer("gemini", model, config);
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PlumaError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or GOOGLE_API_KEY), OPENAI_API_KEY or ANTHROPIC_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(Arc::new(LlmRecognizer::new(provider, "auto", config)))
}

/// Recognise one page, retrying retryable failures.
///
/// Never returns an error: a page that still fails after the last attempt is
/// reported through [`PageResult::error`] so its siblings are unaffected.
pub async fn recognize_page(
    recognizer: &dyn PageRecognizer,
    page_num: usize,
    image: &ImageData,
    prompt: &str,
    config: &TranscriptionConfig,
) -> PageResult {
    let start = Instant::now();
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<RecognitionError> = None;
    let mut attempts: u32 = 0;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }
        attempts = attempt + 1;

        let outcome = match timeout(call_timeout, recognizer.recognize(prompt, image)).await {
            Ok(result) => result,
            Err(_) => Err(RecognitionError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        match outcome {
            Ok(recognition) => {
                let duration = start.elapsed();
                debug!(
                    "Page {}: {} input tokens, {} output tokens, {:?}",
                    page_num, recognition.input_tokens, recognition.output_tokens, duration
                );
                return PageResult {
                    page_num,
                    text: recognition.text,
                    input_tokens: recognition.input_tokens,
                    output_tokens: recognition.output_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt.min(u8::MAX as u32) as u8,
                    error: None,
                };
            }
            Err(e) => {
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, e);
                let retryable = e.is_retryable();
                last_err = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }

    let retries = attempts.saturating_sub(1).min(u8::MAX as u32) as u8;
    let error = match last_err {
        Some(RecognitionError::Timeout { secs }) => PageError::Timeout {
            page: page_num,
            secs,
        },
        Some(e) => PageError::RecognitionFailed {
            page: page_num,
            retries,
            detail: e.to_string(),
        },
        None => PageError::RecognitionFailed {
            page: page_num,
            retries,
            detail: "Unknown error".to_string(),
        },
    };

    PageResult {
        duration_ms: start.elapsed().as_millis() as u64,
        retries,
        ..PageResult::failed(page_num, error)
    }
}

/// Fan out recognition of `pages` (`(page_index_0based, image)`) with at most
/// `config.concurrency` calls in flight.
///
/// Results come back in the order of `pages`, independent of completion order.
pub async fn recognize_pages(
    recognizer: &dyn PageRecognizer,
    pages: &[(usize, ImageData)],
    prompt: &str,
    config: &TranscriptionConfig,
) -> Result<Vec<PageResult>, PlumaError> {
    let total = pages.len();
    let callback = config.progress_callback.as_ref();

    let completed: Vec<(usize, PageResult)> = stream::iter(pages.iter().enumerate())
        .map(|(slot, (idx, image))| async move {
            let page_num = idx + 1;
            if let Some(cb) = callback {
                cb.on_page_start(page_num, total);
            }
            let result = recognize_page(recognizer, page_num, image, prompt, config).await;
            if let Some(cb) = callback {
                match &result.error {
                    None => cb.on_page_complete(page_num, total, result.text.len()),
                    Some(e) => cb.on_page_error(page_num, total, e.to_string()),
                }
            }
            (slot, result)
        })
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    assemble::reassemble(completed, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails `failures` times, then answers with the prompt length.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
        error: RecognitionError,
    }

    #[async_trait]
    impl PageRecognizer for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn recognize(
            &self,
            _prompt: &str,
            _image: &ImageData,
        ) -> Result<Recognition, RecognitionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(Recognition {
                    text: "# Appunti".into(),
                    input_tokens: 3,
                    output_tokens: 4,
                })
            }
        }
    }

    fn image() -> ImageData {
        ImageData::new("iVBORw0KGgo=", "image/png")
    }

    fn fast_config(max_retries: u32) -> TranscriptionConfig {
        TranscriptionConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&TranscriptionConfig::default());
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn gemini_gets_its_own_default_model() {
        assert_eq!(default_model_for("gemini"), DEFAULT_GEMINI_MODEL);
        assert_eq!(default_model_for("openai"), DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let flaky = Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
            error: RecognitionError::Provider("503".into()),
        };
        let result = recognize_page(&flaky, 1, &image(), "p", &fast_config(3)).await;
        assert!(result.is_ok());
        assert_eq!(result.retries, 2);
        assert_eq!(result.text, "# Appunti");
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_become_page_error() {
        let flaky = Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
            error: RecognitionError::Provider("502 Bad Gateway".into()),
        };
        let result = recognize_page(&flaky, 4, &image(), "p", &fast_config(2)).await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        match result.error {
            Some(PageError::RecognitionFailed { page, retries, detail }) => {
                assert_eq!((page, retries), (4, 2));
                assert!(detail.contains("502"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(result.text.is_empty());
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let flaky = Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
            error: RecognitionError::Auth {
                provider: "gemini".into(),
                detail: "API key not valid".into(),
            },
        };
        let result = recognize_page(&flaky, 1, &image(), "p", &fast_config(3)).await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
        assert!(!result.is_ok());
    }

    struct Slow;

    #[async_trait]
    impl PageRecognizer for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn recognize(
            &self,
            _prompt: &str,
            _image: &ImageData,
        ) -> Result<Recognition, RecognitionError> {
            sleep(Duration::from_secs(3600)).await;
            Ok(Recognition::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out() {
        let config = TranscriptionConfig::builder()
            .max_retries(0)
            .api_timeout_secs(2)
            .build()
            .unwrap();
        let result = recognize_page(&Slow, 9, &image(), "p", &config).await;
        assert_eq!(result.error, Some(PageError::Timeout { page: 9, secs: 2 }));
    }

    #[tokio::test]
    async fn explicit_recognizer_wins() {
        let config = TranscriptionConfig::builder()
            .recognizer(Arc::new(Slow))
            .provider_name("does-not-exist")
            .build()
            .unwrap();
        let recognizer = resolve_recognizer(&config).expect("explicit recognizer");
        assert_eq!(recognizer.name(), "slow");
    }
}
