//! Progress-callback trait for per-page transcription events.
//!
//! Inject an [`Arc<dyn TranscriptionProgressCallback>`] via
//! [`crate::config::TranscriptionConfigBuilder::progress_callback`] to receive
//! events as the pipeline processes each page. The host decides where they go:
//! a terminal progress bar, a channel, a log.
//!
//! # Example
//!
//! ```rust
//! use pluma::{TranscriptionConfig, TranscriptionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl TranscriptionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} bytes)", page_num, total_pages, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = TranscriptionConfig::builder()
//!     .progress_callback(counter as Arc<dyn TranscriptionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// Pages are recognised concurrently, so `on_page_start`, `on_page_complete`
/// and `on_page_error` may be called from several tasks at once and in any
/// page order. All methods default to no-ops.
pub trait TranscriptionProgressCallback: Send + Sync {
    /// Called once the selected pages are known, before any model call.
    fn on_transcription_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the model request for a page is sent.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page is transcribed. `text_len` is the byte length of
    /// the model output.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page fails after all retries.
    ///
    /// Takes an owned `String` so implementations can move it into spawned
    /// tasks.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all pages have been attempted. Streams fire it
    /// after their last page has been yielded.
    fn on_transcription_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// No-op implementation.
pub struct NoopProgressCallback;

impl TranscriptionProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::TranscriptionConfig`].
pub type ProgressCallback = Arc<dyn TranscriptionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
        completed_total: AtomicUsize,
    }

    impl TranscriptionProgressCallback for TrackingCallback {
        fn on_transcription_start(&self, total_pages: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _text_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_transcription_complete(&self, _total_pages: usize, success_count: usize) {
            self.completed_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_transcription_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 42);
        cb.on_page_error(2, 5, "some error".into());
        cb.on_transcription_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_transcription_start(3);
        tracker.on_page_start(1, 3);
        tracker.on_page_complete(1, 3, 100);
        tracker.on_page_start(2, 3);
        tracker.on_page_error(2, 3, "timeout".into());
        tracker.on_transcription_complete(3, 1);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_total.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callback_moves_into_spawned_task() {
        let cb: ProgressCallback = Arc::new(TrackingCallback::default());
        let moved = Arc::clone(&cb);
        tokio::spawn(async move {
            moved.on_page_error(2, 5, "timeout after 3 retries".to_string());
        })
        .await
        .expect("spawn must succeed");
    }
}
