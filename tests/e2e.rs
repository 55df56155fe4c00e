//! End-to-end tests against real PDFs and a live model.
//!
//! They need PDFs in `./test_cases/`, a pdfium library and a model API key,
//! so they are gated behind the `E2E_ENABLED` environment variable.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_inspect -- --nocapture

use pluma::{
    inspect, transcribe, transcribe_from_bytes, transcribe_to_file, OutputFormat, PageSelection,
    PlumaError, TranscriptionConfig,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn notes_pdf() -> PathBuf {
    test_cases_dir().join("handwritten_notes.pdf")
}

/// Output passes the cleanup guarantees every format shares.
fn assert_clean(text: &str, context: &str) {
    assert!(!text.trim().is_empty(), "[{context}] output is empty");
    assert!(text.ends_with('\n'), "[{context}] output must end with a newline");
    assert!(
        !text.lines().next().unwrap_or("").starts_with("```"),
        "[{context}] output must not start with a code fence"
    );
    assert!(
        !text.contains("\n\n\n\n"),
        "[{context}] more than two consecutive blank lines"
    );
    for ch in ['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'] {
        assert!(!text.contains(ch), "[{context}] invisible char U+{:04X}", ch as u32);
    }
    println!("[{context}] ✓  {} bytes", text.len());
}

fn first_page(format: OutputFormat) -> TranscriptionConfig {
    TranscriptionConfig::builder()
        .format(format)
        .pages(PageSelection::Single(1))
        .max_retries(2)
        .build()
        .expect("valid config")
}

// ── Inspect (no model) ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_notes() {
    let path = e2e_skip_unless_ready!(notes_pdf());
    let meta = inspect(path.to_str().unwrap()).await.expect("inspect should succeed");
    assert!(meta.page_count >= 1);
    assert!(!meta.pdf_version.is_empty());
    println!("Metadata: {:?}", meta);
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }
    let err = inspect("/definitely/not/a/real/file.pdf").await.unwrap_err();
    assert!(matches!(err, PlumaError::FileNotFound { .. }));
}

#[tokio::test]
async fn test_not_a_pdf_bytes() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }
    let err = transcribe_from_bytes(b"hello, not a pdf", &TranscriptionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlumaError::NotAPdf { .. }));
}

// ── Transcription (live model) ───────────────────────────────────────────────

#[tokio::test]
async fn test_transcribe_markdown_page1() {
    let path = e2e_skip_unless_ready!(notes_pdf());
    let out = transcribe(path.to_str().unwrap(), &first_page(OutputFormat::Markdown))
        .await
        .expect("transcription should succeed");
    assert_eq!(out.stats.processed_pages, 1);
    assert!(out.stats.total_input_tokens > 0);
    assert_clean(&out.text, "markdown");
}

#[tokio::test]
async fn test_transcribe_plain_text_page1() {
    let path = e2e_skip_unless_ready!(notes_pdf());
    let out = transcribe(path.to_str().unwrap(), &first_page(OutputFormat::PlainText))
        .await
        .expect("transcription should succeed");
    assert_clean(&out.text, "plain");
    assert!(
        !out.text.lines().any(|l| l.starts_with("# ")),
        "plain text must not contain Markdown headings"
    );
}

#[tokio::test]
async fn test_transcribe_latex_to_file() {
    let path = e2e_skip_unless_ready!(notes_pdf());
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("notes.tex");

    let stats = transcribe_to_file(path.to_str().unwrap(), &out_path, &first_page(OutputFormat::Latex))
        .await
        .expect("transcription should succeed");
    assert_eq!(stats.processed_pages, 1);

    let tex = std::fs::read_to_string(&out_path).unwrap();
    assert_clean(&tex, "latex");
    assert_eq!(tex.matches("\\documentclass").count(), 1);
    assert_eq!(tex.matches("\\begin{document}").count(), 1);
    assert!(tex.trim_end().ends_with("\\end{document}"));
}
