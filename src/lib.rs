//! # pluma
//!
//! Transcribe handwritten-notes PDFs into Markdown, plain text or LaTeX using
//! Vision Language Models, and score transcriptions against manual ones.
//!
//! ## Why this crate?
//!
//! OCR engines trained on print do badly on handwriting: slanted baselines,
//! joined letters, formulas squeezed into margins. Instead this crate
//! rasterises each page and lets a vision model read it the way a student
//! would, asking for structured output (headings, lists, LaTeX math) rather
//! than a flat dump of characters.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file, bytes, or download from URL
//!  ├─ 2. Render     rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode     PNG → base64 ImageData
//!  ├─ 4. Recognise  concurrent model calls with retry + timeout
//!  ├─ 5. Clean      fences, whitespace, headings, tables, images
//!  └─ 6. Assemble   pages in document order; LaTeX is translated and
//!                   wrapped in a single compilable document
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pluma::{transcribe, OutputFormat, TranscriptionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = TranscriptionConfig::builder()
//!         .format(OutputFormat::Latex)
//!         .build()?;
//!     let output = transcribe("lecture-notes.pdf", &config).await?;
//!     println!("{}", output.text);
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.total_input_tokens,
//!         output.stats.total_output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Similarity
//!
//! ```rust
//! use pluma::{compare_texts, Language, Metric};
//!
//! let report = compare_texts("Il gatto dorme", "il gatto dorme.", Metric::Both, Language::Italian);
//! assert_eq!(report.jaccard, Some(1.0));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pluma` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pluma = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod latex;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod similarity;
pub mod stream;
pub mod transcribe;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    LatexOptions, OutputFormat, PageSelection, PageSeparator, TranscriptionConfig,
    TranscriptionConfigBuilder,
};
pub use error::{PageError, PlumaError, RecognitionError};
pub use output::{DocumentMetadata, PageResult, TranscriptionOutput, TranscriptionStats};
pub use pipeline::recognize::{LlmRecognizer, PageRecognizer, Recognition};
pub use progress::{NoopProgressCallback, ProgressCallback, TranscriptionProgressCallback};
pub use similarity::{compare_files, compare_texts, Language, Metric, SimilarityReport};
pub use stream::{stream_images, transcribe_stream, transcribe_stream_from_bytes, PageStream};
pub use transcribe::{
    enhance, enhance_image, enhance_page, inspect, inspect_with_password, transcribe,
    transcribe_from_bytes, transcribe_images, transcribe_sync, transcribe_to_file, Enhancement,
};
