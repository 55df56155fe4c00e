//! Pipeline stages, one transformation per module.
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ recognize ──▶ postprocess ──▶ assemble
//! (path/URL) (pdfium)  (base64)   (VLM fan-out) (cleanup)      (page order)
//! ```
//!
//! 1. [`input`]: resolve a path, URL or byte buffer to a local PDF file
//! 2. [`render`]: rasterise selected pages inside `spawn_blocking`
//! 3. [`encode`]: PNG + base64 payload for the multimodal request
//! 4. [`recognize`]: bounded-concurrency model calls with retry and timeout;
//!    the only stage with network I/O besides URL download
//! 5. [`postprocess`]: deterministic cleanup of model quirks, per page
//! 6. [`assemble`]: put results back in page order and join them

pub mod assemble;
pub mod encode;
pub mod input;
pub mod postprocess;
pub mod recognize;
pub mod render;
