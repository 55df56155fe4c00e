//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! pdfium is a blocking C++ library, so every call runs inside
//! `tokio::task::spawn_blocking`. The library is bound through `pdfium-auto`,
//! which downloads and caches it on first use.
//!
//! Pages are scaled by `dpi / 72` (PDF user space is 72 units per inch) and
//! then capped at `max_rendered_pixels` on either edge.

use crate::config::TranscriptionConfig;
use crate::error::{PageError, PlumaError};
use crate::output::DocumentMetadata;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Rendering parameters copied out of the config so they can move into a
/// blocking task.
#[derive(Debug, Clone)]
struct RenderSettings {
    dpi: u32,
    max_pixels: u32,
    password: Option<String>,
}

impl RenderSettings {
    fn from_config(config: &TranscriptionConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
        }
    }

    fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// One rendered page, or why it could not be rendered.
pub type RenderedPage = (usize, Result<DynamicImage, PageError>);

/// Rasterise selected pages of a PDF.
///
/// Opening the document is fatal; a page that fails to rasterise is returned
/// as a [`PageError::RenderFailed`] so the other pages still go through.
///
/// # Returns
/// `(page_index_0based, image)` tuples in `page_indices` order. Indices past
/// the end of the document are skipped.
pub async fn render_pages(
    pdf_path: &Path,
    config: &TranscriptionConfig,
    page_indices: &[usize],
) -> Result<Vec<RenderedPage>, PlumaError> {
    let path = pdf_path.to_path_buf();
    let settings = RenderSettings::from_config(config);
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || render_pages_blocking(&path, &settings, &indices))
        .await
        .map_err(|e| PlumaError::Internal(format!("Render task panicked: {}", e)))?
}

/// Render a single page (0-indexed).
pub async fn render_page(
    pdf_path: &Path,
    config: &TranscriptionConfig,
    page_index: usize,
) -> Result<DynamicImage, PlumaError> {
    match render_pages(pdf_path, config, &[page_index]).await?.pop() {
        Some((_, Ok(image))) => Ok(image),
        Some((_, Err(e))) => Err(PlumaError::RasterisationFailed {
            page: page_index + 1,
            detail: e.to_string(),
        }),
        None => Err(PlumaError::RasterisationFailed {
            page: page_index + 1,
            detail: "page index beyond end of document".to_string(),
        }),
    }
}

fn bind_pdfium() -> Result<Pdfium, PlumaError> {
    pdfium_auto::bind_pdfium_silent().map_err(|e| PlumaError::PdfiumBindingFailed(e.to_string()))
}

fn open_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> PlumaError {
    let detail = format!("{:?}", e);
    if detail.to_lowercase().contains("password") {
        if password.is_some() {
            PlumaError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            PlumaError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        PlumaError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail,
        }
    }
}

fn render_pages_blocking(
    pdf_path: &Path,
    settings: &RenderSettings,
    page_indices: &[usize],
) -> Result<Vec<RenderedPage>, PlumaError> {
    let pdfium = bind_pdfium()?;
    let password = settings.password.as_deref();

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| open_error(pdf_path, password, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let max = settings.max_pixels as i32;
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(settings.scale())
        .set_maximum_width(max)
        .set_maximum_height(max);

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        if idx >= total_pages {
            warn!("Skipping page {} (out of range, total={})", idx + 1, total_pages);
            continue;
        }

        let rendered = match pages.get(idx as u16) {
            Ok(page) => page
                .render_with_config(&render_config)
                .map(|bitmap| bitmap.as_image()),
            Err(e) => Err(e),
        }
        .map_err(|e| {
            warn!("Page {} failed to render: {:?}", idx + 1, e);
            PageError::RenderFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        });

        if let Ok(ref image) = rendered {
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
        }
        results.push((idx, rendered));
    }

    Ok(results)
}

/// Read document metadata without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, PlumaError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| PlumaError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, PlumaError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| open_error(pdf_path, password, e))?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
        // pdfium does not expose the security handler once the file is open.
        is_encrypted: password.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_follows_dpi() {
        let config = TranscriptionConfig::builder().dpi(144).build().unwrap();
        let settings = RenderSettings::from_config(&config);
        assert!((settings.scale() - 2.0).abs() < f32::EPSILON);
    }
}
