//! PDF rasterisation: render the selected page to a `DynamicImage` via
//! pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a thread
//! designed for blocking operations, preventing the Tokio worker threads
//! from stalling during CPU-heavy rendering.
//!
//! ## DPI → pixels
//!
//! PDF page geometry is expressed in points (1/72 inch). The target pixel
//! width is `page_points * dpi / 72`; pdfium scales the height
//! proportionally. At the default 300 DPI an ANSI D P&ID sheet (34×22 in)
//! rasterises to roughly 10200×6600 px — a 9×6 grid of 1200 px tiles.

use crate::config::IngestConfig;
use crate::error::IngestError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Rasterise the configured page of a PDF into an image.
///
/// This runs inside `spawn_blocking` since pdfium operations are CPU-bound.
pub async fn render_page(
    pdf_path: &Path,
    config: &IngestConfig,
) -> Result<DynamicImage, IngestError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let page = config.page;

    tokio::task::spawn_blocking(move || render_page_blocking(&path, dpi, page))
        .await
        .map_err(|e| IngestError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
fn render_page_blocking(
    pdf_path: &Path,
    dpi: u32,
    page_num: usize,
) -> Result<DynamicImage, IngestError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| IngestError::PdfiumBindingFailed(e.to_string()))?;
    let pdfium = Pdfium::new(bindings);

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| IngestError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let idx = page_num - 1;
    if idx >= total_pages {
        return Err(IngestError::PageOutOfRange {
            page: page_num,
            total: total_pages,
        });
    }

    let page = pages
        .get(idx as u16)
        .map_err(|e| IngestError::RasterisationFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    // Points are 1/72 inch; scale the width and let pdfium keep the aspect.
    let target_width = (page.width().value * dpi as f32 / 72.0) as i32;
    let render_config = PdfRenderConfig::new().set_target_width(target_width.max(1));

    let bitmap =
        page.render_with_config(&render_config)
            .map_err(|e| IngestError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px at {} DPI",
        page_num,
        image.width(),
        image.height(),
        dpi
    );

    if image.width() == 0 || image.height() == 0 {
        return Err(IngestError::EmptyPage {
            width: image.width(),
            height: image.height(),
        });
    }

    Ok(image)
}
