//! Page rasterisation for previews, via pdfium.
//!
//! Only previews need pixels. Signing never touches pdfium, so a missing
//! shared library degrades previews and leaves everything else working.
//!
//! ## Library lookup
//!
//! 1. `PDFIUM_LIB_PATH`, when set, names the library file directly.
//! 2. The platform library name next to the running executable.
//! 3. The system library search path.

use crate::error::PdfSignError;
use crate::pipeline::input::SourceDocument;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Default preview zoom (1.5 pixels per point).
pub const PREVIEW_ZOOM: f32 = 1.5;

/// One rendered page together with its size in PDF points.
pub struct RenderedPage {
    pub image: DynamicImage,
    /// 0-indexed page that was rendered.
    pub page_index: usize,
    pub total_pages: u32,
    pub page_width_pts: f64,
    pub page_height_pts: f64,
}

/// Bind to a pdfium shared library.
pub fn bind_pdfium() -> Result<Pdfium, PdfSignError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        debug!("Binding pdfium from PDFIUM_LIB_PATH={}", path);
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| PdfSignError::PdfiumBindingFailed(format!("{path}: {e:?}")));
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./"));

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&exe_dir))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| PdfSignError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Rasterise one page of `source` at `zoom` pixels per point.
pub fn render_page(
    pdfium: &Pdfium,
    source: &SourceDocument,
    page_index: usize,
    zoom: f32,
) -> Result<RenderedPage, PdfSignError> {
    render_page_with(pdfium, source, zoom, |_| page_index)
}

/// Like [`render_page`], but the page is chosen once the page count is known.
///
/// `choose_page` receives the document's page count and returns a 0-indexed page.
pub fn render_page_with(
    pdfium: &Pdfium,
    source: &SourceDocument,
    zoom: f32,
    choose_page: impl FnOnce(u32) -> usize,
) -> Result<RenderedPage, PdfSignError> {
    let document = pdfium
        .load_pdf_from_byte_slice(&source.bytes, None)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                PdfSignError::PasswordProtected {
                    name: source.name.clone(),
                }
            } else {
                PdfSignError::CorruptPdf {
                    name: source.name.clone(),
                    detail: err_str,
                }
            }
        })?;

    let pages = document.pages();
    let total_pages = u32::from(pages.len());
    let page_index = choose_page(total_pages);
    info!("{}: {} page(s), previewing page {}", source.name, total_pages, page_index + 1);

    let page = u16::try_from(page_index)
        .ok()
        .and_then(|idx| pages.get(idx).ok())
        .ok_or_else(|| PdfSignError::RasterisationFailed {
            page: page_index + 1,
            detail: format!("page out of range (document has {total_pages} pages)"),
        })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(zoom);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| PdfSignError::RasterisationFailed {
            page: page_index + 1,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_index + 1,
        image.width(),
        image.height()
    );

    Ok(RenderedPage {
        image,
        page_index,
        total_pages,
        page_width_pts: f64::from(page.width().value),
        page_height_pts: f64::from(page.height().value),
    })
}
