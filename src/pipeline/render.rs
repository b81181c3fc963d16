//! PDF rasterisation: render every page of a PDF card scan via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is not async-safe and
//! is CPU-bound while rasterising. The work runs on tokio's blocking pool so
//! the runtime's worker threads never stall.
//!
//! ## Binding
//!
//! The shared library is looked up, in order, at `PDFIUM_LIB_PATH`, in the
//! working directory, then on the system library path.

use crate::config::ScanConfig;
use crate::error::CardScanError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rasterise all pages of an in-memory PDF, in page order.
pub async fn render_pdf(
    origin: PathBuf,
    bytes: Vec<u8>,
    config: &ScanConfig,
) -> Result<Vec<DynamicImage>, CardScanError> {
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;

    tokio::task::spawn_blocking(move || render_pdf_blocking(&origin, &bytes, dpi, max_pixels))
        .await
        .map_err(|e| CardScanError::Internal(format!("Render task panicked: {}", e)))?
}

fn bind_pdfium() -> Result<Pdfium, CardScanError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| CardScanError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Scale factor turning PDF points (1/72 inch) into pixels at `dpi`.
fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / 72.0
}

/// Blocking implementation of page rendering.
fn render_pdf_blocking(
    origin: &Path,
    bytes: &[u8],
    dpi: u32,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, CardScanError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            CardScanError::PasswordRequired {
                path: origin.to_path_buf(),
            }
        } else {
            CardScanError::CorruptPdf {
                path: origin.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(CardScanError::EmptyPdf {
            path: origin.to_path_buf(),
        });
    }
    info!("{}: {} page(s) at {} DPI", origin.display(), total_pages, dpi);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale_for_dpi(dpi))
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            CardScanError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}
