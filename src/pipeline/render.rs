//! PDF rasterisation: render every page to an RGBA bitmap via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! [`rasterize_document`] moves the work onto tokio's blocking pool so the
//! runtime worker is free while a large document renders.
//!
//! ## Why a fixed scale, not a pixel cap?
//!
//! Every geometric threshold downstream (minimum cell area, label search
//! width, font sizes) is expressed in pixels. Rendering every page at the
//! same points-to-pixels factor keeps those thresholds meaningful across
//! pages and lets a cell be mapped back to PDF points with one division.

use crate::error::FormFillError;
use crate::model::Page;
use crate::pipeline::input;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a PDF file into one [`Page`] per PDF page, in document order.
pub trait Rasterizer: Send + Sync {
    /// Render all pages at `scale` pixels per PDF point.
    ///
    /// Must fail with a document-open error
    /// ([`FormFillError::is_document_open`]) when the file is missing,
    /// unreadable, or not a PDF.
    fn rasterize(&self, pdf_path: &Path, scale: f32) -> Result<Vec<Page>, FormFillError>;
}

/// Run a rasterizer on tokio's blocking pool.
pub async fn rasterize_document(
    rasterizer: Arc<dyn Rasterizer>,
    pdf_path: &Path,
    scale: f32,
) -> Result<Vec<Page>, FormFillError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || rasterizer.rasterize(&path, scale))
        .await
        .map_err(|e| FormFillError::Internal(format!("Render task panicked: {}", e)))?
}

/// Production rasterizer backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    password: Option<String>,
}

impl PdfiumRasterizer {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_path: &Path, scale: f32) -> Result<Vec<Page>, FormFillError> {
        let path = input::resolve_local(pdf_path)?;
        let pdfium = bind_pdfium()?;
        let password = self.password.as_deref();

        let document = pdfium.load_pdf_from_file(&path, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    FormFillError::WrongPassword { path: path.clone() }
                } else {
                    FormFillError::PasswordRequired { path: path.clone() }
                }
            } else {
                FormFillError::CorruptPdf {
                    path: path.clone(),
                    detail: err_str,
                }
            }
        })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        let mut results = Vec::with_capacity(total_pages);
        for idx in 0..total_pages {
            let page = pages
                .get(idx as u16)
                .map_err(|e| FormFillError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                FormFillError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image().to_rgba8();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );

            results.push(Page::new(idx, scale, image)?);
        }

        Ok(results)
    }
}

/// Bind pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the system library.
fn bind_pdfium() -> Result<Pdfium, FormFillError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(lib) if !lib.is_empty() => Pdfium::bind_to_library(&lib),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| FormFillError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_fails_before_binding() {
        // resolve_local runs first, so this needs no pdfium library.
        let err = PdfiumRasterizer::default()
            .rasterize(Path::new("/no/such/form.pdf"), 2.0)
            .unwrap_err();
        assert!(err.is_document_open(), "got: {err:?}");
    }

    #[tokio::test]
    async fn blocking_wrapper_propagates_errors() {
        let rasterizer: Arc<dyn Rasterizer> = Arc::new(PdfiumRasterizer::default());
        let err = rasterize_document(rasterizer, Path::new("/no/such/form.pdf"), 2.0)
            .await
            .unwrap_err();
        assert!(matches!(err, FormFillError::FileNotFound { .. }));
    }
}
