//! Overlay: draw an answer into its cell, shrinking the font until it fits.

use crate::config::OverlayConfig;
use crate::error::FormFillError;
use crate::model::CellRect;
use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Fonts tried, in order, when no font path is configured.
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Measures and rasterises text.
pub trait TextRenderer: Send + Sync {
    /// Width and height in pixels of `text` at `size`.
    fn measure(&self, text: &str, size: f32) -> (u32, u32);

    /// Draw `text` with its top-left corner at `(x, y)`.
    fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>, text: &str);
}

/// TrueType renderer backed by `ab_glyph`.
pub struct GlyphRenderer {
    font: FontVec,
    source: PathBuf,
}

impl GlyphRenderer {
    /// Load a TrueType/OpenType font file.
    pub fn from_path(path: &Path) -> Result<Self, FormFillError> {
        let data = std::fs::read(path).map_err(|e| FormFillError::FontLoad {
            detail: format!("{}: {}", path.display(), e),
        })?;
        let font = FontVec::try_from_vec(data).map_err(|e| FormFillError::FontLoad {
            detail: format!("{}: {}", path.display(), e),
        })?;
        debug!("Loaded overlay font {}", path.display());
        Ok(Self {
            font,
            source: path.to_path_buf(),
        })
    }

    /// Use `path` if given, else the first loadable entry of [`FONT_CANDIDATES`].
    pub fn discover(path: Option<&Path>) -> Result<Self, FormFillError> {
        if let Some(p) = path {
            return Self::from_path(p);
        }
        for candidate in FONT_CANDIDATES {
            let p = Path::new(candidate);
            if !p.is_file() {
                continue;
            }
            match Self::from_path(p) {
                Ok(r) => return Ok(r),
                Err(e) => warn!("Skipping font candidate: {}", e),
            }
        }
        Err(FormFillError::FontLoad {
            detail: format!(
                "no usable system font found (tried {} locations); pass a font path",
                FONT_CANDIDATES.len()
            ),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl TextRenderer for GlyphRenderer {
    fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        text_size(PxScale::from(size), &self.font, text)
    }

    fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>, text: &str) {
        draw_text_mut(canvas, color, x, y, PxScale::from(size), &self.font, text);
    }
}

/// Chosen font size and whether the text fits the cell at that size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontFit {
    pub size: f32,
    pub fits: bool,
}

/// Places answers inside cells.
pub struct OverlayRenderer {
    renderer: Arc<dyn TextRenderer>,
    config: OverlayConfig,
}

impl OverlayRenderer {
    pub fn new(renderer: Arc<dyn TextRenderer>, config: OverlayConfig) -> Self {
        Self { renderer, config }
    }

    /// Area text may occupy: the cell minus the inset, or the whole cell
    /// when it is too small to inset.
    fn text_area(&self, cell: &CellRect) -> CellRect {
        cell.inset(self.config.inset).unwrap_or(*cell)
    }

    /// Largest size in `preferred, preferred - step, ..., min` at which the
    /// text fits. Falls back to the minimum with `fits: false`.
    pub fn fit_font_size(&self, cell: &CellRect, text: &str) -> FontFit {
        let area = self.text_area(cell);
        let min = self.config.min_font_size;
        let mut size = self.config.preferred_font_size;

        loop {
            let (w, h) = self.renderer.measure(text, size);
            trace!("Font {:.1}px -> {}x{} in {}x{}", size, w, h, area.width, area.height);
            if w <= area.width && h <= area.height {
                return FontFit { size, fits: true };
            }
            if size <= min {
                break;
            }
            let next = (size - self.config.shrink_step).max(min);
            // Above f32 precision the step is absorbed and the size never drops.
            if next >= size {
                break;
            }
            size = next;
        }
        FontFit {
            size: min,
            fits: false,
        }
    }

    /// Draw `answer` left-aligned and vertically centred in `cell`.
    ///
    /// Returns the font size used. Text that overflows even at the minimum
    /// size is still drawn; the canvas clips it.
    pub fn draw(&self, canvas: &mut RgbaImage, cell: &CellRect, answer: &str) -> f32 {
        let fit = self.fit_font_size(cell, answer);
        if !fit.fits {
            warn!(
                "Answer '{}' overflows {}x{} cell even at {:.1}px",
                answer, cell.width, cell.height, fit.size
            );
        }

        let area = self.text_area(cell);
        let (_, h) = self.renderer.measure(answer, fit.size);
        let x = area.x as i32;
        let y = area.y as i32 + (area.height as i32 - h as i32) / 2;
        // Never start above the cell when the text is taller than it.
        let y = y.max(cell.y as i32);

        self.renderer
            .draw(canvas, x, y, fit.size, Rgba(self.config.color), answer);
        fit.size
    }
}
