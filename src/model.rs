//! Core data model: pages, cells, the context document, and the run report.
//!
//! Ownership mirrors the pipeline: the run owns its [`Page`]s, every page
//! owns its [`Cell`]s, and the single [`ContextDocument`] is only ever
//! borrowed immutably while answers are generated.

use crate::error::{CellError, FormFillError};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Geometry ─────────────────────────────────────────────────────────────

/// Axis-aligned rectangle in page-bitmap pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width over height; `0.0` for a degenerate rectangle.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// True if `other` lies entirely inside `self` (edges may touch).
    pub fn contains(&self, other: &CellRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True if the rectangle lies inside a `width × height` bitmap.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= width && self.bottom() <= height
    }

    /// Intersect with a `width × height` bitmap.
    ///
    /// Returns `None` when nothing of the rectangle overlaps the bitmap.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<CellRect> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let right = self.right().min(width);
        let bottom = self.bottom().min(height);
        if right <= self.x || bottom <= self.y {
            return None;
        }
        Some(CellRect::new(self.x, self.y, right - self.x, bottom - self.y))
    }

    /// Shrink by `inset` on every side; `None` if nothing is left.
    pub fn inset(&self, inset: u32) -> Option<CellRect> {
        let w = self.width.checked_sub(inset.saturating_mul(2))?;
        let h = self.height.checked_sub(inset.saturating_mul(2))?;
        if w == 0 || h == 0 {
            return None;
        }
        Some(CellRect::new(self.x + inset, self.y + inset, w, h))
    }
}

impl From<(u32, u32, u32, u32)> for CellRect {
    fn from((x, y, width, height): (u32, u32, u32, u32)) -> Self {
        CellRect::new(x, y, width, height)
    }
}

// ── Cells & pages ────────────────────────────────────────────────────────

/// A detected answer box plus everything the pipeline learned about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub rect: CellRect,
    pub empty: bool,
    pub label: Option<String>,
    pub answer: Option<String>,
    /// Font size the overlay was drawn with, if it was drawn.
    pub font_size: Option<f32>,
    pub error: Option<CellError>,
}

impl Cell {
    pub fn new(rect: CellRect) -> Self {
        Self {
            rect,
            empty: false,
            label: None,
            answer: None,
            font_size: None,
            error: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.answer.is_some()
    }
}

/// One rasterised page.
///
/// `scale` is render resolution ÷ native PDF resolution (72 dpi), so a
/// pixel coordinate `p` maps back to PDF points as `p / scale`.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub scale: f32,
    pub bitmap: RgbaImage,
    pub cells: Vec<Cell>,
}

impl Page {
    /// Wrap a rendered bitmap, enforcing `scale > 0` and non-empty dimensions.
    pub fn new(index: usize, scale: f32, bitmap: RgbaImage) -> Result<Self, FormFillError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(FormFillError::RasterisationFailed {
                page: index + 1,
                detail: format!("invalid scale factor {scale}"),
            });
        }
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(FormFillError::RasterisationFailed {
                page: index + 1,
                detail: "rendered bitmap is empty".into(),
            });
        }
        Ok(Self {
            index,
            scale,
            bitmap,
            cells: Vec::new(),
        })
    }

    /// 1-indexed page number for logs and reports.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    /// Map a bitmap rectangle back to PDF points `(x, y, w, h)`, top-left origin.
    pub fn to_pdf_points(&self, rect: &CellRect) -> (f32, f32, f32, f32) {
        (
            rect.x as f32 / self.scale,
            rect.y as f32 / self.scale,
            rect.width as f32 / self.scale,
            rect.height as f32 / self.scale,
        )
    }
}

/// Caller-supplied background text, loaded once and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDocument {
    text: String,
}

impl ContextDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// ── Report ───────────────────────────────────────────────────────────────

/// Result of a complete run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillOutput {
    pub pages: Vec<PageReport>,
    /// Page artifacts in page order; `artifacts.len() == pages.len()`.
    pub artifacts: Vec<PathBuf>,
    /// JSON field report, when enabled.
    pub report_path: Option<PathBuf>,
    pub stats: FillStats,
}

/// Per-page summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page_num: usize,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub cells: Vec<CellReport>,
}

impl PageReport {
    pub fn from_page(page: &Page) -> Self {
        Self {
            page_num: page.page_num(),
            width: page.width(),
            height: page.height(),
            scale: page.scale,
            cells: page.cells.iter().map(CellReport::from).collect(),
        }
    }
}

/// Per-cell summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellReport {
    pub rect: CellRect,
    pub empty: bool,
    pub label: Option<String>,
    pub answer: Option<String>,
    pub font_size: Option<f32>,
    pub error: Option<CellError>,
}

impl From<&Cell> for CellReport {
    fn from(cell: &Cell) -> Self {
        Self {
            rect: cell.rect,
            empty: cell.empty,
            label: cell.label.clone(),
            answer: cell.answer.clone(),
            font_size: cell.font_size,
            error: cell.error.clone(),
        }
    }
}

/// Aggregate counters and timings for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FillStats {
    pub total_pages: usize,
    pub detected_cells: usize,
    pub empty_cells: usize,
    pub filled_cells: usize,
    pub failed_cells: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub llm_duration_ms: u64,
}
