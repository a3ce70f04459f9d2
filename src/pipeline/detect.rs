//! Cell detection: find rectangular answer boxes on a rasterised page.
//!
//! The page is binarised (ink = dark pixels), optionally dilated by one
//! pixel so antialiased or dashed outlines close up, and traced with
//! `imageproc`'s border-following contour finder. Each contour's bounding
//! box is then filtered on size, page fraction and aspect ratio.
//!
//! ## Nesting
//!
//! A drawn box yields two contours: the outer edge of its stroke and the
//! hole inside it, plus one per glyph or mark written in the box. The
//! contour finder reports a component's outer border before any border
//! inside it (raster order of the start pixel), so keeping the first
//! rectangle and dropping every later one that lies inside an accepted
//! rectangle leaves exactly one cell per box.
//!
//! A grid of boxes with shared borders is one ink component: a single
//! outer border with one hole per box. When an outer border has two or
//! more holes that pass the filters, the holes are the cells and the outer
//! rectangle is skipped.

use crate::config::DetectionConfig;
use crate::model::CellRect;
use image::{GrayImage, Luma, RgbaImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use tracing::{debug, trace};

/// Finds candidate answer boxes on a page bitmap.
pub trait CellDetector: Send + Sync {
    /// Candidate rectangles in detection order. An empty vec is a normal result.
    fn detect(&self, page: &RgbaImage) -> Vec<CellRect>;
}

/// Production detector: binarise → dilate → trace contours → filter.
#[derive(Debug, Clone, Default)]
pub struct ContourCellDetector {
    config: DetectionConfig,
}

impl ContourCellDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Foreground (255) where luma is below the threshold.
    fn ink_mask(&self, page: &RgbaImage) -> GrayImage {
        let gray = image::imageops::grayscale(page);
        let threshold = self.config.binarize_threshold;
        let mut mask = GrayImage::new(gray.width(), gray.height());
        for (x, y, px) in gray.enumerate_pixels() {
            if px.0[0] < threshold {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        if self.config.dilate {
            dilate(&mask, Norm::LInf, 1)
        } else {
            mask
        }
    }

    fn accepts(&self, rect: &CellRect, page_area: u64) -> bool {
        let c = &self.config;
        if rect.width < c.min_width || rect.height < c.min_height {
            return false;
        }
        let area = rect.area();
        if area < c.min_area || area as f64 > page_area as f64 * c.max_area_fraction as f64 {
            return false;
        }
        let aspect = rect.aspect_ratio();
        aspect >= c.min_aspect && aspect <= c.max_aspect
    }
}

impl CellDetector for ContourCellDetector {
    fn detect(&self, page: &RgbaImage) -> Vec<CellRect> {
        let (width, height) = page.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let mask = self.ink_mask(page);
        let contours: Vec<Contour<u32>> = find_contours(&mask);
        let page_area = width as u64 * height as u64;

        let rects: Vec<Option<CellRect>> = contours
            .iter()
            .map(|c| bounding_rect(c).filter(|r| self.accepts(r, page_area)))
            .collect();

        // Qualifying holes per outer border.
        let mut holes = vec![0usize; contours.len()];
        for (contour, rect) in contours.iter().zip(&rects) {
            if contour.border_type != BorderType::Hole || rect.is_none() {
                continue;
            }
            if let Some(parent) = contour.parent {
                holes[parent] += 1;
            }
        }

        let mut accepted: Vec<CellRect> = Vec::new();
        for (i, contour) in contours.iter().enumerate() {
            let Some(rect) = rects[i] else {
                continue;
            };
            if contour.border_type == BorderType::Outer && holes[i] >= 2 {
                trace!("Grid at {:?} split into {} cells", rect, holes[i]);
                continue;
            }
            if accepted.iter().any(|outer| outer.contains(&rect)) {
                continue;
            }
            accepted.push(rect);
        }

        debug!(
            "Detected {} cells from {} contours on {}x{} page",
            accepted.len(),
            contours.len(),
            width,
            height
        );
        accepted
    }
}

/// Tight axis-aligned bounding box of a contour's points.
fn bounding_rect(contour: &Contour<u32>) -> Option<CellRect> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(CellRect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}
