//! Emptiness classification: is a detected box still blank?

use crate::config::EmptinessConfig;
use crate::model::CellRect;
use image::RgbaImage;
use tracing::trace;

/// Decides whether a cell is fillable.
pub trait EmptinessClassifier: Send + Sync {
    /// True if `cell` holds no meaningful ink.
    ///
    /// Implementations must fail closed: a rectangle that does not overlap
    /// the bitmap is reported as non-empty.
    fn is_empty(&self, page: &RgbaImage, cell: &CellRect) -> bool;
}

/// Production classifier: fraction of dark pixels inside the cell.
#[derive(Debug, Clone, Default)]
pub struct InkDensityClassifier {
    config: EmptinessConfig,
}

impl InkDensityClassifier {
    pub fn new(config: EmptinessConfig) -> Self {
        Self { config }
    }

    /// Fraction of ink pixels in `region`, which must lie inside `page`.
    fn ink_fraction(&self, page: &RgbaImage, region: &CellRect) -> f32 {
        let threshold = self.config.ink_threshold;
        let mut ink = 0u64;
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                let [r, g, b, _] = page.get_pixel(x, y).0;
                // Rec. 601 luma, same weights as image::imageops::grayscale.
                let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
                if luma < threshold as u32 {
                    ink += 1;
                }
            }
        }
        ink as f32 / region.area() as f32
    }
}

impl EmptinessClassifier for InkDensityClassifier {
    fn is_empty(&self, page: &RgbaImage, cell: &CellRect) -> bool {
        let Some(visible) = cell.clamp_to(page.width(), page.height()) else {
            return false;
        };
        // Skip the box outline; tiny cells are measured whole.
        let region = visible.inset(self.config.inset).unwrap_or(visible);

        let fraction = self.ink_fraction(page, &region);
        trace!(
            "Cell {:?}: ink fraction {:.4} (max {:.4})",
            cell,
            fraction,
            self.config.max_ink_fraction
        );
        fraction < self.config.max_ink_fraction
    }
}
