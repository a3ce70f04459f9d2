//! Label extraction: OCR the text printed next to an empty cell.
//!
//! ## Search rule
//!
//! Forms put the question either to the left of the box ("Name: [____]")
//! or directly above it. The extractor tries, in this fixed order:
//!
//! 1. the strip immediately **left** of the cell, same vertical band,
//!    at most [`LabelConfig::max_width`] wide;
//! 2. the strip immediately **above** the cell, same horizontal span,
//!    at most [`LabelConfig::max_height`] tall.
//!
//! The first strip that yields usable text wins. A cell with no usable
//! text in either strip gets an empty label; it is still sent to the
//! answer engine.

use crate::config::LabelConfig;
use crate::error::CellError;
#[cfg(feature = "tesseract")]
use crate::error::FormFillError;
use crate::model::CellRect;
use image::{GrayImage, ImageFormat, RgbaImage};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, warn};

/// Recognises text in a grayscale image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, region: &GrayImage) -> Result<String, CellError>;
}

// ── Tesseract via CLI ────────────────────────────────────────────────────

/// Runs the `tesseract` executable on a temporary PNG.
///
/// Needs nothing at build time; the binary must be on `PATH` (or configured)
/// at run time.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: String,
    language: String,
    dpi: u32,
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>, language: impl Into<String>, dpi: u32) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            dpi: dpi.max(70),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, region: &GrayImage) -> Result<String, CellError> {
        let tmp = tempfile::Builder::new()
            .prefix("formfill-label-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| CellError::OcrFailed {
                detail: format!("temp file: {e}"),
            })?;
        region
            .save_with_format(tmp.path(), ImageFormat::Png)
            .map_err(|e| CellError::OcrFailed {
                detail: format!("encode label region: {e}"),
            })?;

        // psm 6: a single uniform block of text.
        let output = Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg("6")
            .arg("--dpi")
            .arg(self.dpi.to_string())
            .output()
            .map_err(|e| CellError::OcrFailed {
                detail: format!("failed to run {} (is it installed?): {e}", self.binary),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CellError::OcrFailed {
                detail: format!(
                    "tesseract exited with {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Tesseract in-process ─────────────────────────────────────────────────

/// Links libtesseract through `leptess`.
///
/// A `LepTess` handle is not `Sync`, so one is created per call; `new`
/// initialises one up front to fail fast on a missing language pack.
#[cfg(feature = "tesseract")]
#[derive(Debug, Clone)]
pub struct LeptessOcr {
    language: String,
    dpi: i32,
}

#[cfg(feature = "tesseract")]
impl LeptessOcr {
    pub fn new(language: impl Into<String>, dpi: u32) -> Result<Self, FormFillError> {
        let language = language.into();
        leptess::LepTess::new(None, &language)
            .map_err(|e| FormFillError::OcrInit(format!("tesseract '{language}': {e}")))?;
        Ok(Self {
            language,
            dpi: dpi as i32,
        })
    }
}

#[cfg(feature = "tesseract")]
impl OcrEngine for LeptessOcr {
    fn recognize(&self, region: &GrayImage) -> Result<String, CellError> {
        let ocr_err = |detail: String| CellError::OcrFailed { detail };

        let mut png = Vec::new();
        region
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| ocr_err(format!("encode label region: {e}")))?;

        let mut tess = leptess::LepTess::new(None, &self.language)
            .map_err(|e| ocr_err(format!("init: {e}")))?;
        tess.set_image_from_mem(&png)
            .map_err(|e| ocr_err(format!("load image: {e}")))?;
        // Must follow set_image.
        tess.set_source_resolution(self.dpi);
        tess.get_utf8_text()
            .map_err(|e| ocr_err(format!("decode text: {e}")))
    }
}

// ── Extractor ────────────────────────────────────────────────────────────

/// Positions label search strips around a cell and OCRs them.
#[derive(Clone)]
pub struct LabelExtractor {
    ocr: Arc<dyn OcrEngine>,
    config: LabelConfig,
}

impl LabelExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, config: LabelConfig) -> Self {
        Self { ocr, config }
    }

    /// Search strips for `cell` in priority order, clipped to the page.
    pub fn search_regions(&self, cell: &CellRect, page_width: u32, page_height: u32) -> Vec<CellRect> {
        let c = &self.config;
        let mut regions = Vec::with_capacity(2);

        let left_end = cell.x.saturating_sub(c.gap);
        let left_start = left_end.saturating_sub(c.max_width);
        let left_width = left_end - left_start;
        if left_width >= c.min_width.max(1) {
            if let Some(r) =
                CellRect::new(left_start, cell.y, left_width, cell.height).clamp_to(page_width, page_height)
            {
                regions.push(r);
            }
        }

        let above_end = cell.y.saturating_sub(c.gap);
        let above_start = above_end.saturating_sub(c.max_height);
        let above_height = above_end - above_start;
        if above_height > 0 {
            if let Some(r) =
                CellRect::new(cell.x, above_start, cell.width, above_height).clamp_to(page_width, page_height)
            {
                regions.push(r);
            }
        }

        regions
    }

    /// Grayscale crops of every search strip, in priority order.
    pub fn crop_regions(&self, page: &RgbaImage, cell: &CellRect) -> Vec<GrayImage> {
        self.search_regions(cell, page.width(), page.height())
            .into_iter()
            .map(|r| {
                let strip = image::imageops::crop_imm(page, r.x, r.y, r.width, r.height).to_image();
                image::imageops::grayscale(&strip)
            })
            .collect()
    }

    /// OCR crops in order; first usable text wins, else the empty string.
    pub fn recognize_first(&self, crops: &[GrayImage]) -> String {
        for (i, crop) in crops.iter().enumerate() {
            match self.ocr.recognize(crop) {
                Ok(raw) => {
                    let label = clean_label(&raw);
                    if !label.is_empty() {
                        debug!("Label from strip {}: {:?}", i, label);
                        return label;
                    }
                }
                Err(e) => warn!("Label OCR failed on strip {}: {}", i, e),
            }
        }
        String::new()
    }

    /// Synchronous extraction; may block on the OCR engine.
    pub fn extract(&self, page: &RgbaImage, cell: &CellRect) -> String {
        let crops = self.crop_regions(page, cell);
        self.recognize_first(&crops)
    }

    /// Extraction with OCR moved to tokio's blocking pool.
    pub async fn extract_async(&self, page: &RgbaImage, cell: &CellRect) -> String {
        let crops = self.crop_regions(page, cell);
        if crops.is_empty() {
            return String::new();
        }
        let extractor = self.clone();
        match tokio::task::spawn_blocking(move || extractor.recognize_first(&crops)).await {
            Ok(label) => label,
            Err(e) => {
                warn!("Label OCR task panicked: {}", e);
                String::new()
            }
        }
    }
}

/// Collapse whitespace, drop leader dots/underscores and trailing colons.
///
/// Text with no letter or digit at all is OCR noise and becomes empty.
pub fn clean_label(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .trim_end_matches(|c: char| matches!(c, ':' | '_' | '.' | '…' | '-') || c.is_whitespace())
        .trim();
    if trimmed.chars().any(char::is_alphanumeric) {
        trimmed.to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns queued results in order and records crop sizes.
    struct ScriptedOcr {
        results: Mutex<Vec<Result<String, CellError>>>,
        seen: Mutex<Vec<(u32, u32)>>,
    }

    impl ScriptedOcr {
        fn new(results: Vec<Result<String, CellError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl OcrEngine for ScriptedOcr {
        fn recognize(&self, region: &GrayImage) -> Result<String, CellError> {
            self.seen.lock().unwrap().push(region.dimensions());
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Ok(String::new())
            } else {
                results.remove(0)
            }
        }
    }

    fn page() -> RgbaImage {
        RgbaImage::from_pixel(1000, 1000, image::Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn left_then_above_regions() {
        let ex = LabelExtractor::new(ScriptedOcr::new(vec![]), LabelConfig::default());
        let regions = ex.search_regions(&CellRect::new(600, 300, 200, 50), 1000, 1000);
        assert_eq!(
            regions,
            vec![CellRect::new(98, 300, 500, 50), CellRect::new(600, 238, 200, 60)]
        );
    }

    #[test]
    fn regions_clip_at_page_edges() {
        let ex = LabelExtractor::new(ScriptedOcr::new(vec![]), LabelConfig::default());
        let regions = ex.search_regions(&CellRect::new(100, 100, 200, 50), 1000, 1000);
        assert_eq!(
            regions,
            vec![CellRect::new(0, 100, 98, 50), CellRect::new(100, 38, 200, 60)]
        );
    }

    #[test]
    fn cell_at_top_left_corner_has_no_regions() {
        let ex = LabelExtractor::new(ScriptedOcr::new(vec![]), LabelConfig::default());
        let regions = ex.search_regions(&CellRect::new(0, 0, 200, 50), 1000, 1000);
        assert!(regions.is_empty());
    }

    #[test]
    fn narrow_left_strip_is_skipped() {
        let ex = LabelExtractor::new(ScriptedOcr::new(vec![]), LabelConfig::default());
        let regions = ex.search_regions(&CellRect::new(20, 200, 200, 50), 1000, 1000);
        assert_eq!(regions, vec![CellRect::new(20, 138, 200, 60)]);
    }

    #[test]
    fn left_label_wins() {
        let ocr = ScriptedOcr::new(vec![Ok("  Full Name:\n".into()), Ok("ignored".into())]);
        let ex = LabelExtractor::new(ocr.clone(), LabelConfig::default());
        let label = ex.extract(&page(), &CellRect::new(600, 300, 200, 50));
        assert_eq!(label, "Full Name");
        assert_eq!(ocr.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn falls_back_to_above_when_left_is_blank() {
        let ocr = ScriptedOcr::new(vec![Ok(" \n ".into()), Ok("Date of birth".into())]);
        let ex = LabelExtractor::new(ocr.clone(), LabelConfig::default());
        let label = ex.extract(&page(), &CellRect::new(600, 300, 200, 50));
        assert_eq!(label, "Date of birth");
        assert_eq!(*ocr.seen.lock().unwrap(), vec![(500, 50), (200, 60)]);
    }

    #[test]
    fn ocr_failure_degrades_to_empty_label() {
        let ocr = ScriptedOcr::new(vec![
            Err(CellError::OcrFailed {
                detail: "boom".into(),
            }),
            Ok("|||".into()),
        ]);
        let ex = LabelExtractor::new(ocr, LabelConfig::default());
        assert_eq!(ex.extract(&page(), &CellRect::new(600, 300, 200, 50)), "");
    }

    #[tokio::test]
    async fn async_extract_matches_sync() {
        let ocr = ScriptedOcr::new(vec![Ok("Test Field Name".into())]);
        let ex = LabelExtractor::new(ocr, LabelConfig::default());
        let label = ex
            .extract_async(&page(), &CellRect::new(100, 100, 200, 50))
            .await;
        assert_eq!(label, "Test Field Name");
    }

    #[test]
    fn clean_label_rules() {
        assert_eq!(clean_label("Name:____"), "Name");
        assert_eq!(clean_label("Street\naddress ....."), "Street address");
        assert_eq!(clean_label("  -- : "), "");
        assert_eq!(clean_label("Phone (home)"), "Phone (home)");
    }

    #[test]
    fn missing_tesseract_binary_is_cell_error() {
        let ocr = TesseractCli::new("/definitely/not/tesseract", "eng", 144);
        let err = ocr.recognize(&GrayImage::new(10, 10)).unwrap_err();
        assert!(matches!(err, CellError::OcrFailed { .. }));
    }
}
