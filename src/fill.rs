//! Form-filling entry points.
//!
//! [`FormFiller`] owns one handle per pipeline stage and walks a document
//! strictly in order: pages one after another, cells one after another,
//! one model request per empty cell. Handles (font, OCR engine, HTTP
//! client) are created once in [`FormFiller::from_config`] and reused for
//! every cell of the run.

use crate::config::FillConfig;
use crate::error::FormFillError;
use crate::model::{Cell, CellRect, ContextDocument, FillOutput, FillStats, Page, PageReport};
use crate::pipeline::answer::{resolve_answer_client, AnswerClient, AnswerEngine};
use crate::pipeline::assemble::DocumentAssembler;
use crate::pipeline::classify::{EmptinessClassifier, InkDensityClassifier};
use crate::pipeline::context;
use crate::pipeline::detect::{CellDetector, ContourCellDetector};
use crate::pipeline::label::{LabelExtractor, OcrEngine};
use crate::pipeline::overlay::{GlyphRenderer, OverlayRenderer, TextRenderer};
use crate::pipeline::render::{self, PdfiumRasterizer, Rasterizer};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The swappable capabilities a run depends on.
///
/// [`FillComponents::production`] wires the real implementations; tests
/// and embedders can substitute any of them.
#[derive(Clone)]
pub struct FillComponents {
    pub rasterizer: Arc<dyn Rasterizer>,
    pub detector: Arc<dyn CellDetector>,
    pub classifier: Arc<dyn EmptinessClassifier>,
    pub ocr: Arc<dyn OcrEngine>,
    pub answer_client: Arc<dyn AnswerClient>,
    pub text_renderer: Arc<dyn TextRenderer>,
}

impl FillComponents {
    /// Build the production stack: pdfium, contour detection, ink density,
    /// tesseract, the configured answer transport, and a system font.
    ///
    /// Fails with [`FormFillError::FontLoad`] or [`FormFillError::OcrInit`]
    /// before any document is touched.
    pub fn production(config: &FillConfig) -> Result<Self, FormFillError> {
        let text_renderer = GlyphRenderer::discover(config.font_path.as_deref())?;
        info!("Overlay font: {}", text_renderer.source().display());

        Ok(Self {
            rasterizer: Arc::new(PdfiumRasterizer::new(config.password.clone())),
            detector: Arc::new(ContourCellDetector::new(config.detection)),
            classifier: Arc::new(InkDensityClassifier::new(config.emptiness)),
            ocr: production_ocr(config)?,
            answer_client: resolve_answer_client(config)?,
            text_renderer: Arc::new(text_renderer),
        })
    }
}

#[cfg(feature = "tesseract")]
fn production_ocr(config: &FillConfig) -> Result<Arc<dyn OcrEngine>, FormFillError> {
    use crate::pipeline::label::LeptessOcr;
    Ok(Arc::new(LeptessOcr::new(
        config.ocr_language.clone(),
        render_dpi(config),
    )?))
}

#[cfg(not(feature = "tesseract"))]
fn production_ocr(config: &FillConfig) -> Result<Arc<dyn OcrEngine>, FormFillError> {
    use crate::pipeline::label::TesseractCli;
    Ok(Arc::new(TesseractCli::new(
        config.tesseract_path.clone(),
        config.ocr_language.clone(),
        render_dpi(config),
    )))
}

fn render_dpi(config: &FillConfig) -> u32 {
    (config.render_scale * crate::config::PDF_NATIVE_DPI).round() as u32
}

/// Runs the fill pipeline over whole documents.
pub struct FormFiller {
    config: FillConfig,
    rasterizer: Arc<dyn Rasterizer>,
    detector: Arc<dyn CellDetector>,
    classifier: Arc<dyn EmptinessClassifier>,
    labels: LabelExtractor,
    answers: AnswerEngine,
    overlay: OverlayRenderer,
}

/// Outcome of one page, before stats are folded in.
struct PageOutcome {
    llm_time: Duration,
}

impl FormFiller {
    /// Wire the production components for `config`.
    pub fn from_config(config: &FillConfig) -> Result<Self, FormFillError> {
        let components = FillComponents::production(config)?;
        Ok(Self::new(config.clone(), components))
    }

    pub fn new(config: FillConfig, components: FillComponents) -> Self {
        Self {
            labels: LabelExtractor::new(components.ocr, config.label),
            answers: AnswerEngine::new(components.answer_client, config.prompt_template.clone()),
            overlay: OverlayRenderer::new(components.text_renderer, config.overlay),
            rasterizer: components.rasterizer,
            detector: components.detector,
            classifier: components.classifier,
            config,
        }
    }

    pub fn config(&self) -> &FillConfig {
        &self.config
    }

    /// Fill every empty cell of `input` and write the pages to `output_dir`.
    ///
    /// # Returns
    /// `Ok(FillOutput)` whenever the document was processed end to end, even
    /// if some cells could not be answered (see `stats.failed_cells`).
    ///
    /// # Errors
    /// Only fatal conditions abort the run:
    /// - the context document cannot be read (checked before rasterising)
    /// - the source PDF cannot be opened or rendered
    /// - the output directory or a page artifact cannot be written
    pub async fn fill(
        &self,
        input: &Path,
        output_dir: &Path,
        context_path: &Path,
    ) -> Result<FillOutput, FormFillError> {
        let total_start = Instant::now();
        info!("Filling {}", input.display());

        // ── Step 1: Context ──────────────────────────────────────────────
        let context = context::load_context(context_path).await?;

        // ── Step 2: Output directory ─────────────────────────────────────
        let assembler = DocumentAssembler::new(output_dir, self.config.output_format);
        assembler.prepare()?;
        debug!("Writing pages to {}", assembler.output_dir().display());

        // ── Step 3: Rasterise ────────────────────────────────────────────
        let render_start = Instant::now();
        let mut pages = render::rasterize_document(
            Arc::clone(&self.rasterizer),
            input,
            self.config.render_scale,
        )
        .await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        let total_pages = pages.len();
        info!("Rendered {} pages in {}ms", total_pages, render_duration_ms);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_fill_start(total_pages);
        }

        // ── Step 4: Fill pages in order ──────────────────────────────────
        let mut llm_time = Duration::ZERO;
        let mut filled_cells = 0;
        for page in pages.iter_mut() {
            let outcome = self.fill_page(page, total_pages, &context).await;
            llm_time += outcome.llm_time;
            filled_cells += page.cells.iter().filter(|c| c.is_filled()).count();
        }

        // ── Step 5: Assemble ─────────────────────────────────────────────
        let reports: Vec<PageReport> = pages.iter().map(PageReport::from_page).collect();
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("form")
            .to_string();

        let page_writer = assembler.clone();
        let page_stem = stem.clone();
        let artifacts = tokio::task::spawn_blocking(move || page_writer.write_pages(&page_stem, &pages))
            .await
            .map_err(|e| FormFillError::Internal(format!("Write task panicked: {}", e)))??;

        let report_path = if self.config.write_report {
            Some(assembler.write_report(&stem, input, &reports)?)
        } else {
            None
        };

        // ── Step 6: Stats ────────────────────────────────────────────────
        let cells = || reports.iter().flat_map(|p| p.cells.iter());
        let stats = FillStats {
            total_pages,
            detected_cells: cells().count(),
            empty_cells: cells().filter(|c| c.empty).count(),
            filled_cells,
            failed_cells: cells().filter(|c| c.error.is_some()).count(),
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            render_duration_ms,
            llm_duration_ms: llm_time.as_millis() as u64,
        };

        info!(
            "Fill complete: {} pages, {}/{} empty cells filled, {}ms total",
            total_pages, stats.filled_cells, stats.empty_cells, stats.total_duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_fill_complete(total_pages, filled_cells);
        }

        Ok(FillOutput {
            pages: reports,
            artifacts,
            report_path,
            stats,
        })
    }

    /// Detect, classify, label, answer and draw every cell of one page.
    ///
    /// Never fails: every per-cell problem is recorded on the cell.
    async fn fill_page(
        &self,
        page: &mut Page,
        total_pages: usize,
        context: &ContextDocument,
    ) -> PageOutcome {
        let page_num = page.page_num();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_start(page_num, total_pages);
        }

        let (width, height) = (page.width(), page.height());
        let mut cells: Vec<Cell> = self
            .detector
            .detect(&page.bitmap)
            .into_iter()
            .filter_map(|r| within_page(r, width, height, page_num))
            .map(Cell::new)
            .collect();
        debug!("Page {}: {} candidate cells", page_num, cells.len());

        let mut llm_time = Duration::ZERO;
        for cell in cells.iter_mut() {
            cell.empty = self.classifier.is_empty(&page.bitmap, &cell.rect);
            if !cell.empty {
                continue;
            }

            let label = self.labels.extract_async(&page.bitmap, &cell.rect).await;
            if label.is_empty() {
                debug!("Page {}: no label found for {:?}", page_num, cell.rect);
            }

            let started = Instant::now();
            let result = self.answers.answer(&label, context).await;
            llm_time += started.elapsed();

            match result {
                Ok(answer) => cell.answer = Some(answer),
                Err(e) => {
                    warn!("Page {}: cell {:?} left blank: {}", page_num, cell.rect, e);
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_cell_error(page_num, &e.to_string());
                    }
                    cell.error = Some(e);
                }
            }
            cell.label = Some(label);
        }

        // Drawn only after every label was read, so no answer can end up in
        // a neighbouring cell's OCR strip.
        let mut filled = 0;
        for cell in cells.iter_mut() {
            let Some(ref answer) = cell.answer else {
                continue;
            };
            cell.font_size = Some(self.overlay.draw(&mut page.bitmap, &cell.rect, answer));
            filled += 1;
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_cell_filled(page_num, cell.label.as_deref().unwrap_or(""), answer);
            }
        }

        page.cells = cells;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_complete(page_num, total_pages, filled);
        }
        PageOutcome { llm_time }
    }
}

/// Keep a detected rectangle only if (part of) it lies on the page.
fn within_page(rect: CellRect, width: u32, height: u32, page_num: usize) -> Option<CellRect> {
    if rect.fits_within(width, height) {
        return Some(rect);
    }
    match rect.clamp_to(width, height) {
        Some(clamped) => {
            debug!("Page {}: clamped {:?} to {:?}", page_num, rect, clamped);
            Some(clamped)
        }
        None => {
            warn!("Page {}: dropped off-page cell {:?}", page_num, rect);
            None
        }
    }
}

/// Fill a PDF form with the production components.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` — path to the source PDF
/// * `output_dir` — directory for the annotated pages (created if absent)
/// * `context` — plain-text document the answers are drawn from
/// * `config` — run configuration
pub async fn fill_form(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    context: impl AsRef<Path>,
    config: &FillConfig,
) -> Result<FillOutput, FormFillError> {
    FormFiller::from_config(config)?
        .fill(input.as_ref(), output_dir.as_ref(), context.as_ref())
        .await
}

/// Synchronous wrapper around [`fill_form`].
///
/// Creates a temporary tokio runtime internally.
pub fn fill_form_sync(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    context: impl AsRef<Path>,
    config: &FillConfig,
) -> Result<FillOutput, FormFillError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FormFillError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(fill_form(input, output_dir, context, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inside_rect_is_kept() {
        let r = CellRect::new(10, 10, 50, 20);
        assert_eq!(within_page(r, 100, 100, 1), Some(r));
    }

    #[test]
    fn overhanging_rect_is_clamped() {
        let r = CellRect::new(80, 90, 50, 20);
        let kept = within_page(r, 100, 100, 1).unwrap();
        assert!(kept.fits_within(100, 100));
        assert_eq!(kept, CellRect::new(80, 90, 20, 10));
    }

    #[test]
    fn off_page_rect_is_dropped() {
        assert_eq!(within_page(CellRect::new(200, 0, 10, 10), 100, 100, 1), None);
        assert_eq!(within_page(CellRect::new(10, 10, 0, 10), 100, 100, 1), None);
    }

    #[test]
    fn dpi_follows_render_scale() {
        let config = FillConfig::builder().render_scale(2.0).build().unwrap();
        assert_eq!(render_dpi(&config), 144);
    }
}
