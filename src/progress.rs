//! Progress-callback trait for per-page and per-cell fill events.
//!
//! Inject an [`Arc<dyn FillProgressCallback>`] via
//! [`crate::config::FillConfigBuilder::progress_callback`] to receive events
//! as the pipeline walks the document. All methods default to no-ops so
//! implementations override only what they need.
//!
//! # Example
//!
//! ```rust
//! use edgequake_formfill::{FillConfig, FillProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     filled: AtomicUsize,
//! }
//!
//! impl FillProgressCallback for CountingCallback {
//!     fn on_cell_filled(&self, page_num: usize, label: &str, answer: &str) {
//!         self.filled.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}: {label} → {answer}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { filled: AtomicUsize::new(0) });
//!
//! let config = FillConfig::builder()
//!     .progress_callback(counter as Arc<dyn FillProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the fill pipeline as it processes each page and cell.
///
/// Events arrive strictly in document order, one page and one cell at a
/// time. The trait is still `Send + Sync` because the callback lives inside
/// [`crate::config::FillConfig`], which is shared across tasks.
pub trait FillProgressCallback: Send + Sync {
    /// Called once after rasterisation, before the first page is scanned.
    fn on_fill_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before cell detection on a page.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the document
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called after an answer was generated and drawn into a cell.
    fn on_cell_filled(&self, page_num: usize, label: &str, answer: &str) {
        let _ = (page_num, label, answer);
    }

    /// Called when an empty cell could not be answered.
    ///
    /// # Arguments
    /// * `error` — human-readable description of the local failure
    fn on_cell_error(&self, page_num: usize, error: &str) {
        let _ = (page_num, error);
    }

    /// Called once every cell of a page has been handled.
    ///
    /// # Arguments
    /// * `filled` — cells on this page that received an answer
    fn on_page_complete(&self, page_num: usize, total_pages: usize, filled: usize) {
        let _ = (page_num, total_pages, filled);
    }

    /// Called once after all pages were written.
    fn on_fill_complete(&self, total_pages: usize, filled_cells: usize) {
        let _ = (total_pages, filled_cells);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl FillProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::FillConfig`].
pub type ProgressCallback = Arc<dyn FillProgressCallback>;
