//! # edgequake-formfill
//!
//! Fill blank fields on scanned or rendered PDF forms with a language model.
//!
//! ## Why this crate?
//!
//! Most real-world forms are flat: the boxes are just lines on a page, with
//! no AcroForm fields to fill programmatically. This crate treats the form
//! the way a person would. It renders each page, finds the empty boxes,
//! reads the printed label next to each one, asks a model what belongs
//! there given a background document, and writes the answer into the box.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF + context.txt
//!  │
//!  ├─ 1. Context   read the background document (fatal if unreadable)
//!  ├─ 2. Render    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Detect    box-shaped contours → candidate cells
//!  ├─ 4. Classify  ink density → empty / already filled
//!  ├─ 5. Label     OCR the strip left of (else above) each empty cell
//!  ├─ 6. Answer    one model request per empty cell, cleaned to one line
//!  ├─ 7. Overlay   shrink-to-fit text drawn into the cell
//!  └─ 8. Assemble  {stem}_page_NNN.png + {stem}_fields.json
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_formfill::{fill_form, FillConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Answers come from a local Ollama server unless a provider is set.
//!     let config = FillConfig::builder().model("llama3").build()?;
//!     let output = fill_form("form.pdf", "filled/", "about_me.txt", &config).await?;
//!     eprintln!(
//!         "filled {}/{} empty cells on {} pages",
//!         output.stats.filled_cells, output.stats.empty_cells, output.stats.total_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | Enables the `formfill` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `tesseract` | off     | Link libtesseract via `leptess` instead of running the `tesseract` executable |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-formfill = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime Requirements
//!
//! - a pdfium shared library (`PDFIUM_LIB_PATH`, the working directory, or
//!   the system library path)
//! - `tesseract` on `PATH` (or the `tesseract` feature)
//! - a TrueType font (`--font`, or a common system font)

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod fill;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    DetectionConfig, EmptinessConfig, FillConfig, FillConfigBuilder, LabelConfig, OutputFormat,
    OverlayConfig,
};
pub use error::{CellError, FormFillError};
pub use fill::{fill_form, fill_form_sync, FillComponents, FormFiller};
pub use model::{
    Cell, CellRect, CellReport, ContextDocument, FillOutput, FillStats, Page, PageReport,
};
pub use progress::{FillProgressCallback, NoopProgressCallback, ProgressCallback};
