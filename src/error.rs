//! Error types for the edgequake-formfill library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FormFillError`] — **Fatal**: the run cannot proceed at all (the PDF
//!   cannot be opened, the context document cannot be read, the output
//!   directory is not writable). Returned as `Err(FormFillError)` from the
//!   top-level `fill_form*` functions and stops processing of remaining pages.
//!
//! * [`CellError`] — **Non-fatal**: a single cell could not be answered
//!   (OCR failure, endpoint error, unusable response). Stored inside
//!   [`crate::model::CellReport`]; the cell is left unfilled and the run
//!   moves on to the next cell.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-formfill library.
///
/// Cell-level failures use [`CellError`] and are recorded on the cell
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum FormFillError {
    // ── Document open errors ──────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Context errors ────────────────────────────────────────────────────
    /// The context document is missing, unreadable, or not UTF-8 text.
    #[error("Failed to read context document '{path}': {detail}")]
    ContextRead { path: PathBuf, detail: String },

    // ── Rendering resources ───────────────────────────────────────────────
    /// No usable TrueType/OpenType font could be loaded for the overlay.
    #[error("Failed to load overlay font: {detail}\nPass --font /path/to/font.ttf.")]
    FontLoad { detail: String },

    /// The in-process OCR engine could not be initialised.
    #[error("Failed to initialise OCR engine: {0}")]
    OcrInit(String),

    /// The configured answer provider could not be created.
    #[error("Answer provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory or write a page artifact.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FormFillError {
    /// True for the failures that mean the source document could not be opened.
    pub fn is_document_open(&self) -> bool {
        matches!(
            self,
            FormFillError::FileNotFound { .. }
                | FormFillError::PermissionDenied { .. }
                | FormFillError::NotAPdf { .. }
                | FormFillError::CorruptPdf { .. }
                | FormFillError::PasswordRequired { .. }
                | FormFillError::WrongPassword { .. }
        )
    }
}

/// A non-fatal error for a single cell.
///
/// The affected cell keeps `answer = None` and is not drawn.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum CellError {
    /// The OCR engine failed on the label region.
    #[error("OCR failed: {detail}")]
    OcrFailed { detail: String },

    /// The endpoint answered with a status other than 200.
    #[error("endpoint returned HTTP {status}")]
    EndpointStatus { status: u16 },

    /// The body was not JSON or had no string `response` field.
    #[error("malformed endpoint response: {detail}")]
    MalformedResponse { detail: String },

    /// Connection refused, reset, DNS failure, timeout.
    #[error("request to endpoint failed: {detail}")]
    Transport { detail: String },

    /// A hosted provider returned an error.
    #[error("provider error: {detail}")]
    Provider { detail: String },

    /// The model answered, but nothing drawable was left after cleanup.
    #[error("endpoint returned an empty answer")]
    EmptyAnswer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_open_classification() {
        let missing = FormFillError::FileNotFound {
            path: "a.pdf".into(),
        };
        assert!(missing.is_document_open());

        let ctx = FormFillError::ContextRead {
            path: "ctx.txt".into(),
            detail: "No such file".into(),
        };
        assert!(!ctx.is_document_open());
    }

    #[test]
    fn context_read_display() {
        let e = FormFillError::ContextRead {
            path: "notes/context.txt".into(),
            detail: "No such file or directory".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("notes/context.txt"), "got: {msg}");
        assert!(msg.contains("No such file"), "got: {msg}");
    }

    #[test]
    fn endpoint_status_display() {
        let e = CellError::EndpointStatus { status: 503 };
        assert_eq!(e.to_string(), "endpoint returned HTTP 503");
    }

    #[test]
    fn cell_error_serialises() {
        let e = CellError::MalformedResponse {
            detail: "missing field `response`".into(),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("MalformedResponse"));
    }
}
