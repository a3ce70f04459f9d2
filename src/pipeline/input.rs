//! Input validation: make sure the source PDF exists, is readable, and
//! starts with the `%PDF` magic bytes before pdfium ever sees it.
//!
//! pdfium reports a missing file and a JPEG renamed to `.pdf` with the same
//! opaque error code; checking up front lets each case surface as its own
//! [`FormFillError`] variant.

use crate::error::FormFillError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate a local PDF path and return it as an owned `PathBuf`.
pub fn resolve_local(path: &Path) -> Result<PathBuf, FormFillError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(FormFillError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(FormFillError::CorruptPdf {
            path,
            detail: "path is a directory".into(),
        });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic != b"%PDF" => {
                    return Err(FormFillError::NotAPdf { path, magic });
                }
                Ok(()) => {}
                Err(_) => {
                    return Err(FormFillError::CorruptPdf {
                        path,
                        detail: "file is shorter than a PDF header".into(),
                    });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(FormFillError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(FormFillError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, FormFillError::FileNotFound { .. }));
        assert!(err.is_document_open());
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"\x89PNG rest of file").unwrap();
        let err = resolve_local(tmp.path()).unwrap_err();
        match err {
            FormFillError::NotAPdf { magic, .. } => assert_eq!(&magic, b"\x89PNG"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%P").unwrap();
        let err = resolve_local(tmp.path()).unwrap_err();
        assert!(matches!(err, FormFillError::CorruptPdf { .. }));
    }

    #[test]
    fn pdf_header_is_accepted() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n%%EOF\n").unwrap();
        assert_eq!(resolve_local(tmp.path()).unwrap(), tmp.path());
    }
}
