//! Context loading: the free-form background document answers are grounded in.

use crate::error::FormFillError;
use crate::model::ContextDocument;
use std::path::Path;
use tracing::{debug, warn};

/// Read the whole context document as UTF-8 text.
///
/// The text is opaque to the pipeline; it is embedded verbatim in every
/// prompt. An empty file is accepted (answers will mostly be "N/A") but
/// logged, since it almost always means the wrong path was passed.
pub async fn load_context(path: &Path) -> Result<ContextDocument, FormFillError> {
    let read_err = |detail: String| FormFillError::ContextRead {
        path: path.to_path_buf(),
        detail,
    };

    let bytes = tokio::fs::read(path).await.map_err(|e| read_err(e.to_string()))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| read_err(format!("not valid UTF-8 text ({})", e.utf8_error())))?;

    let context = ContextDocument::new(text);
    if context.is_empty() {
        warn!("Context document '{}' is empty", path.display());
    }
    debug!(
        "Loaded context '{}' ({} bytes)",
        path.display(),
        context.text().len()
    );
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_full_text() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "Name: Ada Lovelace\nBorn: 1815-12-10\n").unwrap();
        let ctx = load_context(tmp.path()).await.unwrap();
        assert_eq!(ctx.text(), "Name: Ada Lovelace\nBorn: 1815-12-10\n");
    }

    #[tokio::test]
    async fn missing_file_is_context_read_error() {
        let err = load_context(Path::new("/no/such/context.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, FormFillError::ContextRead { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn binary_file_is_context_read_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0xff, 0xfe, 0x00, 0x80]).unwrap();
        let err = load_context(tmp.path()).await.unwrap_err();
        assert!(err.to_string().contains("UTF-8"), "got {err}");
    }

    #[tokio::test]
    async fn empty_file_is_accepted() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let ctx = load_context(tmp.path()).await.unwrap();
        assert!(ctx.is_empty());
    }
}
