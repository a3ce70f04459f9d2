//! Assembly: write the annotated pages (and the field report) to disk.
//!
//! Every artifact is encoded into a hidden temp file inside the output
//! directory and then renamed into place, so a crash never leaves a
//! half-written page under its final name, and the temp files disappear
//! on drop if anything fails.

use crate::config::OutputFormat;
use crate::error::FormFillError;
use crate::model::{Page, PageReport};
use image::DynamicImage;
use serde::Serialize;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// JSON document written as `{stem}_fields.json`.
#[derive(Debug, Serialize)]
struct FieldReport<'a> {
    source: &'a str,
    pages: &'a [PageReport],
}

/// Writes page artifacts under one output directory.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    output_dir: PathBuf,
    format: OutputFormat,
}

impl DocumentAssembler {
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `{dir}/{stem}_page_{NNN}.{ext}` for a 1-indexed page number.
    pub fn page_path(&self, stem: &str, page_num: usize) -> PathBuf {
        self.output_dir.join(format!(
            "{}_page_{:03}.{}",
            stem,
            page_num,
            self.format.extension()
        ))
    }

    pub fn report_path(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{stem}_fields.json"))
    }

    /// Create the output directory and check it accepts files.
    ///
    /// Called before any page is processed so an unwritable destination
    /// fails the run up front.
    pub fn prepare(&self) -> Result<(), FormFillError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| self.write_err(&self.output_dir, e))?;
        let _probe = tempfile::Builder::new()
            .prefix(".formfill-probe")
            .tempfile_in(&self.output_dir)
            .map_err(|e| self.write_err(&self.output_dir, e))?;
        Ok(())
    }

    /// Write every page in order. Returns one path per page.
    pub fn write_pages(&self, stem: &str, pages: &[Page]) -> Result<Vec<PathBuf>, FormFillError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| self.write_err(&self.output_dir, e))?;

        let mut written = Vec::with_capacity(pages.len());
        for page in pages {
            let path = self.page_path(stem, page.page_num());
            let bytes = self.encode(page).map_err(|e| self.write_err(&path, e))?;
            self.persist(&path, &bytes)?;
            debug!("Wrote page {} to {}", page.page_num(), path.display());
            written.push(path);
        }
        info!(
            "Wrote {} page(s) to {}",
            written.len(),
            self.output_dir.display()
        );
        Ok(written)
    }

    /// Write the per-cell JSON report.
    pub fn write_report(
        &self,
        stem: &str,
        source: &Path,
        pages: &[PageReport],
    ) -> Result<PathBuf, FormFillError> {
        let path = self.report_path(stem);
        let source = source.display().to_string();
        let report = FieldReport {
            source: &source,
            pages,
        };
        let bytes = serde_json::to_vec_pretty(&report)
            .map_err(|e| self.write_err(&path, io::Error::other(e)))?;
        self.persist(&path, &bytes)?;
        debug!("Wrote field report to {}", path.display());
        Ok(path)
    }

    fn encode(&self, page: &Page) -> io::Result<Vec<u8>> {
        // JPEG has no alpha channel.
        let image = match self.format {
            OutputFormat::Png => DynamicImage::ImageRgba8(page.bitmap.clone()),
            OutputFormat::Jpeg => {
                DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(page.bitmap.clone()).to_rgb8())
            }
        };
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, self.format.image_format())
            .map_err(io::Error::other)?;
        Ok(buf.into_inner())
    }

    fn persist(&self, path: &Path, bytes: &[u8]) -> Result<(), FormFillError> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".formfill-")
            .suffix(".tmp")
            .tempfile_in(&self.output_dir)
            .map_err(|e| self.write_err(path, e))?;
        tmp.write_all(bytes).map_err(|e| self.write_err(path, e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_err(path, e))?;
        tmp.persist(path).map_err(|e| self.write_err(path, e.error))?;
        Ok(())
    }

    fn write_err(&self, path: &Path, source: io::Error) -> FormFillError {
        FormFillError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn pages(n: usize) -> Vec<Page> {
        (0..n)
            .map(|i| {
                let shade = (i * 40) as u8;
                let bmp = RgbaImage::from_pixel(30, 40, Rgba([shade, shade, shade, 255]));
                Page::new(i, 1.0, bmp).unwrap()
            })
            .collect()
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect()
    }

    #[test]
    fn writes_one_file_per_page_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let asm = DocumentAssembler::new(dir.path().join("out"), OutputFormat::Png);
        let written = asm.write_pages("form", &pages(3)).unwrap();

        assert_eq!(asm.output_dir(), dir.path().join("out"));
        assert_eq!(written.len(), 3);
        for (i, path) in written.iter().enumerate() {
            assert_eq!(*path, asm.page_path("form", i + 1));
            let img = image::open(path).unwrap().to_rgba8();
            assert_eq!(img.dimensions(), (30, 40));
            assert_eq!(img.get_pixel(0, 0)[0], (i * 40) as u8);
        }
        assert!(leftovers(&dir.path().join("out")).is_empty());
    }

    #[test]
    fn page_names_are_zero_padded() {
        let asm = DocumentAssembler::new("/tmp/x", OutputFormat::Jpeg);
        assert_eq!(
            asm.page_path("scan", 7),
            PathBuf::from("/tmp/x/scan_page_007.jpg")
        );
    }

    #[test]
    fn jpeg_pages_decode() {
        let dir = tempfile::tempdir().unwrap();
        let asm = DocumentAssembler::new(dir.path(), OutputFormat::Jpeg);
        let written = asm.write_pages("form", &pages(1)).unwrap();
        let img = image::open(&written[0]).unwrap();
        assert_eq!((img.width(), img.height()), (30, 40));
    }

    #[test]
    fn report_is_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let asm = DocumentAssembler::new(dir.path(), OutputFormat::Png);
        let reports: Vec<PageReport> = pages(2).iter().map(PageReport::from_page).collect();
        let path = asm
            .write_report("form", Path::new("form.pdf"), &reports)
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(value["source"], "form.pdf");
        assert_eq!(value["pages"].as_array().unwrap().len(), 2);
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn prepare_creates_directory_and_cleans_probe() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a").join("b");
        DocumentAssembler::new(&out, OutputFormat::Png).prepare().unwrap();
        assert!(out.is_dir());
        assert!(leftovers(&out).is_empty());
    }

    #[test]
    fn output_dir_that_is_a_file_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = DocumentAssembler::new(file.path(), OutputFormat::Png)
            .prepare()
            .unwrap_err();
        assert!(matches!(err, FormFillError::OutputWriteFailed { .. }));
    }
}
