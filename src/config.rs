//! Configuration types for form filling.
//!
//! All run behaviour is controlled through [`FillConfig`], built via its
//! [`FillConfigBuilder`]. Every heuristic threshold the pipeline uses
//! (cell geometry, ink density, label search window, font fitting) lives in
//! one of the nested config structs below with a documented default, so a
//! run on an unusual form can be tuned without touching code.

use crate::error::FormFillError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Native PDF resolution; `render_scale = dpi / PDF_NATIVE_DPI`.
pub const PDF_NATIVE_DPI: f32 = 72.0;

/// Default Ollama-compatible generate endpoint.
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:11434/api/generate";

/// Default model requested from the generate endpoint.
pub const DEFAULT_MODEL: &str = "llama3";

/// Default model when a hosted provider is selected.
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4.1-nano";

/// Largest accepted overlay font size, in pixels.
pub const MAX_FONT_SIZE: f32 = 512.0;

/// Configuration for a form-filling run.
///
/// # Example
/// ```rust
/// use edgequake_formfill::FillConfig;
///
/// let config = FillConfig::builder()
///     .render_scale(2.0)
///     .model("llama3")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct FillConfig {
    /// Pixels per PDF point used when rasterising. Default: 2.0 (144 dpi).
    ///
    /// All pixel thresholds below are calibrated for the default; scale them
    /// proportionally when rendering at a very different resolution.
    pub render_scale: f32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    pub detection: DetectionConfig,
    pub emptiness: EmptinessConfig,
    pub label: LabelConfig,
    pub overlay: OverlayConfig,

    /// Image format of the per-page artifacts. Default: PNG.
    pub output_format: OutputFormat,

    /// Also write `{stem}_fields.json` next to the pages. Default: true.
    pub write_report: bool,

    /// Generate endpoint URL. Default: [`DEFAULT_ENDPOINT_URL`].
    pub endpoint_url: String,

    /// Model identifier. If None, [`DEFAULT_MODEL`] for the generate endpoint
    /// or [`DEFAULT_PROVIDER_MODEL`] for a hosted provider.
    pub model: Option<String>,

    /// Hosted provider name (e.g. "openai", "anthropic"). When set, answers go
    /// through `edgequake-llm` instead of the generate endpoint.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens generated per answer (hosted providers). Default: 256.
    pub max_tokens: usize,

    /// Per-request timeout in seconds. Default: none (transport default).
    pub api_timeout_secs: Option<u64>,

    /// Custom prompt template; must contain `{label}` and `{context}`.
    pub prompt_template: Option<String>,

    /// Overlay font. Default: first match in [`crate::pipeline::overlay::FONT_CANDIDATES`].
    pub font_path: Option<PathBuf>,

    /// Path or name of the tesseract executable. Default: "tesseract".
    pub tesseract_path: String,

    /// Tesseract language code(s). Default: "eng".
    pub ocr_language: String,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            render_scale: 2.0,
            password: None,
            detection: DetectionConfig::default(),
            emptiness: EmptinessConfig::default(),
            label: LabelConfig::default(),
            overlay: OverlayConfig::default(),
            output_format: OutputFormat::default(),
            write_report: true,
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 256,
            api_timeout_secs: None,
            prompt_template: None,
            font_path: None,
            tesseract_path: "tesseract".to_string(),
            ocr_language: "eng".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for FillConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillConfig")
            .field("render_scale", &self.render_scale)
            .field("detection", &self.detection)
            .field("emptiness", &self.emptiness)
            .field("label", &self.label)
            .field("overlay", &self.overlay)
            .field("output_format", &self.output_format)
            .field("write_report", &self.write_report)
            .field("endpoint_url", &self.endpoint_url)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("font_path", &self.font_path)
            .field("tesseract_path", &self.tesseract_path)
            .field("ocr_language", &self.ocr_language)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn FillProgressCallback>"),
            )
            .finish()
    }
}

impl FillConfig {
    /// Create a new builder for `FillConfig`.
    pub fn builder() -> FillConfigBuilder {
        FillConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`FillConfig`].
#[derive(Debug)]
pub struct FillConfigBuilder {
    config: FillConfig,
}

impl FillConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    /// Convenience: set the render scale from a target DPI.
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.render_scale = dpi as f32 / PDF_NATIVE_DPI;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn detection(mut self, detection: DetectionConfig) -> Self {
        self.config.detection = detection;
        self
    }

    pub fn emptiness(mut self, emptiness: EmptinessConfig) -> Self {
        self.config.emptiness = emptiness;
        self
    }

    pub fn label(mut self, label: LabelConfig) -> Self {
        self.config.label = label;
        self
    }

    pub fn overlay(mut self, overlay: OverlayConfig) -> Self {
        self.config.overlay = overlay;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn write_report(mut self, v: bool) -> Self {
        self.config.write_report = v;
        self
    }

    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<String>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FillConfig, FormFillError> {
        let c = &self.config;
        if !(c.render_scale.is_finite() && c.render_scale > 0.0 && c.render_scale <= 8.0) {
            return Err(FormFillError::InvalidConfig(format!(
                "render scale must be in (0, 8], got {}",
                c.render_scale
            )));
        }
        c.detection.validate()?;
        c.emptiness.validate()?;
        c.overlay.validate()?;
        if c.endpoint_url.trim().is_empty() {
            return Err(FormFillError::InvalidConfig(
                "endpoint URL must not be empty".into(),
            ));
        }
        if let Some(ref template) = c.prompt_template {
            crate::prompts::validate_template(template)?;
        }
        Ok(self.config)
    }
}

// ── Stage configs ────────────────────────────────────────────────────────

/// Geometry filters for [`crate::pipeline::detect::ContourCellDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Pixels with luma below this are ink. Default: 180.
    pub binarize_threshold: u8,
    /// Grow ink by one pixel before tracing so dashed or antialiased box
    /// outlines form one contour. Default: true.
    pub dilate: bool,
    /// Minimum bounding-box area in px². Default: 1500.
    pub min_area: u64,
    /// Maximum area as a fraction of the page; rejects page borders. Default: 0.5.
    pub max_area_fraction: f32,
    /// Default: 40 px.
    pub min_width: u32,
    /// Default: 16 px.
    pub min_height: u32,
    /// Minimum width ÷ height. Default: 0.5.
    pub min_aspect: f32,
    /// Maximum width ÷ height. Default: 40.0.
    pub max_aspect: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            binarize_threshold: 180,
            dilate: true,
            min_area: 1500,
            max_area_fraction: 0.5,
            min_width: 40,
            min_height: 16,
            min_aspect: 0.5,
            max_aspect: 40.0,
        }
    }
}

impl DetectionConfig {
    fn validate(&self) -> Result<(), FormFillError> {
        if !(self.max_area_fraction > 0.0 && self.max_area_fraction <= 1.0) {
            return Err(FormFillError::InvalidConfig(format!(
                "max_area_fraction must be in (0, 1], got {}",
                self.max_area_fraction
            )));
        }
        if !(self.min_aspect > 0.0 && self.min_aspect <= self.max_aspect) {
            return Err(FormFillError::InvalidConfig(format!(
                "aspect bounds must satisfy 0 < min ≤ max, got {}..{}",
                self.min_aspect, self.max_aspect
            )));
        }
        Ok(())
    }
}

/// Ink-density thresholds for [`crate::pipeline::classify::InkDensityClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmptinessConfig {
    /// Pixels with luma below this are ink. Default: 128.
    pub ink_threshold: u8,
    /// A cell is empty when its ink fraction is below this. Default: 0.01.
    pub max_ink_fraction: f32,
    /// Pixels ignored on each side so the box outline is not counted. Default: 4.
    pub inset: u32,
}

impl Default for EmptinessConfig {
    fn default() -> Self {
        Self {
            ink_threshold: 128,
            max_ink_fraction: 0.01,
            inset: 4,
        }
    }
}

impl EmptinessConfig {
    fn validate(&self) -> Result<(), FormFillError> {
        if !(0.0..=1.0).contains(&self.max_ink_fraction) {
            return Err(FormFillError::InvalidConfig(format!(
                "max_ink_fraction must be in [0, 1], got {}",
                self.max_ink_fraction
            )));
        }
        Ok(())
    }
}

/// Label search window for [`crate::pipeline::label::LabelExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Widest strip searched to the left of a cell. Default: 500 px.
    pub max_width: u32,
    /// Tallest strip searched above a cell. Default: 60 px.
    pub max_height: u32,
    /// Pixels skipped between the strip and the cell outline. Default: 2.
    pub gap: u32,
    /// A left strip narrower than this is not worth OCR-ing. Default: 30 px.
    pub min_width: u32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            max_width: 500,
            max_height: 60,
            gap: 2,
            min_width: 30,
        }
    }
}

/// Font fitting for [`crate::pipeline::overlay::OverlayRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// First size tried, in px. Default: 28.0.
    pub preferred_font_size: f32,
    /// Smallest size tried; used even if it overflows. Default: 8.0.
    pub min_font_size: f32,
    /// Decrement per attempt. Default: 2.0.
    pub shrink_step: f32,
    /// Margin kept clear inside the cell on every side. Default: 4 px.
    pub inset: u32,
    /// RGBA text colour. Default: dark blue.
    pub color: [u8; 4],
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            preferred_font_size: 28.0,
            min_font_size: 8.0,
            shrink_step: 2.0,
            inset: 4,
            color: [0, 0, 160, 255],
        }
    }
}

impl OverlayConfig {
    fn validate(&self) -> Result<(), FormFillError> {
        if !self.preferred_font_size.is_finite() || self.preferred_font_size > MAX_FONT_SIZE {
            return Err(FormFillError::InvalidConfig(format!(
                "preferred_font_size must be finite and ≤ {MAX_FONT_SIZE}, got {}",
                self.preferred_font_size
            )));
        }
        if !(self.min_font_size > 0.0 && self.min_font_size <= self.preferred_font_size) {
            return Err(FormFillError::InvalidConfig(format!(
                "font sizes must satisfy 0 < min ≤ preferred, got {}..{}",
                self.min_font_size, self.preferred_font_size
            )));
        }
        if !(self.shrink_step > 0.0 && self.shrink_step.is_finite()) {
            return Err(FormFillError::InvalidConfig(format!(
                "shrink_step must be > 0, got {}",
                self.shrink_step
            )));
        }
        Ok(())
    }
}

/// Encoding of the per-page artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Lossless; keeps thin glyph strokes crisp. (default)
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = FillConfig::builder().build().expect("defaults are valid");
        assert_eq!(config.render_scale, 2.0);
        assert_eq!(config.endpoint_url, DEFAULT_ENDPOINT_URL);
        assert!(config.api_timeout_secs.is_none());
    }

    #[test]
    fn dpi_maps_to_scale() {
        let config = FillConfig::builder().dpi(216).build().unwrap();
        assert!((config.render_scale - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_zero_scale() {
        assert!(FillConfig::builder().render_scale(0.0).build().is_err());
    }

    #[test]
    fn rejects_inverted_font_range() {
        let overlay = OverlayConfig {
            preferred_font_size: 6.0,
            min_font_size: 10.0,
            ..OverlayConfig::default()
        };
        assert!(FillConfig::builder().overlay(overlay).build().is_err());
    }

    #[test]
    fn rejects_huge_or_non_finite_font_sizes() {
        for preferred in [1.0e9, f32::INFINITY, f32::NAN, MAX_FONT_SIZE + 1.0] {
            let overlay = OverlayConfig {
                preferred_font_size: preferred,
                ..OverlayConfig::default()
            };
            assert!(
                FillConfig::builder().overlay(overlay).build().is_err(),
                "accepted preferred_font_size={preferred}"
            );
        }
        let overlay = OverlayConfig {
            preferred_font_size: MAX_FONT_SIZE,
            ..OverlayConfig::default()
        };
        assert!(FillConfig::builder().overlay(overlay).build().is_ok());
    }

    #[test]
    fn rejects_template_without_placeholders() {
        let err = FillConfig::builder()
            .prompt_template("Answer: {label}")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("{context}"), "got: {err}");
    }

    #[test]
    fn output_format_extension() {
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
    }
}
