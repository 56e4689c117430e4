//! Service configuration.
//!
//! All process-wide settings live in [`ServiceConfig`], built via its
//! [`ServiceConfigBuilder`] once at startup and then shared read-only behind
//! an `Arc`. Size ceilings and allowed-extension sets are passed into the
//! upload validator from here, and the fixed slide/page geometry used by the
//! decomposer and the page layout engine is modelled as [`SlideTemplate`] and
//! [`PageLayout`] so layout policy can change without touching extraction.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default request ceiling: 10 MiB.
pub const DEFAULT_MAX_REQUEST_BYTES: u64 = 10 * 1024 * 1024;

/// English Metric Units per inch, the unit of DrawingML geometry.
pub const EMU_PER_INCH: i64 = 914_400;

/// PostScript points per millimetre.
pub const POINTS_PER_MM: f32 = 72.0 / 25.4;

/// Configuration for the conversion service.
///
/// # Example
/// ```rust
/// use docconvert::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .listen_addr("127.0.0.1:8080")
///     .max_request_bytes(4 * 1024 * 1024)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_request_bytes, 4 * 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Socket address the HTTP server binds. Default: `0.0.0.0:5000`.
    pub listen_addr: String,

    /// Ceiling on one request's upload payload(s), in bytes. Default: 10 MiB.
    ///
    /// Applies to the single file of single-upload endpoints and to the
    /// running total of a multi-image batch.
    pub max_request_bytes: u64,

    /// Accepted filename extensions per upload field.
    pub allowed_extensions: AllowedExtensions,

    /// Root directory for staged files. Default: `<os temp dir>/docconvert`.
    pub storage_dir: Option<PathBuf>,

    /// LibreOffice executable used for PDF↔Word. Default: `soffice`.
    pub soffice_bin: String,

    /// Tesseract executable used for image→spreadsheet OCR. Default: `tesseract`.
    pub tesseract_bin: String,

    /// Tesseract language pack. Default: `eng`.
    pub tesseract_lang: String,

    /// Directory containing the pdfium shared library. When `None` the
    /// system library search path is used.
    pub pdfium_lib_dir: Option<PathBuf>,

    /// Geometry of generated slides.
    pub slide_template: SlideTemplate,

    /// Physical page size for image→PDF packing.
    pub page_layout: PageLayout,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            allowed_extensions: AllowedExtensions::default(),
            storage_dir: None,
            soffice_bin: "soffice".to_string(),
            tesseract_bin: "tesseract".to_string(),
            tesseract_lang: "eng".to_string(),
            pdfium_lib_dir: None,
            slide_template: SlideTemplate::default(),
            page_layout: PageLayout::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory staged files are created in.
    pub fn storage_root(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("docconvert"))
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn max_request_bytes(mut self, bytes: u64) -> Self {
        self.config.max_request_bytes = bytes;
        self
    }

    pub fn allowed_extensions(mut self, allowed: AllowedExtensions) -> Self {
        self.config.allowed_extensions = allowed;
        self
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = Some(dir.into());
        self
    }

    pub fn soffice_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.soffice_bin = bin.into();
        self
    }

    pub fn tesseract_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.tesseract_bin = bin.into();
        self
    }

    pub fn tesseract_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.tesseract_lang = lang.into();
        self
    }

    pub fn pdfium_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_dir = Some(dir.into());
        self
    }

    pub fn slide_template(mut self, template: SlideTemplate) -> Self {
        self.config.slide_template = template;
        self
    }

    pub fn page_layout(mut self, layout: PageLayout) -> Self {
        self.config.page_layout = layout;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ConvertError> {
        let c = &self.config;
        if c.max_request_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "max_request_bytes must be > 0".into(),
            ));
        }
        if c.listen_addr.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "listen address must not be empty".into(),
            ));
        }
        for field in UploadField::ALL {
            if c.allowed_extensions.for_field(field).is_empty() {
                return Err(ConvertError::InvalidConfig(format!(
                    "no allowed extensions for field '{}'",
                    field
                )));
            }
        }
        if !(c.page_layout.width_pt > 0.0 && c.page_layout.height_pt > 0.0) {
            return Err(ConvertError::InvalidConfig(
                "page layout dimensions must be positive".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Upload fields ────────────────────────────────────────────────────────

/// Multipart field names that carry file uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadField {
    Pdf,
    Word,
    Images,
    Image,
}

impl UploadField {
    pub const ALL: [UploadField; 4] = [
        UploadField::Pdf,
        UploadField::Word,
        UploadField::Images,
        UploadField::Image,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UploadField::Pdf => "pdf",
            UploadField::Word => "word",
            UploadField::Images => "images",
            UploadField::Image => "image",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for UploadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lower-case extensions accepted per upload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedExtensions {
    pub pdf: Vec<String>,
    pub word: Vec<String>,
    pub images: Vec<String>,
}

impl Default for AllowedExtensions {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Self {
            pdf: owned(&["pdf"]),
            word: owned(&["doc", "docx"]),
            images: owned(&["png", "jpg", "jpeg", "gif", "bmp"]),
        }
    }
}

impl AllowedExtensions {
    /// Extensions accepted for `field`. `images` and `image` share one set.
    pub fn for_field(&self, field: UploadField) -> &[String] {
        match field {
            UploadField::Pdf => &self.pdf,
            UploadField::Word => &self.word,
            UploadField::Images | UploadField::Image => &self.images,
        }
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────

/// A rectangle on a slide, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl Frame {
    /// Build a frame from inch measurements.
    pub fn inches(left: f64, top: f64, width: f64, height: f64) -> Self {
        let emu = |v: f64| (v * EMU_PER_INCH as f64).round() as i64;
        Self {
            left: emu(left),
            top: emu(top),
            width: emu(width),
            height: emu(height),
        }
    }
}

/// Fixed layout of generated slides: one template per content-unit kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideTemplate {
    /// Slide width in EMU. Default: 10in.
    pub slide_width: i64,
    /// Slide height in EMU. Default: 7.5in.
    pub slide_height: i64,
    /// Text box geometry. Default: (1in, 1in) 8in × 5in.
    pub text_frame: Frame,
    /// Text size in points. Default: 12.
    pub text_font_pt: u32,
    /// Table geometry. Default: (1in, 2in) 8in × 0.8in.
    pub table_frame: Frame,
    /// Picture box; the image is stretched to it. Default: (1in, 1in) 5.5in × 4.5in.
    pub image_frame: Frame,
}

impl Default for SlideTemplate {
    fn default() -> Self {
        Self {
            slide_width: 10 * EMU_PER_INCH,
            slide_height: EMU_PER_INCH * 15 / 2,
            text_frame: Frame::inches(1.0, 1.0, 8.0, 5.0),
            text_font_pt: 12,
            table_frame: Frame::inches(1.0, 2.0, 8.0, 0.8),
            image_frame: Frame::inches(1.0, 1.0, 5.5, 4.5),
        }
    }
}

/// Physical portrait page size used by the page layout engine, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageLayout {
    pub fn from_mm(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width_pt: width_mm * POINTS_PER_MM,
            height_pt: height_mm * POINTS_PER_MM,
        }
    }

    /// ISO A4, 210 mm × 297 mm.
    pub fn a4() -> Self {
        Self::from_mm(210.0, 297.0)
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::a4()
    }
}

// ── Request options ──────────────────────────────────────────────────────

/// Page orientation for image→PDF packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(ConvertError::InvalidOption {
                field: "orientation".into(),
                reason: format!("expected 'portrait' or 'landscape', got '{other}'"),
            }),
        }
    }
}

/// Half-open, 0-indexed page range `[start, end)`. `end = None` runs to the
/// last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl PageRange {
    pub fn new(start: usize, end: Option<usize>) -> Result<Self, ConvertError> {
        if let Some(end) = end {
            if end <= start {
                return Err(ConvertError::InvalidOption {
                    field: "page_range".into(),
                    reason: format!("end ({end}) must be greater than start ({start})"),
                });
            }
        }
        Ok(Self { start, end })
    }

    /// Clamp to a document of `total` pages, returning `(start, end)`.
    pub fn resolve(&self, total: usize) -> (usize, usize) {
        let end = self.end.unwrap_or(total).min(total);
        (self.start.min(end), end)
    }
}
