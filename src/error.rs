//! Error types for the docconvert library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`ConvertError`]: what a request ends with. Validation failures
//!   (missing file, wrong extension, oversized upload, bad option) are
//!   *client* errors and are reported verbatim with HTTP 400. Everything else
//!   (storage, codec, content extraction) is a *server* error: the detail is
//!   logged and the caller only sees a generic message with HTTP 500.
//!
//! * [`CodecError`]: what an external collaborator (office suite, pdfium,
//!   OCR engine, package writer) reports. Transformers translate it into
//!   [`ConvertError::Conversion`] tagged with the conversion kind, except for
//!   per-page content failures which become
//!   [`ConvertError::ContentExtraction`].

use crate::job::ConversionKind;
use std::path::PathBuf;
use thiserror::Error;

/// All errors a conversion request can end with.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Upload validation (HTTP 400) ─────────────────────────────────────
    /// The multipart form has no part for the required upload field.
    #[error("missing upload field '{field}'")]
    MissingField { field: String },

    /// A file part was present but carried no filename (nothing selected).
    #[error("no file selected for field '{field}'")]
    EmptySelection { field: String },

    /// The declared filename's extension is not accepted for this field.
    #[error("file type not allowed: '{filename}' (allowed: {allowed})")]
    UnsupportedType { filename: String, allowed: String },

    /// Payload, or the running total of a batch, exceeds the request ceiling.
    #[error("upload exceeds the size limit of {limit} bytes (got {actual} bytes)")]
    SizeLimitExceeded { limit: u64, actual: u64 },

    /// A form option could not be parsed or is out of range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidOption { field: String, reason: String },

    // ── Job failures (HTTP 500) ──────────────────────────────────────────
    /// Transient storage could not be allocated, written or read.
    #[error("transient storage {op} failed for '{path}': {source}")]
    Storage {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external codec failed or produced no output.
    #[error("{kind} conversion failed: {message}")]
    Conversion {
        kind: ConversionKind,
        message: String,
    },

    /// Decomposing a PDF page into content units failed.
    #[error("content extraction failed on page {page}: {detail}")]
    ContentExtraction { page: usize, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Whether the error was caused by the request itself (HTTP 400) rather
    /// than by the service (HTTP 500).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConvertError::MissingField { .. }
                | ConvertError::EmptySelection { .. }
                | ConvertError::UnsupportedType { .. }
                | ConvertError::SizeLimitExceeded { .. }
                | ConvertError::InvalidOption { .. }
        )
    }

    pub(crate) fn storage(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Storage {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Errors reported by external collaborators.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The external program could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external program ran but exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    Exited {
        program: String,
        status: String,
        stderr: String,
    },

    /// The codec finished without writing anything usable.
    #[error("no output produced at '{path}'")]
    NoOutput { path: PathBuf },

    /// A single page's content could not be extracted.
    #[error("page {page}: {detail}")]
    PageContent { page: usize, detail: String },

    /// The requested page range selects no pages of the document.
    #[error("page range {start}..{end} selects no pages (document has {total})")]
    EmptyPageRange { start: usize, end: usize, total: usize },

    /// PDF parsing or writing failed.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Raster decode/encode failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Writing an OOXML package failed.
    #[error("package error: {0}")]
    Package(String),

    /// Building or saving a workbook failed.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for CodecError {
    fn from(e: zip::result::ZipError) -> Self {
        CodecError::Package(e.to_string())
    }
}

impl From<lopdf::Error> for CodecError {
    fn from(e: lopdf::Error) -> Self {
        CodecError::Pdf(e.to_string())
    }
}
