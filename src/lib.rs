//! # docconvert
//!
//! An HTTP service that converts uploaded documents between PDF, Word,
//! slide-deck, spreadsheet and image formats.
//!
//! ## Request lifecycle
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Validate   filename, extension, size (in memory, nothing on disk)
//!  ├─ 2. Stage      uniquely named transient files
//!  ├─ 3. Transform  one external codec per conversion kind (spawn_blocking)
//!  ├─ 4. Read       output bytes into memory
//!  └─ 5. Release    every staged file of the request, on every path
//! ```
//!
//! ## Conversions
//!
//! | Endpoint          | Kind              | Codec                          |
//! |-------------------|-------------------|--------------------------------|
//! | `/pdf_to_word`    | `PdfToWord`       | LibreOffice, optional page range |
//! | `/word_to_pdf`    | `WordToPdf`       | LibreOffice                    |
//! | `/pdf_to_pptx`    | `PdfToPptx`       | pdfium + decomposer + PPTX writer |
//! | `/pdf_to_excel`   | `PdfToExcel`      | pdfplumber ruled tables + XLSX writer |
//! | `/image_to_pdf`   | `ImagesToPdf`     | normalizer + lopdf packer      |
//! | `/image_to_excel` | `ImageToExcelOcr` | tesseract + XLSX writer        |
//!
//! ## Library use
//!
//! ```rust,no_run
//! use docconvert::{Orchestrator, ServiceConfig, UploadedArtifact};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().build()?;
//!     let orchestrator = Orchestrator::new(config)?;
//!     let pdf = std::fs::read("slides.pdf")?;
//!     let output = orchestrator
//!         .pdf_to_pptx(Some(UploadedArtifact::new("slides.pdf", pdf)))
//!         .await?;
//!     std::fs::write(output.filename(), &output.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docconvert` server binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod codec;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod transform;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use codec::Collaborators;
pub use config::{
    AllowedExtensions, Frame, Orientation, PageLayout, PageRange, ServiceConfig,
    ServiceConfigBuilder, SlideTemplate, UploadField,
};
pub use error::{CodecError, ConvertError};
pub use job::{ConversionJob, ConversionKind, ConversionOptions, ConversionResult};
pub use orchestrator::{ConversionOutput, Orchestrator};
pub use server::{build_router, serve, ServerError};
pub use storage::{FileKind, StagedBatch, StagedFile, TransientStore};
pub use transform::{transformer_for, Transformer};
pub use validate::{UploadValidator, UploadedArtifact};
