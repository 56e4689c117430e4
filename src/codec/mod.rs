//! External collaborators behind narrow call contracts.
//!
//! Transformers only ever talk to the traits in this module. Each trait has
//! one production adapter:
//!
//! | Contract              | Adapter                | Backed by              |
//! |-----------------------|------------------------|------------------------|
//! | [`DocumentCodec`]     | [`OfficeCodec`]        | LibreOffice `soffice`  |
//! | [`PdfContentSource`]  | [`PdfiumContentSource`]| pdfium + `pdfplumber`  |
//! | [`DeckFactory`]       | [`PptxDeckFactory`]    | OOXML over `zip`       |
//! | [`PdfPacker`]         | [`LopdfPacker`]        | `lopdf`                |
//! | [`SpreadsheetWriter`] | [`XlsxWriter`]         | `rust_xlsxwriter`      |
//! | [`TableOcr`]          | [`TesseractOcr`]       | `tesseract` CLI        |
//! | [`PageSubsetter`]     | [`LopdfSubsetter`]     | `lopdf`                |
//!
//! All calls are blocking and run on the blocking thread pool.

pub mod office;
pub mod ocr;
pub(crate) mod ooxml;
pub mod packer;
pub mod pdfium;
pub mod plumber;
pub mod pptx;
pub mod subset;
pub mod xlsx;

pub use office::{OfficeCodec, OfficeTarget};
pub use ocr::TesseractOcr;
pub use packer::LopdfPacker;
pub use pdfium::PdfiumContentSource;
pub use pptx::{PptxDeck, PptxDeckFactory};
pub use subset::LopdfSubsetter;
pub use xlsx::XlsxWriter;

use crate::config::{Frame, PageRange, ServiceConfig, SlideTemplate};
use crate::error::CodecError;
use crate::pipeline::layout::PageBox;
use crate::pipeline::tables::Table;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Whole-document format conversion (PDF→DOCX, DOCX→PDF).
pub trait DocumentCodec: Send + Sync {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), CodecError>;
}

/// Everything extracted from one PDF page, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    /// 1-based page number.
    pub number: usize,
    pub text: String,
    pub tables: Vec<Table>,
    /// Encoded image bytes as embedded in the page.
    pub images: Vec<Vec<u8>>,
}

/// Per-page text, tables and images of a PDF.
pub trait PdfContentSource: Send + Sync {
    fn extract(&self, pdf: &Path) -> Result<Vec<PageContent>, CodecError>;
}

/// An in-progress slide deck.
pub trait SlideDeck: Send {
    /// Append a blank slide and return its index.
    fn add_slide(&mut self) -> usize;
    fn add_textbox(
        &mut self,
        slide: usize,
        frame: Frame,
        text: &str,
        font_pt: u32,
    ) -> Result<(), CodecError>;
    fn add_table(&mut self, slide: usize, frame: Frame, table: &Table) -> Result<(), CodecError>;
    /// Place PNG bytes stretched to `frame`.
    fn add_picture(&mut self, slide: usize, frame: Frame, png: &[u8]) -> Result<(), CodecError>;
    fn slide_count(&self) -> usize;
    fn save(&mut self, path: &Path) -> Result<(), CodecError>;
}

/// Creates empty decks sized by a slide template.
pub trait DeckFactory: Send + Sync {
    fn new_deck(&self, template: &SlideTemplate) -> Box<dyn SlideDeck>;
}

/// Packs images, one per page, into a single PDF.
pub trait PdfPacker: Send + Sync {
    fn pack(&self, images: &[PathBuf], page: PageBox, output: &Path) -> Result<(), CodecError>;
}

/// One worksheet of a workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Writes a workbook of one or more sheets.
pub trait SpreadsheetWriter: Send + Sync {
    fn write(&self, sheets: &[Sheet], output: &Path) -> Result<(), CodecError>;
}

/// Recovers tables from a raster image.
pub trait TableOcr: Send + Sync {
    fn extract_tables(&self, image: &Path) -> Result<Vec<Table>, CodecError>;
}

/// Copies a page range of a PDF into a new PDF.
pub trait PageSubsetter: Send + Sync {
    fn subset(&self, input: &Path, range: PageRange, output: &Path) -> Result<(), CodecError>;
}

/// The full set of collaborators a transformer may call.
#[derive(Clone)]
pub struct Collaborators {
    pub pdf_to_docx: Arc<dyn DocumentCodec>,
    pub docx_to_pdf: Arc<dyn DocumentCodec>,
    pub pdf_content: Arc<dyn PdfContentSource>,
    pub decks: Arc<dyn DeckFactory>,
    pub packer: Arc<dyn PdfPacker>,
    pub spreadsheets: Arc<dyn SpreadsheetWriter>,
    pub ocr: Arc<dyn TableOcr>,
    pub subsetter: Arc<dyn PageSubsetter>,
}

impl Collaborators {
    /// Production adapters. Nothing external is probed here; a missing
    /// binary or library surfaces when a conversion first needs it.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            pdf_to_docx: Arc::new(OfficeCodec::new(&config.soffice_bin, OfficeTarget::Docx)),
            docx_to_pdf: Arc::new(OfficeCodec::new(&config.soffice_bin, OfficeTarget::Pdf)),
            pdf_content: Arc::new(PdfiumContentSource::new(config.pdfium_lib_dir.clone())),
            decks: Arc::new(PptxDeckFactory),
            packer: Arc::new(LopdfPacker),
            spreadsheets: Arc::new(XlsxWriter),
            ocr: Arc::new(TesseractOcr::new(
                &config.tesseract_bin,
                &config.tesseract_lang,
            )),
            subsetter: Arc::new(LopdfSubsetter),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
