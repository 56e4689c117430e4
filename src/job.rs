//! Conversion jobs: what one request asks a transformer to do.

use crate::config::{Orientation, PageRange};
use crate::error::ConvertError;
use crate::storage::{release_files, FileKind, StagedFile};
use serde::Serialize;
use std::fmt;

/// One conversion kind per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConversionKind {
    PdfToWord,
    PdfToPptx,
    PdfToExcel,
    ImagesToPdf,
    WordToPdf,
    ImageToExcelOcr,
}

impl ConversionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionKind::PdfToWord => "pdf_to_word",
            ConversionKind::PdfToPptx => "pdf_to_pptx",
            ConversionKind::PdfToExcel => "pdf_to_excel",
            ConversionKind::ImagesToPdf => "images_to_pdf",
            ConversionKind::WordToPdf => "word_to_pdf",
            ConversionKind::ImageToExcelOcr => "image_to_excel_ocr",
        }
    }

    /// Kind of the artifact this conversion produces.
    pub fn output_kind(self) -> FileKind {
        match self {
            ConversionKind::PdfToWord => FileKind::Docx,
            ConversionKind::PdfToPptx => FileKind::Pptx,
            ConversionKind::PdfToExcel | ConversionKind::ImageToExcelOcr => FileKind::Xlsx,
            ConversionKind::ImagesToPdf | ConversionKind::WordToPdf => FileKind::Pdf,
        }
    }

    /// Fixed download filename of the produced artifact.
    pub fn download_name(self) -> &'static str {
        match self.output_kind() {
            FileKind::Doc => "converted.doc",
            FileKind::Docx => "converted.docx",
            FileKind::Pptx => "converted.pptx",
            FileKind::Xlsx => "converted.xlsx",
            FileKind::Pdf => "converted.pdf",
            FileKind::Png => "converted.png",
        }
    }

    pub fn content_disposition(self) -> &'static str {
        match self.output_kind() {
            FileKind::Doc => "attachment; filename=\"converted.doc\"",
            FileKind::Docx => "attachment; filename=\"converted.docx\"",
            FileKind::Pptx => "attachment; filename=\"converted.pptx\"",
            FileKind::Xlsx => "attachment; filename=\"converted.xlsx\"",
            FileKind::Pdf => "attachment; filename=\"converted.pdf\"",
            FileKind::Png => "attachment; filename=\"converted.png\"",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self.output_kind() {
            FileKind::Doc => "application/msword",
            FileKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileKind::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            FileKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            FileKind::Pdf => "application/pdf",
            FileKind::Png => "image/png",
        }
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options recognised across endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversionOptions {
    /// Swaps page width/height for `ImagesToPdf`.
    pub orientation: Orientation,
    /// Page inset in millimetres. Accepted and carried, not yet applied.
    pub margin_mm: u32,
    /// Limits `PdfToWord` to a page subset.
    pub page_range: Option<PageRange>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Portrait,
            margin_mm: 8,
            page_range: None,
        }
    }
}

/// A request's staged inputs plus what to turn them into.
///
/// A job is consumed by exactly one transformer run; the orchestrator moves
/// it into the blocking task and gets it back only to release its inputs.
#[derive(Debug)]
pub struct ConversionJob {
    kind: ConversionKind,
    inputs: Vec<StagedFile>,
    options: ConversionOptions,
}

impl ConversionJob {
    pub fn new(kind: ConversionKind, inputs: Vec<StagedFile>, options: ConversionOptions) -> Self {
        Self {
            kind,
            inputs,
            options,
        }
    }

    pub fn kind(&self) -> ConversionKind {
        self.kind
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn inputs(&self) -> &[StagedFile] {
        &self.inputs
    }

    /// The single input of a one-file job.
    pub fn input(&self) -> Result<&StagedFile, ConvertError> {
        match self.inputs.as_slice() {
            [only] => Ok(only),
            other => Err(ConvertError::Internal(format!(
                "{} expects exactly one input, got {}",
                self.kind,
                other.len()
            ))),
        }
    }

    /// Release every staged input concurrently.
    pub async fn release(self) {
        release_files(self.inputs).await;
    }
}

/// Outcome of one transformer run.
pub type ConversionResult = Result<StagedFile, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_names_per_kind() {
        assert_eq!(ConversionKind::PdfToWord.download_name(), "converted.docx");
        assert_eq!(ConversionKind::WordToPdf.download_name(), "converted.pdf");
        assert_eq!(ConversionKind::ImagesToPdf.download_name(), "converted.pdf");
        assert_eq!(ConversionKind::PdfToPptx.download_name(), "converted.pptx");
        assert_eq!(ConversionKind::PdfToExcel.download_name(), "converted.xlsx");
        assert_eq!(ConversionKind::ImageToExcelOcr.download_name(), "converted.xlsx");
    }

    #[test]
    fn disposition_names_the_download() {
        for kind in [
            ConversionKind::PdfToWord,
            ConversionKind::PdfToPptx,
            ConversionKind::PdfToExcel,
            ConversionKind::ImagesToPdf,
            ConversionKind::WordToPdf,
            ConversionKind::ImageToExcelOcr,
        ] {
            assert!(kind.content_disposition().contains(kind.download_name()));
        }
    }

    #[test]
    fn default_options() {
        let o = ConversionOptions::default();
        assert_eq!(o.orientation, Orientation::Portrait);
        assert_eq!(o.margin_mm, 8);
        assert!(o.page_range.is_none());
    }
}
