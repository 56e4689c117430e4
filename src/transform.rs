//! Format transformers: one per conversion kind.
//!
//! A transformer marshals a job's staged inputs into the shape its codec
//! expects, invokes the codec, and hands back the output as a
//! [`StagedFile`]. The output is acquired through [`produce`], which releases
//! it again if the codec fails or leaves it empty, so a failed transform
//! never leaves a half-written artifact behind.
//!
//! Transformers are blocking and are only ever called from the blocking
//! thread pool.

use crate::codec::{
    Collaborators, DeckFactory, DocumentCodec, PageSubsetter, PdfContentSource, PdfPacker, Sheet,
    SpreadsheetWriter, TableOcr,
};
use crate::config::{PageLayout, ServiceConfig, SlideTemplate};
use crate::error::{CodecError, ConvertError};
use crate::job::{ConversionJob, ConversionKind, ConversionResult};
use crate::pipeline::decompose::{decompose, ContentUnit};
use crate::pipeline::layout::page_box;
use crate::pipeline::tables::Table;
use crate::storage::{FileKind, StagedFile, TransientStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Realizes one conversion kind.
pub trait Transformer: Send + Sync {
    fn kind(&self) -> ConversionKind;

    /// Run the conversion, returning the staged output.
    fn transform(&self, job: &ConversionJob, store: &TransientStore) -> ConversionResult;
}

/// Build the transformer for `kind` from the shared collaborators.
pub fn transformer_for(
    kind: ConversionKind,
    collaborators: &Collaborators,
    config: &ServiceConfig,
) -> Box<dyn Transformer> {
    match kind {
        ConversionKind::PdfToWord => Box::new(PdfToWord {
            subsetter: Arc::clone(&collaborators.subsetter),
            codec: Arc::clone(&collaborators.pdf_to_docx),
        }),
        ConversionKind::WordToPdf => Box::new(WordToPdf {
            codec: Arc::clone(&collaborators.docx_to_pdf),
        }),
        ConversionKind::PdfToPptx => Box::new(PdfToPptx {
            source: Arc::clone(&collaborators.pdf_content),
            decks: Arc::clone(&collaborators.decks),
            template: config.slide_template.clone(),
        }),
        ConversionKind::PdfToExcel => Box::new(PdfToExcel {
            source: Arc::clone(&collaborators.pdf_content),
            writer: Arc::clone(&collaborators.spreadsheets),
        }),
        ConversionKind::ImagesToPdf => Box::new(ImagesToPdf {
            packer: Arc::clone(&collaborators.packer),
            layout: config.page_layout,
        }),
        ConversionKind::ImageToExcelOcr => Box::new(ImageToExcelOcr {
            ocr: Arc::clone(&collaborators.ocr),
            writer: Arc::clone(&collaborators.spreadsheets),
        }),
    }
}

/// Translate a collaborator failure into the error a request ends with.
fn codec_error(kind: ConversionKind) -> impl Fn(CodecError) -> ConvertError {
    move |e| match e {
        CodecError::EmptyPageRange { .. } => ConvertError::InvalidOption {
            field: "page_range".into(),
            reason: e.to_string(),
        },
        CodecError::PageContent { page, detail } => {
            ConvertError::ContentExtraction { page, detail }
        }
        other => ConvertError::Conversion {
            kind,
            message: other.to_string(),
        },
    }
}

/// Acquire the output file, let `write` fill it, and check it is non-empty.
/// On any failure the output is released before the error is returned.
fn produce<F>(kind: ConversionKind, store: &TransientStore, write: F) -> ConversionResult
where
    F: FnOnce(&Path) -> Result<(), ConvertError>,
{
    let mut output = store.acquire(kind.output_kind())?;
    let outcome = write(output.path()).and_then(|()| ensure_written(kind, &output));
    match outcome {
        Ok(bytes) => {
            info!(%kind, bytes, "conversion produced output");
            Ok(output)
        }
        Err(e) => {
            output.release();
            Err(e)
        }
    }
}

fn ensure_written(kind: ConversionKind, output: &StagedFile) -> Result<u64, ConvertError> {
    match output.byte_len()? {
        0 => Err(codec_error(kind)(CodecError::NoOutput {
            path: output.path().to_path_buf(),
        })),
        n => Ok(n),
    }
}

/// Number tables as worksheets `Table 1`, `Table 2`, … skipping empty ones.
fn table_sheets<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Vec<Sheet> {
    tables
        .into_iter()
        .filter(|t| !t.is_empty())
        .enumerate()
        .map(|(i, t)| Sheet {
            name: format!("Table {}", i + 1),
            rows: t.rectangular(),
        })
        .collect()
}

// ── PDF → Word ───────────────────────────────────────────────────────────

pub struct PdfToWord {
    subsetter: Arc<dyn PageSubsetter>,
    codec: Arc<dyn DocumentCodec>,
}

impl Transformer for PdfToWord {
    fn kind(&self) -> ConversionKind {
        ConversionKind::PdfToWord
    }

    fn transform(&self, job: &ConversionJob, store: &TransientStore) -> ConversionResult {
        let kind = self.kind();
        let input = job.input()?;
        match job.options().page_range {
            Some(range) => {
                let subset = store.acquire(FileKind::Pdf)?;
                self.subsetter
                    .subset(input.path(), range, subset.path())
                    .map_err(codec_error(kind))?;
                debug!(start = range.start, end = ?range.end, "converting page subset");
                produce(kind, store, |out| {
                    self.codec
                        .convert(subset.path(), out)
                        .map_err(codec_error(kind))
                })
            }
            None => produce(kind, store, |out| {
                self.codec.convert(input.path(), out).map_err(codec_error(kind))
            }),
        }
    }
}

// ── Word → PDF ───────────────────────────────────────────────────────────

pub struct WordToPdf {
    codec: Arc<dyn DocumentCodec>,
}

impl Transformer for WordToPdf {
    fn kind(&self) -> ConversionKind {
        ConversionKind::WordToPdf
    }

    fn transform(&self, job: &ConversionJob, store: &TransientStore) -> ConversionResult {
        let kind = self.kind();
        let input = job.input()?;
        produce(kind, store, |out| {
            self.codec.convert(input.path(), out).map_err(codec_error(kind))
        })
    }
}

// ── PDF → slides ─────────────────────────────────────────────────────────

pub struct PdfToPptx {
    source: Arc<dyn PdfContentSource>,
    decks: Arc<dyn DeckFactory>,
    template: SlideTemplate,
}

impl Transformer for PdfToPptx {
    fn kind(&self) -> ConversionKind {
        ConversionKind::PdfToPptx
    }

    fn transform(&self, job: &ConversionJob, store: &TransientStore) -> ConversionResult {
        let kind = self.kind();
        let input = job.input()?;
        let assignments = decompose(self.source.as_ref(), input.path(), &self.template)?;

        produce(kind, store, |out| {
            let to_error = codec_error(kind);
            let mut deck = self.decks.new_deck(&self.template);
            for assignment in &assignments {
                let slide = deck.add_slide();
                let placed = match &assignment.unit {
                    ContentUnit::TextBlock(text) => deck.add_textbox(
                        slide,
                        assignment.frame,
                        text,
                        self.template.text_font_pt,
                    ),
                    ContentUnit::Table(table) => deck.add_table(slide, assignment.frame, table),
                    ContentUnit::Image(image) => {
                        deck.add_picture(slide, assignment.frame, &image.bytes)
                    }
                };
                placed.map_err(&to_error)?;
            }
            deck.save(out).map_err(&to_error)
        })
    }
}

// ── PDF tables → spreadsheet ─────────────────────────────────────────────

pub struct PdfToExcel {
    source: Arc<dyn PdfContentSource>,
    writer: Arc<dyn SpreadsheetWriter>,
}

impl Transformer for PdfToExcel {
    fn kind(&self) -> ConversionKind {
        ConversionKind::PdfToExcel
    }

    fn transform(&self, job: &ConversionJob, store: &TransientStore) -> ConversionResult {
        let kind = self.kind();
        let input = job.input()?;
        let pages = self
            .source
            .extract(input.path())
            .map_err(codec_error(kind))?;
        let sheets = table_sheets(pages.iter().flat_map(|p| p.tables.iter()));
        if sheets.is_empty() {
            return Err(ConvertError::Conversion {
                kind,
                message: "no tables found".into(),
            });
        }
        produce(kind, store, |out| {
            self.writer.write(&sheets, out).map_err(codec_error(kind))
        })
    }
}

// ── Images → PDF ─────────────────────────────────────────────────────────

pub struct ImagesToPdf {
    packer: Arc<dyn PdfPacker>,
    layout: PageLayout,
}

impl Transformer for ImagesToPdf {
    fn kind(&self) -> ConversionKind {
        ConversionKind::ImagesToPdf
    }

    fn transform(&self, job: &ConversionJob, store: &TransientStore) -> ConversionResult {
        let kind = self.kind();
        let options = job.options();
        let page = page_box(&self.layout, options.orientation);
        debug!(
            orientation = ?options.orientation,
            margin_mm = options.margin_mm,
            width = page.width,
            height = page.height,
            "page box computed"
        );
        let images: Vec<PathBuf> = job.inputs().iter().map(|f| f.path().to_path_buf()).collect();
        produce(kind, store, |out| {
            self.packer.pack(&images, page, out).map_err(codec_error(kind))
        })
    }
}

// ── Image → spreadsheet (OCR) ────────────────────────────────────────────

pub struct ImageToExcelOcr {
    ocr: Arc<dyn TableOcr>,
    writer: Arc<dyn SpreadsheetWriter>,
}

impl Transformer for ImageToExcelOcr {
    fn kind(&self) -> ConversionKind {
        ConversionKind::ImageToExcelOcr
    }

    fn transform(&self, job: &ConversionJob, store: &TransientStore) -> ConversionResult {
        let kind = self.kind();
        let input = job.input()?;
        let tables = self
            .ocr
            .extract_tables(input.path())
            .map_err(codec_error(kind))?;
        let sheets = table_sheets(&tables);
        if sheets.is_empty() {
            return Err(ConvertError::Conversion {
                kind,
                message: "no tables recognised in image".into(),
            });
        }
        produce(kind, store, |out| {
            self.writer.write(&sheets, out).map_err(codec_error(kind))
        })
    }
}
