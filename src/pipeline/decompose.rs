//! PDF content decomposition for slide generation.
//!
//! Each page becomes zero or more [`SlideAssignment`]s, one per content unit,
//! in the fixed order text → tables → images. Pages are visited in order, so
//! the resulting sequence is fully determined by the extracted content.

use crate::codec::{PageContent, PdfContentSource};
use crate::config::{Frame, SlideTemplate};
use crate::error::{CodecError, ConvertError};
use crate::job::ConversionKind;
use crate::pipeline::tables::Table;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// A decoded page image, re-encoded as PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One classified piece of page content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentUnit {
    TextBlock(String),
    Table(Table),
    Image(PngImage),
}

impl ContentUnit {
    pub fn label(&self) -> &'static str {
        match self {
            ContentUnit::TextBlock(_) => "text",
            ContentUnit::Table(_) => "table",
            ContentUnit::Image(_) => "image",
        }
    }
}

/// One content unit placed on its own slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideAssignment {
    /// 0-based slide index in the output deck.
    pub slide: usize,
    /// 1-based source page.
    pub page: usize,
    pub frame: Frame,
    pub unit: ContentUnit,
}

/// Extract `pdf` through `source` and assign every content unit a slide.
pub fn decompose(
    source: &dyn PdfContentSource,
    pdf: &Path,
    template: &SlideTemplate,
) -> Result<Vec<SlideAssignment>, ConvertError> {
    let pages = source.extract(pdf).map_err(|e| match e {
        CodecError::PageContent { page, detail } => {
            ConvertError::ContentExtraction { page, detail }
        }
        other => ConvertError::Conversion {
            kind: ConversionKind::PdfToPptx,
            message: other.to_string(),
        },
    })?;

    let mut assignments = Vec::new();
    for page in &pages {
        for unit in page_units(page)? {
            let frame = match unit {
                ContentUnit::TextBlock(_) => template.text_frame,
                ContentUnit::Table(_) => template.table_frame,
                ContentUnit::Image(_) => template.image_frame,
            };
            assignments.push(SlideAssignment {
                slide: assignments.len(),
                page: page.number,
                frame,
                unit,
            });
        }
    }
    info!(
        pages = pages.len(),
        slides = assignments.len(),
        "PDF decomposed"
    );
    Ok(assignments)
}

/// Content units of one page, text first, then tables, then images.
///
/// An image that cannot be decoded fails the page.
fn page_units(page: &PageContent) -> Result<Vec<ContentUnit>, ConvertError> {
    let mut units = Vec::new();

    let text = page.text.trim();
    if !text.is_empty() {
        units.push(ContentUnit::TextBlock(text.to_string()));
    }

    for table in &page.tables {
        if table.is_empty() {
            debug!(page = page.number, "skipping empty table");
            continue;
        }
        units.push(ContentUnit::Table(table.clone()));
    }

    for (index, raw) in page.images.iter().enumerate() {
        let png = reencode_png(raw).map_err(|detail| ConvertError::ContentExtraction {
            page: page.number,
            detail: format!("image {}: {detail}", index + 1),
        })?;
        units.push(ContentUnit::Image(png));
    }

    debug!(page = page.number, units = units.len(), "page decomposed");
    Ok(units)
}

fn reencode_png(raw: &[u8]) -> Result<PngImage, String> {
    let img = image::load_from_memory(raw).map_err(|e| e.to_string())?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(PngImage {
        bytes: out.into_inner(),
        width: img.width(),
        height: img.height(),
    })
}
