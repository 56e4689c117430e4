//! Page content extraction through pdfium, with tables from pdfplumber.

use super::plumber::page_tables;
use super::{PageContent, PdfContentSource};
use crate::error::CodecError;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extracts text and embedded images from each page through pdfium and the
/// page's ruled tables through pdfplumber.
///
/// The library is bound on every call, on the calling thread, so a missing
/// pdfium only fails the conversions that need it.
#[derive(Debug, Clone, Default)]
pub struct PdfiumContentSource {
    lib_dir: Option<PathBuf>,
}

impl PdfiumContentSource {
    pub fn new(lib_dir: Option<PathBuf>) -> Self {
        Self { lib_dir }
    }

    fn bind(&self) -> Result<Pdfium, CodecError> {
        let bindings = match &self.lib_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| CodecError::Pdf(format!("pdfium unavailable: {e:?}")))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PdfContentSource for PdfiumContentSource {
    fn extract(&self, pdf: &Path) -> Result<Vec<PageContent>, CodecError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(pdf, None)
            .map_err(|e| CodecError::Pdf(format!("{e:?}")))?;
        let mut tables_by_page = page_tables(pdf)?.into_iter();

        let mut pages = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let number = index + 1;
            let text = page
                .text()
                .map_err(|e| CodecError::PageContent {
                    page: number,
                    detail: format!("text: {e:?}"),
                })?
                .all();

            let mut images = Vec::new();
            for object in page.objects().iter() {
                let Some(image) = object.as_image_object() else {
                    continue;
                };
                let raster = image.get_raw_image().map_err(|e| CodecError::PageContent {
                    page: number,
                    detail: format!("image: {e:?}"),
                })?;
                let mut out = Cursor::new(Vec::new());
                raster.write_to(&mut out, ImageFormat::Png)?;
                images.push(out.into_inner());
            }

            let tables = tables_by_page.next().unwrap_or_default();
            debug!(
                page = number,
                chars = text.len(),
                tables = tables.len(),
                images = images.len(),
                "page extracted"
            );
            pages.push(PageContent {
                number,
                text,
                tables,
                images,
            });
        }
        info!(path = %pdf.display(), pages = pages.len(), "PDF content extracted");
        Ok(pages)
    }
}
