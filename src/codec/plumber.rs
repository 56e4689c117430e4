//! Ruled-table detection through pdfplumber.
//!
//! pdfium reports text runs but no table structure. pdfplumber rebuilds
//! tables from the ruling lines and rectangles drawn on each page and places
//! the characters it finds inside every cell.

use crate::error::CodecError;
use crate::pipeline::tables::Table;
use pdfplumber::{Pdf, TableSettings};
use std::path::Path;
use tracing::debug;

/// Tables of every page, indexed by 0-based page number.
pub fn page_tables(pdf: &Path) -> Result<Vec<Vec<Table>>, CodecError> {
    let document = Pdf::open_file(pdf, None).map_err(|e| CodecError::Pdf(e.to_string()))?;
    let settings = TableSettings::default();

    let mut pages = Vec::with_capacity(document.page_count());
    for (index, page) in document.pages_iter().enumerate() {
        let page = page.map_err(|e| CodecError::PageContent {
            page: index + 1,
            detail: format!("tables: {e}"),
        })?;
        let tables: Vec<Table> = page
            .find_tables(&settings)
            .iter()
            .map(|found| {
                table_from_cells(
                    found
                        .rows
                        .iter()
                        .map(|row| row.iter().map(|cell| cell.text.as_deref())),
                )
            })
            .filter(|t| !t.is_empty())
            .collect();
        debug!(page = index + 1, tables = tables.len(), "ruled tables detected");
        pages.push(tables);
    }
    Ok(pages)
}

/// Grid of trimmed cell strings; cells without text become empty strings.
fn table_from_cells<'a, R, C>(rows: R) -> Table
where
    R: IntoIterator<Item = C>,
    C: IntoIterator<Item = Option<&'a str>>,
{
    Table::new(
        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|text| text.map(str::trim).unwrap_or_default().to_string())
                    .collect()
            })
            .collect(),
    )
}
