//! Workbook writer on `rust_xlsxwriter`: one worksheet per table.

use super::{Sheet, SpreadsheetWriter};
use crate::error::CodecError;
use rust_xlsxwriter::Workbook;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Sheet names are limited to 31 characters and may not contain `[]:*?/\`.
const MAX_SHEET_NAME: usize = 31;

#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxWriter;

impl SpreadsheetWriter for XlsxWriter {
    fn write(&self, sheets: &[Sheet], output: &Path) -> Result<(), CodecError> {
        if sheets.is_empty() {
            return Err(CodecError::Package("workbook needs at least one sheet".into()));
        }

        let mut workbook = Workbook::new();
        for (sheet, name) in sheets.iter().zip(sheet_names(sheets)) {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(name)?;
            for (r, row) in sheet.rows.iter().enumerate() {
                let r = u32::try_from(r).map_err(|_| too_large(&sheet.name))?;
                for (c, cell) in row.iter().enumerate() {
                    if cell.is_empty() {
                        continue;
                    }
                    let c = u16::try_from(c).map_err(|_| too_large(&sheet.name))?;
                    worksheet.write_string(r, c, cell)?;
                }
            }
        }
        workbook.save(output)?;
        debug!(path = %output.display(), sheets = sheets.len(), "xlsx written");
        Ok(())
    }
}

fn too_large(sheet: &str) -> CodecError {
    CodecError::Package(format!("sheet '{sheet}' exceeds the worksheet grid"))
}

/// Valid, unique sheet names in sheet order.
fn sheet_names(sheets: &[Sheet]) -> Vec<String> {
    let mut seen = HashSet::new();
    sheets
        .iter()
        .enumerate()
        .map(|(i, sheet)| {
            let cleaned: String = sheet
                .name
                .chars()
                .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
                .take(MAX_SHEET_NAME)
                .collect();
            let cleaned = cleaned.trim_matches('\'').to_string();
            let mut name = if cleaned.trim().is_empty() {
                format!("Sheet{}", i + 1)
            } else {
                cleaned
            };
            if !seen.insert(name.to_lowercase()) {
                name = format!("Sheet{}", i + 1);
                seen.insert(name.to_lowercase());
            }
            name
        })
        .collect()
}
