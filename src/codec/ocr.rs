//! Table recovery from images with the `tesseract` CLI.

use super::office::run;
use super::TableOcr;
use crate::error::CodecError;
use crate::pipeline::tables::Table;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Runs `tesseract <image> stdout -l <lang> tsv` and rebuilds tables from the
/// word boxes.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    program: String,
    lang: String,
}

impl TesseractOcr {
    pub fn new(program: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            lang: lang.into(),
        }
    }
}

impl TableOcr for TesseractOcr {
    fn extract_tables(&self, image: &Path) -> Result<Vec<Table>, CodecError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(image).arg("stdout").arg("-l").arg(&self.lang).arg("tsv");
        debug!(program = %self.program, image = %image.display(), "running OCR");
        let stdout = run(&mut cmd, &self.program)?;
        let tables = tables_from_tsv(&String::from_utf8_lossy(&stdout));
        info!(tables = tables.len(), "OCR finished");
        Ok(tables)
    }
}

#[derive(Debug, Clone)]
struct Word {
    block: u32,
    par: u32,
    line: u32,
    left: i64,
    width: i64,
    height: i64,
    text: String,
}

fn parse_word(line: &str) -> Option<Word> {
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() < 12 || cols[0] != "5" {
        return None;
    }
    let text = cols[11..].join("\t").trim().to_string();
    if text.is_empty() {
        return None;
    }
    Some(Word {
        block: cols[2].parse().ok()?,
        par: cols[3].parse().ok()?,
        line: cols[4].parse().ok()?,
        left: cols[6].parse().ok()?,
        width: cols[8].parse().ok()?,
        height: cols[9].parse().ok()?,
        text,
    })
}

/// Rebuild tables from tesseract TSV output.
///
/// Words sharing (block, paragraph, line) form a row. Within a row a new cell
/// starts wherever the gap to the previous word exceeds twice the median word
/// height. Each block with at least one row is one table.
pub fn tables_from_tsv(tsv: &str) -> Vec<Table> {
    let words: Vec<Word> = tsv.lines().filter_map(parse_word).collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut heights: Vec<i64> = words.iter().map(|w| w.height).collect();
    heights.sort_unstable();
    let gap_threshold = 2 * heights[heights.len() / 2];

    let mut tables: Vec<Table> = Vec::new();
    let mut current_block = None;
    let mut start = 0;
    while start < words.len() {
        let key = (words[start].block, words[start].par, words[start].line);
        let end = words[start..]
            .iter()
            .position(|w| (w.block, w.par, w.line) != key)
            .map_or(words.len(), |n| start + n);
        let mut line: Vec<&Word> = words[start..end].iter().collect();
        line.sort_by_key(|w| w.left);

        let mut row: Vec<String> = Vec::new();
        let mut prev_right: Option<i64> = None;
        for word in line {
            match prev_right {
                Some(right) if word.left - right <= gap_threshold => {
                    if let Some(cell) = row.last_mut() {
                        cell.push(' ');
                        cell.push_str(&word.text);
                    }
                }
                _ => row.push(word.text.clone()),
            }
            prev_right = Some(word.left + word.width);
        }

        if current_block != Some(key.0) {
            tables.push(Table::default());
            current_block = Some(key.0);
        }
        if let Some(table) = tables.last_mut() {
            table.rows.push(row);
        }
        start = end;
    }
    tables.retain(|t| !t.is_empty());
    tables
}
