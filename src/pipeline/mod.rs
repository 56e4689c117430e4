//! In-process pipeline stages.
//!
//! ```text
//! PdfToPptx:   pdf ──▶ codec::PdfContentSource ──▶ decompose ──▶ SlideDeck
//! PdfToExcel:  pdf ──▶ codec::PdfContentSource ──▶ tables ──▶ SpreadsheetWriter
//! ImagesToPdf: images ──▶ normalize ──▶ layout ──▶ PdfPacker
//! ```
//!
//! 1. [`tables`]    : text-grid table detection over page text
//! 2. [`decompose`] : page content → ordered slide assignments
//! 3. [`normalize`] : raster bytes → canonical PNG, with pass-through fallback
//! 4. [`layout`]    : page box per orientation, image fit within it

pub mod decompose;
pub mod layout;
pub mod normalize;
pub mod tables;
