//! Shared fixtures for the integration tests: in-process stand-ins for the
//! external tools and an orchestrator over a throwaway storage root.

#![allow(dead_code)]

use docconvert::codec::{DocumentCodec, PageContent, PdfContentSource, TableOcr};
use docconvert::pipeline::tables::Table;
use docconvert::{CodecError, Collaborators, Orchestrator, ServiceConfig, TransientStore};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Fake collaborators ───────────────────────────────────────────────────────

/// "Converts" by copying the input verbatim.
pub struct CopyCodec;

impl DocumentCodec for CopyCodec {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), CodecError> {
        std::fs::copy(input, output)?;
        Ok(())
    }
}

/// Copies like [`CopyCodec`] and remembers the extension of every input.
#[derive(Default)]
pub struct RecordingCodec {
    pub seen: Mutex<Vec<String>>,
}

impl RecordingCodec {
    pub fn extensions(&self) -> Vec<String> {
        self.seen.lock().expect("record lock").clone()
    }
}

impl DocumentCodec for RecordingCodec {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), CodecError> {
        let ext = input
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.seen.lock().expect("record lock").push(ext);
        std::fs::copy(input, output)?;
        Ok(())
    }
}

/// Writes a partial output, then fails like a crashed office process.
pub struct FailingCodec;

impl DocumentCodec for FailingCodec {
    fn convert(&self, _input: &Path, output: &Path) -> Result<(), CodecError> {
        std::fs::write(output, b"partial")?;
        Err(CodecError::Exited {
            program: "soffice".into(),
            status: "exit status: 1".into(),
            stderr: "source file could not be loaded".into(),
        })
    }
}

/// Returns the same pages for every PDF.
pub struct FixedPages(pub Vec<PageContent>);

impl PdfContentSource for FixedPages {
    fn extract(&self, _pdf: &Path) -> Result<Vec<PageContent>, CodecError> {
        Ok(self.0.clone())
    }
}

/// Returns the same tables for every image.
pub struct FixedOcr(pub Vec<Table>);

impl TableOcr for FixedOcr {
    fn extract_tables(&self, _image: &Path) -> Result<Vec<Table>, CodecError> {
        Ok(self.0.clone())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub const TEST_LIMIT: u64 = 64 * 1024;

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub store: TransientStore,
    _dir: TempDir,
}

impl Harness {
    /// Staged files left under the storage root.
    pub fn leftovers(&self) -> usize {
        self.store.staged_count()
    }
}

/// Orchestrator over a fresh storage root, production collaborators patched
/// by `patch`.
pub fn harness_with(limit: u64, patch: impl FnOnce(&mut Collaborators)) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ServiceConfig::builder()
        .storage_dir(dir.path())
        .max_request_bytes(limit)
        .build()
        .expect("valid config");
    let store = TransientStore::new(config.storage_root()).expect("store");
    let mut collaborators = Collaborators::from_config(&config);
    collaborators.pdf_to_docx = Arc::new(CopyCodec);
    collaborators.docx_to_pdf = Arc::new(CopyCodec);
    patch(&mut collaborators);
    let orchestrator = Orchestrator::with_parts(Arc::new(config), store.clone(), collaborators);
    Harness {
        orchestrator: Arc::new(orchestrator),
        store,
        _dir: dir,
    }
}

pub fn harness() -> Harness {
    harness_with(TEST_LIMIT, |_| {})
}

// ── Payloads ─────────────────────────────────────────────────────────────────

pub fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 120, 200])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).expect("encode test image");
    out.into_inner()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    image_bytes(width, height, ImageFormat::Png)
}

/// A PNG cut off halfway through its image data.
pub fn truncated_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = png(width, height);
    bytes.truncate(bytes.len() / 2);
    bytes
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &b in bytes {
        crc ^= u32::from(b);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }
    !crc
}

/// A valid PNG header announcing `side` x `side` pixels over a tiny payload,
/// so decoding trips the decoder's allocation limit.
pub fn oversized_png(side: u32) -> Vec<u8> {
    let mut bytes = png(4, 4);
    bytes[16..20].copy_from_slice(&side.to_be_bytes());
    bytes[20..24].copy_from_slice(&side.to_be_bytes());
    let crc = crc32(&bytes[12..29]);
    bytes[29..33].copy_from_slice(&crc.to_be_bytes());
    bytes
}

pub fn table(rows: &[&[&str]]) -> Table {
    Table::new(
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    )
}

/// Entry names of a zip package.
pub fn zip_entries(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip package");
    archive.file_names().map(str::to_string).collect()
}

/// One entry of a zip package as text.
pub fn zip_text(bytes: &[u8], name: &str) -> String {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip package");
    let mut entry = archive.by_name(name).expect("entry present");
    let mut text = String::new();
    entry.read_to_string(&mut text).expect("utf-8 entry");
    text
}

/// A minimal PDF with `pages` empty US-letter pages.
pub fn pdf(pages: usize) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for i in 0..pages {
        let content = doc.add_object(Stream::new(
            dictionary! {},
            format!("% page {}", i + 1).into_bytes(),
        ));
        kids.push(Object::Reference(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Contents" => Object::Reference(content),
        })));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(pages as i64),
        }),
    );
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog));

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("serialize test PDF");
    out
}

pub fn pdf_page_count(bytes: &[u8]) -> usize {
    lopdf::Document::load_mem(bytes)
        .expect("valid PDF")
        .get_pages()
        .len()
}
