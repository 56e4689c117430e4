//! Page-range extraction with lopdf.

use super::PageSubsetter;
use crate::config::PageRange;
use crate::error::CodecError;
use lopdf::Document;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfSubsetter;

impl PageSubsetter for LopdfSubsetter {
    fn subset(&self, input: &Path, range: PageRange, output: &Path) -> Result<(), CodecError> {
        let mut doc = Document::load(input)?;
        let total = doc.get_pages().len();
        let (start, end) = range.resolve(total);
        if start >= end {
            return Err(CodecError::EmptyPageRange {
                start: range.start,
                end: range.end.unwrap_or(total),
                total,
            });
        }
        // lopdf numbers pages from 1.
        let excluded: Vec<u32> = doc
            .get_pages()
            .keys()
            .copied()
            .filter(|&n| {
                let index = n as usize - 1;
                index < start || index >= end
            })
            .collect();
        if !excluded.is_empty() {
            doc.delete_pages(&excluded);
            doc.prune_objects();
        }
        doc.save(output)?;
        debug!(start, end, total, "PDF page subset written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};

    fn write_pdf(path: &Path, pages: usize) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for i in 0..pages {
            let content = doc.add_object(Stream::new(
                dictionary! {},
                format!("% page {i}").into_bytes(),
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
        doc.save(path).unwrap();
    }

    #[test]
    fn keeps_only_the_requested_pages() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        write_pdf(&input, 5);
        LopdfSubsetter
            .subset(&input, PageRange::new(1, Some(3)).unwrap(), &output)
            .unwrap();
        assert_eq!(Document::load(&output).unwrap().get_pages().len(), 2);
    }

    #[test]
    fn open_range_runs_to_last_page() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        write_pdf(&input, 4);
        LopdfSubsetter
            .subset(&input, PageRange::new(0, None).unwrap(), &output)
            .unwrap();
        assert_eq!(Document::load(&output).unwrap().get_pages().len(), 4);
    }

    #[test]
    fn range_past_the_end_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        write_pdf(&input, 2);
        let err = LopdfSubsetter
            .subset(&input, PageRange::new(5, None).unwrap(), &dir.path().join("o.pdf"))
            .unwrap_err();
        assert!(matches!(err, CodecError::EmptyPageRange { total: 2, .. }));
    }
}
