//! Image-to-PDF packing with lopdf.

use super::PdfPacker;
use crate::error::CodecError;
use crate::pipeline::layout::{fit_image, PageBox};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One page per image, the image fitted and centred on the page box.
///
/// Bytes that do not decode as an image produce a blank page, so the page
/// count always equals the image count.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfPacker;

impl PdfPacker for LopdfPacker {
    fn pack(&self, images: &[PathBuf], page: PageBox, output: &Path) -> Result<(), CodecError> {
        if images.is_empty() {
            return Err(CodecError::Pdf("no images to pack".into()));
        }
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let media_box = vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page.width),
            Object::Real(page.height),
        ];

        let mut kids = Vec::with_capacity(images.len());
        for (index, path) in images.iter().enumerate() {
            let bytes = std::fs::read(path)?;
            let page_id = match image::load_from_memory(&bytes) {
                Ok(img) => {
                    let rgb = img.to_rgb8();
                    let (w, h) = rgb.dimensions();
                    let image_id = doc.add_object(Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "Width" => Object::Integer(i64::from(w)),
                            "Height" => Object::Integer(i64::from(h)),
                            "ColorSpace" => "DeviceRGB",
                            "BitsPerComponent" => Object::Integer(8),
                        },
                        rgb.into_raw(),
                    ));
                    let at = fit_image(w, h, page);
                    let ops = format!(
                        "q {:.3} 0 0 {:.3} {:.3} {:.3} cm /Im0 Do Q",
                        at.width, at.height, at.x, at.y
                    );
                    let content_id = doc.add_object(Stream::new(dictionary! {}, ops.into_bytes()));
                    debug!(page = index + 1, width = w, height = h, "image placed");
                    add_page(
                        &mut doc,
                        pages_id,
                        &media_box,
                        content_id,
                        dictionary! {
                            "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
                        },
                    )
                }
                Err(error) => {
                    warn!(page = index + 1, %error, "image not decodable, emitting blank page");
                    let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
                    add_page(&mut doc, pages_id, &media_box, content_id, dictionary! {})
                }
            };
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.compress();
        doc.save(output)?;
        debug!(path = %output.display(), pages = count, "PDF packed");
        Ok(())
    }
}

fn add_page(
    doc: &mut Document,
    parent: ObjectId,
    media_box: &[Object],
    content_id: ObjectId,
    resources: lopdf::Dictionary,
) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(parent),
        "MediaBox" => media_box.to_vec(),
        "Contents" => Object::Reference(content_id),
        "Resources" => resources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Orientation, PageLayout};
    use crate::pipeline::layout::page_box;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::from_pixel(w, h, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();
        path
    }

    fn media_boxes(path: &Path) -> Vec<(f32, f32)> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_dictionary(*id).unwrap();
                let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
                (mb[2].as_float().unwrap(), mb[3].as_float().unwrap())
            })
            .collect()
    }

    #[test]
    fn landscape_swaps_media_box() {
        let dir = tempfile::tempdir().unwrap();
        let img = write_png(dir.path(), "a.png", 30, 20);
        let a4 = PageLayout::a4();

        let portrait = dir.path().join("p.pdf");
        LopdfPacker
            .pack(&[img.clone()], page_box(&a4, Orientation::Portrait), &portrait)
            .unwrap();
        let landscape = dir.path().join("l.pdf");
        LopdfPacker
            .pack(&[img], page_box(&a4, Orientation::Landscape), &landscape)
            .unwrap();

        let (pw, ph) = media_boxes(&portrait)[0];
        let (lw, lh) = media_boxes(&landscape)[0];
        assert!((pw - lh).abs() < 0.01 && (ph - lw).abs() < 0.01);
        assert!(pw < ph);
    }

    #[test]
    fn undecodable_image_becomes_blank_page() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_png(dir.path(), "good.png", 4, 4);
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"corrupt").unwrap();

        let out = dir.path().join("out.pdf");
        LopdfPacker
            .pack(
                &[good, bad],
                page_box(&PageLayout::a4(), Orientation::Portrait),
                &out,
            )
            .unwrap();
        assert_eq!(media_boxes(&out).len(), 2);
    }

    #[test]
    fn no_images_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let page = PageBox {
            width: 10.0,
            height: 10.0,
        };
        assert!(LopdfPacker.pack(&[], page, &dir.path().join("x.pdf")).is_err());
    }
}
