//! Minimal PresentationML writer.
//!
//! Produces a package with one master, one blank layout and a theme, plus one
//! part per slide. Shapes are kept as serialized XML fragments until
//! [`SlideDeck::save`].

use super::ooxml::{escape_xml, Package, XML_DECL};
use super::{DeckFactory, SlideDeck};
use crate::config::{Frame, SlideTemplate};
use crate::error::CodecError;
use crate::pipeline::tables::Table;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Creates [`PptxDeck`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PptxDeckFactory;

impl DeckFactory for PptxDeckFactory {
    fn new_deck(&self, template: &SlideTemplate) -> Box<dyn SlideDeck> {
        Box::new(PptxDeck::new(template.slide_width, template.slide_height))
    }
}

#[derive(Debug, Default)]
struct SlidePart {
    shapes: Vec<String>,
    /// Media indices referenced by this slide, in rId order.
    media: Vec<usize>,
}

impl SlidePart {
    /// Shape ids start at 2; 1 is the slide's group shape.
    fn next_shape_id(&self) -> usize {
        self.shapes.len() + 2
    }
}

/// A deck of blank-layout slides.
#[derive(Debug)]
pub struct PptxDeck {
    width: i64,
    height: i64,
    slides: Vec<SlidePart>,
    media: Vec<Vec<u8>>,
}

impl PptxDeck {
    pub fn new(width: i64, height: i64) -> Self {
        Self {
            width,
            height,
            slides: Vec::new(),
            media: Vec::new(),
        }
    }

    fn slide_mut(&mut self, slide: usize) -> Result<&mut SlidePart, CodecError> {
        self.slides
            .get_mut(slide)
            .ok_or_else(|| CodecError::Package(format!("no slide at index {slide}")))
    }
}

impl SlideDeck for PptxDeck {
    fn add_slide(&mut self) -> usize {
        self.slides.push(SlidePart::default());
        self.slides.len() - 1
    }

    fn add_textbox(
        &mut self,
        slide: usize,
        frame: Frame,
        text: &str,
        font_pt: u32,
    ) -> Result<(), CodecError> {
        let part = self.slide_mut(slide)?;
        let id = part.next_shape_id();
        let size = font_pt * 100;
        let mut paragraphs = String::new();
        for line in text.split('\n') {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                let _ = write!(paragraphs, "<a:p><a:endParaRPr lang=\"en-US\" sz=\"{size}\"/></a:p>");
            } else {
                let _ = write!(
                    paragraphs,
                    "<a:p><a:r><a:rPr lang=\"en-US\" sz=\"{size}\" dirty=\"0\"/><a:t>{}</a:t></a:r></a:p>",
                    escape_xml(line)
                );
            }
        }
        part.shapes.push(format!(
            "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"TextBox {id}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
             <p:spPr>{xfrm}<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>\
             <p:txBody><a:bodyPr wrap=\"square\" rtlCol=\"0\"><a:spAutoFit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>",
            xfrm = xfrm("a", frame),
        ));
        Ok(())
    }

    fn add_table(&mut self, slide: usize, frame: Frame, table: &Table) -> Result<(), CodecError> {
        if table.is_empty() {
            return Err(CodecError::Package("table has no cells".into()));
        }
        let part = self.slide_mut(slide)?;
        let id = part.next_shape_id();
        let rows = table.rectangular();
        let cols = table.column_count();
        let col_width = frame.width / cols as i64;
        let row_height = frame.height / rows.len() as i64;

        let mut grid = String::new();
        for c in 0..cols {
            let w = if c + 1 == cols {
                frame.width - col_width * (cols as i64 - 1)
            } else {
                col_width
            };
            let _ = write!(grid, "<a:gridCol w=\"{w}\"/>");
        }

        let mut body = String::new();
        for row in &rows {
            let _ = write!(body, "<a:tr h=\"{row_height}\">");
            for cell in row {
                let para = if cell.is_empty() {
                    "<a:p><a:endParaRPr lang=\"en-US\"/></a:p>".to_string()
                } else {
                    format!(
                        "<a:p><a:r><a:rPr lang=\"en-US\" dirty=\"0\"/><a:t>{}</a:t></a:r></a:p>",
                        escape_xml(cell)
                    )
                };
                let _ = write!(
                    body,
                    "<a:tc><a:txBody><a:bodyPr/><a:lstStyle/>{para}</a:txBody><a:tcPr/></a:tc>"
                );
            }
            body.push_str("</a:tr>");
        }

        part.shapes.push(format!(
            "<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id=\"{id}\" name=\"Table {id}\"/>\
             <p:cNvGraphicFramePr><a:graphicFrameLocks noGrp=\"1\"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>\
             {xfrm}<a:graphic><a:graphicData uri=\"http://schemas.openxmlformats.org/drawingml/2006/table\">\
             <a:tbl><a:tblPr firstRow=\"1\" bandRow=\"1\"/><a:tblGrid>{grid}</a:tblGrid>{body}</a:tbl>\
             </a:graphicData></a:graphic></p:graphicFrame>",
            xfrm = xfrm("p", frame),
        ));
        Ok(())
    }

    fn add_picture(&mut self, slide: usize, frame: Frame, png: &[u8]) -> Result<(), CodecError> {
        if !png.starts_with(PNG_SIGNATURE) {
            return Err(CodecError::Package("picture is not PNG".into()));
        }
        let media_index = self.media.len();
        let part = self.slide_mut(slide)?;
        let id = part.next_shape_id();
        part.media.push(media_index);
        // rId1 is the layout; pictures follow.
        let rid = part.media.len() + 1;
        part.shapes.push(format!(
            "<p:pic><p:nvPicPr><p:cNvPr id=\"{id}\" name=\"Picture {id}\"/>\
             <p:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>\
             <p:blipFill><a:blip r:embed=\"rId{rid}\"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>\
             <p:spPr>{xfrm}<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr></p:pic>",
            xfrm = xfrm("a", frame),
        ));
        self.media.push(png.to_vec());
        Ok(())
    }

    fn slide_count(&self) -> usize {
        self.slides.len()
    }

    fn save(&mut self, path: &Path) -> Result<(), CodecError> {
        let mut pkg = Package::create(path)?;
        pkg.part("[Content_Types].xml", self.content_types().as_bytes())?;
        pkg.part("_rels/.rels", root_rels().as_bytes())?;
        pkg.part("ppt/presentation.xml", self.presentation().as_bytes())?;
        pkg.part(
            "ppt/_rels/presentation.xml.rels",
            self.presentation_rels().as_bytes(),
        )?;
        pkg.part("ppt/presProps.xml", pres_props().as_bytes())?;
        pkg.part("ppt/tableStyles.xml", table_styles().as_bytes())?;
        pkg.part("ppt/slideMasters/slideMaster1.xml", slide_master().as_bytes())?;
        pkg.part(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            slide_master_rels().as_bytes(),
        )?;
        pkg.part("ppt/slideLayouts/slideLayout1.xml", slide_layout().as_bytes())?;
        pkg.part(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            slide_layout_rels().as_bytes(),
        )?;
        pkg.part("ppt/theme/theme1.xml", THEME.as_bytes())?;

        for (i, slide) in self.slides.iter().enumerate() {
            let n = i + 1;
            pkg.part(&format!("ppt/slides/slide{n}.xml"), slide_xml(slide).as_bytes())?;
            pkg.part(
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                slide_rels(slide).as_bytes(),
            )?;
        }
        for (i, bytes) in self.media.iter().enumerate() {
            pkg.part(&format!("ppt/media/image{}.png", i + 1), bytes)?;
        }
        pkg.finish()?;
        debug!(
            path = %path.display(),
            slides = self.slides.len(),
            media = self.media.len(),
            "pptx written"
        );
        Ok(())
    }
}

impl PptxDeck {
    fn content_types(&self) -> String {
        let mut s = format!(
            "{XML_DECL}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
             <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
             <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
             <Default Extension=\"png\" ContentType=\"image/png\"/>\
             <Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
             <Override PartName=\"/ppt/presProps.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presProps+xml\"/>\
             <Override PartName=\"/ppt/tableStyles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml\"/>\
             <Override PartName=\"/ppt/slideMasters/slideMaster1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml\"/>\
             <Override PartName=\"/ppt/slideLayouts/slideLayout1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml\"/>\
             <Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>"
        );
        for n in 1..=self.slides.len() {
            let _ = write!(
                s,
                "<Override PartName=\"/ppt/slides/slide{n}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
            );
        }
        s.push_str("</Types>");
        s
    }

    fn presentation(&self) -> String {
        let mut ids = String::new();
        if !self.slides.is_empty() {
            ids.push_str("<p:sldIdLst>");
            for i in 0..self.slides.len() {
                let _ = write!(ids, "<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 256 + i, 5 + i);
            }
            ids.push_str("</p:sldIdLst>");
        }
        format!(
            "{XML_DECL}<p:presentation xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\" saveSubsetFonts=\"1\">\
             <p:sldMasterIdLst><p:sldMasterId id=\"2147483648\" r:id=\"rId1\"/></p:sldMasterIdLst>{ids}\
             <p:sldSz cx=\"{}\" cy=\"{}\"/><p:notesSz cx=\"6858000\" cy=\"9144000\"/></p:presentation>",
            self.width, self.height
        )
    }

    fn presentation_rels(&self) -> String {
        let mut s = format!(
            "{XML_DECL}<Relationships xmlns=\"{PKG_REL}\">\
             <Relationship Id=\"rId1\" Type=\"{REL}/slideMaster\" Target=\"slideMasters/slideMaster1.xml\"/>\
             <Relationship Id=\"rId2\" Type=\"{REL}/theme\" Target=\"theme/theme1.xml\"/>\
             <Relationship Id=\"rId3\" Type=\"{REL}/presProps\" Target=\"presProps.xml\"/>\
             <Relationship Id=\"rId4\" Type=\"{REL}/tableStyles\" Target=\"tableStyles.xml\"/>"
        );
        for i in 0..self.slides.len() {
            let _ = write!(
                s,
                "<Relationship Id=\"rId{}\" Type=\"{REL}/slide\" Target=\"slides/slide{}.xml\"/>",
                5 + i,
                i + 1
            );
        }
        s.push_str("</Relationships>");
        s
    }
}

fn xfrm(prefix: &str, f: Frame) -> String {
    format!(
        "<{prefix}:xfrm><a:off x=\"{}\" y=\"{}\"/><a:ext cx=\"{}\" cy=\"{}\"/></{prefix}:xfrm>",
        f.left, f.top, f.width, f.height
    )
}

fn empty_tree_head() -> &'static str {
    "<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
     <p:grpSpPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"0\" cy=\"0\"/>\
     <a:chOff x=\"0\" y=\"0\"/><a:chExt cx=\"0\" cy=\"0\"/></a:xfrm></p:grpSpPr>"
}

fn slide_xml(slide: &SlidePart) -> String {
    format!(
        "{XML_DECL}<p:sld xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\">\
         <p:cSld><p:spTree>{}{}</p:spTree></p:cSld>\
         <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>",
        empty_tree_head(),
        slide.shapes.concat()
    )
}

fn slide_rels(slide: &SlidePart) -> String {
    let mut s = format!(
        "{XML_DECL}<Relationships xmlns=\"{PKG_REL}\">\
         <Relationship Id=\"rId1\" Type=\"{REL}/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>"
    );
    for (i, media) in slide.media.iter().enumerate() {
        let _ = write!(
            s,
            "<Relationship Id=\"rId{}\" Type=\"{REL}/image\" Target=\"../media/image{}.png\"/>",
            i + 2,
            media + 1
        );
    }
    s.push_str("</Relationships>");
    s
}

fn root_rels() -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"{PKG_REL}\">\
         <Relationship Id=\"rId1\" Type=\"{REL}/officeDocument\" Target=\"ppt/presentation.xml\"/>\
         </Relationships>"
    )
}

fn pres_props() -> String {
    format!("{XML_DECL}<p:presentationPr xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\"/>")
}

fn table_styles() -> String {
    format!(
        "{XML_DECL}<a:tblStyleLst xmlns:a=\"{NS_A}\" def=\"{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}\"/>"
    )
}

fn slide_master() -> String {
    format!(
        "{XML_DECL}<p:sldMaster xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\">\
         <p:cSld><p:bg><p:bgRef idx=\"1001\"><a:schemeClr val=\"bg1\"/></p:bgRef></p:bg>\
         <p:spTree>{}</p:spTree></p:cSld>\
         <p:clrMap bg1=\"lt1\" tx1=\"dk1\" bg2=\"lt2\" tx2=\"dk2\" accent1=\"accent1\" accent2=\"accent2\" \
         accent3=\"accent3\" accent4=\"accent4\" accent5=\"accent5\" accent6=\"accent6\" hlink=\"hlink\" folHlink=\"folHlink\"/>\
         <p:sldLayoutIdLst><p:sldLayoutId id=\"2147483649\" r:id=\"rId1\"/></p:sldLayoutIdLst>\
         </p:sldMaster>",
        empty_tree_head()
    )
}

fn slide_master_rels() -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"{PKG_REL}\">\
         <Relationship Id=\"rId1\" Type=\"{REL}/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
         <Relationship Id=\"rId2\" Type=\"{REL}/theme\" Target=\"../theme/theme1.xml\"/>\
         </Relationships>"
    )
}

fn slide_layout() -> String {
    format!(
        "{XML_DECL}<p:sldLayout xmlns:a=\"{NS_A}\" xmlns:r=\"{NS_R}\" xmlns:p=\"{NS_P}\" type=\"blank\" preserve=\"1\">\
         <p:cSld name=\"Blank\"><p:spTree>{}</p:spTree></p:cSld>\
         <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>",
        empty_tree_head()
    )
}

fn slide_layout_rels() -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"{PKG_REL}\">\
         <Relationship Id=\"rId1\" Type=\"{REL}/slideMaster\" Target=\"../slideMasters/slideMaster1.xml\"/>\
         </Relationships>"
    )
}

const THEME: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<a:theme xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" name=\"Office Theme\">",
    "<a:themeElements>",
    "<a:clrScheme name=\"Office\">",
    "<a:dk1><a:sysClr val=\"windowText\" lastClr=\"000000\"/></a:dk1>",
    "<a:lt1><a:sysClr val=\"window\" lastClr=\"FFFFFF\"/></a:lt1>",
    "<a:dk2><a:srgbClr val=\"44546A\"/></a:dk2>",
    "<a:lt2><a:srgbClr val=\"E7E6E6\"/></a:lt2>",
    "<a:accent1><a:srgbClr val=\"4472C4\"/></a:accent1>",
    "<a:accent2><a:srgbClr val=\"ED7D31\"/></a:accent2>",
    "<a:accent3><a:srgbClr val=\"A5A5A5\"/></a:accent3>",
    "<a:accent4><a:srgbClr val=\"FFC000\"/></a:accent4>",
    "<a:accent5><a:srgbClr val=\"5B9BD5\"/></a:accent5>",
    "<a:accent6><a:srgbClr val=\"70AD47\"/></a:accent6>",
    "<a:hlink><a:srgbClr val=\"0563C1\"/></a:hlink>",
    "<a:folHlink><a:srgbClr val=\"954F72\"/></a:folHlink>",
    "</a:clrScheme>",
    "<a:fontScheme name=\"Office\">",
    "<a:majorFont><a:latin typeface=\"Calibri Light\"/><a:ea typeface=\"\"/><a:cs typeface=\"\"/></a:majorFont>",
    "<a:minorFont><a:latin typeface=\"Calibri\"/><a:ea typeface=\"\"/><a:cs typeface=\"\"/></a:minorFont>",
    "</a:fontScheme>",
    "<a:fmtScheme name=\"Office\">",
    "<a:fillStyleLst>",
    "<a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>",
    "<a:solidFill><a:schemeClr val=\"phClr\"><a:tint val=\"50000\"/></a:schemeClr></a:solidFill>",
    "<a:solidFill><a:schemeClr val=\"phClr\"><a:shade val=\"80000\"/></a:schemeClr></a:solidFill>",
    "</a:fillStyleLst>",
    "<a:lnStyleLst>",
    "<a:ln w=\"6350\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln>",
    "<a:ln w=\"12700\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln>",
    "<a:ln w=\"19050\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln>",
    "</a:lnStyleLst>",
    "<a:effectStyleLst>",
    "<a:effectStyle><a:effectLst/></a:effectStyle>",
    "<a:effectStyle><a:effectLst/></a:effectStyle>",
    "<a:effectStyle><a:effectLst/></a:effectStyle>",
    "</a:effectStyleLst>",
    "<a:bgFillStyleLst>",
    "<a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill>",
    "<a:solidFill><a:schemeClr val=\"phClr\"><a:tint val=\"95000\"/></a:schemeClr></a:solidFill>",
    "<a:solidFill><a:schemeClr val=\"phClr\"><a:shade val=\"90000\"/></a:schemeClr></a:solidFill>",
    "</a:bgFillStyleLst>",
    "</a:fmtScheme>",
    "</a:themeElements>",
    "</a:theme>"
);
