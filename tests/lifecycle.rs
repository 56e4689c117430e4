//! Request lifecycle tests: every staged file of a request is gone once the
//! orchestrator returns, whatever the outcome.
//!
//! External tools are replaced by in-process fakes; the OOXML writers, the
//! lopdf packer and the lopdf subsetter run for real.

mod common;

use common::*;
use docconvert::codec::PageContent;
use docconvert::{
    ConversionKind, ConversionOptions, ConvertError, Orientation, PageRange, UploadedArtifact,
};
use image::ImageFormat;
use std::sync::Arc;

// ── Single-file conversions ──────────────────────────────────────────────────

#[tokio::test]
async fn successful_conversion_leaves_nothing_staged() {
    let h = harness();
    let doc = b"PK fake word document".to_vec();

    let out = h
        .orchestrator
        .word_to_pdf(Some(UploadedArtifact::new("report.docx", doc.clone())))
        .await
        .unwrap();

    assert_eq!(out.kind, ConversionKind::WordToPdf);
    assert_eq!(out.bytes, doc);
    assert_eq!(out.filename(), "converted.pdf");
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn failed_conversion_leaves_nothing_staged() {
    let h = harness_with(TEST_LIMIT, |c| c.docx_to_pdf = Arc::new(FailingCodec));

    let err = h
        .orchestrator
        .word_to_pdf(Some(UploadedArtifact::new("report.doc", b"x".to_vec())))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::Conversion {
            kind: ConversionKind::WordToPdf,
            ..
        }
    ));
    assert!(!err.is_client_error());
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn word_uploads_keep_their_declared_format() {
    let recorder = Arc::new(RecordingCodec::default());
    let codec = Arc::clone(&recorder);
    let h = harness_with(TEST_LIMIT, move |c| c.docx_to_pdf = codec);

    for name in ["legacy.DOC", "modern.docx"] {
        h.orchestrator
            .word_to_pdf(Some(UploadedArtifact::new(name, b"word bytes".to_vec())))
            .await
            .unwrap();
    }

    assert_eq!(recorder.extensions(), vec!["doc", "docx"]);
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn disallowed_extension_never_touches_disk() {
    let h = harness();

    let err = h
        .orchestrator
        .pdf_to_word(Some(UploadedArtifact::new("notes.txt", b"%PDF".to_vec())), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::UnsupportedType { .. }));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn missing_and_unnamed_uploads_are_client_errors() {
    let h = harness();

    let missing = h.orchestrator.pdf_to_pptx(None).await.unwrap_err();
    assert!(matches!(missing, ConvertError::MissingField { ref field } if field == "pdf"));

    let unnamed = h
        .orchestrator
        .pdf_to_excel(Some(UploadedArtifact::unnamed(pdf(1))))
        .await
        .unwrap_err();
    assert!(matches!(unnamed, ConvertError::EmptySelection { .. }));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn oversized_single_upload_is_rejected() {
    let h = harness_with(1024, |_| {});

    let err = h
        .orchestrator
        .pdf_to_word(Some(UploadedArtifact::new("big.pdf", vec![0u8; 1025])), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::SizeLimitExceeded {
            limit: 1024,
            actual: 1025
        }
    ));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn pdf_to_word_page_range_reaches_the_codec_as_a_subset() {
    let h = harness();

    let out = h
        .orchestrator
        .pdf_to_word(
            Some(UploadedArtifact::new("book.pdf", pdf(5))),
            Some(PageRange::new(1, Some(3)).unwrap()),
        )
        .await
        .unwrap();

    // CopyCodec hands back exactly what it was given: the subset.
    assert_eq!(pdf_page_count(&out.bytes), 2);
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn page_range_past_the_end_is_a_client_error() {
    let h = harness();

    let err = h
        .orchestrator
        .pdf_to_word(
            Some(UploadedArtifact::new("short.pdf", pdf(2))),
            Some(PageRange::new(4, Some(6)).unwrap()),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::InvalidOption { .. }));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn concurrent_requests_do_not_collide() {
    let h = harness();

    let tasks: Vec<_> = (0..8u8)
        .map(|i| {
            let orchestrator = Arc::clone(&h.orchestrator);
            tokio::spawn(async move {
                let payload = vec![i; 64 + i as usize];
                let out = orchestrator
                    .word_to_pdf(Some(UploadedArtifact::new("same-name.docx", payload.clone())))
                    .await
                    .unwrap();
                (payload, out.bytes)
            })
        })
        .collect();

    for task in tasks {
        let (sent, received) = task.await.unwrap();
        assert_eq!(sent, received);
    }
    assert_eq!(h.leftovers(), 0);
}

// ── Image batches ────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_crossing_the_limit_stages_nothing() {
    let h = harness_with(1000, |_| {});
    let uploads = vec![
        UploadedArtifact::new("a.png", vec![1u8; 400]),
        UploadedArtifact::new("b.png", vec![2u8; 400]),
        UploadedArtifact::new("c.png", vec![3u8; 400]),
    ];

    let err = h
        .orchestrator
        .images_to_pdf(uploads, ConversionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::SizeLimitExceeded {
            limit: 1000,
            actual: 1200
        }
    ));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn one_bad_extension_rejects_the_whole_batch() {
    let h = harness();
    let uploads = vec![
        UploadedArtifact::new("a.png", png(4, 4)),
        UploadedArtifact::new("b.tiff", png(4, 4)),
    ];

    let err = h
        .orchestrator
        .images_to_pdf(uploads, ConversionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::UnsupportedType { .. }));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn empty_batch_is_a_missing_field() {
    let h = harness();
    let err = h
        .orchestrator
        .images_to_pdf(Vec::new(), ConversionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::MissingField { ref field } if field == "images"));
}

#[tokio::test]
async fn undecodable_image_still_gets_its_page() {
    let h = harness();
    let uploads = vec![
        UploadedArtifact::new("first.png", png(40, 30)),
        UploadedArtifact::new("broken.png", b"definitely not an image".to_vec()),
        UploadedArtifact::new("third.JPG", image_bytes(30, 40, ImageFormat::Jpeg)),
        UploadedArtifact::new("cut-short.png", truncated_png(64, 64)),
    ];

    let out = h
        .orchestrator
        .images_to_pdf(
            uploads,
            ConversionOptions {
                orientation: Orientation::Landscape,
                ..ConversionOptions::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(out.content_type(), "application/pdf");
    assert_eq!(pdf_page_count(&out.bytes), 4);
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn truncated_image_does_not_sink_the_batch() {
    let h = harness();
    let uploads = vec![
        UploadedArtifact::new("ok.png", png(64, 64)),
        UploadedArtifact::new("truncated.png", truncated_png(64, 64)),
    ];

    let out = h
        .orchestrator
        .images_to_pdf(uploads, ConversionOptions::default())
        .await
        .unwrap();

    assert_eq!(pdf_page_count(&out.bytes), 2);
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn failure_after_partial_staging_releases_the_staged_files() {
    let h = harness();
    // The first two images are normalized and staged before the third one
    // exceeds the decoder's allocation limit.
    let uploads = vec![
        UploadedArtifact::new("one.png", png(12, 12)),
        UploadedArtifact::new("two.jpg", image_bytes(12, 12, ImageFormat::Jpeg)),
        UploadedArtifact::new("huge.png", oversized_png(100_000)),
    ];

    let err = h
        .orchestrator
        .images_to_pdf(uploads, ConversionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::Internal(_)));
    assert!(!err.is_client_error());
    assert_eq!(h.leftovers(), 0);
}

// ── Content-driven conversions ───────────────────────────────────────────────

#[tokio::test]
async fn pdf_to_pptx_emits_one_slide_per_unit() {
    let pages = vec![
        PageContent {
            number: 1,
            text: "  Quarterly report \n".into(),
            tables: vec![table(&[&["Region", "Sales"], &["North", "10"]])],
            images: vec![png(8, 6)],
        },
        PageContent {
            number: 2,
            ..PageContent::default()
        },
    ];
    let h = harness_with(TEST_LIMIT, |c| c.pdf_content = Arc::new(FixedPages(pages)));

    let out = h
        .orchestrator
        .pdf_to_pptx(Some(UploadedArtifact::new("deck.pdf", pdf(2))))
        .await
        .unwrap();

    let entries = zip_entries(&out.bytes);
    for slide in 1..=3 {
        assert!(entries.contains(&format!("ppt/slides/slide{slide}.xml")));
    }
    assert!(!entries.contains(&"ppt/slides/slide4.xml".to_string()));
    assert!(entries.contains(&"ppt/media/image1.png".to_string()));
    assert!(zip_text(&out.bytes, "ppt/slides/slide1.xml").contains("Quarterly report"));
    assert!(zip_text(&out.bytes, "ppt/slides/slide2.xml").contains("North"));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn pdf_to_pptx_bad_embedded_image_is_a_server_error() {
    let pages = vec![PageContent {
        number: 1,
        images: vec![b"garbage".to_vec()],
        ..PageContent::default()
    }];
    let h = harness_with(TEST_LIMIT, |c| c.pdf_content = Arc::new(FixedPages(pages)));

    let err = h
        .orchestrator
        .pdf_to_pptx(Some(UploadedArtifact::new("deck.pdf", pdf(1))))
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::ContentExtraction { page: 1, .. }));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn pdf_to_excel_writes_one_sheet_per_table() {
    let pages = vec![
        PageContent {
            number: 1,
            tables: vec![table(&[&["a", "b"], &["1", "2"]])],
            ..PageContent::default()
        },
        PageContent {
            number: 2,
            tables: vec![table(&[&["x", "y", "z"]])],
            ..PageContent::default()
        },
    ];
    let h = harness_with(TEST_LIMIT, |c| c.pdf_content = Arc::new(FixedPages(pages)));

    let out = h
        .orchestrator
        .pdf_to_excel(Some(UploadedArtifact::new("tables.pdf", pdf(2))))
        .await
        .unwrap();

    assert_eq!(out.filename(), "converted.xlsx");
    let workbook = zip_text(&out.bytes, "xl/workbook.xml");
    assert!(workbook.contains("Table 1"));
    assert!(workbook.contains("Table 2"));
    assert!(zip_entries(&out.bytes).contains(&"xl/worksheets/sheet2.xml".to_string()));
    assert!(zip_text(&out.bytes, "xl/sharedStrings.xml").contains(">z<"));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn pdf_without_tables_fails_and_cleans_up() {
    let h = harness_with(TEST_LIMIT, |c| {
        c.pdf_content = Arc::new(FixedPages(vec![PageContent {
            number: 1,
            text: "just prose".into(),
            ..PageContent::default()
        }]))
    });

    let err = h
        .orchestrator
        .pdf_to_excel(Some(UploadedArtifact::new("prose.pdf", pdf(1))))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::Conversion {
            kind: ConversionKind::PdfToExcel,
            ..
        }
    ));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn image_to_excel_uses_recognised_tables() {
    let h = harness_with(TEST_LIMIT, |c| {
        c.ocr = Arc::new(FixedOcr(vec![table(&[&["Item", "Qty"], &["Bolts", "40"]])]))
    });

    let out = h
        .orchestrator
        .image_to_excel(Some(UploadedArtifact::new(
            "scan.jpeg",
            image_bytes(16, 16, ImageFormat::Jpeg),
        )))
        .await
        .unwrap();

    assert!(zip_text(&out.bytes, "xl/sharedStrings.xml").contains("Bolts"));
    assert_eq!(h.leftovers(), 0);
}

#[tokio::test]
async fn image_without_tables_fails_and_cleans_up() {
    let h = harness_with(TEST_LIMIT, |c| c.ocr = Arc::new(FixedOcr(Vec::new())));

    let err = h
        .orchestrator
        .image_to_excel(Some(UploadedArtifact::new("blank.png", png(10, 10))))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvertError::Conversion {
            kind: ConversionKind::ImageToExcelOcr,
            ..
        }
    ));
    assert_eq!(h.leftovers(), 0);
}
