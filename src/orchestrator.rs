//! Request orchestration: validate → stage → transform → read → release.
//!
//! The [`Orchestrator`] is the only component that spans the async and the
//! blocking worlds. Uploads are validated in memory, staged to disk, and the
//! transformer runs on tokio's blocking pool. The job comes back out of the
//! blocking task so its inputs can be released concurrently; the output is
//! read into memory and released too, so by the time a caller holds a
//! [`ConversionOutput`] nothing of the request remains on disk.

use crate::codec::Collaborators;
use crate::config::{PageRange, ServiceConfig, UploadField};
use crate::error::ConvertError;
use crate::job::{ConversionJob, ConversionKind, ConversionOptions};
use crate::pipeline::normalize::{normalize, Normalized};
use crate::storage::{FileKind, StagedBatch, TransientStore};
use crate::transform::transformer_for;
use crate::validate::{extension_of, UploadValidator, UploadedArtifact};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A finished conversion, held entirely in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutput {
    pub kind: ConversionKind,
    pub bytes: Vec<u8>,
}

impl ConversionOutput {
    pub fn filename(&self) -> &'static str {
        self.kind.download_name()
    }

    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }

    pub fn content_disposition(&self) -> &'static str {
        self.kind.content_disposition()
    }
}

/// Drives one request per call; cheap to clone and share across handlers.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Arc<ServiceConfig>,
    store: TransientStore,
    collaborators: Collaborators,
}

impl Orchestrator {
    /// Orchestrator with production collaborators and a store at the
    /// configured storage root.
    pub fn new(config: ServiceConfig) -> Result<Self, ConvertError> {
        let store = TransientStore::new(config.storage_root())?;
        let collaborators = Collaborators::from_config(&config);
        Ok(Self::with_parts(Arc::new(config), store, collaborators))
    }

    pub fn with_parts(
        config: Arc<ServiceConfig>,
        store: TransientStore,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            store,
            collaborators,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &TransientStore {
        &self.store
    }

    /// PDF → DOCX, optionally limited to a page range.
    pub async fn pdf_to_word(
        &self,
        upload: Option<UploadedArtifact>,
        page_range: Option<PageRange>,
    ) -> Result<ConversionOutput, ConvertError> {
        let options = ConversionOptions {
            page_range,
            ..ConversionOptions::default()
        };
        self.single(ConversionKind::PdfToWord, UploadField::Pdf, upload, options)
            .await
    }

    /// PDF → PPTX, one slide per content unit.
    pub async fn pdf_to_pptx(
        &self,
        upload: Option<UploadedArtifact>,
    ) -> Result<ConversionOutput, ConvertError> {
        self.single(
            ConversionKind::PdfToPptx,
            UploadField::Pdf,
            upload,
            ConversionOptions::default(),
        )
        .await
    }

    /// PDF tables → XLSX.
    pub async fn pdf_to_excel(
        &self,
        upload: Option<UploadedArtifact>,
    ) -> Result<ConversionOutput, ConvertError> {
        self.single(
            ConversionKind::PdfToExcel,
            UploadField::Pdf,
            upload,
            ConversionOptions::default(),
        )
        .await
    }

    /// DOC/DOCX → PDF.
    pub async fn word_to_pdf(
        &self,
        upload: Option<UploadedArtifact>,
    ) -> Result<ConversionOutput, ConvertError> {
        self.single(
            ConversionKind::WordToPdf,
            UploadField::Word,
            upload,
            ConversionOptions::default(),
        )
        .await
    }

    /// Image → XLSX through OCR.
    pub async fn image_to_excel(
        &self,
        upload: Option<UploadedArtifact>,
    ) -> Result<ConversionOutput, ConvertError> {
        self.single(
            ConversionKind::ImageToExcelOcr,
            UploadField::Image,
            upload,
            ConversionOptions::default(),
        )
        .await
    }

    /// Images → one multi-page PDF, pages in upload order.
    ///
    /// Every upload is validated before anything is staged. If normalizing
    /// or staging fails part-way, the files staged so far are released
    /// before the error is returned.
    pub async fn images_to_pdf(
        &self,
        uploads: Vec<UploadedArtifact>,
        options: ConversionOptions,
    ) -> Result<ConversionOutput, ConvertError> {
        let field = UploadField::Images;
        if uploads.is_empty() {
            return Err(ConvertError::MissingField {
                field: field.name().to_string(),
            });
        }

        let mut batch = UploadValidator::new(&self.config).batch(field);
        let mut payloads = Vec::with_capacity(uploads.len());
        for upload in uploads {
            payloads.push(batch.admit(upload)?);
        }
        debug!(
            files = payloads.len(),
            bytes = batch.running_total(),
            "image batch validated"
        );

        let mut staged = StagedBatch::new();
        for payload in payloads {
            let bytes = match normalize_blocking(payload).await {
                Ok(normalized) => normalized.into_bytes(),
                Err(e) => {
                    staged.release_all().await;
                    return Err(e);
                }
            };
            match self.store.stage(FileKind::Png, &bytes).await {
                Ok(file) => staged.push(file),
                Err(e) => {
                    staged.release_all().await;
                    return Err(e);
                }
            }
        }

        let job = ConversionJob::new(ConversionKind::ImagesToPdf, staged.into_files(), options);
        self.run(job).await
    }

    async fn single(
        &self,
        kind: ConversionKind,
        field: UploadField,
        upload: Option<UploadedArtifact>,
        options: ConversionOptions,
    ) -> Result<ConversionOutput, ConvertError> {
        let upload = upload.ok_or_else(|| ConvertError::MissingField {
            field: field.name().to_string(),
        })?;
        let name = upload.display_name();
        let declared = upload.filename.as_deref().and_then(extension_of);
        let mut bytes = UploadValidator::new(&self.config).validate(field, upload)?;
        debug!(%kind, file = %name, bytes = bytes.len(), "upload validated");

        let staged_kind = match field {
            UploadField::Pdf => FileKind::Pdf,
            // The office suite picks its import filter from the extension.
            UploadField::Word if declared.as_deref() == Some("doc") => FileKind::Doc,
            UploadField::Word => FileKind::Docx,
            UploadField::Image | UploadField::Images => {
                bytes = normalize_blocking(bytes).await?.into_bytes();
                FileKind::Png
            }
        };
        let input = self.store.stage(staged_kind, &bytes).await?;
        self.run(ConversionJob::new(kind, vec![input], options))
            .await
    }

    /// Run the job's transformer on the blocking pool, then release every
    /// staged file of the request.
    async fn run(&self, job: ConversionJob) -> Result<ConversionOutput, ConvertError> {
        let kind = job.kind();
        let transformer = transformer_for(kind, &self.collaborators, &self.config);
        let store = self.store.clone();
        let started = Instant::now();

        // A panicking transformer drops the job during unwinding, which
        // releases its inputs.
        let (result, job) = tokio::task::spawn_blocking(move || {
            let result = transformer.transform(&job, &store);
            (result, job)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("transformer task failed: {e}")))?;

        job.release().await;
        let output = result?;
        let bytes = output.read().await;
        output.release_async().await;
        let bytes = bytes?;

        info!(
            %kind,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "conversion complete"
        );
        Ok(ConversionOutput { kind, bytes })
    }
}

async fn normalize_blocking(bytes: Vec<u8>) -> Result<Normalized, ConvertError> {
    tokio::task::spawn_blocking(move || normalize(bytes))
        .await
        .map_err(|e| ConvertError::Internal(format!("normalizer task failed: {e}")))?
}
