//! Upload validation: filename, extension and size checks.
//!
//! Validation runs on the in-memory upload, before any transient storage is
//! allocated, so a rejected upload never touches disk. Batch endpoints use a
//! [`BatchValidator`] that tracks the running total and rejects the first
//! file that pushes it over the ceiling.

use crate::config::{ServiceConfig, UploadField};
use crate::error::ConvertError;

/// One file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    /// Filename declared by the client, if any.
    pub filename: Option<String>,
    /// Raw payload.
    pub bytes: Vec<u8>,
}

impl UploadedArtifact {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: Some(filename.into()),
            bytes,
        }
    }

    /// A file part submitted without a filename.
    pub fn unnamed(bytes: Vec<u8>) -> Self {
        Self {
            filename: None,
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The declared filename made safe for logs and messages.
    pub fn display_name(&self) -> String {
        self.filename
            .as_deref()
            .map(sanitize_filename)
            .unwrap_or_default()
    }
}

/// Checks uploads against per-field extension sets and the request ceiling.
#[derive(Debug, Clone, Copy)]
pub struct UploadValidator<'a> {
    config: &'a ServiceConfig,
}

impl<'a> UploadValidator<'a> {
    pub fn new(config: &'a ServiceConfig) -> Self {
        Self { config }
    }

    /// Validate a single upload and hand back its payload.
    pub fn validate(
        &self,
        field: UploadField,
        artifact: UploadedArtifact,
    ) -> Result<Vec<u8>, ConvertError> {
        self.check_name(field, &artifact)?;
        let limit = self.config.max_request_bytes;
        if artifact.size() > limit {
            return Err(ConvertError::SizeLimitExceeded {
                limit,
                actual: artifact.size(),
            });
        }
        Ok(artifact.bytes)
    }

    /// Start validating a multi-file batch for `field`.
    pub fn batch(&self, field: UploadField) -> BatchValidator<'a> {
        BatchValidator {
            validator: *self,
            field,
            running_total: 0,
        }
    }

    fn check_name(&self, field: UploadField, artifact: &UploadedArtifact) -> Result<(), ConvertError> {
        let filename = match artifact.filename.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(ConvertError::EmptySelection {
                    field: field.name().to_string(),
                })
            }
        };
        let allowed = self.config.allowed_extensions.for_field(field);
        match extension_of(filename) {
            Some(ext) if allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)) => Ok(()),
            _ => Err(ConvertError::UnsupportedType {
                filename: sanitize_filename(filename),
                allowed: allowed.join(", "),
            }),
        }
    }
}

/// Incremental validator for batch uploads.
#[derive(Debug)]
pub struct BatchValidator<'a> {
    validator: UploadValidator<'a>,
    field: UploadField,
    running_total: u64,
}

impl BatchValidator<'_> {
    /// Validate the next file of the batch; the running total includes it.
    pub fn admit(&mut self, artifact: UploadedArtifact) -> Result<Vec<u8>, ConvertError> {
        self.validator.check_name(self.field, &artifact)?;
        let limit = self.validator.config.max_request_bytes;
        let total = self.running_total.saturating_add(artifact.size());
        if total > limit {
            return Err(ConvertError::SizeLimitExceeded {
                limit,
                actual: total,
            });
        }
        self.running_total = total;
        Ok(artifact.bytes)
    }

    pub fn running_total(&self) -> u64 {
        self.running_total
    }
}

/// Lower-cased text after the last `.`, if there is one.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Strip directory components and anything outside `[A-Za-z0-9._-]`.
///
/// Whitespace becomes `_`; leading dots are removed so the result can never
/// name a hidden file or climb out of a directory.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}
