//! Raster normalization to canonical PNG.
//!
//! Bytes whose format cannot be recognised or decoded are passed through
//! unchanged; the downstream packer then emits a blank page for them. That
//! includes truncated files, which surface as an early end of input. Any
//! other failure (allocation limits, bad decoder parameters) rejects the file.

use crate::error::ConvertError;
use image::{ImageError, ImageFormat};
use std::io::{self, Cursor};
use tracing::{debug, warn};

/// Outcome of normalizing one image upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Decoded and re-encoded as PNG.
    Canonical(Vec<u8>),
    /// Undecodable; the original bytes, untouched.
    PassedThrough(Vec<u8>),
}

impl Normalized {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Normalized::Canonical(b) | Normalized::PassedThrough(b) => b,
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, Normalized::Canonical(_))
    }
}

/// Decode `bytes` and re-encode them as PNG.
pub fn normalize(bytes: Vec<u8>) -> Result<Normalized, ConvertError> {
    let decoded = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(ImageError::Decoding(e)) => {
            warn!(error = %e, len = bytes.len(), "image not decodable, passing through");
            return Ok(Normalized::PassedThrough(bytes));
        }
        Err(ImageError::Unsupported(e)) => {
            warn!(error = %e, len = bytes.len(), "image format unsupported, passing through");
            return Ok(Normalized::PassedThrough(bytes));
        }
        Err(ImageError::IoError(e))
            if matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData
            ) =>
        {
            warn!(error = %e, len = bytes.len(), "image truncated, passing through");
            return Ok(Normalized::PassedThrough(bytes));
        }
        Err(e) => {
            return Err(ConvertError::Internal(format!("image normalization failed: {e}")));
        }
    };

    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| ConvertError::Internal(format!("PNG re-encode failed: {e}")))?;
    let out = out.into_inner();
    debug!(
        width = decoded.width(),
        height = decoded.height(),
        bytes = out.len(),
        "image normalized to PNG"
    );
    Ok(Normalized::Canonical(out))
}
