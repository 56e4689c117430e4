//! Transient storage: scoped acquisition and release of staged files.
//!
//! Every artifact a request touches on disk is a [`StagedFile`] handed out by
//! a [`TransientStore`]. Names come from `tempfile`'s random suffixing, so
//! concurrent requests never collide. A handle is released exactly once:
//! explicitly through [`StagedFile::release`] / [`StagedBatch::release_all`],
//! or implicitly when it is dropped, which covers early returns, `?`
//! propagation and panics inside blocking transformer threads.
//!
//! Release failures are logged and swallowed. By the time a file is released
//! the request outcome has already been decided.

use crate::error::ConvertError;
use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const STAGED_PREFIX: &str = "docconv-";

/// Logical kind of a staged artifact; decides its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    /// Legacy binary Word document.
    Doc,
    Docx,
    Pptx,
    Xlsx,
    Png,
}

impl FileKind {
    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Doc => "doc",
            FileKind::Docx => "docx",
            FileKind::Pptx => "pptx",
            FileKind::Xlsx => "xlsx",
            FileKind::Png => "png",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Allocates uniquely named staged files under one root directory.
#[derive(Debug, Clone)]
pub struct TransientStore {
    root: PathBuf,
}

impl TransientStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ConvertError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| ConvertError::storage("create", &root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate an empty staged file of `kind`.
    pub fn acquire(&self, kind: FileKind) -> Result<StagedFile, ConvertError> {
        let suffix = format!(".{}", kind.extension());
        let file = tempfile::Builder::new()
            .prefix(STAGED_PREFIX)
            .suffix(&suffix)
            .tempfile_in(&self.root)
            .map_err(|e| ConvertError::storage("acquire", &self.root, e))?;
        let (_, path) = file
            .keep()
            .map_err(|e| ConvertError::storage("acquire", &self.root, e.error))?;
        debug!(path = %path.display(), %kind, "staged file acquired");
        Ok(StagedFile {
            path,
            kind,
            released: false,
        })
    }

    /// Acquire a staged file and persist `bytes` into it.
    ///
    /// If the write fails the freshly acquired handle is released before the
    /// error is returned.
    pub async fn stage(&self, kind: FileKind, bytes: &[u8]) -> Result<StagedFile, ConvertError> {
        let file = self.acquire(kind)?;
        file.write(bytes).await?;
        Ok(file)
    }

    /// Number of staged files currently present under the root.
    pub fn staged_count(&self) -> usize {
        std::fs::read_dir(&self.root)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().starts_with(STAGED_PREFIX))
                    .count()
            })
            .unwrap_or(0)
    }
}

/// A transient on-disk artifact owned by one request.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    kind: FileKind,
    released: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub async fn write(&self, bytes: &[u8]) -> Result<(), ConvertError> {
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| ConvertError::storage("write", &self.path, e))
    }

    /// Blocking variant of [`StagedFile::write`] for transformer threads.
    pub fn write_blocking(&self, bytes: &[u8]) -> Result<(), ConvertError> {
        std::fs::write(&self.path, bytes).map_err(|e| ConvertError::storage("write", &self.path, e))
    }

    pub async fn read(&self) -> Result<Vec<u8>, ConvertError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| ConvertError::storage("read", &self.path, e))
    }

    /// Current size on disk.
    pub fn byte_len(&self) -> Result<u64, ConvertError> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| ConvertError::storage("stat", &self.path, e))
    }

    /// Delete the file. Idempotent; failures are logged, never returned.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "staged file released"),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to release staged file")
            }
        }
    }

    /// Async release used when many handles are released concurrently.
    pub async fn release_async(mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "staged file released"),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "failed to release staged file")
            }
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.release();
    }
}

/// An ordered group of staged files released together.
#[derive(Debug, Default)]
pub struct StagedBatch {
    files: Vec<StagedFile>,
}

impl StagedBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: StagedFile) {
        self.files.push(file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn into_files(mut self) -> Vec<StagedFile> {
        std::mem::take(&mut self.files)
    }

    /// Release every handle concurrently, whatever state the batch is in.
    pub async fn release_all(self) {
        release_files(self.into_files()).await;
    }
}

impl From<Vec<StagedFile>> for StagedBatch {
    fn from(files: Vec<StagedFile>) -> Self {
        Self { files }
    }
}

/// Release a set of handles concurrently.
pub async fn release_files(files: Vec<StagedFile>) {
    if files.is_empty() {
        return;
    }
    let count = files.len();
    join_all(files.into_iter().map(StagedFile::release_async)).await;
    debug!(count, "staged batch released");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, TransientStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TransientStore::new(dir.path().join("staging")).expect("store");
        (dir, store)
    }

    #[test]
    fn acquire_names_are_unique_and_typed() {
        let (_dir, store) = store();
        let a = store.acquire(FileKind::Pdf).unwrap();
        let b = store.acquire(FileKind::Pdf).unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().extension().unwrap(), "pdf");
        assert_eq!(store.staged_count(), 2);
    }

    #[test]
    fn legacy_word_keeps_its_extension() {
        let (_dir, store) = store();
        let file = store.acquire(FileKind::Doc).unwrap();
        assert_eq!(file.path().extension().unwrap(), "doc");
    }

    #[test]
    fn drop_releases_file() {
        let (_dir, store) = store();
        let file = store.acquire(FileKind::Docx).unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
        assert_eq!(store.staged_count(), 0);
    }

    #[test]
    fn release_is_idempotent_and_tolerates_missing_file() {
        let (_dir, store) = store();
        let mut file = store.acquire(FileKind::Png).unwrap();
        std::fs::remove_file(file.path()).unwrap();
        file.release();
        file.release();
        drop(file);
        assert_eq!(store.staged_count(), 0);
    }

    #[tokio::test]
    async fn stage_writes_content() {
        let (_dir, store) = store();
        let file = store.stage(FileKind::Pdf, b"%PDF-1.4").await.unwrap();
        assert_eq!(file.read().await.unwrap(), b"%PDF-1.4");
        assert_eq!(file.byte_len().unwrap(), 8);
    }

    #[tokio::test]
    async fn batch_release_removes_every_file() {
        let (_dir, store) = store();
        let mut batch = StagedBatch::new();
        for _ in 0..5 {
            batch.push(store.stage(FileKind::Png, b"x").await.unwrap());
        }
        // One file vanishes underneath the batch; the rest must still go.
        std::fs::remove_file(batch.files()[2].path()).unwrap();
        assert_eq!(store.staged_count(), 4);
        batch.release_all().await;
        assert_eq!(store.staged_count(), 0);
    }

    #[test]
    fn acquire_fails_loudly_when_root_is_gone() {
        let (_dir, store) = store();
        std::fs::remove_dir_all(store.root()).unwrap();
        let err = store.acquire(FileKind::Pdf).unwrap_err();
        assert!(matches!(err, ConvertError::Storage { op: "acquire", .. }));
    }
}
