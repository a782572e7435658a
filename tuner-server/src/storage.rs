//! Per-request spooling of uploads to disk.
//!
//! Each upload lives in its own temporary file owned by a [`ScopedUpload`].
//! The file is removed when the guard drops, whichever way the request ends.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tuner_core::Result;

/// Somewhere an upload can be written for the duration of one request.
pub trait UploadStore: Send + Sync {
    fn persist(&self, bytes: &[u8], extension: Option<&str>) -> Result<ScopedUpload>;
}

/// An upload on disk, deleted on drop.
#[derive(Debug)]
pub struct ScopedUpload {
    file: NamedTempFile,
}

impl ScopedUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Spools uploads into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct TempDirStore {
    dir: PathBuf,
}

impl TempDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl UploadStore for TempDirStore {
    fn persist(&self, bytes: &[u8], extension: Option<&str>) -> Result<ScopedUpload> {
        std::fs::create_dir_all(&self.dir)?;
        let suffix = extension.map(|ext| format!(".{ext}")).unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        tracing::debug!(path = %file.path().display(), bytes = bytes.len(), "upload spooled");
        Ok(ScopedUpload { file })
    }
}
