//! Private working copies of producer-owned clips.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// A copy of a clip inside its own temporary directory.
///
/// The directory (and the copy) is removed when this value is dropped, so the
/// copy never outlives the analysis that needed it.
#[derive(Debug)]
pub struct ClipCopy {
    _dir: TempDir,
    path: PathBuf,
}

impl ClipCopy {
    /// Copy `source` into a fresh temporary directory.
    pub async fn create(source: &Path) -> MediaResult<Self> {
        let file_name = source
            .file_name()
            .ok_or_else(|| MediaError::internal(format!("not a file: {}", source.display())))?;

        let dir = tempfile::Builder::new().prefix("hclip-").tempdir()?;
        let path = dir.path().join(file_name);
        let bytes = tokio::fs::copy(source, &path).await?;

        debug!(
            "Copied {} ({} bytes) to {}",
            source.display(),
            bytes,
            path.display()
        );

        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
