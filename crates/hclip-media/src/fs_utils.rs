//! Moving finished outputs into place.
//!
//! Compilations are written inside a temporary directory and then moved to the
//! output directory, which may sit on a different filesystem.

use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// EXDEV on Linux and macOS.
const CROSS_DEVICE_ERRNO: i32 = 18;

/// Move `src` to `dst`, creating the parent directory and falling back to a
/// copy when a plain rename crosses filesystems.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(CROSS_DEVICE_ERRNO) => {
            debug!("Cross-device move {} -> {}", src.display(), dst.display());
            copy_across(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Copy next to `dst`, rename over it, then drop the source.
async fn copy_across(src: &Path, dst: &Path) -> MediaResult<()> {
    let staging = dst.with_extension("partial");

    fs::copy(src, &staging).await?;
    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!("Moved {} but could not remove it: {}", src.display(), e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("compilation.mp4");
        let dst = dir.path().join("compilations").join("viral.mp4");
        fs::write(&src, b"frames").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_move_replaces_existing_output() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.mp4");
        let dst = dir.path().join("out.mp4");
        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read(&dst).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_copy_across_cleans_up_source() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp4");
        let dst = dir.path().join("b.mp4");
        fs::write(&src, b"bytes").await.unwrap();

        copy_across(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert!(!dst.with_extension("partial").exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"bytes");
    }
}
