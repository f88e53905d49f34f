//! Filesystem helpers for publishing rendered outputs.
//!
//! Rendered files are written into scratch directories and then moved into
//! place; the move must survive scratch and destination living on different
//! filesystems.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaResult, VideoProcessingError};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Attempts a fast rename first. If that fails with EXDEV (cross-device
/// link error), falls back to copying to a temp file next to `dst` and
/// renaming it, so the destination either has the old content or the
/// complete new content, never a partial write.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(VideoProcessingError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

/// Copy file to destination (via temp file) then delete source.
async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    // Temp file in the destination directory guarantees same filesystem
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        VideoProcessingError::from(e)
    })?;

    fs::rename(&tmp_dst, dst).await.map_err(|e| {
        let _ = std::fs::remove_file(&tmp_dst);
        tracing::error!(
            "Failed to rename temp file during cross-device move: {} -> {}: {}",
            tmp_dst.display(),
            dst.display(),
            e
        );
        VideoProcessingError::from(e)
    })?;

    // Source removal is best effort
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("render.mp4");
        let dst = dir.path().join("final.mp4");

        fs::write(&src, b"frame data").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists(), "source should be removed");
        assert!(dst.exists(), "destination should exist");
        assert_eq!(fs::read(&dst).await.unwrap(), b"frame data");
    }

    #[tokio::test]
    async fn test_move_file_creates_parent() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("render.mp4");
        let dst = dir.path().join("out").join("final.mp4");

        fs::write(&src, b"frame data").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert!(dst.exists());
    }

    #[tokio::test]
    async fn test_move_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("render.mp4");
        let dst = dir.path().join("final.mp4");

        fs::write(&src, b"new render").await.unwrap();
        fs::write(&dst, b"stale render").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"new render");
    }

    #[test]
    fn test_is_cross_device_error() {
        let exdev = std::io::Error::from_raw_os_error(18);
        assert!(is_cross_device_error(&exdev));

        let not_found = std::io::Error::from_raw_os_error(2);
        assert!(!is_cross_device_error(&not_found));
    }
}
