//! Frame decoding via FFmpeg subprocesses.
//!
//! Three decode paths:
//! - a coarse grayscale rawvideo pipe for motion scoring (no files touch disk),
//! - selective full-resolution PNG extraction for chosen keyframes,
//! - exhaustive PNG sequence extraction for compositing.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaResult, VideoProcessingError};

/// Decode a video as downscaled grayscale frames, invoking `on_frame` with
/// the frame index and raw `width * height` luma bytes for each frame.
///
/// Returns the number of frames decoded. The whole decode is bounded by
/// `timeout_secs`; on timeout the child is killed.
pub async fn decode_gray_frames<F>(
    path: impl AsRef<Path>,
    width: u32,
    height: u32,
    timeout_secs: u64,
    on_frame: F,
) -> MediaResult<u64>
where
    F: FnMut(u64, &[u8]),
{
    let path = path.as_ref();

    if !path.exists() {
        return Err(VideoProcessingError::FileNotFound(path.to_path_buf()));
    }
    which::which("ffmpeg").map_err(|_| VideoProcessingError::FfmpegNotFound)?;

    let frame_bytes = (width as usize) * (height as usize);
    debug!(
        video = %path.display(),
        width,
        height,
        "Decoding grayscale frame stream"
    );

    let mut child = Command::new("ffmpeg")
        .arg("-v")
        .arg("error")
        .arg("-i")
        .arg(path)
        .args(["-vf", &format!("scale={width}:{height}")])
        .args(["-f", "rawvideo", "-pix_fmt", "gray"])
        .arg("pipe:1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| VideoProcessingError::internal("ffmpeg stdout not captured"))?;

    let read_loop = read_gray_frames(&mut stdout, frame_bytes, on_frame);

    let decoded = match tokio::time::timeout(
        std::time::Duration::from_secs(timeout_secs),
        read_loop,
    )
    .await
    {
        Ok(Ok(frames)) => frames,
        Ok(Err(e)) => {
            // A broken pipe mid-stream must not leave the child running.
            let _ = child.kill().await;
            return Err(e);
        }
        Err(_) => {
            warn!("Grayscale decode timed out after {}s, killing ffmpeg", timeout_secs);
            let _ = child.kill().await;
            return Err(VideoProcessingError::Timeout(timeout_secs));
        }
    };

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(VideoProcessingError::ffmpeg_failed(
            "Grayscale decode failed",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
            output.status.code(),
        ));
    }

    if decoded == 0 {
        return Err(VideoProcessingError::EmptyVideo(path.to_path_buf()));
    }

    Ok(decoded)
}

/// Read whole `frame_bytes`-sized luma frames off `reader` until EOF,
/// delivering each to `on_frame`. Returns the number of complete frames.
async fn read_gray_frames<R, F>(
    reader: &mut R,
    frame_bytes: usize,
    mut on_frame: F,
) -> MediaResult<u64>
where
    R: tokio::io::AsyncRead + Unpin,
    F: FnMut(u64, &[u8]),
{
    let mut buf = vec![0u8; frame_bytes];
    let mut frame_index = 0u64;
    loop {
        match reader.read_exact(&mut buf).await {
            Ok(_) => {
                on_frame(frame_index, &buf);
                frame_index += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(VideoProcessingError::from(e)),
        }
    }
    Ok(frame_index)
}

/// Extract specific frames at full resolution as PNG files named
/// `kf_<frame_index>.png` in `out_dir`. Returns paths in the order of
/// `indices` (which must be sorted ascending).
pub async fn extract_frames_by_index(
    video: impl AsRef<Path>,
    indices: &[u64],
    out_dir: impl AsRef<Path>,
    timeout_secs: u64,
) -> MediaResult<Vec<PathBuf>> {
    let video = video.as_ref();
    let out_dir = out_dir.as_ref();

    if indices.is_empty() {
        return Ok(Vec::new());
    }
    debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));

    tokio::fs::create_dir_all(out_dir).await?;

    // select= emits the chosen frames in input order, so the sequential
    // output numbers map 1:1 onto the sorted indices.
    let select_expr = indices
        .iter()
        .map(|i| format!("eq(n\\,{i})"))
        .collect::<Vec<_>>()
        .join("+");

    let pattern = out_dir.join("sel_%06d.png");
    let cmd = FfmpegCommand::new(video, &pattern)
        .video_filter(format!("select='{select_expr}'"))
        .passthrough_sync();

    FfmpegRunner::new()
        .with_timeout(timeout_secs)
        .run(&cmd)
        .await?;

    let mut paths = Vec::with_capacity(indices.len());
    for (seq, &frame_index) in indices.iter().enumerate() {
        let src = out_dir.join(format!("sel_{:06}.png", seq + 1));
        let dst = out_dir.join(format!("kf_{frame_index}.png"));
        if !src.exists() {
            return Err(VideoProcessingError::internal(format!(
                "Expected extracted frame {} missing",
                src.display()
            )));
        }
        tokio::fs::rename(&src, &dst).await?;
        paths.push(dst);
    }

    Ok(paths)
}

/// Extract every frame of a video as `%06d.png` files in `out_dir`.
/// Returns the number of frames written.
pub async fn extract_frame_sequence(
    video: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    timeout_secs: u64,
) -> MediaResult<u64> {
    let video = video.as_ref();
    let out_dir = out_dir.as_ref();

    tokio::fs::create_dir_all(out_dir).await?;

    let pattern = out_dir.join("%06d.png");
    let cmd = FfmpegCommand::new(video, &pattern).passthrough_sync();

    FfmpegRunner::new()
        .with_timeout(timeout_secs)
        .run(&cmd)
        .await?;

    let mut count = 0u64;
    let mut entries = tokio::fs::read_dir(out_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.path().extension().is_some_and(|e| e == "png") {
            count += 1;
        }
    }

    if count == 0 {
        return Err(VideoProcessingError::EmptyVideo(video.to_path_buf()));
    }

    Ok(count)
}

/// Path of the `n`-th extracted frame (1-based, matching `%06d.png`).
pub fn sequence_frame_path(dir: &Path, n: u64) -> PathBuf {
    dir.join(format!("{n:06}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_frame_path() {
        let p = sequence_frame_path(Path::new("/tmp/frames"), 7);
        assert_eq!(p, Path::new("/tmp/frames/000007.png"));
    }

    #[tokio::test]
    async fn test_decode_missing_file() {
        let err = decode_gray_frames("/nonexistent.mp4", 64, 36, 5, |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, VideoProcessingError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_read_gray_frames_counts_whole_frames() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&[1u8; 4])
            .read(&[2u8; 4])
            .build();

        let mut seen = Vec::new();
        let frames = read_gray_frames(&mut reader, 4, |i, buf| seen.push((i, buf[0])))
            .await
            .unwrap();
        assert_eq!(frames, 2);
        assert_eq!(seen, vec![(0, 1), (1, 2)]);
    }

    #[tokio::test]
    async fn test_read_gray_frames_surfaces_mid_stream_error() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&[1u8; 4])
            .read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"))
            .build();

        let mut delivered = 0;
        let err = read_gray_frames(&mut reader, 4, |_, _| delivered += 1)
            .await
            .unwrap_err();
        assert_eq!(delivered, 1);
        assert!(matches!(err, VideoProcessingError::Io(_)));
    }

    #[tokio::test]
    async fn test_extract_no_indices() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = extract_frames_by_index("unused.mp4", &[], dir.path(), 5)
            .await
            .unwrap();
        assert!(paths.is_empty());
    }
}
