//! Stream-copy concatenation with the FFmpeg concat demuxer.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::move_file;
use crate::probe::probe_video;

/// Summary of a finished concatenation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatReport {
    pub output: PathBuf,
    pub input_count: usize,
    /// Sum of the input durations
    pub total_duration_secs: f64,
    pub output_size: u64,
}

/// Joins clips into a single file.
#[async_trait]
pub trait Concatenator: Send + Sync {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<ConcatReport>;
}

/// [`Concatenator`] backed by [`concat_clips`].
#[derive(Debug, Clone, Default)]
pub struct FfmpegConcatenator;

#[async_trait]
impl Concatenator for FfmpegConcatenator {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<ConcatReport> {
        concat_clips(inputs, output).await
    }
}

/// Concatenate `inputs` in order into `output` without re-encoding.
///
/// Every input is probed and validated first; one bad input fails the whole
/// operation before FFmpeg runs.
pub async fn concat_clips(inputs: &[PathBuf], output: &Path) -> MediaResult<ConcatReport> {
    if inputs.is_empty() {
        return Err(MediaError::concat_failed("no inputs"));
    }

    let mut total_duration_secs = 0.0;
    for input in inputs {
        let info = probe_video(input).await.map_err(|e| {
            MediaError::concat_failed(format!("{}: {}", input.display(), e))
        })?;
        info.validate().map_err(|e| {
            MediaError::concat_failed(format!("{}: {}", input.display(), e))
        })?;
        total_duration_secs += info.duration;
    }

    let work_dir = tempfile::Builder::new().prefix("hclip-concat-").tempdir()?;
    let list_path = work_dir.path().join("inputs.ffconcat");
    tokio::fs::write(&list_path, concat_list(inputs)).await?;

    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let staged = work_dir.path().join(format!("compilation.{}", extension));

    let cmd = FfmpegCommand::new(&list_path, &staged)
        .input_format("concat")
        .input_args(["-safe", "0"])
        .codec_copy();

    let total_ms = (total_duration_secs * 1000.0) as i64;
    FfmpegRunner::new()
        .run_with_progress(&cmd, move |p| {
            debug!("Concatenation {:.0}%", p.percentage(total_ms));
        })
        .await
        .map_err(|e| match e {
            MediaError::FfmpegFailed {
                exit_code, stderr, ..
            } => MediaError::concat_failed(format!(
                "ffmpeg exited with {:?}: {}",
                exit_code,
                stderr.unwrap_or_default()
            )),
            other => other,
        })?;

    move_file(&staged, output).await?;
    let output_size = tokio::fs::metadata(output).await?.len();

    info!(
        "Concatenated {} clips into {} ({:.2}s, {} bytes)",
        inputs.len(),
        output.display(),
        total_duration_secs,
        output_size
    );

    Ok(ConcatReport {
        output: output.to_path_buf(),
        input_count: inputs.len(),
        total_duration_secs,
        output_size,
    })
}

/// Render an ffconcat list for `inputs`.
fn concat_list(inputs: &[PathBuf]) -> String {
    let mut list = String::from("ffconcat version 1.0\n");
    for input in inputs {
        let escaped = input.to_string_lossy().replace('\'', r"'\''");
        list.push_str(&format!("file '{}'\n", escaped));
    }
    list
}
