//! Pending viral runs and their compilation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use hclip_media::{build_srt, Concatenator};
use hclip_models::{CompilationEntry, CompilationManifest};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Viral clips waiting to be compiled, in arrival order.
#[derive(Debug, Default)]
pub struct PendingRun {
    entries: Vec<CompilationEntry>,
}

impl PendingRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: CompilationEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CompilationEntry] {
        &self.entries
    }

    /// Empty the run, returning its clips.
    pub fn take(&mut self) -> Vec<CompilationEntry> {
        std::mem::take(&mut self.entries)
    }
}

/// Writes compilations (and their sidecars) into the output directory.
pub struct Compiler {
    output_dir: PathBuf,
    concatenator: Arc<dyn Concatenator>,
    write_captions: bool,
    write_manifest: bool,
    seq: AtomicU64,
}

impl Compiler {
    pub fn new(output_dir: impl Into<PathBuf>, concatenator: Arc<dyn Concatenator>) -> Self {
        Self {
            output_dir: output_dir.into(),
            concatenator,
            write_captions: true,
            write_manifest: true,
            seq: AtomicU64::new(0),
        }
    }

    /// Choose which sidecar files accompany each compilation.
    pub fn with_sidecars(mut self, captions: bool, manifest: bool) -> Self {
        self.write_captions = captions;
        self.write_manifest = manifest;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Unique output path: `viral_compilation_<unix_millis>_<seq>.mp4`.
    fn next_output(&self) -> PathBuf {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.output_dir.join(format!(
            "viral_compilation_{}_{}.mp4",
            Utc::now().timestamp_millis(),
            seq
        ))
    }

    /// Concatenate `entries` into one output file.
    ///
    /// An empty list produces nothing. On failure the clips are not retried;
    /// the caller reports the error and moves on.
    pub async fn compile(
        &self,
        entries: Vec<CompilationEntry>,
    ) -> WorkerResult<Option<CompilationManifest>> {
        if entries.is_empty() {
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.next_output();
        let inputs: Vec<PathBuf> = entries.iter().map(|e| e.path.clone()).collect();

        let report = match self.concatenator.concat(&inputs, &output).await {
            Ok(report) => report,
            Err(e) => {
                metrics::record_compilation("failed");
                return Err(WorkerError::concatenation(e.to_string()));
            }
        };

        let manifest = CompilationManifest::new(report.output.clone(), entries);
        info!(
            output = %report.output.display(),
            clips = report.input_count,
            duration_secs = report.total_duration_secs,
            size_bytes = report.output_size,
            "Compilation written"
        );
        metrics::record_compilation("success");

        // Sidecars are best effort; the video is already in place
        if self.write_manifest {
            if let Err(e) = self.write_manifest_file(&manifest).await {
                warn!(output = %report.output.display(), error = %e, "Failed to write manifest");
            }
        }
        if self.write_captions {
            if let Err(e) = self.write_captions_file(&manifest).await {
                warn!(output = %report.output.display(), error = %e, "Failed to write captions");
            }
        }

        Ok(Some(manifest))
    }

    async fn write_manifest_file(&self, manifest: &CompilationManifest) -> WorkerResult<()> {
        let json = serde_json::to_vec_pretty(manifest)?;
        tokio::fs::write(manifest.output.with_extension("json"), json).await?;
        Ok(())
    }

    async fn write_captions_file(&self, manifest: &CompilationManifest) -> WorkerResult<()> {
        let srt = build_srt(&manifest.clips);
        if srt.is_empty() {
            return Ok(());
        }
        tokio::fs::write(manifest.output.with_extension("srt"), srt).await?;
        Ok(())
    }
}
