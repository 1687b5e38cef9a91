//! Directory-watching clip orchestrator.
//!
//! One control loop owns the pending run. For each new clip it waits for the
//! producer to finish writing, fans analysis out to the worker tasks for a
//! fixed budget, asks the correlator for a verdict and either extends the
//! run or flushes it into a compilation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use hclip_chat::HypeTracker;
use hclip_media::{
    ClipCopy, ClipInspector, ClipReadinessGuard, Concatenator, FfmpegInspector, ReadyState,
    VideoInfo,
};
use hclip_models::{
    ClipId, ClipOutcome, ClipStage, CompilationEntry, CompilationManifest, ViralVerdict,
};

use crate::analyzers::{Analyzers, SamplingConfig};
use crate::compiler::{Compiler, PendingRun};
use crate::config::{HypeGate, WorkerConfig};
use crate::correlator::ClipEventCorrelator;
use crate::error::WorkerResult;
use crate::logging::ClipLogger;
use crate::metrics;

const CLIP_EXTENSION: &str = "mp4";

/// Drives every clip from discovery to a terminal outcome.
pub struct ClipOrchestrator<I: ClipInspector = FfmpegInspector> {
    config: WorkerConfig,
    guard: ClipReadinessGuard<I>,
    analyzers: Analyzers,
    sampling: SamplingConfig,
    correlator: Arc<ClipEventCorrelator>,
    compiler: Compiler,
    hype: HypeTracker,
    pending: PendingRun,
    processed: HashSet<PathBuf>,
    clips_seen: u64,
    last_new_clip: Instant,
}

impl<I: ClipInspector> ClipOrchestrator<I> {
    pub fn new(
        config: WorkerConfig,
        guard: ClipReadinessGuard<I>,
        analyzers: Analyzers,
        concatenator: Arc<dyn Concatenator>,
        hype: HypeTracker,
    ) -> Self {
        let compiler = Compiler::new(&config.output_dir, concatenator)
            .with_sidecars(config.write_captions, config.write_manifest);

        Self {
            sampling: SamplingConfig::from(&config),
            config,
            guard,
            analyzers,
            correlator: Arc::new(ClipEventCorrelator::new()),
            compiler,
            hype,
            pending: PendingRun::new(),
            processed: HashSet::new(),
            clips_seen: 0,
            last_new_clip: Instant::now(),
        }
    }

    /// Clips waiting in the current viral run.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn correlator(&self) -> &Arc<ClipEventCorrelator> {
        &self.correlator
    }

    /// Poll the clips directory until `shutdown` fires, then flush.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> WorkerResult<()> {
        tokio::fs::create_dir_all(&self.config.clips_dir).await?;
        info!(
            clips_dir = %self.config.clips_dir.display(),
            output_dir = %self.config.output_dir.display(),
            hype_gate = self.config.hype_gate.as_str(),
            "Watching for clips"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.last_new_clip = Instant::now();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping orchestrator");
                        break;
                    }
                }
                _ = interval.tick() => {
                    let clips = match self.scan().await {
                        Ok(clips) => clips,
                        Err(e) => {
                            warn!(error = %e, "Failed to scan clips directory");
                            continue;
                        }
                    };

                    for path in clips {
                        if *shutdown.borrow() {
                            break;
                        }
                        self.process_clip(&path).await;
                    }
                    self.check_quiescence().await;
                }
            }
        }

        if !self.pending.is_empty() {
            info!(clips = self.pending.len(), "Flushing pending run before exit");
        }
        self.flush().await;
        info!("Orchestrator stopped");
        Ok(())
    }

    /// New clips in name order; each is marked processed as it is returned.
    async fn scan(&mut self) -> WorkerResult<Vec<PathBuf>> {
        let mut dir = tokio::fs::read_dir(&self.config.clips_dir).await?;
        let mut found = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if !is_clip(&path) || self.processed.contains(&path) {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                found.push(path);
            }
        }

        found.sort();
        if !found.is_empty() {
            debug!(count = found.len(), "Discovered new clips");
            self.last_new_clip = Instant::now();
        }
        self.processed.extend(found.iter().cloned());
        Ok(found)
    }

    /// Flush a lingering run once no clip has arrived for the quiescence period.
    async fn check_quiescence(&mut self) {
        let Some(quiescence) = self.config.quiescence else {
            return;
        };
        if !self.pending.is_empty() && self.last_new_clip.elapsed() >= quiescence {
            info!(
                clips = self.pending.len(),
                idle_secs = quiescence.as_secs_f64(),
                "No new clips, flushing pending run"
            );
            self.flush().await;
        }
    }

    /// Run one clip through the full pipeline.
    pub async fn process_clip(&mut self, path: &Path) -> ClipOutcome {
        let clip_id = ClipId::from_path(path);
        let mut logger = ClipLogger::new(&clip_id);
        self.processed.insert(path.to_path_buf());
        self.clips_seen += 1;

        let outcome = if self.config.skip_first_clip && self.clips_seen == 1 {
            ClipOutcome::WarmUp
        } else {
            self.evaluate(&clip_id, path, &mut logger).await
        };

        match &outcome {
            ClipOutcome::Viral {
                description,
                peak_offset_secs,
            } => {
                logger.log_progress(&format!(
                    "viral at {:.1}s, pending compilation: {} (run length {})",
                    peak_offset_secs,
                    description,
                    self.pending.len()
                ));
            }
            ClipOutcome::Corrupt { reason } => logger.log_skip(&format!("corrupt: {}", reason)),
            other => logger.log_skip(other.label()),
        }

        if outcome.breaks_run() {
            self.flush().await;
        }

        self.correlator.remove(&clip_id).await;
        metrics::record_clip_processed(outcome.label());
        outcome
    }

    async fn evaluate(
        &mut self,
        clip_id: &ClipId,
        path: &Path,
        logger: &mut ClipLogger,
    ) -> ClipOutcome {
        logger.enter(ClipStage::Stabilizing);
        let info = match self.guard.wait_ready(path, self.config.ready_max_wait).await {
            ReadyState::Ready(info) => info,
            ReadyState::TimedOut => return ClipOutcome::NotReady,
            ReadyState::Corrupt(e) => {
                return ClipOutcome::Corrupt {
                    reason: e.to_string(),
                }
            }
        };

        let copy = if self.guard.config().defensive_copy {
            match ClipCopy::create(path).await {
                Ok(copy) => Some(copy),
                Err(e) => {
                    logger.log_warning(&format!("defensive copy failed, reading in place: {}", e));
                    None
                }
            }
        } else {
            None
        };
        let analysis_path = copy.as_ref().map(|c| c.path()).unwrap_or(path);

        logger.enter(ClipStage::Analyzing);
        self.collect(clip_id, analysis_path).await;
        drop(copy);

        let verdict = self.correlator.compute_verdict(clip_id).await;
        logger.enter(ClipStage::Verdicted);
        info!(
            clip_id = %clip_id,
            viral = verdict.is_viral,
            dominant = verdict.dominant_emotion.as_deref().unwrap_or("none"),
            ratio = verdict.ratio,
            "Verdict computed"
        );

        if !verdict.is_viral {
            return ClipOutcome::Regular;
        }

        let (from, to) = clip_time_range(path, &info).await;
        let hyped = self.hype.is_hyped(from, to);
        match self.config.hype_gate {
            HypeGate::Required if !hyped => return ClipOutcome::NotHyped,
            HypeGate::Required => {}
            HypeGate::Disabled => {
                info!(clip_id = %clip_id, hyped, "Chat hype (not gating)");
            }
        }

        let entry = self.entry(clip_id, path, &info, &verdict).await;
        let outcome = ClipOutcome::Viral {
            description: entry.description.clone(),
            peak_offset_secs: entry.peak_offset_secs,
        };
        self.pending.push(entry);
        outcome
    }

    /// Feed worker events to the correlator until the budget runs out or
    /// every worker is done.
    async fn collect(&self, clip_id: &ClipId, path: &Path) {
        self.correlator.register(clip_id).await;

        let (tx, mut rx) = mpsc::channel(self.config.event_buffer.max(1));
        let handles = self.analyzers.spawn(path, &self.sampling, tx);
        let started = Instant::now();
        let deadline = started + self.config.clip_budget;

        loop {
            let now = Instant::now();
            if now >= deadline {
                debug!(clip_id = %clip_id, "Analysis budget exhausted");
                break;
            }
            let wait = self.config.collect_poll.min(deadline - now);
            match tokio::time::timeout(wait, rx.recv()).await {
                Ok(Some(event)) => self.correlator.add_event(clip_id, event).await,
                Ok(None) => {
                    debug!(clip_id = %clip_id, "All analyzers finished");
                    break;
                }
                Err(_) => {}
            }
        }

        // Keep what was already emitted, then stop the stragglers
        rx.close();
        while let Ok(event) = rx.try_recv() {
            self.correlator.add_event(clip_id, event).await;
        }
        for handle in handles {
            handle.abort();
        }

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_analysis_duration(elapsed);
        let events = self.correlator.event_count(clip_id).await;
        debug!(
            clip_id = %clip_id,
            events = events,
            elapsed_secs = elapsed,
            "Collection finished"
        );
    }

    async fn entry(
        &self,
        clip_id: &ClipId,
        path: &Path,
        info: &VideoInfo,
        verdict: &ViralVerdict,
    ) -> CompilationEntry {
        CompilationEntry {
            clip_id: clip_id.clone(),
            path: path.to_path_buf(),
            description: verdict
                .description
                .clone()
                .unwrap_or_else(|| hclip_models::UNKNOWN_SCENE.to_string()),
            peak_offset_secs: verdict.peak_offset_secs.unwrap_or(0.0),
            duration_secs: info.duration,
            transcript: self.correlator.transcript(clip_id).await,
        }
    }

    /// Compile and clear the pending run.
    ///
    /// A failed compilation is reported once and the run is discarded.
    pub async fn flush(&mut self) -> Option<CompilationManifest> {
        if self.pending.is_empty() {
            return None;
        }
        let entries = self.pending.take();
        let count = entries.len();

        match self.compiler.compile(entries).await {
            Ok(Some(manifest)) => {
                for entry in &manifest.clips {
                    ClipLogger::new(&entry.clip_id).enter(ClipStage::Compiled);
                }
                Some(manifest)
            }
            Ok(None) => None,
            Err(e) => {
                error!(clips = count, error = %e, "Compilation failed, discarding run");
                None
            }
        }
    }
}

fn is_clip(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(true);
    let mp4 = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case(CLIP_EXTENSION))
        .unwrap_or(false);
    mp4 && !hidden
}

/// Wall-clock span covered by a clip: it ended when last written.
async fn clip_time_range(path: &Path, info: &VideoInfo) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::now()));
    let span = ChronoDuration::milliseconds((info.duration.max(0.0) * 1000.0) as i64);
    (end - span, end)
}
