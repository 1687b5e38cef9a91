//! Readiness and corruption checks for clips written by an external producer.
//!
//! A clip is ready only when all of these hold:
//! 1. the file exists and is non-empty
//! 2. its size is unchanged across `stability_rounds` samples, each taken one
//!    cooldown apart (any growth restarts the count)
//! 3. ffprobe reports a positive frame count, frame rate, width and height
//! 4. the first `test_frames` frames decode without diagnostics
//!
//! The guard only reads the file. Nothing here mutates or deletes it.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Readiness policy.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Unchanged size samples required after the baseline sample
    pub stability_rounds: u32,
    /// Delay between size samples
    pub cooldown: Duration,
    /// Delay between polls while the file is missing or empty
    pub poll_interval: Duration,
    /// Leading frames that must decode cleanly
    pub test_frames: u32,
    /// Analyze a private copy instead of the producer's file
    pub defensive_copy: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            stability_rounds: 3,
            cooldown: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            test_frames: 10,
            defensive_copy: false,
        }
    }
}

impl GuardConfig {
    /// Load from `HCLIP_GUARD_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            stability_rounds: std::env::var("HCLIP_GUARD_ROUNDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.stability_rounds)
                .max(1),
            cooldown: std::env::var("HCLIP_GUARD_COOLDOWN_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.cooldown),
            poll_interval: std::env::var("HCLIP_GUARD_POLL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            test_frames: std::env::var("HCLIP_GUARD_TEST_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.test_frames),
            defensive_copy: std::env::var("HCLIP_GUARD_DEFENSIVE_COPY")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.defensive_copy),
        }
    }
}

/// Result of one size observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Size matches the previous sample `rounds` times in a row (or is the first sample)
    Settling { rounds: u32 },
    /// Size has been unchanged for all required rounds
    Stable,
    /// Size differs from the previous sample; the count restarted
    Changed,
}

/// Multi-round file size stability state machine.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    required_rounds: u32,
    last_size: Option<u64>,
    unchanged_rounds: u32,
}

impl StabilityTracker {
    pub fn new(required_rounds: u32) -> Self {
        Self {
            required_rounds: required_rounds.max(1),
            last_size: None,
            unchanged_rounds: 0,
        }
    }

    /// Record a size sample.
    pub fn observe(&mut self, size: u64) -> Stability {
        match self.last_size {
            None => {
                self.last_size = Some(size);
                self.unchanged_rounds = 0;
                Stability::Settling { rounds: 0 }
            }
            Some(prev) if prev == size => {
                self.unchanged_rounds += 1;
                if self.unchanged_rounds >= self.required_rounds {
                    Stability::Stable
                } else {
                    Stability::Settling {
                        rounds: self.unchanged_rounds,
                    }
                }
            }
            Some(_) => {
                self.last_size = Some(size);
                self.unchanged_rounds = 0;
                Stability::Changed
            }
        }
    }

    /// Forget all samples.
    pub fn reset(&mut self) {
        self.last_size = None;
        self.unchanged_rounds = 0;
    }
}

/// File and decoder access used by the guard.
#[async_trait]
pub trait ClipInspector: Send + Sync {
    /// Current size, or `None` if the file does not exist.
    async fn file_size(&self, path: &Path) -> MediaResult<Option<u64>>;

    /// Container and stream metadata.
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;

    /// Decode the first `count` frames, failing on any decoder complaint.
    async fn decode_test_frames(&self, path: &Path, count: u32) -> MediaResult<()>;
}

/// [`ClipInspector`] backed by the filesystem and FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegInspector {
    decode_timeout_secs: u64,
}

impl Default for FfmpegInspector {
    fn default() -> Self {
        Self {
            decode_timeout_secs: 30,
        }
    }
}

#[async_trait]
impl ClipInspector for FfmpegInspector {
    async fn file_size(&self, path: &Path) -> MediaResult<Option<u64>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video(path).await
    }

    async fn decode_test_frames(&self, path: &Path, count: u32) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(path, "-")
            .max_frames(count)
            .output_format("null")
            .log_level("error");

        let outcome = FfmpegRunner::new()
            .with_timeout(self.decode_timeout_secs)
            .run(&cmd)
            .await
            .map_err(|e| match e {
                MediaError::FfmpegFailed { stderr, .. } => MediaError::decode_failed(
                    stderr
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| "decoder exited with an error".to_string()),
                ),
                other => other,
            })?;

        if let Some(first) = outcome.diagnostics.first() {
            return Err(MediaError::decode_failed(first.clone()));
        }
        if outcome.progress.frame < u64::from(count) {
            return Err(MediaError::decode_failed(format!(
                "decoded {} of {} test frames",
                outcome.progress.frame, count
            )));
        }
        Ok(())
    }
}

/// Outcome of a single readiness check.
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Missing,
    Empty,
    /// Size changed between samples
    Unstable,
    Ready(VideoInfo),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready(_))
    }
}

/// Outcome of waiting for a clip.
#[derive(Debug)]
pub enum ReadyState {
    Ready(VideoInfo),
    TimedOut,
    /// Stable on disk but not decodable; never retried
    Corrupt(MediaError),
}

/// Decides whether a clip is safe to open.
pub struct ClipReadinessGuard<I = FfmpegInspector> {
    config: GuardConfig,
    inspector: I,
}

impl ClipReadinessGuard<FfmpegInspector> {
    pub fn new(config: GuardConfig) -> Self {
        Self::with_inspector(config, FfmpegInspector::default())
    }
}

impl<I: ClipInspector> ClipReadinessGuard<I> {
    pub fn with_inspector(config: GuardConfig, inspector: I) -> Self {
        Self { config, inspector }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Sample the size once plus `stability_rounds` more times, then validate.
    pub async fn check(&self, path: &Path) -> MediaResult<Readiness> {
        let mut tracker = StabilityTracker::new(self.config.stability_rounds);

        loop {
            let size = match self.inspector.file_size(path).await? {
                None => return Ok(Readiness::Missing),
                Some(0) => return Ok(Readiness::Empty),
                Some(size) => size,
            };

            match tracker.observe(size) {
                Stability::Stable => break,
                Stability::Changed => return Ok(Readiness::Unstable),
                Stability::Settling { .. } => tokio::time::sleep(self.config.cooldown).await,
            }
        }

        let info = self.validate_structure(path).await?;
        Ok(Readiness::Ready(info))
    }

    /// Whether the clip passes every check right now.
    pub async fn is_ready(&self, path: &Path) -> bool {
        match self.check(path).await {
            Ok(readiness) => readiness.is_ready(),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Readiness check failed");
                false
            }
        }
    }

    /// Poll until the clip is ready, corrupt, or `max_wait` has elapsed.
    pub async fn wait_ready(&self, path: &Path, max_wait: Duration) -> ReadyState {
        let deadline = Instant::now() + max_wait;
        let mut tracker = StabilityTracker::new(self.config.stability_rounds);

        loop {
            let delay = match self.inspector.file_size(path).await {
                Ok(Some(size)) if size > 0 => match tracker.observe(size) {
                    Stability::Stable => match self.validate_structure(path).await {
                        Ok(info) => {
                            info!(
                                path = %path.display(),
                                frames = info.frame_count,
                                fps = info.fps,
                                "Clip ready"
                            );
                            return ReadyState::Ready(info);
                        }
                        Err(e) if e.is_corrupt_input() => {
                            warn!(path = %path.display(), error = %e, "Clip is corrupt");
                            return ReadyState::Corrupt(e);
                        }
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Validation failed, retrying");
                            tracker.reset();
                            self.config.poll_interval
                        }
                    },
                    Stability::Settling { rounds } => {
                        debug!(path = %path.display(), size, rounds, "Clip settling");
                        self.config.cooldown
                    }
                    Stability::Changed => {
                        debug!(path = %path.display(), size, "Clip still growing");
                        self.config.cooldown
                    }
                },
                Ok(_) => {
                    tracker.reset();
                    self.config.poll_interval
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Failed to stat clip");
                    tracker.reset();
                    self.config.poll_interval
                }
            };

            if Instant::now() + delay > deadline {
                warn!(
                    path = %path.display(),
                    max_wait_secs = max_wait.as_secs_f64(),
                    "Clip not ready before deadline"
                );
                return ReadyState::TimedOut;
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Bounded wait reduced to a yes/no answer.
    pub async fn wait_until_ready(&self, path: &Path, max_wait: Duration) -> bool {
        matches!(self.wait_ready(path, max_wait).await, ReadyState::Ready(_))
    }

    async fn validate_structure(&self, path: &Path) -> MediaResult<VideoInfo> {
        let info = self.inspector.probe(path).await?;
        info.validate()?;

        let count = self
            .config
            .test_frames
            .min(u32::try_from(info.frame_count).unwrap_or(u32::MAX));
        if count > 0 {
            self.inspector.decode_test_frames(path, count).await?;
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a scripted size sequence, repeating the last entry forever.
    struct ScriptedInspector {
        sizes: Mutex<VecDeque<Option<u64>>>,
        size_calls: AtomicUsize,
        frame_count: u64,
        decodes: bool,
    }

    impl ScriptedInspector {
        fn new(sizes: &[Option<u64>]) -> Self {
            Self {
                sizes: Mutex::new(sizes.iter().copied().collect()),
                size_calls: AtomicUsize::new(0),
                frame_count: 180,
                decodes: true,
            }
        }

        fn undecodable(mut self) -> Self {
            self.decodes = false;
            self
        }

        fn without_frames(mut self) -> Self {
            self.frame_count = 0;
            self
        }
    }

    #[async_trait]
    impl ClipInspector for ScriptedInspector {
        async fn file_size(&self, _path: &Path) -> MediaResult<Option<u64>> {
            self.size_calls.fetch_add(1, Ordering::SeqCst);
            let mut sizes = self.sizes.lock().unwrap();
            if sizes.len() > 1 {
                Ok(sizes.pop_front().flatten())
            } else {
                Ok(sizes.front().copied().flatten())
            }
        }

        async fn probe(&self, _path: &Path) -> MediaResult<VideoInfo> {
            Ok(VideoInfo {
                duration: 6.0,
                width: 1920,
                height: 1080,
                fps: 30.0,
                frame_count: self.frame_count,
                codec: "h264".to_string(),
                size: 1024,
            })
        }

        async fn decode_test_frames(&self, _path: &Path, count: u32) -> MediaResult<()> {
            if self.decodes {
                Ok(())
            } else {
                Err(MediaError::decode_failed(format!(
                    "Invalid NAL unit in frame {}",
                    count - 1
                )))
            }
        }
    }

    fn guard(inspector: ScriptedInspector) -> ClipReadinessGuard<ScriptedInspector> {
        ClipReadinessGuard::with_inspector(GuardConfig::default(), inspector)
    }

    #[test]
    fn test_stability_tracker_requires_all_rounds() {
        let mut tracker = StabilityTracker::new(3);
        assert_eq!(tracker.observe(100), Stability::Settling { rounds: 0 });
        assert_eq!(tracker.observe(100), Stability::Settling { rounds: 1 });
        assert_eq!(tracker.observe(100), Stability::Settling { rounds: 2 });
        assert_eq!(tracker.observe(100), Stability::Stable);
    }

    #[test]
    fn test_stability_tracker_growth_restarts_count() {
        let mut tracker = StabilityTracker::new(3);
        tracker.observe(100);
        tracker.observe(100);
        assert_eq!(tracker.observe(150), Stability::Changed);
        assert_eq!(tracker.observe(150), Stability::Settling { rounds: 1 });
        assert_eq!(tracker.observe(150), Stability::Settling { rounds: 2 });
        assert_eq!(tracker.observe(150), Stability::Stable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_growing_file_is_not_ready() {
        let guard = guard(ScriptedInspector::new(&[
            Some(100),
            Some(100),
            Some(200),
            Some(300),
        ]));
        assert!(!guard.is_ready(Path::new("clip_001.mp4")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stable_decodable_file_is_ready() {
        let inspector = ScriptedInspector::new(&[Some(4096)]);
        let guard = guard(inspector);

        let readiness = guard.check(Path::new("clip_001.mp4")).await.unwrap();
        assert!(readiness.is_ready());
        // Baseline sample plus three unchanged rounds
        assert_eq!(guard.inspector.size_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_and_empty_files() {
        let missing = guard(ScriptedInspector::new(&[None]));
        assert_eq!(
            missing.check(Path::new("clip.mp4")).await.unwrap(),
            Readiness::Missing
        );

        let empty = guard(ScriptedInspector::new(&[Some(0)]));
        assert_eq!(
            empty.check(Path::new("clip.mp4")).await.unwrap(),
            Readiness::Empty
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_file_is_not_ready() {
        let guard = guard(ScriptedInspector::new(&[Some(4096)]).undecodable());
        assert!(!guard.is_ready(Path::new("clip.mp4")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_after_growth_settles() {
        let guard = guard(ScriptedInspector::new(&[
            None,
            Some(100),
            Some(200),
            Some(300),
            Some(300),
        ]));

        let state = guard
            .wait_ready(Path::new("clip.mp4"), Duration::from_secs(30))
            .await;
        assert!(matches!(state, ReadyState::Ready(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_times_out_on_endless_growth() {
        let sizes: Vec<Option<u64>> = (1..=100).map(|i| Some(i * 1000)).collect();
        let guard = guard(ScriptedInspector::new(&sizes));

        let start = Instant::now();
        let ready = guard
            .wait_until_ready(Path::new("clip.mp4"), Duration::from_secs(5))
            .await;
        assert!(!ready);
        assert!(start.elapsed() <= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_reports_corruption() {
        let guard = guard(ScriptedInspector::new(&[Some(4096)]).without_frames());

        let state = guard
            .wait_ready(Path::new("clip.mp4"), Duration::from_secs(30))
            .await;
        match state {
            ReadyState::Corrupt(e) => assert!(e.is_corrupt_input()),
            other => panic!("expected corrupt, got {:?}", other),
        }
    }
}
