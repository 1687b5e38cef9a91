//! Analyzer workers.
//!
//! Each clip gets three independent workers (emotion, scene, transcript) that
//! push [`AnalysisEvent`]s into one bounded channel. Workers own their frame
//! stream, so a slow captioner never holds back emotion sampling. A failed
//! sample is dropped and logged; a closed channel stops the worker.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

use hclip_media::{FrameSource, FrameStream};
use hclip_ml_client::{EmotionAnalyzer, MlClient, SceneCaptioner, Transcriber};
use hclip_models::{AnalysisEvent, AnalysisKind};

use crate::config::WorkerConfig;
use crate::metrics;

/// Sampling cadence for the frame-based workers.
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Classify every Nth frame
    pub emotion_stride: u64,
    /// Seconds of video between captions
    pub scene_interval_secs: f64,
    /// Pause after each caption request
    pub caption_delay: Duration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            emotion_stride: 10,
            scene_interval_secs: 1.0,
            caption_delay: Duration::from_millis(500),
        }
    }
}

impl From<&WorkerConfig> for SamplingConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            emotion_stride: config.emotion_stride.max(1),
            scene_interval_secs: config.scene_interval_secs,
            caption_delay: config.caption_delay,
        }
    }
}

/// The analyzer backends plus the frame source they read from.
#[derive(Clone)]
pub struct Analyzers {
    pub emotion: Arc<dyn EmotionAnalyzer>,
    pub scene: Arc<dyn SceneCaptioner>,
    pub transcriber: Arc<dyn Transcriber>,
    pub frames: Arc<dyn FrameSource>,
}

impl Analyzers {
    /// All three analyzers served by one ML service client.
    pub fn from_client(client: MlClient, frames: Arc<dyn FrameSource>) -> Self {
        let client = Arc::new(client);
        Self {
            emotion: client.clone(),
            scene: client.clone(),
            transcriber: client,
            frames,
        }
    }

    /// Start the three workers for `path`.
    ///
    /// The handles are returned so the collector can abort stragglers once
    /// the clip's budget runs out.
    pub fn spawn(
        &self,
        path: &Path,
        sampling: &SamplingConfig,
        tx: mpsc::Sender<AnalysisEvent>,
    ) -> Vec<JoinHandle<()>> {
        let span = tracing::info_span!("analyzers", path = %path.display());

        let emotion = tokio::spawn(
            run_emotion(
                Arc::clone(&self.frames),
                Arc::clone(&self.emotion),
                path.to_path_buf(),
                sampling.emotion_stride.max(1),
                tx.clone(),
            )
            .instrument(span.clone()),
        );

        let scene = tokio::spawn(
            run_scene(
                Arc::clone(&self.frames),
                Arc::clone(&self.scene),
                path.to_path_buf(),
                sampling.clone(),
                tx.clone(),
            )
            .instrument(span.clone()),
        );

        let transcript = tokio::spawn(
            run_transcript(Arc::clone(&self.transcriber), path.to_path_buf(), tx)
                .instrument(span),
        );

        vec![emotion, scene, transcript]
    }
}

async fn open_stream(
    frames: &Arc<dyn FrameSource>,
    path: &Path,
    kind: AnalysisKind,
) -> Option<Box<dyn FrameStream>> {
    match frames.open(path).await {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(kind = kind.as_str(), error = %e, "Failed to open frame stream");
            metrics::record_analyzer_failure(kind.as_str());
            None
        }
    }
}

/// Deliver one event; `false` once the collector has gone away.
async fn deliver(tx: &mpsc::Sender<AnalysisEvent>, event: AnalysisEvent) -> bool {
    let kind = event.kind();
    if tx.send(event).await.is_err() {
        debug!(kind = kind.as_str(), "Event channel closed, stopping worker");
        return false;
    }
    metrics::record_analysis_event(kind.as_str());
    true
}

async fn run_emotion(
    frames: Arc<dyn FrameSource>,
    analyzer: Arc<dyn EmotionAnalyzer>,
    path: PathBuf,
    stride: u64,
    tx: mpsc::Sender<AnalysisEvent>,
) {
    let kind = AnalysisKind::Emotion;
    let Some(mut stream) = open_stream(&frames, &path, kind).await else {
        return;
    };

    loop {
        let frame = match stream.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "Frame read failed");
                metrics::record_analyzer_failure(kind.as_str());
                break;
            }
        };
        if frame.index % stride != 0 {
            continue;
        }

        match analyzer.analyze(&frame).await {
            Ok(Some(label)) => {
                if !deliver(&tx, AnalysisEvent::emotion(frame.offset_secs, label)).await {
                    return;
                }
            }
            // No face in frame
            Ok(None) => {}
            Err(e) => {
                debug!(frame = frame.index, error = %e, "Emotion sample dropped");
                metrics::record_analyzer_failure(kind.as_str());
            }
        }
    }
    debug!(kind = kind.as_str(), "Worker finished");
}

async fn run_scene(
    frames: Arc<dyn FrameSource>,
    captioner: Arc<dyn SceneCaptioner>,
    path: PathBuf,
    sampling: SamplingConfig,
    tx: mpsc::Sender<AnalysisEvent>,
) {
    let kind = AnalysisKind::Scene;
    let Some(mut stream) = open_stream(&frames, &path, kind).await else {
        return;
    };

    let mut next_due = 0.0;
    loop {
        let frame = match stream.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "Frame read failed");
                metrics::record_analyzer_failure(kind.as_str());
                break;
            }
        };
        if frame.offset_secs < next_due {
            continue;
        }
        next_due = frame.offset_secs + sampling.scene_interval_secs;

        match captioner.describe(&frame).await {
            Ok(description) if !description.trim().is_empty() => {
                let event = AnalysisEvent::scene(frame.offset_secs, description.trim());
                if !deliver(&tx, event).await {
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                debug!(frame = frame.index, error = %e, "Caption sample dropped");
                metrics::record_analyzer_failure(kind.as_str());
            }
        }

        if !sampling.caption_delay.is_zero() {
            tokio::time::sleep(sampling.caption_delay).await;
        }
    }
    debug!(kind = kind.as_str(), "Worker finished");
}

async fn run_transcript(
    transcriber: Arc<dyn Transcriber>,
    path: PathBuf,
    tx: mpsc::Sender<AnalysisEvent>,
) {
    let kind = AnalysisKind::Transcript;
    let segments = match transcriber.transcribe(&path).await {
        Ok(segments) => segments,
        Err(e) => {
            warn!(kind = kind.as_str(), error = %e, "Transcription failed");
            metrics::record_analyzer_failure(kind.as_str());
            return;
        }
    };

    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }
        if !deliver(&tx, AnalysisEvent::transcript(segment.start, text)).await {
            return;
        }
    }
    debug!(kind = kind.as_str(), "Worker finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hclip_media::MediaResult;
    use hclip_ml_client::{MlError, MlResult, TranscriptSegment};
    use hclip_models::VideoFrame;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingFrames {
        count: u64,
        fps: f64,
    }

    struct CountingStream {
        next: u64,
        count: u64,
        fps: f64,
    }

    #[async_trait]
    impl FrameSource for CountingFrames {
        async fn open(&self, _path: &Path) -> MediaResult<Box<dyn FrameStream>> {
            Ok(Box::new(CountingStream {
                next: 0,
                count: self.count,
                fps: self.fps,
            }))
        }
    }

    #[async_trait]
    impl FrameStream for CountingStream {
        fn fps(&self) -> f64 {
            self.fps
        }

        async fn next_frame(&mut self) -> MediaResult<Option<VideoFrame>> {
            if self.next >= self.count {
                return Ok(None);
            }
            let index = self.next;
            self.next += 1;
            Ok(Some(VideoFrame {
                index,
                offset_secs: index as f64 / self.fps,
                width: 2,
                height: 2,
                data: vec![0; 12],
            }))
        }
    }

    /// Fails every third call to check that samples are dropped, not fatal.
    struct FlakyEmotion {
        calls: AtomicU64,
    }

    #[async_trait]
    impl EmotionAnalyzer for FlakyEmotion {
        async fn analyze(&self, frame: &VideoFrame) -> MlResult<Option<String>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 3 == 2 {
                return Err(MlError::ServiceUnavailable("busy".to_string()));
            }
            Ok(Some(format!("label_{}", frame.index)))
        }
    }

    struct FixedCaption;

    #[async_trait]
    impl SceneCaptioner for FixedCaption {
        async fn describe(&self, _frame: &VideoFrame) -> MlResult<String> {
            Ok("a streamer at a desk".to_string())
        }
    }

    struct FixedTranscript;

    #[async_trait]
    impl Transcriber for FixedTranscript {
        async fn transcribe(&self, _path: &Path) -> MlResult<Vec<TranscriptSegment>> {
            Ok(vec![
                TranscriptSegment {
                    start: 0.5,
                    end: Some(1.0),
                    text: " no way ".to_string(),
                },
                TranscriptSegment {
                    start: 1.0,
                    end: None,
                    text: "   ".to_string(),
                },
            ])
        }
    }

    fn analyzers(frame_count: u64) -> Analyzers {
        Analyzers {
            emotion: Arc::new(FlakyEmotion {
                calls: AtomicU64::new(0),
            }),
            scene: Arc::new(FixedCaption),
            transcriber: Arc::new(FixedTranscript),
            frames: Arc::new(CountingFrames {
                count: frame_count,
                fps: 10.0,
            }),
        }
    }

    #[tokio::test]
    async fn test_workers_emit_sampled_events() {
        let (tx, mut rx) = mpsc::channel(64);
        let sampling = SamplingConfig {
            emotion_stride: 5,
            scene_interval_secs: 1.0,
            caption_delay: Duration::ZERO,
        };

        let handles = analyzers(30).spawn(Path::new("clip.mp4"), &sampling, tx);
        for handle in handles {
            handle.await.unwrap();
        }

        let mut emotions = Vec::new();
        let mut scenes = Vec::new();
        let mut transcripts = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                AnalysisEvent::Emotion { label, .. } => emotions.push(label),
                AnalysisEvent::Scene {
                    video_offset_secs, ..
                } => scenes.push(video_offset_secs),
                AnalysisEvent::Transcript { text, .. } => transcripts.push(text),
            }
        }

        // Frames 0,5,10,15,20,25 sampled; the third call fails
        assert_eq!(emotions, vec!["label_0", "label_5", "label_15", "label_20"]);
        // 30 frames at 10 fps: one caption per second of video
        assert_eq!(scenes, vec![0.0, 1.0, 2.0]);
        assert_eq!(transcripts, vec!["no way"]);
    }

    #[tokio::test]
    async fn test_workers_stop_when_channel_closes() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let sampling = SamplingConfig {
            caption_delay: Duration::ZERO,
            ..Default::default()
        };
        let handles = analyzers(10_000).spawn(Path::new("clip.mp4"), &sampling, tx);
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
