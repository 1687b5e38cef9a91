//! Per-clip event storage and viral verdicts.
//!
//! Analyzer workers for a clip feed one channel; the collector hands each
//! event to [`ClipEventCorrelator::add_event`]. Records are kept per clip
//! behind their own mutex, so events for one clip never block another.
//!
//! Verdict rules:
//! - no emotion samples, or only neutral ones: not viral
//! - dominant = most frequent non-neutral label (ties go to the label seen first)
//! - ratio = dominant count / all emotion samples, neutral included
//! - description = median scene caption (lower middle on even counts)
//! - peak = median offset of the dominant label's samples
//! - viral when ratio >= [`VIRAL_THRESHOLD`]

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use hclip_models::{
    AnalysisEvent, ClipId, TranscriptLine, ViralVerdict, NEUTRAL_LABEL, UNKNOWN_SCENE,
    VIRAL_THRESHOLD,
};

/// Events and cached verdict for one clip.
#[derive(Debug)]
struct ClipRecord {
    events: Vec<AnalysisEvent>,
    emotion_counts: HashMap<String, usize>,
    /// Labels in first-seen order, for deterministic tie-breaks
    label_order: Vec<String>,
    verdict: Option<ViralVerdict>,
}

impl ClipRecord {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            emotion_counts: HashMap::new(),
            label_order: Vec::new(),
            verdict: None,
        }
    }

    fn push(&mut self, event: AnalysisEvent) {
        let event = match event {
            AnalysisEvent::Emotion {
                captured_at,
                video_offset_secs,
                label,
            } => {
                let label = label.trim().to_lowercase();
                if !self.emotion_counts.contains_key(&label) {
                    self.label_order.push(label.clone());
                }
                *self.emotion_counts.entry(label.clone()).or_insert(0) += 1;
                AnalysisEvent::Emotion {
                    captured_at,
                    video_offset_secs,
                    label,
                }
            }
            other => other,
        };

        self.events.push(event);
        self.verdict = None;
    }

    fn verdict(&mut self) -> ViralVerdict {
        if let Some(verdict) = &self.verdict {
            return verdict.clone();
        }
        let verdict = self.reduce();
        self.verdict = Some(verdict.clone());
        verdict
    }

    fn reduce(&self) -> ViralVerdict {
        let total: usize = self.emotion_counts.values().sum();

        let mut dominant: Option<(&str, usize)> = None;
        for label in self.label_order.iter().filter(|l| *l != NEUTRAL_LABEL) {
            let count = self.emotion_counts.get(label).copied().unwrap_or(0);
            if dominant.map_or(true, |(_, best)| count > best) {
                dominant = Some((label.as_str(), count));
            }
        }

        let Some((dominant, count)) = dominant else {
            return ViralVerdict::not_viral();
        };
        if total == 0 {
            return ViralVerdict::not_viral();
        }

        let ratio = count as f64 / total as f64;

        let scenes: Vec<&str> = self
            .events
            .iter()
            .filter_map(|e| match e {
                AnalysisEvent::Scene { description, .. } => Some(description.as_str()),
                _ => None,
            })
            .collect();
        let description = lower_median(&scenes).unwrap_or(UNKNOWN_SCENE).to_string();

        let peaks: Vec<f64> = self
            .events
            .iter()
            .filter_map(|e| match e {
                AnalysisEvent::Emotion {
                    label,
                    video_offset_secs,
                    ..
                } if label == dominant => Some(*video_offset_secs),
                _ => None,
            })
            .collect();
        let peak_offset_secs = lower_median(&peaks).unwrap_or(0.0);

        ViralVerdict {
            is_viral: ratio >= VIRAL_THRESHOLD,
            dominant_emotion: Some(dominant.to_string()),
            ratio,
            description: Some(description),
            peak_offset_secs: Some(peak_offset_secs),
        }
    }
}

/// Middle element by position; the lower one for even lengths.
fn lower_median<T: Copy>(items: &[T]) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[(items.len() - 1) / 2])
    }
}

/// Thread-safe store of per-clip analysis events.
#[derive(Debug, Default)]
pub struct ClipEventCorrelator {
    records: RwLock<HashMap<ClipId, Arc<Mutex<ClipRecord>>>>,
}

impl ClipEventCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record(&self, clip_id: &ClipId) -> Arc<Mutex<ClipRecord>> {
        if let Some(record) = self.records.read().await.get(clip_id) {
            return Arc::clone(record);
        }
        let mut records = self.records.write().await;
        Arc::clone(
            records
                .entry(clip_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(ClipRecord::new()))),
        )
    }

    /// Start tracking a clip with no events.
    pub async fn register(&self, clip_id: &ClipId) {
        self.record(clip_id).await;
    }

    /// Append an event; any cached verdict is discarded.
    pub async fn add_event(&self, clip_id: &ClipId, event: AnalysisEvent) {
        let record = self.record(clip_id).await;
        let mut record = record.lock().await;
        debug!(clip_id = %clip_id, kind = event.kind().as_str(), "Event added");
        record.push(event);
    }

    /// Compute (or reuse) the verdict for a clip.
    ///
    /// Unknown clips are not viral.
    pub async fn compute_verdict(&self, clip_id: &ClipId) -> ViralVerdict {
        let record = self.records.read().await.get(clip_id).cloned();
        match record {
            Some(record) => record.lock().await.verdict(),
            None => ViralVerdict::not_viral(),
        }
    }

    /// Transcript events of a clip, in arrival order.
    pub async fn transcript(&self, clip_id: &ClipId) -> Vec<TranscriptLine> {
        let record = self.records.read().await.get(clip_id).cloned();
        let Some(record) = record else {
            return Vec::new();
        };
        let record = record.lock().await;
        record
            .events
            .iter()
            .filter_map(|e| match e {
                AnalysisEvent::Transcript {
                    video_offset_secs,
                    text,
                    ..
                } => Some(TranscriptLine {
                    offset_secs: *video_offset_secs,
                    text: text.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Number of events stored for a clip.
    pub async fn event_count(&self, clip_id: &ClipId) -> usize {
        let record = self.records.read().await.get(clip_id).cloned();
        match record {
            Some(record) => record.lock().await.events.len(),
            None => 0,
        }
    }

    /// Emotion label counts for a clip.
    pub async fn emotion_counts(&self, clip_id: &ClipId) -> HashMap<String, usize> {
        let record = self.records.read().await.get(clip_id).cloned();
        match record {
            Some(record) => record.lock().await.emotion_counts.clone(),
            None => HashMap::new(),
        }
    }

    /// Drop a clip's record once bookkeeping is done.
    pub async fn remove(&self, clip_id: &ClipId) -> bool {
        self.records.write().await.remove(clip_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn add_emotions(correlator: &ClipEventCorrelator, clip: &ClipId, labels: &[(&str, usize)]) {
        let mut offset = 0.0;
        for (label, count) in labels {
            for _ in 0..*count {
                correlator
                    .add_event(clip, AnalysisEvent::emotion(offset, *label))
                    .await;
                offset += 0.5;
            }
        }
    }

    #[tokio::test]
    async fn test_dominant_emotion_over_threshold_is_viral() {
        let correlator = ClipEventCorrelator::new();
        let clip = ClipId::from("clip_002.mp4");
        add_emotions(&correlator, &clip, &[("happy", 4), ("neutral", 3), ("surprise", 3)]).await;

        let verdict = correlator.compute_verdict(&clip).await;
        assert!(verdict.is_viral);
        assert_eq!(verdict.dominant_emotion.as_deref(), Some("happy"));
        assert!((verdict.ratio - 0.4).abs() < 1e-9);
        assert_eq!(verdict.description.as_deref(), Some(UNKNOWN_SCENE));
    }

    #[tokio::test]
    async fn test_only_neutral_is_not_viral() {
        let correlator = ClipEventCorrelator::new();
        let clip = ClipId::from("clip_003.mp4");
        add_emotions(&correlator, &clip, &[("neutral", 10)]).await;

        let verdict = correlator.compute_verdict(&clip).await;
        assert!(!verdict.is_viral);
        assert_eq!(verdict, ViralVerdict::not_viral());
    }

    #[tokio::test]
    async fn test_no_events_is_not_viral() {
        let correlator = ClipEventCorrelator::new();
        let clip = ClipId::from("clip_009.mp4");
        correlator.register(&clip).await;
        assert_eq!(correlator.compute_verdict(&clip).await, ViralVerdict::not_viral());
        assert_eq!(
            correlator.compute_verdict(&ClipId::from("unknown.mp4")).await,
            ViralVerdict::not_viral()
        );
    }

    #[tokio::test]
    async fn test_scattered_emotions_are_not_viral() {
        let correlator = ClipEventCorrelator::new();
        let clip = ClipId::from("clip_010.mp4");
        add_emotions(
            &correlator,
            &clip,
            &[("happy", 2), ("sad", 2), ("angry", 2), ("surprise", 2), ("neutral", 2)],
        )
        .await;

        let verdict = correlator.compute_verdict(&clip).await;
        assert!(!verdict.is_viral);
        // Tie goes to the first label seen
        assert_eq!(verdict.dominant_emotion.as_deref(), Some("happy"));
        assert!((verdict.ratio - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_median_description_and_peak() {
        let correlator = ClipEventCorrelator::new();
        let clip = ClipId::from("clip_004.mp4");

        for (i, caption) in ["intro", "jump scare", "screaming", "laughing"].iter().enumerate() {
            correlator
                .add_event(&clip, AnalysisEvent::scene(i as f64, *caption))
                .await;
        }
        for offset in [0.3, 1.3, 2.0, 4.6] {
            correlator
                .add_event(&clip, AnalysisEvent::emotion(offset, "Fear"))
                .await;
        }
        correlator
            .add_event(&clip, AnalysisEvent::emotion(5.0, "happy"))
            .await;

        let verdict = correlator.compute_verdict(&clip).await;
        assert_eq!(verdict.dominant_emotion.as_deref(), Some("fear"));
        // Four captions: lower middle is index 1
        assert_eq!(verdict.description.as_deref(), Some("jump scare"));
        assert_eq!(verdict.peak_offset_secs, Some(1.3));
        assert!((verdict.ratio - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_verdict_is_idempotent_and_refreshed_by_new_events() {
        let correlator = ClipEventCorrelator::new();
        let clip = ClipId::from("clip_005.mp4");
        add_emotions(&correlator, &clip, &[("neutral", 8), ("happy", 2)]).await;

        let first = correlator.compute_verdict(&clip).await;
        let second = correlator.compute_verdict(&clip).await;
        assert_eq!(first, second);
        assert!(!first.is_viral);

        add_emotions(&correlator, &clip, &[("happy", 4)]).await;
        let third = correlator.compute_verdict(&clip).await;
        assert!(third.is_viral);
        assert!((third.ratio - 6.0 / 14.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_concurrent_producers_lose_nothing() {
        let correlator = Arc::new(ClipEventCorrelator::new());
        let clip = ClipId::from("clip_006.mp4");

        let mut handles = Vec::new();
        for worker in 0..4 {
            let correlator = Arc::clone(&correlator);
            let clip = clip.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let label = if worker == 0 { "happy" } else { "neutral" };
                    correlator
                        .add_event(&clip, AnalysisEvent::emotion(i as f64, label))
                        .await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(correlator.event_count(&clip).await, 200);
        let counts = correlator.emotion_counts(&clip).await;
        assert_eq!(counts.get("happy"), Some(&50));
        assert_eq!(counts.get("neutral"), Some(&150));
    }

    #[tokio::test]
    async fn test_clips_are_isolated_and_removable() {
        let correlator = ClipEventCorrelator::new();
        let a = ClipId::from("a.mp4");
        let b = ClipId::from("b.mp4");
        add_emotions(&correlator, &a, &[("happy", 3)]).await;
        correlator
            .add_event(&b, AnalysisEvent::transcript(1.5, "clip that"))
            .await;

        assert!(correlator.compute_verdict(&a).await.is_viral);
        assert!(!correlator.compute_verdict(&b).await.is_viral);
        assert_eq!(correlator.transcript(&a).await, Vec::new());
        assert_eq!(correlator.transcript(&b).await[0].text, "clip that");

        assert!(correlator.remove(&a).await);
        assert!(!correlator.remove(&a).await);
        assert_eq!(correlator.len().await, 1);
    }
}
