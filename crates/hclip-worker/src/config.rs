//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use hclip_media::GuardConfig;

/// How chat hype affects viral eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HypeGate {
    /// Verdicts stand on their own; hype is only logged
    Disabled,
    /// A viral clip must overlap a current or recent hype window
    Required,
}

impl HypeGate {
    pub fn as_str(&self) -> &'static str {
        match self {
            HypeGate::Disabled => "disabled",
            HypeGate::Required => "required",
        }
    }
}

impl std::str::FromStr for HypeGate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disabled" | "off" | "false" | "log" => Ok(HypeGate::Disabled),
            "required" | "on" | "true" => Ok(HypeGate::Required),
            other => Err(format!("unknown hype gate '{}'", other)),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory the capture pipeline writes clips into
    pub clips_dir: PathBuf,
    /// Directory compiled highlights are written to
    pub output_dir: PathBuf,
    /// Directory polling interval
    pub poll_interval: Duration,
    /// Wall-clock analysis budget per clip
    pub clip_budget: Duration,
    /// How long the readiness guard may wait for a clip
    pub ready_max_wait: Duration,
    /// Flush the pending run after this long without new clips (`None` disables)
    pub quiescence: Option<Duration>,
    /// Treat the first clip as warm-up and skip it
    pub skip_first_clip: bool,
    pub hype_gate: HypeGate,
    /// Classify every Nth frame
    pub emotion_stride: u64,
    /// Seconds of video between scene captions
    pub scene_interval_secs: f64,
    /// Pause after each caption request
    pub caption_delay: Duration,
    /// Capacity of the per-clip event channel
    pub event_buffer: usize,
    /// How long the collector blocks before re-checking the budget
    pub collect_poll: Duration,
    /// Write an `.srt` next to each compilation
    pub write_captions: bool,
    /// Write a `.json` manifest next to each compilation
    pub write_manifest: bool,
    /// Prometheus listener port
    pub metrics_port: Option<u16>,
    pub guard: GuardConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            clips_dir: PathBuf::from("clips"),
            output_dir: PathBuf::from("compilations"),
            poll_interval: Duration::from_millis(500),
            clip_budget: Duration::from_secs(6),
            ready_max_wait: Duration::from_secs(30),
            quiescence: Some(Duration::from_secs(60)),
            skip_first_clip: true,
            hype_gate: HypeGate::Required,
            emotion_stride: 10,
            scene_interval_secs: 1.0,
            caption_delay: Duration::from_millis(500),
            event_buffer: 256,
            collect_poll: Duration::from_millis(100),
            write_captions: true,
            write_manifest: true,
            metrics_port: None,
            guard: GuardConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            clips_dir: std::env::var("HCLIP_CLIPS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.clips_dir),
            output_dir: std::env::var("HCLIP_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            poll_interval: env_millis("HCLIP_POLL_MS").unwrap_or(defaults.poll_interval),
            clip_budget: env_secs("HCLIP_CLIP_BUDGET_SECS").unwrap_or(defaults.clip_budget),
            ready_max_wait: env_secs("HCLIP_READY_MAX_WAIT_SECS")
                .unwrap_or(defaults.ready_max_wait),
            quiescence: match env_secs("HCLIP_QUIESCENCE_SECS") {
                Some(d) if d.is_zero() => None,
                Some(d) => Some(d),
                None => defaults.quiescence,
            },
            skip_first_clip: env_bool("HCLIP_SKIP_FIRST_CLIP").unwrap_or(defaults.skip_first_clip),
            hype_gate: std::env::var("HCLIP_HYPE_GATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.hype_gate),
            emotion_stride: std::env::var("HCLIP_EMOTION_STRIDE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.emotion_stride),
            scene_interval_secs: std::env::var("HCLIP_SCENE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s: &f64| *s > 0.0)
                .unwrap_or(defaults.scene_interval_secs),
            caption_delay: env_millis("HCLIP_CAPTION_DELAY_MS").unwrap_or(defaults.caption_delay),
            event_buffer: std::env::var("HCLIP_EVENT_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.event_buffer),
            collect_poll: defaults.collect_poll,
            write_captions: env_bool("HCLIP_WRITE_CAPTIONS").unwrap_or(defaults.write_captions),
            write_manifest: defaults.write_manifest,
            metrics_port: std::env::var("HCLIP_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
            guard: GuardConfig::from_env(),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.clip_budget, Duration::from_secs(6));
        assert_eq!(config.emotion_stride, 10);
        assert!(config.skip_first_clip);
        assert_eq!(config.guard.stability_rounds, 3);
    }

    #[test]
    fn test_hype_gate_parsing() {
        assert_eq!("required".parse::<HypeGate>(), Ok(HypeGate::Required));
        assert_eq!("OFF".parse::<HypeGate>(), Ok(HypeGate::Disabled));
        assert!("sometimes".parse::<HypeGate>().is_err());
    }
}
