//! Chat connection and rate monitor configuration.

use std::fmt;

use crate::error::{ChatError, ChatResult};

/// Connection settings for the chat server.
#[derive(Clone)]
pub struct ChatConfig {
    pub host: String,
    pub port: u16,
    pub nick: String,
    /// OAuth token; anonymous read-only login when absent
    pub token: Option<String>,
    /// Channel name without the leading `#`
    pub channel: String,
    /// Seconds without any line (including PINGs) before the session is considered dead
    pub read_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: "irc.chat.twitch.tv".to_string(),
            port: 6667,
            nick: "justinfan31415".to_string(),
            token: None,
            channel: String::new(),
            read_timeout_secs: 600,
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("nick", &self.nick)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("channel", &self.channel)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .finish()
    }
}

impl ChatConfig {
    /// Load from `CHAT_*` environment variables. `CHAT_CHANNEL` is required.
    pub fn from_env() -> ChatResult<Self> {
        let defaults = Self::default();

        let channel = std::env::var("CHAT_CHANNEL")
            .map_err(|_| ChatError::config("CHAT_CHANNEL is not set"))?;

        let config = Self {
            host: std::env::var("CHAT_HOST").unwrap_or(defaults.host),
            port: std::env::var("CHAT_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            nick: std::env::var("CHAT_NICK").unwrap_or(defaults.nick),
            token: std::env::var("CHAT_TOKEN").ok().filter(|t| !t.is_empty()),
            channel,
            read_timeout_secs: std::env::var("CHAT_READ_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.read_timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ChatResult<()> {
        if self.channel.trim_start_matches('#').is_empty() {
            return Err(ChatError::config("channel must not be empty"));
        }
        if self.nick.is_empty() {
            return Err(ChatError::config("nick must not be empty"));
        }
        Ok(())
    }

    /// `#channel`, lowercased.
    pub fn channel_tag(&self) -> String {
        format!("#{}", self.channel.trim_start_matches('#').to_lowercase())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Peak detection policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatePolicy {
    /// Trailing rate against an exponentially smoothed baseline
    Adaptive,
    /// Message count in the window against a fixed threshold
    FixedThreshold { threshold: usize },
}

/// Parameters of the chat rate monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub policy: RatePolicy,
    /// Trailing window length in seconds
    pub window_secs: f64,
    /// Rate over baseline that starts a peak
    pub peak_multiplier: f64,
    /// Rate over baseline that keeps a peak alive
    pub sustain_ratio: f64,
    /// Look-back added before the detected peak
    pub pre_roll_secs: f64,
    /// Quiet time after the last elevated message before a peak ends
    pub end_cooldown_secs: f64,
    /// EMA smoothing factor
    pub alpha: f64,
    /// Baseline before any message is seen (messages per second)
    pub initial_baseline: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            policy: RatePolicy::Adaptive,
            window_secs: 60.0,
            peak_multiplier: 2.0,
            sustain_ratio: 1.1,
            pre_roll_secs: 10.0,
            end_cooldown_secs: 10.0,
            alpha: 0.1,
            initial_baseline: 0.5,
        }
    }
}

impl MonitorConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let float = |key: &str, default: f64| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(default)
        };

        let policy = match std::env::var("CHAT_POLICY").as_deref() {
            Ok("fixed") => RatePolicy::FixedThreshold {
                threshold: std::env::var("CHAT_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            _ => RatePolicy::Adaptive,
        };

        Self {
            policy,
            window_secs: float("CHAT_WINDOW_SECS", defaults.window_secs),
            peak_multiplier: float("CHAT_PEAK_MULTIPLIER", defaults.peak_multiplier),
            sustain_ratio: defaults.sustain_ratio,
            pre_roll_secs: float("CHAT_PRE_ROLL_SECS", defaults.pre_roll_secs),
            end_cooldown_secs: float("CHAT_COOLDOWN_SECS", defaults.end_cooldown_secs),
            alpha: float("CHAT_ALPHA", defaults.alpha).min(1.0),
            initial_baseline: defaults.initial_baseline,
        }
    }
}
