//! Chat message rate anomaly detection.
//!
//! Every message updates a trailing window of arrival times. In the adaptive
//! policy the window rate is compared with an exponentially smoothed baseline:
//!
//! - not in a peak and `rate > multiplier x baseline`: start a peak whose start
//!   is pushed back by the pre-roll
//! - in a peak and `rate >= baseline x sustain_ratio`: the peak is still alive
//! - in a peak, rate back under `baseline x sustain_ratio` and at least the
//!   end cooldown since the last elevated message: end the peak
//!
//! The baseline is updated once per message, so it follows sustained busy chat
//! quickly. Peaks register when activity jumps after a comparatively quiet
//! stretch.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::{debug, info};

use hclip_models::HypeTransition;

use crate::config::{MonitorConfig, RatePolicy};

/// Single-writer rate state machine.
#[derive(Debug, Clone)]
pub struct ChatRateMonitor {
    config: MonitorConfig,
    window: VecDeque<DateTime<Utc>>,
    baseline_rate: f64,
    rate: f64,
    in_peak: bool,
    peak_start: Option<DateTime<Utc>>,
    last_peak: Option<DateTime<Utc>>,
}

impl Default for ChatRateMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl ChatRateMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            baseline_rate: config.initial_baseline,
            config,
            window: VecDeque::new(),
            rate: 0.0,
            in_peak: false,
            peak_start: None,
            last_peak: None,
        }
    }

    /// Feed one message arrival; returns a transition when the peak state flips.
    ///
    /// Arrivals earlier than the newest one already seen are treated as
    /// arriving at that newest time, keeping the window ordered.
    pub fn on_message(&mut self, arrived_at: DateTime<Utc>) -> Option<HypeTransition> {
        let now = match self.window.back() {
            Some(newest) if *newest > arrived_at => *newest,
            _ => arrived_at,
        };

        self.window.push_back(now);
        self.trim_window();

        match self.config.policy {
            RatePolicy::Adaptive => self.step_adaptive(now),
            RatePolicy::FixedThreshold { threshold } => self.step_fixed(now, threshold),
        }
    }

    fn trim_window(&mut self) {
        while self.window.len() >= 2 && self.span_secs() > self.config.window_secs {
            self.window.pop_front();
        }
    }

    fn span_secs(&self) -> f64 {
        match (self.window.front(), self.window.back()) {
            (Some(oldest), Some(newest)) => seconds(*newest - *oldest),
            _ => 0.0,
        }
    }

    fn step_adaptive(&mut self, now: DateTime<Utc>) -> Option<HypeTransition> {
        let span = self.span_secs();
        self.rate = if span > 0.0 {
            (self.window.len() - 1) as f64 / span
        } else {
            0.0
        };

        let alpha = self.config.alpha;
        self.baseline_rate = (1.0 - alpha) * self.baseline_rate + alpha * self.rate;

        let entering = self.rate > self.config.peak_multiplier * self.baseline_rate;
        let elevated = self.rate >= self.baseline_rate * self.config.sustain_ratio;
        self.transition(now, entering, elevated)
    }

    fn step_fixed(&mut self, now: DateTime<Utc>, threshold: usize) -> Option<HypeTransition> {
        let count = self.window.len();
        self.rate = count as f64 / self.config.window_secs.max(f64::EPSILON);
        self.transition(now, count > threshold, count >= threshold)
    }

    fn transition(
        &mut self,
        now: DateTime<Utc>,
        entering: bool,
        elevated: bool,
    ) -> Option<HypeTransition> {
        if !self.in_peak {
            if !entering {
                return None;
            }
            let start = now - duration(self.config.pre_roll_secs);
            self.in_peak = true;
            self.peak_start = Some(start);
            self.last_peak = Some(now);
            info!(
                rate = self.rate,
                baseline = self.baseline_rate,
                start = %start,
                "Hype detected"
            );
            return Some(HypeTransition::HypeStart { start });
        }

        if elevated {
            self.last_peak = Some(now);
            return None;
        }

        let last_peak = self.last_peak.unwrap_or(now);
        if seconds(now - last_peak) < self.config.end_cooldown_secs {
            return None;
        }

        let start = self.peak_start.take().unwrap_or(last_peak);
        self.in_peak = false;
        info!(start = %start, end = %now, "Hype ended");
        Some(HypeTransition::HypeEnd { start, end: now })
    }

    pub fn is_in_peak(&self) -> bool {
        self.in_peak
    }

    /// Rate computed for the most recent message.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn baseline_rate(&self) -> f64 {
        self.baseline_rate
    }

    /// Arrival times currently in the trailing window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.window.iter()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Forget all state, keeping the configuration.
    pub fn reset(&mut self) {
        debug!("Resetting chat rate monitor");
        *self = Self::new(self.config.clone());
    }
}

fn seconds(delta: Duration) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

fn duration(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}
