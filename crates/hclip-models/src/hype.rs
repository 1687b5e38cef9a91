//! Chat hype transitions and windows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transition emitted by the chat rate monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HypeTransition {
    /// Chat rate crossed into a peak. `start` already includes the pre-roll.
    HypeStart { start: DateTime<Utc> },
    /// Chat rate settled back to baseline.
    HypeEnd {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl HypeTransition {
    /// Start of the window the transition belongs to.
    pub fn start(&self) -> DateTime<Utc> {
        match self {
            HypeTransition::HypeStart { start } | HypeTransition::HypeEnd { start, .. } => *start,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HypeTransition::HypeStart { .. } => "start",
            HypeTransition::HypeEnd { .. } => "end",
        }
    }
}

/// A hype window; open while `end` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypeWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl HypeWindow {
    pub fn open(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Whether the window intersects `[from, to]`. Open windows extend to the
    /// end of time.
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        let ends_after_from = self.end.map_or(true, |end| end >= from);
        self.start <= to && ends_after_from
    }
}
