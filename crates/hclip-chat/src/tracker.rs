//! Shared view of hype windows.
//!
//! The chat task applies transitions; the orchestrator asks whether a clip's
//! time range touched a hype window.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use hclip_models::{HypeTransition, HypeWindow};

const DEFAULT_HISTORY: usize = 16;

#[derive(Debug, Default)]
struct TrackerState {
    active: Option<HypeWindow>,
    recent: VecDeque<HypeWindow>,
}

/// Cloneable handle to the current and recently closed hype windows.
#[derive(Debug, Clone)]
pub struct HypeTracker {
    state: Arc<RwLock<TrackerState>>,
    history: usize,
}

impl Default for HypeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl HypeTracker {
    /// Keep up to `history` closed windows.
    pub fn new(history: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(TrackerState::default())),
            history: history.max(1),
        }
    }

    pub fn apply(&self, transition: HypeTransition) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match transition {
            HypeTransition::HypeStart { start } => {
                state.active = Some(HypeWindow::open(start));
            }
            HypeTransition::HypeEnd { start, end } => {
                state.active = None;
                state.recent.push_back(HypeWindow::closed(start, end));
                while state.recent.len() > self.history {
                    state.recent.pop_front();
                }
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.read(|s| s.active.is_some())
    }

    pub fn active(&self) -> Option<HypeWindow> {
        self.read(|s| s.active)
    }

    /// Closed windows, oldest first.
    pub fn recent(&self) -> Vec<HypeWindow> {
        self.read(|s| s.recent.iter().copied().collect())
    }

    /// Whether `[from, to]` intersects the active window or a recent one.
    pub fn is_hyped(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.read(|s| {
            s.active.iter().chain(s.recent.iter()).any(|w| w.overlaps(from, to))
        })
    }

    fn read<T>(&self, f: impl FnOnce(&TrackerState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_open_window_covers_later_clips() {
        let tracker = HypeTracker::default();
        assert!(!tracker.is_hyped(t(0), t(6)));

        tracker.apply(HypeTransition::HypeStart { start: t(10) });
        assert!(tracker.is_active());
        assert!(tracker.is_hyped(t(100), t(106)));
        assert!(!tracker.is_hyped(t(0), t(6)));
    }

    #[test]
    fn test_closed_window_is_remembered() {
        let tracker = HypeTracker::default();
        let shared = tracker.clone();

        shared.apply(HypeTransition::HypeStart { start: t(10) });
        shared.apply(HypeTransition::HypeEnd {
            start: t(10),
            end: t(40),
        });

        assert!(!tracker.is_active());
        assert!(tracker.is_hyped(t(36), t(42)));
        assert!(!tracker.is_hyped(t(41), t(47)));
        assert_eq!(tracker.recent(), vec![HypeWindow::closed(t(10), t(40))]);
    }

    #[test]
    fn test_history_is_bounded() {
        let tracker = HypeTracker::new(2);
        for i in 0..5 {
            tracker.apply(HypeTransition::HypeEnd {
                start: t(i * 100),
                end: t(i * 100 + 20),
            });
        }

        let recent = tracker.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].start, t(300));
        assert!(!tracker.is_hyped(t(0), t(20)));
    }
}
