//! Live chat ingestion and hype detection.
//!
//! - [`ChatConnection`]: line-oriented IRC session (login, keep-alive, messages)
//! - [`ChatRateMonitor`]: turns message arrival times into hype transitions
//! - [`HypeTracker`]: shared view of current and recent hype windows

pub mod config;
pub mod connection;
pub mod error;
pub mod monitor;
pub mod tracker;

pub use config::{ChatConfig, MonitorConfig, RatePolicy};
pub use connection::{parse_line, ChatConnection, ChatLine, ChatMessage};
pub use error::{ChatError, ChatResult};
pub use monitor::ChatRateMonitor;
pub use tracker::HypeTracker;
