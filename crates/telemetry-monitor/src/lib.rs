//! telemetry-monitor: poll device readings and persist what changed
//!
//! Each cycle lists the devices exposing the configured capabilities, runs
//! every reading through the ignore list, the dead-battery override and value
//! normalization, decides CHANGED / HOURLY / SKIPPED against the last
//! persisted timestamps, and writes the accepted points as one batch. The
//! timestamp tracker is replaced only when that batch write succeeds.

mod error;
pub use error::{ConfigError, MonitorError, NormalizeError};

mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

pub mod config;
pub use config::{load_config, InfluxConfig, MonitorConfig, RetryConfig};

pub mod normalize;
pub use normalize::{ConversionMap, Normalized};

pub mod battery;
pub use battery::{BatteryOverride, BatteryPolicy, DeadBatteryReason};

pub mod tracker;
pub use tracker::{Action, Decision, MetricId, PendingTracker, Tracker};

mod metrics;
pub use metrics::MonitorMetrics;

mod monitor;
pub use monitor::{CycleReport, Monitor, WriteOutcome, SOURCE_TAG_DEFAULT};
