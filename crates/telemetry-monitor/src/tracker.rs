//! Last-persisted timestamps and the CHANGED / HOURLY / SKIPPED decision.
//!
//! The durable [`Tracker`] only ever moves by wholesale replacement with the
//! [`PendingTracker`] filled during a cycle, and only after that cycle's
//! batch was written.

use core::fmt;
use std::collections::HashMap;
use time::OffsetDateTime;

/// Series identity: device instance (device id, plus component id for
/// secondary components) and metric key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId {
    pub instance: String,
    pub key: String,
}

impl MetricId {
    pub fn new(instance: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instance, self.key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Timestamp moved since the last write.
    Changed,
    /// Unchanged, but re-emitted at the current time as a heartbeat.
    Hourly,
    /// Unchanged; tracked but not written.
    Skipped,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Changed => "CHANGED",
            Action::Hourly => "HOURLY",
            Action::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad so log columns line up
        f.pad(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    /// Timestamp the reading is written and tracked under.
    pub timestamp: OffsetDateTime,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tracker {
    last: HashMap<MetricId, OffsetDateTime>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &MetricId) -> Option<OffsetDateTime> {
        self.last.get(id).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.last.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.last.keys().any(|id| id.key == key)
    }

    /// Decide what to do with a reading stamped `ts`. A repeat of the last
    /// written timestamp is re-emitted at `now` during the first
    /// `interval_secs / 60` minutes of each hour, and skipped otherwise.
    pub fn decide(
        &self,
        id: &MetricId,
        ts: OffsetDateTime,
        now: OffsetDateTime,
        interval_secs: u64,
    ) -> Decision {
        if self.get(id) != Some(ts) {
            return Decision {
                action: Action::Changed,
                timestamp: ts,
            };
        }
        if u64::from(now.minute()) < interval_secs / 60 {
            Decision {
                action: Action::Hourly,
                timestamp: now,
            }
        } else {
            Decision {
                action: Action::Skipped,
                timestamp: ts,
            }
        }
    }

    /// Replace every entry with the ones gathered during a written cycle.
    pub fn commit(&mut self, next: PendingTracker) {
        self.last = next.last;
    }
}

/// Timestamps gathered during one cycle, committed only on a successful write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PendingTracker {
    last: HashMap<MetricId, OffsetDateTime>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: MetricId, ts: OffsetDateTime) {
        self.last.insert(id, ts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const T: OffsetDateTime = datetime!(2024-05-01 09:12:00 UTC);

    fn id() -> MetricId {
        MetricId::new("dev-1", "temperature")
    }

    fn tracked(ts: OffsetDateTime) -> Tracker {
        let mut pending = PendingTracker::new();
        pending.record(id(), ts);
        let mut tracker = Tracker::new();
        tracker.commit(pending);
        tracker
    }

    #[test]
    fn unknown_series_is_changed() {
        let d = Tracker::new().decide(&id(), T, datetime!(2024-05-01 10:30:00 UTC), 120);
        assert_eq!(d.action, Action::Changed);
        assert_eq!(d.timestamp, T);
    }

    #[test]
    fn new_timestamp_is_changed_at_any_minute() {
        let tracker = tracked(T);
        let later = T + time::Duration::minutes(3);
        for now in [datetime!(2024-05-01 10:00:00 UTC), datetime!(2024-05-01 10:45:00 UTC)] {
            assert_eq!(tracker.decide(&id(), later, now, 120).action, Action::Changed);
        }
    }

    #[test]
    fn repeat_is_skipped_past_the_heartbeat_window() {
        let now = datetime!(2024-05-01 10:02:00 UTC);
        let d = tracked(T).decide(&id(), T, now, 120);
        assert_eq!(d.action, Action::Skipped);
        assert_eq!(d.timestamp, T);
    }

    #[test]
    fn repeat_is_reemitted_inside_the_heartbeat_window() {
        let now = datetime!(2024-05-01 10:01:59 UTC);
        let d = tracked(T).decide(&id(), T, now, 120);
        assert_eq!(d.action, Action::Hourly);
        assert_eq!(d.timestamp, now);
    }

    #[test]
    fn short_intervals_never_heartbeat() {
        let now = datetime!(2024-05-01 10:00:00 UTC);
        assert_eq!(tracked(T).decide(&id(), T, now, 59).action, Action::Skipped);
    }

    #[test]
    fn commit_replaces_wholesale() {
        let mut tracker = tracked(T);
        let other = MetricId::new("dev-2", "switch");
        let mut pending = PendingTracker::new();
        pending.record(other.clone(), T);
        tracker.commit(pending);
        assert_eq!(tracker.get(&id()), None);
        assert_eq!(tracker.get(&other), Some(T));
        assert!(tracker.contains_key("switch"));
    }

    #[test]
    fn action_display_pads() {
        assert_eq!(format!("{:7}", Action::Hourly), "HOURLY ");
    }
}
