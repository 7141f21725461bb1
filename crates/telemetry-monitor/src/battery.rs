//! Dead-battery override.
//!
//! A battery level that stopped updating, or that belongs to a device which
//! is no longer online, is reported as zero so that dashboards and alerts see
//! the device as dead instead of frozen at its last level.

use device_inventory::{DeviceCapability, Reading};
use time::{Duration, OffsetDateTime};

pub const BATTERY_CAPABILITY: &str = "battery";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeadBatteryReason {
    Stale,
    Unhealthy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatteryOverride {
    pub reason: DeadBatteryReason,
    /// Timestamp to store the zeroed reading under.
    pub timestamp: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatteryPolicy {
    pub stale_after: Duration,
    /// Offset added to a stale reading's own timestamp so the forced zero
    /// registers as a change.
    pub nudge: Duration,
}

impl Default for BatteryPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::hours(24),
            nudge: Duration::seconds(10),
        }
    }
}

impl BatteryPolicy {
    pub fn with_stale_hours(hours: u32) -> Self {
        Self {
            stale_after: Duration::hours(i64::from(hours)),
            ..Self::default()
        }
    }

    /// Returns the override to apply, or `None` when the reading stands.
    pub fn check(
        &self,
        item: &DeviceCapability,
        reading: &Reading,
        now: OffsetDateTime,
    ) -> Option<BatteryOverride> {
        if item.capability.id != BATTERY_CAPABILITY {
            return None;
        }
        let health = &item.device.health;
        if !health.is_online() {
            let timestamp = health
                .last_updated
                .unwrap_or(reading.timestamp + self.nudge);
            return Some(BatteryOverride {
                reason: DeadBatteryReason::Unhealthy,
                timestamp,
            });
        }
        if now - reading.timestamp > self.stale_after {
            return Some(BatteryOverride {
                reason: DeadBatteryReason::Stale,
                timestamp: reading.timestamp + self.nudge,
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_inventory::{Capability, Component, Device, Health, HealthState, MAIN_COMPONENT};
    use time::macros::datetime;
    use uuid::Uuid;

    const NOW: OffsetDateTime = datetime!(2024-05-03 12:00:00 UTC);

    fn item(capability: &str, state: HealthState, last_updated: Option<OffsetDateTime>) -> DeviceCapability {
        DeviceCapability {
            device: Device {
                device_id: Uuid::from_u128(7),
                name: "sensor".into(),
                label: "Hall Sensor".into(),
                health: Health::new(state, last_updated),
                components: vec![Component::new(
                    MAIN_COMPONENT,
                    vec![Capability::new(capability, 1)],
                )],
            },
            component: MAIN_COMPONENT.into(),
            capability: Capability::new(capability, 1),
        }
    }

    #[test]
    fn fresh_battery_on_online_device_stands() {
        let reading = Reading::numeric(80.0, "%", NOW - Duration::hours(3));
        let policy = BatteryPolicy::default();
        assert_eq!(policy.check(&item("battery", HealthState::Online, None), &reading, NOW), None);
    }

    #[test]
    fn stale_battery_is_nudged_forward() {
        let ts = NOW - Duration::hours(25);
        let reading = Reading::numeric(80.0, "%", ts);
        let o = BatteryPolicy::default()
            .check(&item("battery", HealthState::Online, None), &reading, NOW)
            .unwrap();
        assert_eq!(o.reason, DeadBatteryReason::Stale);
        assert_eq!(o.timestamp, ts + Duration::seconds(10));
    }

    #[test]
    fn offline_device_uses_health_timestamp() {
        let seen = NOW - Duration::days(2);
        let reading = Reading::numeric(55.0, "%", seen - Duration::hours(1));
        let o = BatteryPolicy::default()
            .check(&item("battery", HealthState::Offline, Some(seen)), &reading, NOW)
            .unwrap();
        assert_eq!(o.reason, DeadBatteryReason::Unhealthy);
        assert_eq!(o.timestamp, seen);
    }

    #[test]
    fn unhealthy_without_health_time_falls_back_to_nudge() {
        let ts = NOW - Duration::minutes(5);
        let reading = Reading::numeric(55.0, "%", ts);
        let o = BatteryPolicy::default()
            .check(&item("battery", HealthState::Unknown, None), &reading, NOW)
            .unwrap();
        assert_eq!(o.timestamp, ts + Duration::seconds(10));
    }

    #[test]
    fn other_capabilities_are_untouched() {
        let reading = Reading::numeric(19.0, "C", NOW - Duration::days(3));
        assert_eq!(
            BatteryPolicy::default().check(
                &item("temperatureMeasurement", HealthState::Offline, Some(NOW)),
                &reading,
                NOW
            ),
            None
        );
    }

    #[test]
    fn exactly_stale_after_is_still_fresh() {
        let policy = BatteryPolicy::default();
        let online = item("battery", HealthState::Online, None);
        let edge = Reading::numeric(80.0, "%", NOW - Duration::hours(24));
        assert_eq!(policy.check(&online, &edge, NOW), None);

        let past = NOW - Duration::hours(24) - Duration::seconds(1);
        let o = policy
            .check(&online, &Reading::numeric(80.0, "%", past), NOW)
            .unwrap();
        assert_eq!(o.reason, DeadBatteryReason::Stale);
        assert_eq!(o.timestamp, past + Duration::seconds(10));
    }

    #[test]
    fn threshold_is_configurable() {
        let reading = Reading::numeric(80.0, "%", NOW - Duration::hours(3));
        let policy = BatteryPolicy::with_stale_hours(2);
        assert!(policy
            .check(&item("battery", HealthState::Online, None), &reading, NOW)
            .is_some());
    }
}
