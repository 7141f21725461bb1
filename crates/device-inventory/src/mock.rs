use crate::{
    expand_capabilities, Capability, Component, Device, DeviceCapability, DeviceId, DeviceStatus,
    Health, HealthState, Inventory, InventoryError, Reading, Result, MAIN_COMPONENT,
};
use std::collections::{HashMap, HashSet};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

type StatusKey = (DeviceId, String, String);

/// A scriptable in-process inventory. Readings, health and failures are set
/// up front and may be changed between polls.
#[derive(Debug, Default, Clone)]
pub struct MockInventory {
    devices: Vec<Device>,
    health: HashMap<DeviceId, Health>,
    status: HashMap<StatusKey, DeviceStatus>,
    failing_status: HashSet<DeviceId>,
    fail_listing: bool,
}

impl MockInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device; its current `health` becomes the reported health.
    pub fn add_device(&mut self, device: Device) {
        self.health.insert(device.device_id, device.health.clone());
        self.devices.retain(|d| d.device_id != device.device_id);
        self.devices.push(device);
    }

    pub fn set_health(&mut self, device_id: DeviceId, health: Health) {
        self.health.insert(device_id, health);
    }

    pub fn set_reading(
        &mut self,
        device_id: DeviceId,
        component: &str,
        capability: &str,
        key: &str,
        reading: Reading,
    ) {
        self.status
            .entry((device_id, component.to_string(), capability.to_string()))
            .or_default()
            .insert(key.to_string(), reading);
    }

    pub fn remove_reading(&mut self, device_id: DeviceId, component: &str, capability: &str, key: &str) {
        if let Some(status) =
            self.status
                .get_mut(&(device_id, component.to_string(), capability.to_string()))
        {
            status.remove(key);
        }
    }

    /// Make every listing call fail until cleared.
    pub fn fail_listing(&mut self, fail: bool) {
        self.fail_listing = fail;
    }

    /// Make status queries for one device fail until cleared.
    pub fn fail_status(&mut self, device_id: DeviceId, fail: bool) {
        if fail {
            self.failing_status.insert(device_id);
        } else {
            self.failing_status.remove(&device_id);
        }
    }

    /// A small fleet for trying the monitor without an account: a two-outlet
    /// power strip, a door sensor and an offline garage sensor.
    pub fn demo(now: OffsetDateTime) -> Self {
        let strip = Uuid::from_u128(0x5741_0001);
        let door = Uuid::from_u128(0x5741_0002);
        let garage = Uuid::from_u128(0x5741_0003);
        let mut inv = Self::new();

        inv.add_device(Device {
            device_id: strip,
            name: "c2c-power-strip".into(),
            label: "Power Strip".into(),
            health: Health::new(HealthState::Online, Some(now)),
            components: vec![
                Component::new(
                    MAIN_COMPONENT,
                    vec![Capability::new("switch", 1), Capability::new("powerMeter", 1)],
                ),
                Component::new("outlet2", vec![Capability::new("switch", 1)]),
            ],
        });
        inv.set_reading(strip, MAIN_COMPONENT, "switch", "switch", Reading::text("on", now));
        inv.set_reading(
            strip,
            MAIN_COMPONENT,
            "powerMeter",
            "power",
            Reading::numeric(41.7, "W", now),
        );
        inv.set_reading(strip, "outlet2", "switch", "switch", Reading::text("off", now));

        inv.add_device(Device {
            device_id: door,
            name: "zigbee-contact".into(),
            label: "Front Door".into(),
            health: Health::new(HealthState::Online, Some(now)),
            components: vec![Component::new(
                MAIN_COMPONENT,
                vec![
                    Capability::new("contactSensor", 1),
                    Capability::new("battery", 1),
                    Capability::new("temperatureMeasurement", 1),
                ],
            )],
        });
        inv.set_reading(door, MAIN_COMPONENT, "contactSensor", "contact", Reading::text("closed", now));
        inv.set_reading(door, MAIN_COMPONENT, "battery", "battery", Reading::numeric(87.0, "%", now));
        inv.set_reading(
            door,
            MAIN_COMPONENT,
            "temperatureMeasurement",
            "temperature",
            Reading::numeric(21.5, "C", now),
        );

        let seen = now - Duration::days(2);
        inv.add_device(Device {
            device_id: garage,
            name: "zigbee-motion".into(),
            label: "Garage Sensor".into(),
            health: Health::new(HealthState::Offline, Some(seen)),
            components: vec![Component::new(
                MAIN_COMPONENT,
                vec![Capability::new("battery", 1), Capability::new("motionSensor", 1)],
            )],
        });
        inv.set_reading(garage, MAIN_COMPONENT, "battery", "battery", Reading::numeric(40.0, "%", seen));
        inv.set_reading(garage, MAIN_COMPONENT, "motionSensor", "motion", Reading::text("inactive", seen));

        inv
    }
}

impl Inventory for MockInventory {
    fn devices(&self) -> Result<Vec<Device>> {
        if self.fail_listing {
            return Err(InventoryError::Http("injected listing failure".into()));
        }
        Ok(self
            .devices
            .iter()
            .cloned()
            .map(|mut d| {
                self.refresh_health(&mut d);
                d
            })
            .collect())
    }

    fn devices_with_capabilities(&self, capabilities: &[String]) -> Result<Vec<DeviceCapability>> {
        let devices = self
            .devices()?
            .into_iter()
            .filter(|d| d.has_any_capability(capabilities))
            .collect();
        Ok(expand_capabilities(devices, capabilities))
    }

    fn device_status(&self, item: &DeviceCapability) -> Result<DeviceStatus> {
        let id = item.device.device_id;
        if self.failing_status.contains(&id) {
            return Err(InventoryError::Http(format!("injected status failure for {id}")));
        }
        if !self.devices.iter().any(|d| d.device_id == id) {
            return Err(InventoryError::NotFound(id));
        }
        let key = (id, item.component.clone(), item.capability.id.clone());
        Ok(self.status.get(&key).cloned().unwrap_or_default())
    }

    fn device_health(&self, device_id: DeviceId) -> Result<Health> {
        self.health
            .get(&device_id)
            .cloned()
            .ok_or(InventoryError::NotFound(device_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-01 10:30:00 UTC);

    fn caps(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn demo_fleet_filters_by_capability() {
        let inv = MockInventory::demo(NOW);
        let items = inv.devices_with_capabilities(&caps(&["switch"])).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.capability.id == "switch"));

        let items = inv.devices_with_capabilities(&caps(&["battery"])).unwrap();
        assert_eq!(items.len(), 2);
        let garage = items
            .iter()
            .find(|i| i.device.label == "Garage Sensor")
            .unwrap();
        assert_eq!(garage.device.health.state, HealthState::Offline);
    }

    #[test]
    fn status_returns_readings_for_the_triple() {
        let inv = MockInventory::demo(NOW);
        let items = inv.devices_with_capabilities(&caps(&["switch"])).unwrap();
        let outlet = items.iter().find(|i| i.component == "outlet2").unwrap();
        let status = inv.device_status(outlet).unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status["switch"], Reading::text("off", NOW));
    }

    #[test]
    fn injected_failures_surface_as_errors() {
        let mut inv = MockInventory::demo(NOW);
        let items = inv.devices_with_capabilities(&caps(&["battery"])).unwrap();
        let first = items[0].clone();

        inv.fail_status(first.device.device_id, true);
        assert!(matches!(inv.device_status(&first), Err(InventoryError::Http(_))));
        inv.fail_status(first.device.device_id, false);
        assert!(inv.device_status(&first).is_ok());

        inv.fail_listing(true);
        assert!(inv.devices_with_capabilities(&caps(&["battery"])).is_err());
    }

    #[test]
    fn health_updates_are_visible_on_next_listing() {
        let mut inv = MockInventory::demo(NOW);
        let door = Uuid::from_u128(0x5741_0002);
        inv.set_health(door, Health::new(HealthState::Offline, Some(NOW)));
        let devices = inv.devices().unwrap();
        let dev = devices.iter().find(|d| d.device_id == door).unwrap();
        assert_eq!(dev.health.state, HealthState::Offline);
        assert!(matches!(
            inv.device_health(Uuid::from_u128(1)),
            Err(InventoryError::NotFound(_))
        ));
    }
}
