use crate::{Device, DeviceCapability, DeviceId, DeviceStatus, Health, Result};

/// A minimal blocking device inventory.
pub trait Inventory {
    /// List every device visible to the account.
    fn devices(&self) -> Result<Vec<Device>>;

    /// List the (device, component, capability) triples for any of the given
    /// capability ids. Devices come back with their health refreshed.
    fn devices_with_capabilities(&self, capabilities: &[String]) -> Result<Vec<DeviceCapability>>;

    /// Latest readings of one capability of one component.
    fn device_status(&self, item: &DeviceCapability) -> Result<DeviceStatus>;

    /// Current connectivity of a device.
    fn device_health(&self, device_id: DeviceId) -> Result<Health>;

    /// Best-effort health refresh; on failure the device keeps its previous
    /// health and the error is logged.
    fn refresh_health(&self, device: &mut Device) {
        match self.device_health(device.device_id) {
            Ok(health) => device.health = health,
            Err(e) => tracing::warn!(
                "could not refresh health of '{}' ({}): {}",
                device.display_name(),
                device.device_id,
                e
            ),
        }
    }
}
