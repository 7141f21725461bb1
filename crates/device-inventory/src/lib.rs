//! device-inventory: enumerate devices, capabilities and their latest readings
//!
//! This crate models the device side of the telemetry bridge (devices, their
//! components and capabilities, health, and per-capability readings) behind a
//! small blocking [`Inventory`] trait. The default build enables a `mock`
//! backend so that binaries and tests run without network access; the
//! `smartthings` feature adds the HTTP client for the SmartThings REST API.

mod types;
pub use types::{
    expand_capabilities, Capability, Component, Device, DeviceCapability, DeviceId, DeviceStatus,
    Health, HealthState, RawValue, Reading, MAIN_COMPONENT,
};

mod error;
pub use error::{InventoryError, Result};

mod traits;
pub use traits::Inventory;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockInventory;

#[cfg(feature = "smartthings")]
mod smartthings;

#[cfg(feature = "smartthings")]
pub use smartthings::{SmartThingsClient, DEFAULT_BASE_URL};
