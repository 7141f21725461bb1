use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// Identifier of the default/primary component of a device.
pub const MAIN_COMPONENT: &str = "main";

pub type DeviceId = Uuid;

/// Latest readings of one capability, keyed by metric key.
pub type DeviceStatus = BTreeMap<String, Reading>;

/// Connectivity state reported by the device health endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HealthState {
    Online,
    Offline,
    #[default]
    Unknown,
    Other(String),
}

impl HealthState {
    pub fn as_str(&self) -> &str {
        match self {
            HealthState::Online => "ONLINE",
            HealthState::Offline => "OFFLINE",
            HealthState::Unknown => "UNKNOWN",
            HealthState::Other(s) => s,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, HealthState::Online)
    }
}

impl From<String> for HealthState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ONLINE" => HealthState::Online,
            "OFFLINE" => HealthState::Offline,
            "UNKNOWN" | "" => HealthState::Unknown,
            _ => HealthState::Other(s),
        }
    }
}

impl From<HealthState> for String {
    fn from(state: HealthState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    #[serde(default)]
    pub state: HealthState,
    #[serde(
        rename = "lastUpdatedDate",
        default,
        with = "time::serde::rfc3339::option"
    )]
    pub last_updated: Option<OffsetDateTime>,
}

impl Health {
    pub fn new(state: HealthState, last_updated: Option<OffsetDateTime>) -> Self {
        Self {
            state,
            last_updated,
        }
    }

    pub fn is_online(&self) -> bool {
        self.state.is_online()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    #[serde(default)]
    pub version: u32,
}

impl Capability {
    pub fn new(id: impl Into<String>, version: u32) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl Component {
    pub fn new(id: impl Into<String>, capabilities: Vec<Capability>) -> Self {
        Self {
            id: id.into(),
            label: None,
            capabilities,
        }
    }

    pub fn is_main(&self) -> bool {
        self.id == MAIN_COMPONENT
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "deviceId")]
    pub device_id: DeviceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    /// Filled by a health refresh, never by the device listing.
    #[serde(skip)]
    pub health: Health,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl Device {
    /// Label when set, otherwise the manufacturer name.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }

    pub fn has_any_capability(&self, capabilities: &[String]) -> bool {
        self.components
            .iter()
            .flat_map(|c| c.capabilities.iter())
            .any(|cap| capabilities.iter().any(|want| *want == cap.id))
    }
}

/// One (device, component, capability) triple exposing metric readings.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceCapability {
    pub device: Device,
    pub component: String,
    pub capability: Capability,
}

impl DeviceCapability {
    pub fn is_main_component(&self) -> bool {
        self.component == MAIN_COMPONENT
    }

    /// Device id, suffixed by the component id for non-primary components so
    /// that e.g. each outlet of a power strip gets its own series.
    pub fn instance_id(&self) -> String {
        if self.is_main_component() {
            self.device.device_id.to_string()
        } else {
            format!("{}{}", self.device.device_id, self.component)
        }
    }

    pub fn label(&self) -> String {
        if self.is_main_component() {
            self.device.display_name().to_string()
        } else {
            format!("{} {}", self.device.display_name(), self.component)
        }
    }
}

/// Flatten devices into the triples whose capability id is in `capabilities`,
/// keeping device, component and capability order.
pub fn expand_capabilities(devices: Vec<Device>, capabilities: &[String]) -> Vec<DeviceCapability> {
    let mut out = Vec::new();
    for device in devices {
        for component in &device.components {
            for cap in &component.capabilities {
                if capabilities.iter().any(|want| *want == cap.id) {
                    out.push(DeviceCapability {
                        device: device.clone(),
                        component: component.id.clone(),
                        capability: cap.clone(),
                    });
                }
            }
        }
    }
    out
}

/// A reading value as reported upstream.
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue {
    Absent,
    Numeric(f64),
    /// Strings, booleans and structured values, kept in their encoded form.
    Other(String),
}

impl RawValue {
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => RawValue::Absent,
            Value::Number(n) => match n.as_f64() {
                Some(f) => RawValue::Numeric(f),
                None => RawValue::Other(n.to_string()),
            },
            Value::String(s) => RawValue::Other(s.clone()),
            Value::Bool(b) => RawValue::Other(b.to_string()),
            other => RawValue::Other(other.to_string()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RawValue::Absent)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Absent => f.pad("<absent>"),
            RawValue::Numeric(v) => f.pad(&v.to_string()),
            RawValue::Other(s) => f.pad(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "ReadingWire")]
pub struct Reading {
    pub value: RawValue,
    pub unit: String,
    pub timestamp: OffsetDateTime,
}

impl Reading {
    pub fn new(value: RawValue, unit: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            value,
            unit: unit.into(),
            timestamp,
        }
    }

    pub fn numeric(value: f64, unit: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self::new(RawValue::Numeric(value), unit, timestamp)
    }

    pub fn text(value: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self::new(RawValue::Other(value.into()), "", timestamp)
    }
}

#[derive(Deserialize)]
struct ReadingWire {
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    timestamp: Option<OffsetDateTime>,
}

impl From<ReadingWire> for Reading {
    fn from(wire: ReadingWire) -> Self {
        Reading {
            value: RawValue::from_json(&wire.value),
            unit: wire.unit.unwrap_or_default(),
            // Attributes never reported upstream carry no timestamp.
            timestamp: wire.timestamp.unwrap_or(OffsetDateTime::UNIX_EPOCH),
        }
    }
}
