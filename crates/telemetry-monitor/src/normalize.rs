//! Numeric and binary views of a reading.
//!
//! Numbers convert to themselves. Encoded states (`"on"`, `"closed"`, ...)
//! are looked up first in the configured `valuemap` for the metric key, then
//! in a built-in table for well-known keys, then in a small table of
//! key-independent words. Anything else is unconvertible and the reading is
//! dropped by the caller.

use crate::NormalizeError;
use device_inventory::RawValue;
use influx_sink::FieldValue;
use std::collections::{BTreeMap, HashMap};

const KEYED: &[(&str, &[(&str, f64)])] = &[
    ("switch", &[("on", 1.0), ("off", 0.0)]),
    ("contact", &[("closed", 1.0), ("open", 0.0)]),
    ("door", &[("closed", 1.0), ("open", 0.0)]),
    ("lock", &[("locked", 1.0), ("unlocked", 0.0), ("unknown", 0.0)]),
    ("motion", &[("active", 1.0), ("inactive", 0.0)]),
    ("acceleration", &[("active", 1.0), ("inactive", 0.0)]),
    ("presence", &[("present", 1.0), ("not present", 0.0)]),
    ("water", &[("wet", 1.0), ("dry", 0.0)]),
    ("smoke", &[("detected", 1.0), ("tested", 1.0), ("clear", 0.0)]),
    ("carbonMonoxide", &[("detected", 1.0), ("tested", 1.0), ("clear", 0.0)]),
    ("tamper", &[("detected", 1.0), ("clear", 0.0)]),
    ("alarm", &[("off", 0.0), ("siren", 1.0), ("strobe", 1.0), ("both", 1.0)]),
    ("button", &[("pushed", 1.0), ("held", 1.0), ("double", 1.0), ("down", 1.0), ("up", 0.0)]),
    (
        "thermostatOperatingState",
        &[
            ("heating", 1.0),
            ("cooling", 1.0),
            ("fan only", 1.0),
            ("pending heat", 0.0),
            ("pending cool", 0.0),
            ("idle", 0.0),
        ],
    ),
    ("valve", &[("open", 1.0), ("closed", 0.0)]),
    ("windowShade", &[("open", 1.0), ("partially open", 1.0), ("closed", 0.0)]),
];

const GENERIC: &[(&str, f64)] = &[
    ("on", 1.0),
    ("off", 0.0),
    ("true", 1.0),
    ("false", 0.0),
    ("yes", 1.0),
    ("no", 0.0),
    ("active", 1.0),
    ("inactive", 0.0),
    ("enabled", 1.0),
    ("disabled", 0.0),
    ("detected", 1.0),
    ("clear", 0.0),
];

/// The three values stored for an accepted reading.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized {
    /// Raw value: numbers as floats, everything else as the encoded string.
    pub value: FieldValue,
    pub float: f64,
    pub binary: i64,
}

impl Normalized {
    /// All-zero values used when a reading is forced to a dead state.
    pub fn zeroed() -> Self {
        Self {
            value: FieldValue::Float(0.0),
            float: 0.0,
            binary: 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConversionMap {
    overrides: HashMap<String, HashMap<String, f64>>,
}

impl ConversionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(valuemap: &BTreeMap<String, BTreeMap<String, f64>>) -> Self {
        let mut map = Self::new();
        for (key, states) in valuemap {
            for (state, value) in states {
                map.insert(key, state, *value);
            }
        }
        map
    }

    pub fn insert(&mut self, key: &str, state: &str, value: f64) {
        self.overrides
            .entry(key.to_string())
            .or_default()
            .insert(state.trim().to_lowercase(), value);
    }

    fn lookup(&self, key: &str, state: &str) -> Option<f64> {
        let state = state.trim().to_lowercase();
        if let Some(v) = self.overrides.get(key).and_then(|m| m.get(&state)) {
            return Some(*v);
        }
        let keyed = KEYED.iter().find(|(k, _)| *k == key).map(|(_, t)| *t);
        if let Some(table) = keyed {
            if let Some((_, v)) = table.iter().find(|(s, _)| *s == state) {
                return Some(*v);
            }
        }
        GENERIC.iter().find(|(s, _)| *s == state).map(|(_, v)| *v)
    }

    pub fn float_value(&self, key: &str, raw: &RawValue) -> Result<f64, NormalizeError> {
        match raw {
            RawValue::Absent => Err(NormalizeError::Absent {
                key: key.to_string(),
            }),
            RawValue::Numeric(v) if v.is_finite() => Ok(*v),
            RawValue::Numeric(v) => Err(unconvertible(key, &v.to_string(), "number")),
            RawValue::Other(s) => self
                .lookup(key, s)
                .or_else(|| s.trim().parse::<f64>().ok().filter(|f| f.is_finite()))
                .ok_or_else(|| unconvertible(key, s, "number")),
        }
    }

    pub fn binary_value(&self, key: &str, raw: &RawValue) -> Result<i64, NormalizeError> {
        match self.float_value(key, raw) {
            Ok(f) => Ok(i64::from(f != 0.0)),
            Err(NormalizeError::Unconvertible { key, value, .. }) => {
                Err(NormalizeError::Unconvertible {
                    key,
                    value,
                    target: "binary",
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn normalize(&self, key: &str, raw: &RawValue) -> Result<Normalized, NormalizeError> {
        let value = match raw {
            RawValue::Absent => {
                return Err(NormalizeError::Absent {
                    key: key.to_string(),
                })
            }
            RawValue::Numeric(v) => FieldValue::Float(*v),
            RawValue::Other(s) => FieldValue::Str(s.clone()),
        };
        let float = self.float_value(key, raw)?;
        let binary = self.binary_value(key, raw)?;
        Ok(Normalized {
            value,
            float,
            binary,
        })
    }
}

fn unconvertible(key: &str, value: &str, target: &'static str) -> NormalizeError {
    NormalizeError::Unconvertible {
        key: key.to_string(),
        value: value.to_string(),
        target,
    }
}
