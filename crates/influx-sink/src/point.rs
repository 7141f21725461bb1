use crate::{encode_point, Result, SinkError};
use core::fmt;
use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => f.pad(&v.to_string()),
            FieldValue::Integer(v) => f.pad(&v.to_string()),
            FieldValue::Str(s) => f.pad(s),
            FieldValue::Bool(b) => f.pad(if *b { "true" } else { "false" }),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// Timestamp resolution of a batch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Precision {
    #[default]
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Seconds => "s",
            Precision::Milliseconds => "ms",
            Precision::Microseconds => "u",
            Precision::Nanoseconds => "ns",
        }
    }

    /// Timestamp truncated to this precision, in units since the epoch.
    pub fn timestamp(&self, ts: OffsetDateTime) -> i128 {
        let nanos = ts.unix_timestamp_nanos();
        match self {
            Precision::Seconds => nanos.div_euclid(1_000_000_000),
            Precision::Milliseconds => nanos.div_euclid(1_000_000),
            Precision::Microseconds => nanos.div_euclid(1_000),
            Precision::Nanoseconds => nanos,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: OffsetDateTime,
}

impl Point {
    /// Build a point, rejecting what the store would refuse: an empty
    /// measurement, no fields, empty keys or non-finite floats.
    pub fn new(
        measurement: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: BTreeMap<String, FieldValue>,
        timestamp: OffsetDateTime,
    ) -> Result<Self> {
        let measurement = measurement.into();
        if measurement.is_empty() {
            return Err(SinkError::InvalidPoint("empty measurement name".into()));
        }
        if fields.is_empty() {
            return Err(SinkError::InvalidPoint(format!(
                "{measurement}: point has no fields"
            )));
        }
        if tags.keys().chain(fields.keys()).any(|k| k.is_empty()) {
            return Err(SinkError::InvalidPoint(format!("{measurement}: empty key")));
        }
        for (key, value) in &fields {
            if let FieldValue::Float(f) = value {
                if !f.is_finite() {
                    return Err(SinkError::InvalidPoint(format!(
                        "{measurement}: field {key} is not finite ({f})"
                    )));
                }
            }
        }
        Ok(Self {
            measurement,
            tags,
            fields,
            timestamp,
        })
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    pub database: String,
    pub precision: Precision,
}

impl BatchConfig {
    pub fn new(database: impl Into<String>, precision: Precision) -> Self {
        Self {
            database: database.into(),
            precision,
        }
    }
}

/// Points written together as one store operation.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchPoints {
    config: BatchConfig,
    points: Vec<Point>,
}

impl BatchPoints {
    pub fn new(config: BatchConfig) -> Result<Self> {
        if config.database.is_empty() {
            return Err(SinkError::InvalidPoint("batch needs a database name".into()));
        }
        Ok(Self {
            config,
            points: Vec::new(),
        })
    }

    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    pub fn precision(&self) -> Precision {
        self.config.precision
    }

    /// Line-protocol body, one point per line.
    pub fn encode(&self) -> String {
        self.points
            .iter()
            .map(|p| encode_point(p, self.config.precision))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn fields() -> BTreeMap<String, FieldValue> {
        BTreeMap::from([("value".to_string(), FieldValue::Float(1.0))])
    }

    #[test]
    fn rejects_points_the_store_would_refuse() {
        let ts = datetime!(2024-05-01 10:00:00 UTC);
        assert!(Point::new("", BTreeMap::new(), fields(), ts).is_err());
        assert!(Point::new("battery", BTreeMap::new(), BTreeMap::new(), ts).is_err());
        let nan = BTreeMap::from([("value".to_string(), FieldValue::Float(f64::NAN))]);
        assert!(matches!(
            Point::new("battery", BTreeMap::new(), nan, ts),
            Err(SinkError::InvalidPoint(_))
        ));
        assert!(Point::new("battery", BTreeMap::new(), fields(), ts).is_ok());
    }

    #[test]
    fn field_values_display_padded() {
        assert_eq!(format!("{:>5}", FieldValue::Float(0.0)), "    0");
        assert_eq!(format!("{:>5}", FieldValue::Float(87.5)), " 87.5");
        assert_eq!(format!("{:<4}|", FieldValue::Str("on".into())), "on  |");
        assert_eq!(FieldValue::Integer(1).to_string(), "1");
        assert_eq!(FieldValue::Bool(false).to_string(), "false");
    }

    #[test]
    fn precision_truncates_timestamps() {
        let ts = datetime!(2024-05-01 10:00:00.987654321 UTC);
        assert_eq!(Precision::Seconds.timestamp(ts), 1_714_557_600);
        assert_eq!(Precision::Milliseconds.timestamp(ts), 1_714_557_600_987);
        assert_eq!(Precision::Nanoseconds.timestamp(ts), 1_714_557_600_987_654_321);
    }

    #[test]
    fn batch_requires_database() {
        assert!(BatchPoints::new(BatchConfig::new("", Precision::Seconds)).is_err());
        let batch = BatchPoints::new(BatchConfig::new("smartthings", Precision::Seconds)).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.precision().as_str(), "s");
    }
}
