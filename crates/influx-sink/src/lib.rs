//! influx-sink: the write side of the telemetry bridge
//!
//! Points are accumulated into a [`BatchPoints`] sharing one database and time
//! precision, encoded as InfluxDB line protocol and handed to a blocking
//! [`PointWriter`]. [`retry_write`] wraps a single batch write with bounded
//! exponential backoff.

mod error;
pub use error::{Result, RetryError, SinkError};

mod point;
pub use point::{BatchConfig, BatchPoints, FieldValue, Point, Precision};

mod line_protocol;
pub use line_protocol::encode_point;

mod writer;
pub use writer::PointWriter;

#[cfg(feature = "mock")]
pub use writer::MemoryWriter;

mod retry;
pub use retry::{retry_write, RetryPolicy};

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::InfluxHttpWriter;
