//! Blocking writer for the InfluxDB 1.x `/write` endpoint.

use crate::{BatchPoints, PointWriter, Result, SinkError};
use reqwest::blocking::{Client, RequestBuilder};
use std::time::Duration;
use tracing::debug;

pub struct InfluxHttpWriter {
    client: Client,
    url: String,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxHttpWriter {
    pub fn new(url: &str, username: Option<String>, password: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            username: username.filter(|u| !u.is_empty()),
            password,
        })
    }

    /// Check that the server answers its ping endpoint.
    pub fn ping(&self) -> Result<()> {
        let resp = self
            .client
            .get(format!("{}/ping", self.url))
            .send()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Rejected {
                code: resp.status().as_u16(),
                body: resp.text().unwrap_or_default(),
            })
        }
    }

    fn write_request(&self, batch: &BatchPoints) -> RequestBuilder {
        let mut req = self
            .client
            .post(format!("{}/write", self.url))
            .query(&[("db", batch.database()), ("precision", batch.precision().as_str())])
            .body(batch.encode());
        if let Some(user) = &self.username {
            req = req.basic_auth(user, self.password.as_deref());
        }
        req
    }
}

impl PointWriter for InfluxHttpWriter {
    fn write(&mut self, batch: &BatchPoints) -> Result<()> {
        debug!("writing {} point(s) to {}", batch.len(), batch.database());
        let resp = self
            .write_request(batch)
            .send()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SinkError::Rejected {
                code: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BatchConfig, FieldValue, Point, Precision};
    use reqwest::header::AUTHORIZATION;
    use std::collections::BTreeMap;
    use time::macros::datetime;

    fn batch() -> BatchPoints {
        let mut batch =
            BatchPoints::new(BatchConfig::new("smartthings", Precision::Seconds)).unwrap();
        let point = Point::new(
            "battery",
            BTreeMap::from([("deviceName".to_string(), "Front Door".to_string())]),
            BTreeMap::from([("valueFloat".to_string(), FieldValue::Float(87.0))]),
            datetime!(2024-05-01 10:00:00 UTC),
        )
        .unwrap();
        batch.add_point(point);
        batch
    }

    #[test]
    fn write_posts_line_protocol_with_db_and_precision() {
        let writer = InfluxHttpWriter::new("http://influx:8086/", None, None).unwrap();
        let batch = batch();
        let req = writer.write_request(&batch).build().unwrap();
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.url().path(), "/write");
        assert_eq!(req.url().query(), Some("db=smartthings&precision=s"));
        assert!(req.headers().get(AUTHORIZATION).is_none());
        let body = req.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, batch.encode().as_bytes());
    }

    #[test]
    fn write_uses_basic_auth_when_a_user_is_set() {
        let writer = InfluxHttpWriter::new(
            "http://influx:8086",
            Some("admin".into()),
            Some("secret".into()),
        )
        .unwrap();
        let req = writer.write_request(&batch()).build().unwrap();
        // base64("admin:secret")
        assert_eq!(
            req.headers().get(AUTHORIZATION).unwrap(),
            "Basic YWRtaW46c2VjcmV0"
        );
    }

    #[test]
    fn empty_username_means_no_auth() {
        let writer =
            InfluxHttpWriter::new("http://influx:8086", Some(String::new()), None).unwrap();
        let req = writer.write_request(&batch()).build().unwrap();
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }
}
