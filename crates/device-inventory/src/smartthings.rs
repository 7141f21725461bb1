//! Blocking client for the SmartThings REST API (v1).

use crate::{
    expand_capabilities, Device, DeviceCapability, DeviceId, DeviceStatus, Health, Inventory,
    InventoryError, Result,
};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.smartthings.com/v1";

pub struct SmartThingsClient {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct DevicePage {
    #[serde(default)]
    items: Vec<Device>,
    #[serde(rename = "_links", default)]
    links: Option<PageLinks>,
}

#[derive(Deserialize)]
struct PageLinks {
    next: Option<Href>,
}

#[derive(Deserialize)]
struct Href {
    href: String,
}

impl DevicePage {
    fn next_url(&self) -> Result<Option<Url>> {
        match self.links.as_ref().and_then(|l| l.next.as_ref()) {
            Some(next) => Url::parse(&next.href)
                .map(Some)
                .map_err(|e| InventoryError::Decode(format!("bad next link: {e}"))),
            None => Ok(None),
        }
    }
}

impl SmartThingsClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| InventoryError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| InventoryError::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(InventoryError::Status {
                code: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .map_err(|e| InventoryError::Decode(e.to_string()))
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| InventoryError::Http(format!("invalid url: {e}")))
    }

    /// Walk the device listing, following `_links.next` until exhausted.
    fn list_pages(&self, first: Url) -> Result<Vec<Device>> {
        let mut devices = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let page: DevicePage = self.get_json(url)?;
            next = page.next_url()?;
            devices.extend(page.items);
        }
        Ok(devices)
    }

    /// Device listing restricted to devices exposing any of `capabilities`.
    fn filtered_devices_url(&self, capabilities: &[String]) -> Result<Url> {
        let mut url = self.url("/devices")?;
        {
            let mut query = url.query_pairs_mut();
            for cap in capabilities {
                query.append_pair("capability", cap);
            }
            query.append_pair("capabilitiesMode", "or");
        }
        Ok(url)
    }
}

impl Inventory for SmartThingsClient {
    fn devices(&self) -> Result<Vec<Device>> {
        let mut devices = self.list_pages(self.url("/devices")?)?;
        for device in &mut devices {
            self.refresh_health(device);
        }
        Ok(devices)
    }

    fn devices_with_capabilities(&self, capabilities: &[String]) -> Result<Vec<DeviceCapability>> {
        let url = self.filtered_devices_url(capabilities)?;
        let mut devices = self.list_pages(url)?;
        for device in &mut devices {
            self.refresh_health(device);
        }
        Ok(expand_capabilities(devices, capabilities))
    }

    fn device_status(&self, item: &DeviceCapability) -> Result<DeviceStatus> {
        let url = self.url(&format!(
            "/devices/{}/components/{}/capabilities/{}/status",
            item.device.device_id, item.component, item.capability.id
        ))?;
        self.get_json(url)
    }

    fn device_health(&self, device_id: DeviceId) -> Result<Health> {
        let url = self.url(&format!("/devices/{device_id}/health"))?;
        self.get_json(url)
    }
}
