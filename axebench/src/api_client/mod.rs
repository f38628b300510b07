//! HTTP client for the Bitaxe device API.

pub mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::device::{Device, DeviceError};
use crate::types::Configuration;
use types::{SettingsPatch, SystemInfo};

/// Default device address.
pub const DEFAULT_BASE_URL: &str = "http://192.168.2.117";

/// Per-request timeout for every endpoint.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a single device.
#[derive(Clone, Debug)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DeviceError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Device for Client {
    async fn system_info(&self) -> Result<SystemInfo, DeviceError> {
        let response = self
            .http
            .get(self.url("/api/system/info"))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn patch_settings(&self, config: Configuration) -> Result<(), DeviceError> {
        self.http
            .patch(self.url("/api/system"))
            .json(&SettingsPatch::from(config))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn restart(&self) -> Result<(), DeviceError> {
        self.http
            .post(self.url("/api/system/restart"))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
