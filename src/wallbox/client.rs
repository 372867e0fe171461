//! Wallbox add-on client
//!
//! Only the status endpoint is used here; the start/stop/mode commands of the
//! add-on are not driven by this bridge.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info};

use super::types::{StatusResponse, WallboxStatus};
use crate::errors::FetchError;
use crate::poller::Source;

pub struct WallboxClient {
    client: Client,
    base_url: String,
}

impl WallboxClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::from_reqwest(&base_url, e))?;
        info!("Wallbox API: {} (timeout {:?})", base_url, timeout);
        Ok(Self { client, base_url })
    }

    /// `GET {base}/status`
    pub fn get_status(&self) -> Result<WallboxStatus, FetchError> {
        let url = format!("{}/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body: StatusResponse = response.json().map_err(|e| FetchError::Decode {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !body.success {
            return Err(FetchError::Rejected { url });
        }

        debug!("Wallbox status: mode={} status={}", body.mode, body.status);
        Ok(WallboxStatus::from_response(body))
    }
}

impl Source for WallboxClient {
    type Output = WallboxStatus;

    fn name(&self) -> &str {
        "Wallbox"
    }

    fn fetch(&self) -> Result<Self::Output, FetchError> {
        self.get_status()
    }
}
