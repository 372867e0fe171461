//! Enpal device page client
//!
//! Fetches the status page over plain HTTP and turns it into sensor records.

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info};

use super::calculated::add_calculated_currents;
use super::parser::parse;
use super::types::SensorRecord;
use crate::errors::FetchError;
use crate::poller::Source;

/// Enpal client wrapper
pub struct EnpalClient {
    client: Client,
    url: String,
    groups: BTreeSet<String>,
}

impl EnpalClient {
    /// Create a new client for the status page at `url`
    pub fn new<I, S>(url: String, groups: I, timeout: Duration) -> Result<Self, FetchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::from_reqwest(&url, e))?;
        let groups: BTreeSet<String> = groups.into_iter().map(Into::into).collect();

        info!("Enpal page: {} (timeout {:?})", url, timeout);
        info!(
            "Enabled groups: {}",
            groups.iter().cloned().collect::<Vec<_>>().join(", ")
        );

        Ok(Self {
            client,
            url,
            groups,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// Fetch the raw status page. Anything but `200 OK` is a failure.
    pub fn fetch_document(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| FetchError::from_reqwest(&self.url, e))?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().map_err(|e| FetchError::Body {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        debug!("Fetched {} bytes from {}", body.len(), self.url);
        Ok(body)
    }

    /// Fetch and parse the status page into sensor records.
    pub fn get_sensors(&self) -> Result<Vec<SensorRecord>, FetchError> {
        let document = self.fetch_document()?;
        Ok(add_calculated_currents(parse(&document, &self.groups)))
    }
}

impl Source for EnpalClient {
    type Output = Vec<SensorRecord>;

    fn name(&self) -> &str {
        "Enpal"
    }

    fn fetch(&self) -> Result<Self::Output, FetchError> {
        self.get_sensors()
    }
}
