//! HTTP client for the MQTT exporter metrics endpoint.

use std::time::Duration;

use mqtt_lld_common::{MetricSnapshot, parse_snapshot};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SourceConfig;

/// Errors while fetching the metrics snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Response failed with status code: {status} and body: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid metrics JSON: {0}")]
    Decode(#[from] mqtt_lld_common::Error),
}

/// Fetches metrics snapshots over HTTP.
pub struct MetricsFetcher {
    client: Client,
    url: String,
}

impl MetricsFetcher {
    /// Create a fetcher from source settings.
    pub fn new(config: &SourceConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| FetchError::Request {
                url: config.url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// URL the fetcher reads from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode one snapshot.
    ///
    /// Any non-2xx status is an error, and so is a body that is not a JSON
    /// object of metric records.
    pub async fn fetch(&self) -> Result<MetricSnapshot, FetchError> {
        debug!(url = %self.url, "Fetching metrics");

        let request_error = |source: reqwest::Error| FetchError::Request {
            url: self.url.clone(),
            source,
        };

        let response = self.client.get(&self.url).send().await.map_err(request_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(request_error)?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let snapshot = parse_snapshot(&body)?;
        info!(url = %self.url, topics = snapshot.len(), "Metrics fetched");
        Ok(snapshot)
    }
}
