// # OVH Availability Source
//
// This crate provides the OVH dedicated-server availability source for dcwatch.
//
// ## API Reference
//
// - `GET /engine/apiv6/dedicated/server/datacenter/availabilities`
//   `?excludeDatacenters=false&planCode=...&server=...`
// - Anonymous, no authentication
// - Answers a JSON array; every element carries at least `fqn` and
//   `datacenters: [{datacenter, availability}]`
//
// ## Behaviour
//
// - One GET per call: no retry, no backoff, no caching (owned by the Poller)
// - Timeout bounded by the client (default 5 seconds)
// - Non-2xx statuses and undecodable bodies are errors, never empty results

use async_trait::async_trait;
use dcwatch_core::config::{ApiConfig, DEFAULT_API_BASE_URL};
use dcwatch_core::traits::AvailabilitySource;
use dcwatch_core::{AvailabilityEntry, Error, Result, WatchedConfig};
use std::time::Duration;

/// Default HTTP timeout for availability requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest slice of an error body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Availability source backed by the OVH availability endpoint
#[derive(Debug, Clone)]
pub struct OvhAvailabilitySource {
    /// Endpoint URL, queried with the watched config's parameters
    base_url: String,

    /// Value sent as `excludeDatacenters`
    exclude_datacenters: bool,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl OvhAvailabilitySource {
    /// Create a new source for the given endpoint
    ///
    /// # Parameters
    ///
    /// - `base_url`: availability endpoint
    /// - `timeout`: per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dcwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            exclude_datacenters: false,
            client,
        })
    }

    /// Create a source for the public OVH endpoint with default timeout
    pub fn ovh() -> Result<Self> {
        Self::new(DEFAULT_API_BASE_URL, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a source from API configuration
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        config.validate()?;
        let mut source = Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        source.exclude_datacenters = config.exclude_datacenters;
        Ok(source)
    }

    /// The endpoint this source queries
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full query string parameters for one watched configuration
    fn query_params(&self, config: &WatchedConfig) -> Vec<(String, String)> {
        let mut params = vec![(
            "excludeDatacenters".to_string(),
            self.exclude_datacenters.to_string(),
        )];
        params.extend(
            config
                .query_params()
                .into_iter()
                .filter(|(k, _)| k != "excludeDatacenters"),
        );
        params
    }
}

#[async_trait]
impl AvailabilitySource for OvhAvailabilitySource {
    async fn fetch(&self, config: &WatchedConfig) -> Result<Vec<AvailabilityEntry>> {
        tracing::debug!(
            "Requesting availability for {} (server {})",
            config.plan_code,
            config.server
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query_params(config))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::http(format!("Request for {} timed out: {}", config.plan_code, e))
                } else {
                    Error::http(format!("Request for {} failed: {}", config.plan_code, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            let error_text = truncate(&error_text);

            return Err(match status.as_u16() {
                400 | 404 => Error::upstream(
                    "ovh",
                    format!(
                        "Unknown plan or server ({} / {}): {} - {}",
                        config.plan_code, config.server, status, error_text
                    ),
                ),
                429 => Error::upstream(
                    "ovh",
                    format!("Rate limit exceeded. Status: {}", status),
                ),
                500..=599 => Error::upstream(
                    "ovh",
                    format!("OVH server error (transient): {} - {}", status, error_text),
                ),
                _ => Error::upstream(
                    "ovh",
                    format!("Availability request failed: {} - {}", status, error_text),
                ),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))?;

        let entries: Vec<AvailabilityEntry> = serde_json::from_str(&body).map_err(|e| {
            Error::malformed(format!(
                "Unexpected availability payload for {}: {}",
                config.plan_code, e
            ))
        })?;

        tracing::debug!(
            "Availability for {}: {} entries",
            config.plan_code,
            entries.len()
        );

        Ok(entries)
    }

    fn source_name(&self) -> &'static str {
        "ovh"
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        cut.push_str("...");
        cut
    }
}
