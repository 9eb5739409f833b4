// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of UDElectrical.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use crate::errors::{ApiError, ApiResult};
use parking_lot::RwLock;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound for every request, connection setup and body included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the static API key
pub const API_KEY_HEADER: &str = "X-API-Key";

pub const STATUS_PATH: &str = "/api/status";
pub const LATEST_CONSUMPTION_PATH: &str = "/api/consumption/latest";

/// UDElectrical REST API client
///
/// Clones share the same API key, so a key replaced through one handle is
/// used by every other handle from the next request on.
#[derive(Clone)]
pub struct UdElectricalClient {
    host: String,
    base_url: String,
    ssl: bool,
    api_key: Arc<RwLock<String>>,
    client: Client,
}

impl std::fmt::Debug for UdElectricalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdElectricalClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl UdElectricalClient {
    /// Create a new client for `host` (e.g. "192.168.1.20:8000")
    pub fn new(host: impl Into<String>, api_key: impl Into<String>, ssl: bool) -> ApiResult<Self> {
        Self::with_timeout(host, api_key, ssl, REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(
        host: impl Into<String>,
        api_key: impl Into<String>,
        ssl: bool,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let host = host.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        let protocol = if ssl { "https" } else { "http" };
        let base_url = format!("{protocol}://{host}");
        debug!("Initializing UDElectrical client: {}", base_url);

        Ok(Self {
            host,
            base_url,
            ssl,
            api_key: Arc::new(RwLock::new(api_key.into())),
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ssl(&self) -> bool {
        self.ssl
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the API key used by this client and all of its clones
    pub fn set_api_key(&self, api_key: impl Into<String>) {
        *self.api_key.write() = api_key.into();
        info!("🔑 [UDE] API key replaced for {}", self.host);
    }

    /// Make an API request and parse the body as JSON
    pub async fn request(&self, method: Method, path: &str) -> ApiResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let api_key = self.api_key.read().clone();

        let response = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!("⚠️ [UDE] Request to {} failed: {}", path, e);
                ApiError::from_transport(&e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        debug!("udelectrical API response [{}] {}: {}", status, path, body);

        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::InvalidAuth("Invalid API key".to_owned())),
            status if !status.is_success() => Err(ApiError::CannotConnect(format!(
                "API returned status {status} for {path}"
            ))),
            _ => serde_json::from_str(&body).map_err(|e| {
                ApiError::CannotConnect(format!("Malformed JSON from {path}: {e}"))
            }),
        }
    }

    /// Probe the status endpoint, keeping the reason of a failure
    pub async fn check_status(&self) -> ApiResult<()> {
        self.request(Method::GET, STATUS_PATH).await.map(|_| ())
    }

    /// Test if we can authenticate with the host
    ///
    /// Both error kinds read as "not authenticated" here; use
    /// [`Self::check_status`] to tell them apart.
    pub async fn authenticate(&self) -> bool {
        match self.check_status().await {
            Ok(()) => true,
            Err(e) => {
                debug!("Authentication probe failed: {}", e);
                false
            }
        }
    }

    /// Monthly aggregate for a single `YYYY-MM` month
    pub async fn monthly_statistics(&self, month: &str) -> ApiResult<Value> {
        let path =
            format!("/api/statistics/by-month/?start_month={month}&end_month={month}");
        self.request(Method::GET, &path).await
    }

    /// Daily aggregates for the inclusive `YYYY-MM-DD` range
    pub async fn daily_statistics(&self, start_date: &str, end_date: &str) -> ApiResult<Value> {
        let path =
            format!("/api/statistics/by-day/?start_date={start_date}&end_date={end_date}");
        self.request(Method::GET, &path).await
    }

    /// Latest single consumption reading
    pub async fn latest_consumption(&self) -> ApiResult<Value> {
        self.request(Method::GET, LATEST_CONSUMPTION_PATH).await
    }
}
