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

//! Credential entry and re-authentication

use thiserror::Error;
use tracing::{info, warn};
use udelectrical_api::ApiError;

use crate::entry::{ConnectionConfig, ConnectionEntry};
use crate::setup::Connection;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("Invalid API key")]
    InvalidAuth,

    #[error("Cannot connect to the UDElectrical API")]
    CannotConnect,

    #[error("This host is already configured")]
    AlreadyConfigured,

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl FlowError {
    /// Short error code for form-style front ends
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAuth => "invalid_auth",
            Self::CannotConnect => "cannot_connect",
            Self::AlreadyConfigured => "already_configured",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<ApiError> for FlowError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidAuth(_) => Self::InvalidAuth,
            ApiError::CannotConnect(_) => Self::CannotConnect,
            ApiError::ConfigError(msg) => Self::Unknown(msg),
        }
    }
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;

async fn validate(config: &ConnectionConfig) -> FlowResult<()> {
    let client = config.client()?;
    client.check_status().await.map_err(|e| {
        warn!("⚠️ Credential check against {} failed: {}", config.host, e);
        FlowError::from(e)
    })
}

/// Validate credentials entered by the user.
///
/// `configured_ids` are the unique ids of connections that already exist.
pub async fn validate_user_input(
    host: &str,
    api_key: &str,
    ssl: bool,
    configured_ids: &[String],
) -> FlowResult<ConnectionEntry> {
    let config = ConnectionConfig::new(host.trim(), api_key, ssl);
    validate(&config).await?;

    let unique_id = config.unique_id();
    if configured_ids.contains(&unique_id) {
        return Err(FlowError::AlreadyConfigured);
    }

    info!("New connection validated for {}", config.host);
    Ok(ConnectionEntry::new(config))
}

/// Swap in a new API key after the old one was rejected.
///
/// The key is checked against the same host and TLS setting first. On success
/// the live client switches over and the cached snapshot is kept.
pub async fn reauthenticate(
    connection: &Connection,
    api_key: &str,
) -> FlowResult<ConnectionConfig> {
    let config = ConnectionConfig {
        api_key: api_key.to_owned(),
        ..connection.entry.config.clone()
    };
    validate(&config).await?;

    connection.client.set_api_key(api_key);
    info!("[{}] Re-authenticated", connection.entry.title);
    Ok(config)
}
