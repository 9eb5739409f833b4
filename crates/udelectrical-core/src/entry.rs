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

use serde::{Deserialize, Serialize};
use udelectrical_api::{ApiResult, UdElectricalClient};

/// Credentials of one UDElectrical account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Host address, optionally with port (no scheme)
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub api_key: String,

    /// Use HTTPS
    #[serde(default = "default_ssl")]
    pub ssl: bool,
}

fn default_ssl() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            api_key: String::new(),
            ssl: default_ssl(),
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("ssl", &self.ssl)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>, ssl: bool) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            ssl,
        }
    }

    /// One connection per host
    pub fn unique_id(&self) -> String {
        unique_id_for(&self.host)
    }

    pub fn client(&self) -> ApiResult<UdElectricalClient> {
        UdElectricalClient::new(self.host.as_str(), self.api_key.as_str(), self.ssl)
    }
}

pub fn unique_id_for(host: &str) -> String {
    format!("udelectrical_{host}")
}

/// A configured connection: identity, display title and credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub entry_id: String,
    pub title: String,
    pub config: ConnectionConfig,
}

impl ConnectionEntry {
    /// Entry keyed by the config's unique id and titled with the host
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            entry_id: config.unique_id(),
            title: config.host.clone(),
            config,
        }
    }
}
