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

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use udelectrical_core::ConnectionConfig;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "UDELECTRICAL_CONFIG";

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_setup_retry_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Default tracing filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Delay between setup attempts while the API is unreachable
    #[serde(default = "default_setup_retry_secs")]
    pub setup_retry_secs: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            setup_retry_secs: default_setup_retry_secs(),
        }
    }
}

/// Where we read the config from, in that order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Environment => f.write_str("environment"),
        }
    }
}

/// Config path from the first CLI argument, then `UDELECTRICAL_CONFIG`
pub fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

impl AppConfig {
    /// Load `path` if it exists, else defaults; environment overrides win
    pub fn load(path: &Path) -> Result<(Self, ConfigSource)> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with<F>(path: &Path, env: F) -> Result<(Self, ConfigSource)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (mut config, source) = if path.exists() {
            let config_str = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: AppConfig = toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            (config, ConfigSource::File(path.to_path_buf()))
        } else {
            (Self::default(), ConfigSource::Environment)
        };

        config.apply_env_overrides(env);
        config.validate()?;
        Ok((config, source))
    }

    fn apply_env_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = env("UDELECTRICAL_HOST") {
            self.connection.host = host;
        }
        if let Some(api_key) = env("UDELECTRICAL_API_KEY") {
            self.connection.api_key = api_key;
        }
        if let Some(ssl) = env("UDELECTRICAL_SSL")
            && let Ok(enabled) = ssl.parse::<bool>()
        {
            self.connection.ssl = enabled;
        }
        if let Some(level) = env("UDELECTRICAL_LOG_LEVEL") {
            self.system.log_level = level;
        }
        if let Some(secs) = env("UDELECTRICAL_SETUP_RETRY_SECS")
            && let Ok(secs) = secs.parse::<u64>()
        {
            self.system.setup_retry_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection.host.trim().is_empty() {
            anyhow::bail!(
                "connection.host cannot be empty (set it in the config file or UDELECTRICAL_HOST)"
            );
        }
        if self.connection.api_key.is_empty() {
            anyhow::bail!(
                "connection.api_key cannot be empty (set it in the config file or UDELECTRICAL_API_KEY)"
            );
        }
        if self.system.setup_retry_secs == 0 {
            anyhow::bail!("system.setup_retry_secs must be greater than zero");
        }
        Ok(())
    }
}
