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

use thiserror::Error;

/// UDElectrical API error types
///
/// Every failure of a request collapses into one of two kinds: the key was
/// rejected, or the service could not be reached in a usable way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Invalid authentication for the UDElectrical API: {0}")]
    InvalidAuth(String),

    #[error("Cannot connect to the UDElectrical API: {0}")]
    CannotConnect(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// True when the upstream rejected the API key
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::InvalidAuth(_))
    }

    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::CannotConnect("Timeout connecting to API".to_owned())
        } else {
            Self::CannotConnect(err.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
