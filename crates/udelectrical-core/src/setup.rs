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

//! Bringing a configured connection online and tearing it down again

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use udelectrical_api::{ApiError, UdElectricalClient};

use crate::coordinator::{UpdateFailure, UsageCoordinator};
use crate::entry::ConnectionEntry;
use crate::reading::{Reading, ReadingKind};
use crate::registry::{CoordinatorRegistry, RegisteredConnection};
use crate::source::UsageSource;
use crate::store::ReadingStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Credentials were rejected; retrying will not help
    #[error("Authentication failed: {0}")]
    AuthFailed(ApiError),

    /// Upstream unreachable; retry later
    #[error("UDElectrical not ready: {0}")]
    NotReady(ApiError),

    #[error("Invalid connection configuration: {0}")]
    Config(ApiError),
}

impl SetupError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }
}

impl From<ApiError> for SetupError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidAuth(_) => Self::AuthFailed(err),
            ApiError::CannotConnect(_) => Self::NotReady(err),
            ApiError::ConfigError(_) => Self::Config(err),
        }
    }
}

impl From<UpdateFailure> for SetupError {
    fn from(failure: UpdateFailure) -> Self {
        match failure {
            UpdateFailure::Authentication(err) => Self::AuthFailed(err),
            UpdateFailure::Communication(err) => Self::NotReady(err),
        }
    }
}

pub type SetupResult<T> = std::result::Result<T, SetupError>;

/// Live handle of a set-up connection
#[derive(Debug)]
pub struct Connection {
    pub entry: ConnectionEntry,
    pub client: Arc<UdElectricalClient>,
    pub coordinator: Arc<UsageCoordinator>,
    pub readings: Vec<Arc<Reading>>,
}

impl Connection {
    pub fn reading(&self, kind: ReadingKind) -> Option<&Arc<Reading>> {
        self.readings.iter().find(|reading| reading.kind() == kind)
    }
}

/// Set up `entry`: probe the API, get or create its coordinator and build the
/// four readings seeded from `store`.
///
/// A coordinator already registered for the entry is reused with the entry's
/// API key; only a new one runs its first refresh. A registration whose TLS
/// setting differs from the entry is replaced.
pub async fn setup_entry(
    entry: &ConnectionEntry,
    registry: &CoordinatorRegistry,
    store: Option<Arc<dyn ReadingStore>>,
) -> SetupResult<Connection> {
    let client = entry.config.client()?;
    client.check_status().await.map_err(|e| {
        warn!("⚠️ [{}] Status probe failed: {}", entry.title, e);
        SetupError::from(e)
    })?;

    let existing = registry.get(&entry.entry_id).and_then(|existing| {
        if existing.client.ssl() == entry.config.ssl {
            return Some(existing);
        }
        warn!(
            "⚠️ [{}] TLS setting changed; replacing the registered connection",
            entry.title
        );
        registry.remove(&entry.entry_id);
        None
    });

    let registered = match existing {
        Some(existing) => {
            existing.client.set_api_key(entry.config.api_key.as_str());
            existing
        }
        None => {
            let client = Arc::new(client);
            let coordinator = Arc::new(UsageCoordinator::new(
                entry.title.as_str(),
                Arc::clone(&client) as Arc<dyn UsageSource>,
            ));
            coordinator.first_refresh().await?;
            let (registered, _) = registry.get_or_insert(
                &entry.entry_id,
                RegisteredConnection {
                    client,
                    coordinator,
                },
            );
            registered
        }
    };

    let readings = ReadingKind::ALL
        .iter()
        .map(|kind| {
            let mut reading = Reading::new(
                &entry.entry_id,
                entry.title.as_str(),
                *kind,
                Arc::clone(&registered.coordinator),
            );
            if let Some(store) = &store {
                reading = reading.with_store(Arc::clone(store));
            }
            reading.restore();
            Arc::new(reading)
        })
        .collect();

    info!("✅ [{}] Connection set up", entry.title);

    Ok(Connection {
        entry: entry.clone(),
        client: registered.client,
        coordinator: registered.coordinator,
        readings,
    })
}

/// Drop the entry's coordinator; returns false if it was not registered
pub fn unload_entry(entry_id: &str, registry: &CoordinatorRegistry) -> bool {
    let removed = registry.remove(entry_id).is_some();
    if removed {
        info!("[{}] Connection unloaded", entry_id);
    }
    removed
}
