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

//! Polling coordinator.
//!
//! One coordinator per connected account. Every cycle fans out the monthly,
//! daily and latest requests together, waits for all three to settle, merges
//! them into a fresh [`Snapshot`] and swaps it in. Failed cycles keep the
//! previous snapshot and only publish the failure.

use chrono::{Local, NaiveDate};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use udelectrical_api::ApiError;

use crate::snapshot::{CycleKeys, Snapshot};
use crate::source::UsageSource;

/// Fixed refresh interval
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(20 * 60);

/// Why a refresh cycle did not produce a new snapshot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateFailure {
    #[error("API communication error: {0}")]
    Communication(ApiError),

    #[error("Authentication failed: {0}")]
    Authentication(ApiError),
}

impl UpdateFailure {
    /// True when the stored credentials need to be replaced
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Underlying API error
    pub fn cause(&self) -> &ApiError {
        match self {
            Self::Communication(e) | Self::Authentication(e) => e,
        }
    }
}

impl From<ApiError> for UpdateFailure {
    fn from(err: ApiError) -> Self {
        if err.is_auth() {
            Self::Authentication(err)
        } else {
            Self::Communication(err)
        }
    }
}

/// Published to every listener after each cycle
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// Cycle succeeded; `None` means upstream had no data for this month
    Updated(Option<Arc<Snapshot>>),
    /// Cycle failed; the previous snapshot is still served
    Failed(UpdateFailure),
}

pub type Listener = Arc<dyn Fn(&CoordinatorEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct UsageCoordinator {
    name: String,
    source: Arc<dyn UsageSource>,
    update_interval: Duration,
    data: RwLock<Option<Arc<Snapshot>>>,
    last_update_success: AtomicBool,
    last_failure: RwLock<Option<UpdateFailure>>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
    refresh_requested: Notify,
}

impl std::fmt::Debug for UsageCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageCoordinator")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field("update_interval", &self.update_interval)
            .field("has_data", &self.data.read().is_some())
            .field("last_update_success", &self.last_update_success())
            .field("listeners", &self.listeners.lock().len())
            .finish_non_exhaustive()
    }
}

impl UsageCoordinator {
    pub fn new(name: impl Into<String>, source: Arc<dyn UsageSource>) -> Self {
        Self {
            name: name.into(),
            source,
            update_interval: UPDATE_INTERVAL,
            data: RwLock::new(None),
            last_update_success: AtomicBool::new(true),
            last_failure: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            refresh_requested: Notify::new(),
        }
    }

    /// Override the refresh interval
    #[must_use]
    pub fn with_update_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Latest committed snapshot; `None` before the first success or when
    /// upstream had no data
    pub fn data(&self) -> Option<Arc<Snapshot>> {
        self.data.read().clone()
    }

    /// False while the most recent cycle failed (data is stale)
    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::Acquire)
    }

    pub fn last_failure(&self) -> Option<UpdateFailure> {
        self.last_failure.read().clone()
    }

    /// Register a callback invoked after every cycle
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CoordinatorEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        debug!("[{}] Listener {:?} subscribed", self.name, id);
        id
    }

    /// Remove a callback; returns false if it was not registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Initial refresh at setup; the caller decides what a failure means
    pub async fn first_refresh(&self) -> Result<(), UpdateFailure> {
        info!("[{}] Running first refresh", self.name);
        self.refresh().await
    }

    /// Ask a running [`Self::run`] loop for an immediate cycle
    pub fn request_refresh(&self) {
        debug!("[{}] Manual refresh requested", self.name);
        self.refresh_requested.notify_one();
    }

    /// Run one cycle keyed on today's local date
    pub async fn refresh(&self) -> Result<(), UpdateFailure> {
        self.refresh_for(Local::now().date_naive()).await
    }

    /// Run one cycle keyed on `today`
    pub async fn refresh_for(&self, today: NaiveDate) -> Result<(), UpdateFailure> {
        let keys = CycleKeys::for_date(today);
        debug!(
            "[{}] Fetching month {} and days {}..{}",
            self.name, keys.month, keys.yesterday, keys.today
        );

        let (monthly, daily, latest) = tokio::join!(
            self.source.monthly(&keys.month),
            self.source.daily(&keys.yesterday, &keys.today),
            self.source.latest(),
        );

        let merged = monthly.and_then(|monthly| {
            let daily = daily?;
            let latest = latest?;
            Ok(Snapshot::from_responses(&monthly, &daily, &latest))
        });

        match merged {
            Ok(snapshot) => {
                self.commit(snapshot.map(Arc::new));
                Ok(())
            }
            Err(err) => {
                let failure = UpdateFailure::from(err);
                self.fail(failure.clone());
                Err(failure)
            }
        }
    }

    fn commit(&self, snapshot: Option<Arc<Snapshot>>) {
        if snapshot.is_none() {
            info!("[{}] No usage data available for this month", self.name);
        }
        *self.data.write() = snapshot.clone();
        *self.last_failure.write() = None;
        if !self.last_update_success.swap(true, Ordering::AcqRel) {
            info!("[{}] Fetching usage data recovered", self.name);
        }
        self.publish(&CoordinatorEvent::Updated(snapshot));
    }

    fn fail(&self, failure: UpdateFailure) {
        if self.last_update_success.swap(false, Ordering::AcqRel) {
            warn!("⚠️ [{}] Error fetching usage data: {}", self.name, failure);
        } else {
            debug!("[{}] Still failing: {}", self.name, failure);
        }
        *self.last_failure.write() = Some(failure.clone());
        self.publish(&CoordinatorEvent::Failed(failure));
    }

    fn publish(&self, event: &CoordinatorEvent) {
        // Listeners may subscribe or unsubscribe from inside the callback
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Poll on the update interval until `shutdown` completes.
    ///
    /// The first tick fires one interval from now; setup is expected to have
    /// run [`Self::first_refresh`]. A cycle still in flight at shutdown is
    /// dropped and commits nothing.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.update_interval, self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "[{}] Polling every {}s",
            self.name,
            self.update_interval.as_secs()
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {}
                () = self.refresh_requested.notified() => ticker.reset(),
            }

            tokio::select! {
                () = &mut shutdown => {
                    info!("[{}] Abandoning in-flight refresh", self.name);
                    break;
                }
                // Failures are already published and logged
                _ = self.refresh() => {}
            }
        }

        info!("[{}] Polling stopped", self.name);
    }
}
