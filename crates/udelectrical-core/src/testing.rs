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

//! In-process usage source for coordinator and reading tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use udelectrical_api::ApiResult;

use crate::source::UsageSource;

#[derive(Debug)]
pub(crate) struct FakeSource {
    monthly: Mutex<ApiResult<Value>>,
    daily: Mutex<ApiResult<Value>>,
    latest: Mutex<ApiResult<Value>>,
    delay: Option<Duration>,
    hang: bool,
    calls: AtomicUsize,
    monthly_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requested_month: Mutex<Option<String>>,
    requested_days: Mutex<Option<(String, String)>>,
}

impl FakeSource {
    pub(crate) fn new(monthly: Value, daily: Value, latest: Value) -> Self {
        Self {
            monthly: Mutex::new(Ok(monthly)),
            daily: Mutex::new(Ok(daily)),
            latest: Mutex::new(Ok(latest)),
            delay: None,
            hang: false,
            calls: AtomicUsize::new(0),
            monthly_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requested_month: Mutex::new(None),
            requested_days: Mutex::new(None),
        }
    }

    /// Month 1.2/0.9/100, days 1.1 then 1.3, latest marker set
    pub(crate) fn scenario() -> Self {
        Self::new(
            json!([{"unit_price": 1.2, "actual_price": 0.9, "consumption": 100}]),
            json!([
                {"unit_price": 1.1, "actual_price": 0.8, "consumption": 3.5},
                {"unit_price": 1.3, "actual_price": 1.0, "consumption": 4.25}
            ]),
            json!("2024-05-01T10:00:00Z"),
        )
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every fetch stays pending forever
    pub(crate) fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub(crate) fn set_monthly(&self, response: ApiResult<Value>) {
        *self.monthly.lock() = response;
    }

    pub(crate) fn set_daily(&self, response: ApiResult<Value>) {
        *self.daily.lock() = response;
    }

    pub(crate) fn set_latest(&self, response: ApiResult<Value>) {
        *self.latest.lock() = response;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn monthly_calls(&self) -> usize {
        self.monthly_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn requested_month(&self) -> Option<String> {
        self.requested_month.lock().clone()
    }

    pub(crate) fn requested_days(&self) -> Option<(String, String)> {
        self.requested_days.lock().clone()
    }

    async fn respond(&self, slot: &Mutex<ApiResult<Value>>) -> ApiResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        slot.lock().clone()
    }
}

#[async_trait]
impl UsageSource for FakeSource {
    async fn monthly(&self, month: &str) -> ApiResult<Value> {
        self.monthly_calls.fetch_add(1, Ordering::SeqCst);
        *self.requested_month.lock() = Some(month.to_owned());
        self.respond(&self.monthly).await
    }

    async fn daily(&self, start_date: &str, end_date: &str) -> ApiResult<Value> {
        *self.requested_days.lock() = Some((start_date.to_owned(), end_date.to_owned()));
        self.respond(&self.daily).await
    }

    async fn latest(&self) -> ApiResult<Value> {
        self.respond(&self.latest).await
    }

    fn name(&self) -> &str {
        "fake"
    }
}
