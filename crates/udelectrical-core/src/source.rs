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

use async_trait::async_trait;
use serde_json::Value;
use udelectrical_api::{ApiResult, UdElectricalClient};

/// Upstream endpoints a refresh cycle reads from
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Monthly aggregate for a `YYYY-MM` month
    async fn monthly(&self, month: &str) -> ApiResult<Value>;

    /// Daily aggregates for the inclusive `YYYY-MM-DD` range
    async fn daily(&self, start_date: &str, end_date: &str) -> ApiResult<Value>;

    /// Latest single consumption reading
    async fn latest(&self) -> ApiResult<Value>;

    fn name(&self) -> &str;
}

#[async_trait]
impl UsageSource for UdElectricalClient {
    async fn monthly(&self, month: &str) -> ApiResult<Value> {
        self.monthly_statistics(month).await
    }

    async fn daily(&self, start_date: &str, end_date: &str) -> ApiResult<Value> {
        self.daily_statistics(start_date, end_date).await
    }

    async fn latest(&self) -> ApiResult<Value> {
        self.latest_consumption().await
    }

    fn name(&self) -> &str {
        self.host()
    }
}
