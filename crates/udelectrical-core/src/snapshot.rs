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

//! Usage snapshot produced by one poll cycle.
//!
//! Values are kept exactly as the upstream sent them; numeric interpretation
//! happens in the reading projector so that schema drift never fails a cycle.

use chrono::{Duration, NaiveDate};
use serde_json::{Map, Value};

pub type Record = Map<String, Value>;

/// Immutable merge of the monthly, daily and latest responses
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Fields of the first monthly record (unit_price, actual_price, consumption, ...)
    pub month: Record,
    /// Current day record; present only together with `yesterday`
    pub today: Option<Record>,
    /// Previous day record; present only together with `today`
    pub yesterday: Option<Record>,
    /// Opaque marker from the latest consumption endpoint
    pub last_updated: Option<Value>,
}

impl Snapshot {
    /// Merge the three responses of a cycle.
    ///
    /// Returns `None` ("no data") unless `monthly` is a non-empty array whose
    /// first element is an object. Day records are taken only as a pair, in
    /// upstream order: index 0 is yesterday, index 1 is today.
    pub fn from_responses(monthly: &Value, daily: &Value, latest: &Value) -> Option<Self> {
        let month = monthly.as_array()?.first()?.as_object()?.clone();

        let (yesterday, today) = match daily.as_array().map(Vec::as_slice) {
            Some([Value::Object(yesterday), Value::Object(today), ..]) => {
                (Some(yesterday.clone()), Some(today.clone()))
            }
            _ => (None, None),
        };

        let last_updated = is_truthy(latest).then(|| latest.clone());

        Some(Self {
            month,
            today,
            yesterday,
            last_updated,
        })
    }

    /// Raw root field of the monthly record
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.month.get(key)
    }

    pub fn unit_price(&self) -> Option<&Value> {
        self.field("unit_price")
    }

    pub fn actual_price(&self) -> Option<&Value> {
        self.field("actual_price")
    }

    pub fn consumption(&self) -> Option<&Value> {
        self.field("consumption")
    }

    /// Raw `(yesterday, today)` values of `key` when both day records exist
    pub fn day_values(&self, key: &str) -> Option<(Option<&Value>, Option<&Value>)> {
        match (&self.yesterday, &self.today) {
            (Some(yesterday), Some(today)) => Some((yesterday.get(key), today.get(key))),
            _ => None,
        }
    }
}

/// Month and day keys used by one refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleKeys {
    /// `YYYY-MM`
    pub month: String,
    /// `YYYY-MM-DD` of the previous calendar day
    pub yesterday: String,
    /// `YYYY-MM-DD` of the current calendar day
    pub today: String,
}

impl CycleKeys {
    pub fn for_date(today: NaiveDate) -> Self {
        let yesterday = today - Duration::days(1);
        Self {
            month: today.format("%Y-%m").to_string(),
            yesterday: yesterday.format("%Y-%m-%d").to_string(),
            today: today.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Truthiness of an upstream marker: null, false, zero and empty values are absent
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
