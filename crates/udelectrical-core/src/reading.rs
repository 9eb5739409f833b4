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

//! Numeric readings projected from the coordinator's snapshot.
//!
//! A reading never fails: missing or malformed upstream fields make it fall
//! back to its last-known value, and that value survives restarts through a
//! [`ReadingStore`].

use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::coordinator::UsageCoordinator;
use crate::snapshot::{Record, Snapshot};
use crate::store::ReadingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingKind {
    UnitPrice,
    ActualPrice,
    Consumption,
    Saved,
}

impl ReadingKind {
    pub const ALL: [Self; 4] = [
        Self::UnitPrice,
        Self::ActualPrice,
        Self::Consumption,
        Self::Saved,
    ];

    pub fn key(self) -> &'static str {
        self.description().key
    }

    pub fn description(self) -> &'static ReadingDescription {
        match self {
            Self::UnitPrice => &UNIT_PRICE,
            Self::ActualPrice => &ACTUAL_PRICE,
            Self::Consumption => &CONSUMPTION,
            Self::Saved => &SAVED,
        }
    }

    /// Whether the reading exposes `today`/`yesterday` attributes
    pub fn has_day_breakdown(self) -> bool {
        match self {
            Self::UnitPrice | Self::ActualPrice | Self::Consumption => true,
            Self::Saved => false,
        }
    }
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Static presentation metadata of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub unit: &'static str,
    pub display_precision: u8,
}

pub const UNIT_PRICE: ReadingDescription = ReadingDescription {
    key: "unit_price",
    name: "Average Units Price",
    icon: "mdi:flash",
    unit: "SEK/kWh",
    display_precision: 3,
};

pub const ACTUAL_PRICE: ReadingDescription = ReadingDescription {
    key: "actual_price",
    name: "Average Actual Price",
    icon: "mdi:flash",
    unit: "SEK/kWh",
    display_precision: 3,
};

pub const CONSUMPTION: ReadingDescription = ReadingDescription {
    key: "consumption",
    name: "Consumption",
    icon: "mdi:flash",
    unit: "kWh",
    display_precision: 2,
};

pub const SAVED: ReadingDescription = ReadingDescription {
    key: "saved",
    name: "Saved",
    icon: "mdi:cash-plus",
    unit: "SEK",
    display_precision: 2,
};

/// Lenient numeric conversion of an upstream value.
///
/// Numbers convert directly and strings are parsed after trimming. Anything
/// else, including booleans and non-finite results, is absent. Strings with
/// `_` digit separators (`"1_000"`) do not parse and are absent too.
pub fn to_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };
    number.filter(|n| n.is_finite())
}

/// Value of `kind` in `snapshot`, if every input it needs converts
pub fn project(kind: ReadingKind, snapshot: &Snapshot) -> Option<f64> {
    match kind {
        ReadingKind::Saved => {
            let unit_price = to_number(snapshot.unit_price())?;
            let actual_price = to_number(snapshot.actual_price())?;
            let consumption = to_number(snapshot.consumption())?;
            Some(unit_price * consumption - actual_price * consumption)
                .filter(|saved| saved.is_finite())
        }
        ReadingKind::UnitPrice | ReadingKind::ActualPrice | ReadingKind::Consumption => {
            to_number(snapshot.field(kind.key()))
        }
    }
}

pub struct Reading {
    kind: ReadingKind,
    unique_id: String,
    device_name: String,
    coordinator: Arc<UsageCoordinator>,
    last_known: Mutex<Option<f64>>,
    store: Option<Arc<dyn ReadingStore>>,
}

impl fmt::Debug for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reading")
            .field("unique_id", &self.unique_id)
            .field("device_name", &self.device_name)
            .field("last_known", &*self.last_known.lock())
            .field("has_store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl Reading {
    pub fn new(
        entry_id: &str,
        device_name: impl Into<String>,
        kind: ReadingKind,
        coordinator: Arc<UsageCoordinator>,
    ) -> Self {
        Self {
            kind,
            unique_id: format!("{entry_id}_{}", kind.key()),
            device_name: device_name.into(),
            coordinator,
            last_known: Mutex::new(None),
            store: None,
        }
    }

    /// Persist last-known values to `store` whenever they change
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ReadingStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn kind(&self) -> ReadingKind {
        self.kind
    }

    pub fn description(&self) -> &'static ReadingDescription {
        self.kind.description()
    }

    /// `{entry_id}_{key}`
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Title of the connection this reading belongs to
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// True while the coordinator's last cycle failed
    pub fn is_stale(&self) -> bool {
        !self.coordinator.last_update_success()
    }

    pub fn last_known(&self) -> Option<f64> {
        *self.last_known.lock()
    }

    /// Set the last-known value without writing it back to the store
    pub fn seed(&self, value: f64) {
        *self.last_known.lock() = Some(value);
    }

    /// Seed from the store unless the current snapshot already yields a value.
    ///
    /// Stored states that do not convert to a number are ignored.
    pub fn restore(&self) -> Option<f64> {
        if let Some(value) = self.current_value() {
            return Some(value);
        }
        let store = self.store.as_ref()?;

        let stored = match store.load(&self.unique_id) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to load last state of {}: {}", self.unique_id, e);
                return None;
            }
        };

        let value = to_number(stored.as_ref());
        match value {
            Some(value) => {
                debug!("Restored {} = {}", self.unique_id, value);
                self.seed(value);
            }
            None if stored.is_some() => {
                debug!("Ignoring non-numeric stored state for {}", self.unique_id);
            }
            None => {}
        }
        value
    }

    /// Projected value of the cached snapshot, else the last-known value
    pub fn current_value(&self) -> Option<f64> {
        let projected = self
            .coordinator
            .data()
            .and_then(|snapshot| project(self.kind, &snapshot));

        match projected {
            Some(value) => {
                self.remember(value);
                Some(value)
            }
            None => self.last_known(),
        }
    }

    fn remember(&self, value: f64) {
        let changed = {
            let mut last_known = self.last_known.lock();
            let changed = *last_known != Some(value);
            *last_known = Some(value);
            changed
        };

        if changed && let Some(store) = &self.store {
            if let Err(e) = store.save(&self.unique_id, json!(value)) {
                warn!("Failed to save last state of {}: {}", self.unique_id, e);
            }
        }
    }

    /// Attribute map for the current local month
    pub fn attributes(&self) -> Record {
        self.attributes_at(Local::now().date_naive())
    }

    /// Attribute map with `For` labelled after the month of `date`
    pub fn attributes_at(&self, date: NaiveDate) -> Record {
        let mut attributes = Record::new();
        attributes.insert(
            "For".to_owned(),
            Value::String(date.format("%B, %Y").to_string()),
        );

        let Some(snapshot) = self.coordinator.data() else {
            return attributes;
        };

        if let Some(last_updated) = &snapshot.last_updated {
            attributes.insert("data_last_updated".to_owned(), last_updated.clone());
        }

        if self.kind.has_day_breakdown()
            && let Some((yesterday, today)) = snapshot.day_values(self.kind.key())
        {
            for (name, value) in [("yesterday", yesterday), ("today", today)] {
                if let Some(value) = value.filter(|v| !v.is_null()) {
                    attributes.insert(name.to_owned(), value.clone());
                }
            }
        }

        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::UsageSource;
    use crate::store::MemoryReadingStore;
    use crate::testing::FakeSource;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn setup(source: FakeSource) -> (Arc<FakeSource>, Arc<UsageCoordinator>) {
        let source = Arc::new(source);
        let coordinator = Arc::new(UsageCoordinator::new(
            "test",
            Arc::clone(&source) as Arc<dyn UsageSource>,
        ));
        (source, coordinator)
    }

    fn reading(kind: ReadingKind, coordinator: &Arc<UsageCoordinator>) -> Reading {
        Reading::new("entry", "meter.local", kind, Arc::clone(coordinator))
    }

    #[test]
    fn test_numeric_conversion() {
        assert_eq!(to_number(Some(&json!("12.5"))), Some(12.5));
        assert_eq!(to_number(Some(&json!("  7 "))), Some(7.0));
        assert_eq!(to_number(Some(&json!(3))), Some(3.0));
        assert_eq!(to_number(Some(&json!(0))), Some(0.0));
        assert_eq!(to_number(Some(&json!("n/a"))), None);
        assert_eq!(to_number(Some(&json!(null))), None);
        assert_eq!(to_number(Some(&json!(true))), None);
        assert_eq!(to_number(Some(&json!([1]))), None);
        assert_eq!(to_number(Some(&json!({"v": 1}))), None);
        assert_eq!(to_number(Some(&json!("NaN"))), None);
        assert_eq!(to_number(Some(&json!("1_000"))), None);
        assert_eq!(to_number(None), None);
    }

    #[test]
    fn test_metadata_table() {
        let keys: Vec<_> = ReadingKind::ALL.iter().map(|k| k.key()).collect();
        assert_eq!(keys, ["unit_price", "actual_price", "consumption", "saved"]);
        assert_eq!(ReadingKind::Saved.description().icon, "mdi:cash-plus");
        assert_eq!(ReadingKind::UnitPrice.description().display_precision, 3);
        assert_eq!(ReadingKind::Consumption.description().unit, "kWh");
    }

    #[tokio::test]
    async fn test_end_to_end_values() {
        let (_, coordinator) = setup(FakeSource::scenario());
        coordinator.refresh_for(date()).await.unwrap();

        let values: Vec<_> = ReadingKind::ALL
            .iter()
            .map(|kind| reading(*kind, &coordinator).current_value())
            .collect();

        assert_eq!(values[0], Some(1.2));
        assert_eq!(values[1], Some(0.9));
        assert_eq!(values[2], Some(100.0));
        let saved = values[3].unwrap();
        assert!((saved - 30.0).abs() < 1e-9, "saved was {saved}");
    }

    #[tokio::test]
    async fn test_saved_accepts_numeric_strings() {
        let source = FakeSource::scenario();
        source.set_monthly(Ok(json!([
            {"unit_price": " 2 ", "actual_price": "1.5", "consumption": 10}
        ])));
        let (_, coordinator) = setup(source);
        coordinator.refresh_for(date()).await.unwrap();

        let saved = reading(ReadingKind::Saved, &coordinator);
        assert_eq!(saved.current_value(), Some(5.0));
    }

    #[tokio::test]
    async fn test_saved_falls_back_when_an_input_is_invalid() {
        let (source, coordinator) = setup(FakeSource::scenario());
        coordinator.refresh_for(date()).await.unwrap();
        let saved = reading(ReadingKind::Saved, &coordinator);
        let first = saved.current_value().unwrap();

        source.set_monthly(Ok(json!([
            {"unit_price": 1.2, "actual_price": "n/a", "consumption": 100}
        ])));
        coordinator.refresh_for(date()).await.unwrap();

        assert_eq!(saved.current_value(), Some(first));
    }

    #[tokio::test]
    async fn test_empty_month_falls_back_to_last_known() {
        let (source, coordinator) = setup(FakeSource::scenario());
        let never_seen = reading(ReadingKind::UnitPrice, &coordinator);

        coordinator.refresh_for(date()).await.unwrap();
        let consumption = reading(ReadingKind::Consumption, &coordinator);
        assert_eq!(consumption.current_value(), Some(100.0));

        source.set_monthly(Ok(json!([])));
        coordinator.refresh_for(date()).await.unwrap();

        assert!(coordinator.data().is_none());
        assert_eq!(consumption.current_value(), Some(100.0));
        assert_eq!(never_seen.current_value(), None);
    }

    #[tokio::test]
    async fn test_stale_flag_follows_coordinator() {
        let (source, coordinator) = setup(FakeSource::scenario());
        let unit_price = reading(ReadingKind::UnitPrice, &coordinator);
        coordinator.refresh_for(date()).await.unwrap();
        assert!(!unit_price.is_stale());

        source.set_latest(Err(udelectrical_api::ApiError::CannotConnect(
            "down".to_owned(),
        )));
        let _ = coordinator.refresh_for(date()).await;

        assert!(unit_price.is_stale());
        assert_eq!(unit_price.current_value(), Some(1.2));
    }

    #[tokio::test]
    async fn test_attributes_with_day_breakdown() {
        let source = FakeSource::scenario();
        source.set_daily(Ok(json!([
            {"unit_price": 1.1, "consumption": null},
            {"unit_price": 1.3}
        ])));
        let (_, coordinator) = setup(source);
        coordinator.refresh_for(date()).await.unwrap();

        let unit_price = reading(ReadingKind::UnitPrice, &coordinator).attributes_at(date());
        assert_eq!(unit_price["For"], json!("May, 2024"));
        assert_eq!(unit_price["data_last_updated"], json!("2024-05-01T10:00:00Z"));
        assert_eq!(unit_price["yesterday"], json!(1.1));
        assert_eq!(unit_price["today"], json!(1.3));

        let consumption = reading(ReadingKind::Consumption, &coordinator).attributes_at(date());
        assert!(!consumption.contains_key("yesterday"));
        assert!(!consumption.contains_key("today"));

        let saved = reading(ReadingKind::Saved, &coordinator).attributes_at(date());
        assert!(!saved.contains_key("today"));
        assert!(saved.contains_key("data_last_updated"));
    }

    #[test]
    fn test_attributes_without_snapshot() {
        let (_, coordinator) = setup(FakeSource::scenario());
        let attributes = reading(ReadingKind::ActualPrice, &coordinator).attributes_at(date());

        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes["For"], json!("May, 2024"));
    }

    #[test]
    fn test_restore_ignores_non_numeric_state() {
        let (_, coordinator) = setup(FakeSource::scenario());
        let store = Arc::new(MemoryReadingStore::with_values([
            ("entry_unit_price", json!("unknown")),
            ("entry_consumption", json!("42.5")),
        ]));

        let unit_price =
            reading(ReadingKind::UnitPrice, &coordinator).with_store(store.clone());
        let consumption =
            reading(ReadingKind::Consumption, &coordinator).with_store(store.clone());

        assert_eq!(unit_price.restore(), None);
        assert_eq!(consumption.restore(), Some(42.5));
        assert_eq!(consumption.current_value(), Some(42.5));
    }

    #[tokio::test]
    async fn test_changed_values_are_saved() {
        let (source, coordinator) = setup(FakeSource::scenario());
        let store = Arc::new(MemoryReadingStore::new());
        let consumption = reading(ReadingKind::Consumption, &coordinator)
            .with_store(store.clone() as Arc<dyn ReadingStore>);
        assert_eq!(consumption.unique_id(), "entry_consumption");

        coordinator.refresh_for(date()).await.unwrap();
        consumption.current_value();
        assert_eq!(store.get("entry_consumption"), Some(json!(100.0)));

        source.set_monthly(Ok(json!([
            {"unit_price": 1.2, "actual_price": 0.9, "consumption": 120}
        ])));
        coordinator.refresh_for(date()).await.unwrap();
        consumption.current_value();
        assert_eq!(store.get("entry_consumption"), Some(json!(120.0)));
    }

    #[tokio::test]
    async fn test_overflowing_saved_keeps_last_known_value() {
        let (source, coordinator) = setup(FakeSource::scenario());
        let store = Arc::new(MemoryReadingStore::new());
        let saved = reading(ReadingKind::Saved, &coordinator)
            .with_store(store.clone() as Arc<dyn ReadingStore>);
        coordinator.refresh_for(date()).await.unwrap();
        let first = saved.current_value().unwrap();

        source.set_monthly(Ok(json!([
            {"unit_price": 1e308, "actual_price": 1e308, "consumption": 10}
        ])));
        coordinator.refresh_for(date()).await.unwrap();

        assert_eq!(project(ReadingKind::Saved, &coordinator.data().unwrap()), None);
        assert_eq!(saved.current_value(), Some(first));
        assert_eq!(store.get("entry_saved"), Some(json!(first)));

        let restarted = reading(ReadingKind::Saved, &coordinator).with_store(store);
        assert_eq!(restarted.restore(), Some(first));
    }
}
