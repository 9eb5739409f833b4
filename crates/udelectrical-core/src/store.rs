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

//! Last-known reading values across restarts.
//!
//! The host owns the actual persistence; readings only load once at setup and
//! save whenever their value changes.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("reading store backend error: {0}")]
    Backend(String),
}

/// Key-value collaborator holding the last state of each reading
pub trait ReadingStore: Send + Sync {
    /// Last saved state for `key`, if any. The value is returned as stored;
    /// callers decide whether it is usable.
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn save(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Process-local store, used when the host provides no persistence
#[derive(Debug, Default)]
pub struct MemoryReadingStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with previous states
    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            values: Mutex::new(values.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl ReadingStore for MemoryReadingStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_owned(), value);
        Ok(())
    }
}
