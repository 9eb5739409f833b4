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

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use udelectrical_api::UdElectricalClient;

use crate::coordinator::UsageCoordinator;

/// Client and coordinator shared by every setup of one connection
#[derive(Debug, Clone)]
pub struct RegisteredConnection {
    pub client: Arc<UdElectricalClient>,
    pub coordinator: Arc<UsageCoordinator>,
}

/// Per-process map of connection entry id to its coordinator
#[derive(Debug, Default)]
pub struct CoordinatorRegistry {
    connections: Mutex<HashMap<String, RegisteredConnection>>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entry_id: &str) -> Option<RegisteredConnection> {
        self.connections.lock().get(entry_id).cloned()
    }

    /// Register `connection` unless the entry already has one.
    ///
    /// Returns the registered connection and whether it was newly inserted.
    pub fn get_or_insert(
        &self,
        entry_id: &str,
        connection: RegisteredConnection,
    ) -> (RegisteredConnection, bool) {
        let mut connections = self.connections.lock();
        if let Some(existing) = connections.get(entry_id) {
            return (existing.clone(), false);
        }
        connections.insert(entry_id.to_owned(), connection.clone());
        (connection, true)
    }

    pub fn remove(&self, entry_id: &str) -> Option<RegisteredConnection> {
        self.connections.lock().remove(entry_id)
    }

    pub fn contains(&self, entry_id: &str) -> bool {
        self.connections.lock().contains_key(entry_id)
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::UsageSource;

    fn connection() -> RegisteredConnection {
        let client = Arc::new(UdElectricalClient::new("meter.local", "key", false).unwrap());
        let coordinator = Arc::new(UsageCoordinator::new(
            "meter.local",
            Arc::clone(&client) as Arc<dyn UsageSource>,
        ));
        RegisteredConnection {
            client,
            coordinator,
        }
    }

    #[test]
    fn test_get_or_insert_keeps_first() {
        let registry = CoordinatorRegistry::new();
        let first = connection();

        let (registered, created) = registry.get_or_insert("entry", first.clone());
        assert!(created);
        assert!(Arc::ptr_eq(&registered.coordinator, &first.coordinator));

        let (registered, created) = registry.get_or_insert("entry", connection());
        assert!(!created);
        assert!(Arc::ptr_eq(&registered.coordinator, &first.coordinator));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let registry = CoordinatorRegistry::new();
        registry.get_or_insert("entry", connection());

        assert!(registry.remove("entry").is_some());
        assert!(registry.remove("entry").is_none());
        assert!(!registry.contains("entry"));
        assert!(registry.is_empty());
    }
}
