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

//! UDElectrical usage polling: snapshot cache, readings and connection setup

pub mod coordinator;
pub mod entry;
pub mod flow;
pub mod reading;
pub mod registry;
pub mod setup;
pub mod snapshot;
pub mod source;
pub mod store;

#[cfg(test)]
mod testing;

pub use coordinator::{
    CoordinatorEvent, Listener, ListenerId, UPDATE_INTERVAL, UpdateFailure, UsageCoordinator,
};
pub use entry::{ConnectionConfig, ConnectionEntry};
pub use flow::{FlowError, FlowResult, reauthenticate, validate_user_input};
pub use reading::{Reading, ReadingDescription, ReadingKind, project, to_number};
pub use registry::{CoordinatorRegistry, RegisteredConnection};
pub use setup::{Connection, SetupError, SetupResult, setup_entry, unload_entry};
pub use snapshot::{CycleKeys, Record, Snapshot};
pub use source::UsageSource;
pub use store::{MemoryReadingStore, ReadingStore, StoreError};
