// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod logging;
pub mod migrations;

pub use crate::core::db::{
    CardRef, ConditionValue, Conditions, Database, DbHandle, Row, SaveData, SaveValue,
    SqliteHandle, Value,
};
pub use crate::core::{Backend, Result, StoreError};
pub use crate::migrations::{AbortReason, MigrationOutcome, MigrationRegistry};
