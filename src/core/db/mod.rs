/// Database Module
///
/// This module provides the database access layer of the contacts store,
/// organized into focused submodules:
///
/// - **Connection Handles** (`handle.rs`, `sqlite.rs`, `recording.rs`): the
///   `DbHandle` seam and its implementations
/// - **Connection Management** (`connection.rs`): the `Database` type and its
///   transaction lifecycle
/// - **Conditions** (`condition.rs`): structured filters compiled to WHERE clauses
/// - **Query Execution** (`query.rs`): insert, update, get, lookup and delete
/// - **Address Objects** (`address.rs`): contact and group store operations
///
/// ## Error Handling
///
/// All database operations use the `StoreError` type for consistent error propagation.
pub mod address;
pub mod condition;
pub mod connection;
pub mod handle;
pub mod query;
pub mod recording;
pub mod sqlite;

pub use address::{aggregate_email, CardRef, SaveData, SaveValue};
pub use condition::{Condition, ConditionValue, Conditions};
pub use connection::{AccessMode, Database, TransactionState};
pub use handle::{DbHandle, Row, Value};
pub use recording::{RecordedStatement, RecordingHandle};
pub use sqlite::SqliteHandle;
