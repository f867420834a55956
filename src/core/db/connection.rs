/// Connection Management Module
///
/// This module provides the `Database` type, which owns the single connection
/// handle of one persistence-layer instance, and its transaction lifecycle.
use super::handle::DbHandle;
use crate::core::backend::{
    dialect_for, Backend, Dialect, READONLY_ISOLATION, READWRITE_ISOLATION,
};
use crate::core::{Result, StoreError};
use tracing::{debug, error, info, warn};

/// Access mode of an active transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    fn isolation_level(self) -> &'static str {
        match self {
            AccessMode::ReadOnly => READONLY_ISOLATION,
            AccessMode::ReadWrite => READWRITE_ISOLATION,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "READ ONLY",
            AccessMode::ReadWrite => "READ WRITE",
        }
    }
}

/// Represents database transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No active transaction (autocommit mode)
    #[default]
    Idle,
    /// Transaction in progress
    Active(AccessMode),
}

/// Access to the contacts database through one connection.
///
/// All statements of one logical transaction must be issued through the same
/// `Database` instance.
#[derive(Debug)]
pub struct Database<H: DbHandle> {
    pub(crate) handle: H,
    table_prefix: String,
    state: TransactionState,
}

impl<H: DbHandle> Database<H> {
    /// Creates a database over `handle` with no table prefix.
    pub fn new(handle: H) -> Self {
        Database {
            handle,
            table_prefix: String::new(),
            state: TransactionState::Idle,
        }
    }

    /// Sets the prefix prepended to every physical table name.
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Adopts a transaction already opened on `handle` by another instance.
    pub(crate) fn with_transaction_state(mut self, state: TransactionState) -> Self {
        self.state = state;
        self
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    /// The lower-level connection handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut H {
        &mut self.handle
    }

    pub fn into_handle(self) -> H {
        self.handle
    }

    /// The backend reported by the handle, if it is a supported one.
    pub fn backend(&self) -> Option<Backend> {
        Backend::from_provider(self.handle.provider())
    }

    pub fn dialect(&self) -> Dialect {
        dialect_for(self.handle.provider())
    }

    /// Physical, unquoted name of a logical table.
    pub fn raw_table_name(&self, table: &str) -> String {
        format!("{}carddav_{}", self.table_prefix, table)
    }

    /// Physical, quoted name of a logical table.
    pub fn table_name(&self, table: &str) -> String {
        self.dialect().quote_identifier(&self.raw_table_name(table))
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.state
    }

    pub fn in_transaction(&self) -> bool {
        self.state != TransactionState::Idle
    }

    /// Starts a transaction on the connection.
    ///
    /// Read-only transactions run at `REPEATABLE READ`, read-write ones at
    /// `SERIALIZABLE`. On an unsupported backend the failure is logged and no
    /// transaction is started.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NestedTransaction` if a transaction is already
    /// active, `StoreError::Query` if the isolation statement or `BEGIN` fails.
    pub fn start_transaction(&mut self, readonly: bool) -> Result<()> {
        if self.in_transaction() {
            return Err(StoreError::NestedTransaction);
        }

        let Some(backend) = self.backend() else {
            error!(
                "FATAL: Unsupported database backend: {}",
                self.handle.provider()
            );
            return Ok(());
        };

        let mode = if readonly {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWrite
        };

        let caps = backend.capabilities();
        if let Some(sql) = caps.isolation_syntax.statement(mode.isolation_level(), mode.sql()) {
            if let Err(e) = self.handle.execute(&sql, &[]) {
                error!("Database::start_transaction ERROR: {}", e);
                return Err(e);
            }
        }

        if let Err(e) = self.handle.begin() {
            error!("Database::start_transaction ERROR: {}", e);
            // the session characteristics were already changed
            self.reset_transaction_settings();
            return Err(e);
        }

        debug!("Started {:?} transaction on {}", mode, backend);
        self.state = TransactionState::Active(mode);
        Ok(())
    }

    /// Commits the active transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoActiveTransaction` if no transaction is active
    /// and `StoreError::Query` if the commit fails. A failed commit leaves the
    /// transaction active, to be ended with [`Database::rollback_transaction`].
    pub fn end_transaction(&mut self) -> Result<()> {
        if !self.in_transaction() {
            return Err(StoreError::NoActiveTransaction);
        }

        if let Err(e) = self.handle.commit() {
            error!("Database::end_transaction ERROR: {}", e);
            return Err(e);
        }

        self.reset_transaction_settings();
        self.state = TransactionState::Idle;
        Ok(())
    }

    /// Rolls back the active transaction.
    ///
    /// Without an active transaction this only logs a notice, so cleanup paths
    /// may call it unconditionally after any failure.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Query` if the rollback statement fails. The state
    /// is `Idle` afterwards either way.
    pub fn rollback_transaction(&mut self) -> Result<()> {
        if !self.in_transaction() {
            info!("Ignored request to rollback a transaction while not within a transaction");
            return Ok(());
        }
        self.state = TransactionState::Idle;

        if let Err(e) = self.handle.rollback() {
            error!("Database::rollback_transaction ERROR: {}", e);
            return Err(e);
        }

        self.reset_transaction_settings();
        Ok(())
    }

    /// Restores the defaults for autocommit statements on backends whose
    /// isolation statement applies to the whole session.
    fn reset_transaction_settings(&mut self) {
        let resets = self
            .backend()
            .map(|b| b.capabilities().resets_session_on_commit)
            .unwrap_or(false);
        if !resets {
            return;
        }

        let sql = format!(
            "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL {}, {}",
            READONLY_ISOLATION,
            AccessMode::ReadWrite.sql()
        );
        if let Err(e) = self.handle.execute(&sql, &[]) {
            warn!("Database::reset_transaction_settings ERROR: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::recording::RecordingHandle;
    use crate::core::db::sqlite::SqliteHandle;

    #[test]
    fn test_transaction_state_management() {
        let mut db = Database::new(SqliteHandle::open_in_memory().unwrap());
        assert_eq!(db.transaction_state(), TransactionState::Idle);

        db.start_transaction(true).unwrap();
        assert_eq!(
            db.transaction_state(),
            TransactionState::Active(AccessMode::ReadOnly)
        );

        // Try to start another transaction - should fail and keep the state
        assert!(matches!(
            db.start_transaction(false),
            Err(StoreError::NestedTransaction)
        ));
        assert_eq!(
            db.transaction_state(),
            TransactionState::Active(AccessMode::ReadOnly)
        );

        db.end_transaction().unwrap();
        assert_eq!(db.transaction_state(), TransactionState::Idle);

        // Try to commit without transaction - should fail
        assert!(matches!(
            db.end_transaction(),
            Err(StoreError::NoActiveTransaction)
        ));
    }

    #[test]
    fn test_failed_commit_keeps_transaction_open() {
        let mut db = Database::new(SqliteHandle::open_in_memory().unwrap());
        db.handle()
            .connection()
            .execute_batch(
                "CREATE TABLE parent (id INTEGER PRIMARY KEY);
                 CREATE TABLE child (
                     id INTEGER PRIMARY KEY,
                     parent_id INTEGER REFERENCES parent (id) DEFERRABLE INITIALLY DEFERRED
                 );",
            )
            .unwrap();

        db.start_transaction(false).unwrap();
        db.handle
            .execute("INSERT INTO child (parent_id) VALUES (99)", &[])
            .unwrap();

        assert!(matches!(db.end_transaction(), Err(StoreError::Query(_))));
        assert_eq!(
            db.transaction_state(),
            TransactionState::Active(AccessMode::ReadWrite)
        );
        assert!(!db.handle().connection().is_autocommit());

        db.rollback_transaction().unwrap();
        assert!(db.handle().connection().is_autocommit());
        db.start_transaction(false).unwrap();
        db.end_transaction().unwrap();
    }

    #[test]
    fn test_failed_begin_resets_session() {
        let mut db = Database::new(RecordingHandle::new("postgres").fail_on("BEGIN"));
        assert!(matches!(db.start_transaction(true), Err(StoreError::Query(_))));
        assert_eq!(db.transaction_state(), TransactionState::Idle);
        assert_eq!(
            db.handle().sql_log(),
            vec![
                "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY",
                "BEGIN",
                "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ WRITE",
            ]
        );
    }

    #[test]
    fn test_rollback_while_idle_is_noop() {
        let mut db = Database::new(RecordingHandle::new("postgres"));
        db.rollback_transaction().unwrap();
        assert!(db.handle().statements().is_empty());
    }

    #[test]
    fn test_table_names() {
        let db = Database::new(RecordingHandle::new("mysql")).with_table_prefix("rc_");
        assert_eq!(db.raw_table_name("contacts"), "rc_carddav_contacts");
        assert_eq!(db.table_name("contacts"), "`rc_carddav_contacts`");

        let db = Database::new(RecordingHandle::new("sqlite"));
        assert_eq!(db.table_name("group_user"), "\"carddav_group_user\"");
    }

    #[test]
    fn test_unsupported_backend_does_not_start() {
        let mut db = Database::new(RecordingHandle::new("oracle"));
        db.start_transaction(false).unwrap();
        assert_eq!(db.transaction_state(), TransactionState::Idle);
        assert!(db.handle().statements().is_empty());
    }
}
