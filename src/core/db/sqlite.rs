/// SQLite Connection Module
///
/// The bundled `DbHandle` implementation, backed by a single `rusqlite`
/// connection.
use super::handle::{DbHandle, Row, Value};
use crate::core::{Result, StoreError};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            // vCards and identifiers are stored as text; blobs are read lossily
            ValueRef::Blob(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

/// A `DbHandle` over one SQLite connection.
#[derive(Debug)]
pub struct SqliteHandle {
    connection: Connection,
}

impl SqliteHandle {
    /// Opens (creating if needed) the SQLite database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the file cannot be opened or the
    /// connection pragmas cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening SQLite database at {:?}", path);
        let connection = Connection::open(path).map_err(|e| {
            error!("Failed to open SQLite database {:?}: {}", path, e);
            StoreError::Database(e)
        })?;
        Self::from_connection(connection)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an already opened connection.
    pub fn from_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        connection.busy_timeout(Duration::from_secs(5))?;
        Ok(SqliteHandle { connection })
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl DbHandle for SqliteHandle {
    fn provider(&self) -> &str {
        "sqlite"
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut stmt = self.connection.prepare(sql).map_err(StoreError::query)?;
        if stmt.column_count() == 0 {
            let affected = stmt
                .execute(params_from_iter(params.iter()))
                .map_err(StoreError::query)?;
            return Ok(affected as u64);
        }

        // Row-returning statements (SELECT, some PRAGMAs) are stepped to completion
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(StoreError::query)?;
        while rows.next().map_err(StoreError::query)?.is_some() {}
        Ok(0)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut stmt = self.connection.prepare(sql).map_err(StoreError::query)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut values = Row::new();
                for (i, name) in columns.iter().enumerate() {
                    values.insert(name.clone(), Value::from(row.get_ref(i)?));
                }
                Ok(values)
            })
            .map_err(StoreError::query)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::query)?;

        Ok(rows)
    }

    fn last_insert_id(&mut self, _table: &str) -> Result<Option<String>> {
        match self.connection.last_insert_rowid() {
            0 => Ok(None),
            id => Ok(Some(id.to_string())),
        }
    }

    fn begin(&mut self) -> Result<()> {
        self.connection
            .execute_batch("BEGIN")
            .map_err(StoreError::query)
    }

    fn commit(&mut self) -> Result<()> {
        self.connection
            .execute_batch("COMMIT")
            .map_err(StoreError::query)
    }

    fn rollback(&mut self) -> Result<()> {
        self.connection
            .execute_batch("ROLLBACK")
            .map_err(StoreError::query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_table(handle: &mut SqliteHandle) {
        handle
            .connection()
            .execute_batch(
                "
                CREATE TABLE test (
                    id INTEGER PRIMARY KEY,
                    name TEXT,
                    value REAL
                );
                INSERT INTO test (name, value) VALUES ('Alice', 123.5);
                INSERT INTO test (name, value) VALUES (NULL, NULL);
            ",
            )
            .unwrap();
    }

    #[test]
    fn test_query_returns_named_columns() {
        let mut handle = SqliteHandle::open_in_memory().unwrap();
        setup_test_table(&mut handle);

        let rows = handle.query("SELECT * FROM test ORDER BY id", &[]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], Value::Integer(1));
        assert_eq!(rows[0]["name"], Value::Text("Alice".to_string()));
        assert_eq!(rows[0]["value"], Value::Real(123.5));
        assert_eq!(rows[1]["name"], Value::Null);
    }

    #[test]
    fn test_execute_binds_parameters() {
        let mut handle = SqliteHandle::open_in_memory().unwrap();
        setup_test_table(&mut handle);

        let affected = handle
            .execute(
                "UPDATE test SET name = ? WHERE id = ?",
                &[Value::from("Bob"), Value::from(2_i64)],
            )
            .unwrap();
        assert_eq!(affected, 1);

        let rows = handle
            .query("SELECT name FROM test WHERE id = ?", &[Value::from(2_i64)])
            .unwrap();
        assert_eq!(rows[0]["name"], Value::from("Bob"));
    }

    #[test]
    fn test_execute_accepts_row_returning_statements() {
        let mut handle = SqliteHandle::open_in_memory().unwrap();
        setup_test_table(&mut handle);

        assert_eq!(handle.execute("SELECT count(*) FROM test", &[]).unwrap(), 0);
        handle.execute("PRAGMA user_version = 7", &[]).unwrap();
        handle.execute("PRAGMA user_version", &[]).unwrap();

        let rows = handle.query("PRAGMA user_version", &[]).unwrap();
        assert_eq!(rows[0]["user_version"], Value::Integer(7));
    }

    #[test]
    fn test_errors_carry_engine_text() {
        let mut handle = SqliteHandle::open_in_memory().unwrap();
        match handle.query("SELECT * FROM nonexistent_table", &[]) {
            Err(StoreError::Query(msg)) => assert!(msg.contains("no such table")),
            other => panic!("Expected Query error, got {:?}", other),
        }
    }

    #[test]
    fn test_last_insert_id() {
        let mut handle = SqliteHandle::open_in_memory().unwrap();
        setup_test_table(&mut handle);
        handle
            .execute("INSERT INTO test (name) VALUES (?)", &[Value::from("Carol")])
            .unwrap();
        assert_eq!(handle.last_insert_id("test").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_transaction_rollback_discards_changes() {
        let mut handle = SqliteHandle::open_in_memory().unwrap();
        setup_test_table(&mut handle);

        handle.begin().unwrap();
        handle.execute("DELETE FROM test", &[]).unwrap();
        handle.rollback().unwrap();

        let rows = handle.query("SELECT id FROM test", &[]).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_open_invalid_path_fails() {
        let result = SqliteHandle::open("/nonexistent/path/database.db");
        match result {
            Err(StoreError::Database(_)) => {}
            other => panic!("Expected Database error, got {:?}", other),
        }
    }
}
