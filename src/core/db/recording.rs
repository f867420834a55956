/// Recording Connection Module
///
/// A `DbHandle` that talks to no engine at all. It records every statement it
/// receives, answers queries with canned rows and fails on request, so the
/// backend-specific behaviour of the layer (isolation statements, dialect
/// quoting, migration file selection) can be exercised for any provider.
use super::handle::{DbHandle, Row, Value};
use crate::core::{Result, StoreError};

/// One statement as seen by the handle.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct RecordingHandle {
    provider: String,
    statements: Vec<RecordedStatement>,
    fail_patterns: Vec<String>,
    query_rows: Vec<Row>,
    affected_rows: u64,
    next_id: u64,
}

impl RecordingHandle {
    pub fn new(provider: impl Into<String>) -> Self {
        RecordingHandle {
            provider: provider.into(),
            statements: Vec::new(),
            fail_patterns: Vec::new(),
            query_rows: Vec::new(),
            affected_rows: 0,
            next_id: 1,
        }
    }

    /// Makes every statement containing `pattern` fail.
    pub fn fail_on(mut self, pattern: impl Into<String>) -> Self {
        self.fail_patterns.push(pattern.into());
        self
    }

    /// Rows returned by every subsequent query.
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.query_rows = rows;
        self
    }

    /// Affected-row count reported by every subsequent execute.
    pub fn with_affected_rows(mut self, affected: u64) -> Self {
        self.affected_rows = affected;
        self
    }

    pub fn statements(&self) -> &[RecordedStatement] {
        &self.statements
    }

    /// SQL texts of all recorded statements, in order.
    pub fn sql_log(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.sql.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.statements.clear();
    }

    fn record(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        self.statements.push(RecordedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match self.fail_patterns.iter().find(|p| sql.contains(p.as_str())) {
            Some(pattern) => Err(StoreError::Query(format!(
                "simulated failure on statement matching '{pattern}'"
            ))),
            None => Ok(()),
        }
    }
}

impl DbHandle for RecordingHandle {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql, params)?;
        Ok(self.affected_rows)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.record(sql, params)?;
        Ok(self.query_rows.clone())
    }

    fn last_insert_id(&mut self, _table: &str) -> Result<Option<String>> {
        let id = self.next_id;
        self.next_id += 1;
        Ok(Some(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_statements_in_order() {
        let mut handle = RecordingHandle::new("postgres");
        handle.begin().unwrap();
        handle.execute("DELETE FROM x", &[]).unwrap();
        handle.commit().unwrap();
        assert_eq!(handle.sql_log(), vec!["BEGIN", "DELETE FROM x", "COMMIT"]);
    }

    #[test]
    fn test_fail_on_pattern() {
        let mut handle = RecordingHandle::new("mysql").fail_on("SET TRANSACTION");
        assert!(handle.execute("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE", &[]).is_err());
        assert!(handle.execute("SELECT 1", &[]).is_ok());
        assert_eq!(handle.statements().len(), 2);
    }

    #[test]
    fn test_generated_ids_increase() {
        let mut handle = RecordingHandle::new("sqlite");
        assert_eq!(handle.last_insert_id("t").unwrap().as_deref(), Some("1"));
        assert_eq!(handle.last_insert_id("t").unwrap().as_deref(), Some("2"));
    }
}
