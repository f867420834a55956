/// Connection Handle Module
///
/// Defines the seam between the persistence layer and the concrete database
/// connection. The host application owns the connection and hands it over as
/// a `DbHandle`; everything above this trait is backend-neutral except for the
/// decisions read from the capability table.
use crate::core::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A scalar value as bound to statements or read back from rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the text content, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A result row keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// The single connection owned by a `Database` instance.
///
/// SQL text handed to a handle uses `?` positional placeholders, bound in order
/// from `params`. Errors are reported as `StoreError::Query` carrying the
/// engine's message.
pub trait DbHandle {
    /// Provider identifier of the underlying engine (`mysql`, `sqlite`, `postgres`).
    fn provider(&self) -> &str;

    /// Executes a statement and returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Runs a query and collects all result rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Returns the identifier generated by the last insert into `table`.
    ///
    /// `table` is the unquoted physical table name, for engines that need it
    /// to locate the sequence.
    fn last_insert_id(&mut self, table: &str) -> Result<Option<String>>;

    fn begin(&mut self) -> Result<()> {
        self.execute("BEGIN", &[]).map(|_| ())
    }

    fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT", &[]).map(|_| ())
    }

    fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK", &[]).map(|_| ())
    }
}

impl<H: DbHandle + ?Sized> DbHandle for Box<H> {
    fn provider(&self) -> &str {
        (**self).provider()
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn last_insert_id(&mut self, table: &str) -> Result<Option<String>> {
        (**self).last_insert_id(table)
    }

    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<()> {
        (**self).rollback()
    }
}

impl<H: DbHandle + ?Sized> DbHandle for &mut H {
    fn provider(&self) -> &str {
        (**self).provider()
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn last_insert_id(&mut self, table: &str) -> Result<Option<String>> {
        (**self).last_insert_id(table)
    }

    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<()> {
        (**self).rollback()
    }
}
