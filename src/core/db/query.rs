/// Query Execution Module
///
/// The generic CRUD operations every collaborator of the persistence layer
/// goes through. Tables are addressed by their logical name (`contacts`,
/// `groups`, `group_user`, ...); filters are `Conditions`.
use super::condition::Conditions;
use super::connection::Database;
use super::handle::{DbHandle, Row, Value};
use crate::core::{Result, StoreError};
use tracing::{debug, error};

/// Tables without a single identifier column.
const TABLES_WITHOUT_ID: &[&str] = &["group_user"];

impl<H: DbHandle> Database<H> {
    /// Stores a new record.
    ///
    /// # Returns
    ///
    /// The generated identifier of the new record, or an empty string for
    /// tables without an identifier column.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` if `columns` is empty or does not
    /// match `values` in length, `StoreError::Query` if the engine rejects the
    /// insert.
    pub fn insert(&mut self, table: &str, columns: &[&str], values: &[Value]) -> Result<String> {
        if columns.is_empty() || columns.len() != values.len() {
            return Err(StoreError::InvalidArgument(format!(
                "insert into {table}: {} columns for {} values",
                columns.len(),
                values.len()
            )));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_name(table),
            self.column_list(columns),
            vec!["?"; columns.len()].join(",")
        );

        if let Err(e) = self.handle.execute(&sql, values) {
            error!("Database::insert ({}) ERROR: {}", sql, e);
            return Err(e);
        }

        let id = if TABLES_WITHOUT_ID.contains(&table) {
            String::new()
        } else {
            let raw_table = self.raw_table_name(table);
            match self.handle.last_insert_id(&raw_table)? {
                Some(id) => id,
                None => {
                    error!("Database::insert ({}) ERROR: no generated id", sql);
                    return Err(StoreError::Query(format!(
                        "insert into {raw_table} did not generate an id"
                    )));
                }
            }
        };

        debug!("INSERT {} ({}) -> {}", table, sql, id);
        Ok(id)
    }

    /// Updates the records matching `conditions`.
    ///
    /// # Returns
    ///
    /// The number of rows the engine reports as modified.
    pub fn update(
        &mut self,
        conditions: impl Into<Conditions>,
        columns: &[&str],
        values: &[Value],
        table: &str,
    ) -> Result<u64> {
        if columns.is_empty() || columns.len() != values.len() {
            return Err(StoreError::InvalidArgument(format!(
                "update of {table}: {} columns for {} values",
                columns.len(),
                values.len()
            )));
        }

        let conditions: Conditions = conditions.into();
        let assignments: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = ?", self.dialect().quote_identifier(c)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}{}",
            self.table_name(table),
            assignments.join(", "),
            conditions.compile(self.dialect())?
        );

        debug!("UPDATE {} ({})", table, sql);
        self.handle.execute(&sql, values).map_err(|e| {
            error!("Database::update ({}) ERROR: {}", sql, e);
            e
        })
    }

    /// Gets the rows matching `conditions`.
    ///
    /// An empty `columns` slice selects all columns.
    pub fn get(
        &mut self,
        conditions: impl Into<Conditions>,
        columns: &[&str],
        table: &str,
    ) -> Result<Vec<Row>> {
        let conditions: Conditions = conditions.into();
        let sql = self.select_sql(&conditions, columns, table)?;
        self.handle.query(&sql, &[]).map_err(|e| {
            error!("Database::get ({}) ERROR: {}", sql, e);
            e
        })
    }

    /// Like [`Database::get`], but expects exactly one matching row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnexpectedRowCount` if zero or several rows match.
    pub fn lookup(
        &mut self,
        conditions: impl Into<Conditions>,
        columns: &[&str],
        table: &str,
    ) -> Result<Row> {
        let conditions: Conditions = conditions.into();
        let sql = self.select_sql(&conditions, columns, table)?;
        let mut rows = self.handle.query(&sql, &[]).map_err(|e| {
            error!("Database::lookup ({}) ERROR: {}", sql, e);
            e
        })?;

        if rows.len() != 1 {
            return Err(StoreError::UnexpectedRowCount {
                sql,
                rows: rows.len(),
            });
        }
        Ok(rows.remove(0))
    }

    /// Deletes the rows matching `conditions`.
    ///
    /// # Returns
    ///
    /// The number of rows deleted.
    pub fn delete(&mut self, conditions: impl Into<Conditions>, table: &str) -> Result<u64> {
        let conditions: Conditions = conditions.into();
        let sql = format!(
            "DELETE FROM {}{}",
            self.table_name(table),
            conditions.compile(self.dialect())?
        );

        debug!("Database::delete {}", sql);
        self.handle.execute(&sql, &[]).map_err(|e| {
            error!("Database::delete ({}) ERROR: {}", sql, e);
            e
        })
    }

    fn select_sql(&self, conditions: &Conditions, columns: &[&str], table: &str) -> Result<String> {
        let columns = if columns.is_empty() {
            "*".to_string()
        } else {
            self.column_list(columns)
        };
        Ok(format!(
            "SELECT {} FROM {}{}",
            columns,
            self.table_name(table),
            conditions.compile(self.dialect())?
        ))
    }

    fn column_list(&self, columns: &[&str]) -> String {
        let dialect = self.dialect();
        columns
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(",")
    }
}
