/// Condition Compiler Module
///
/// Structured filters for select, update and delete. A filter is either
/// nothing, an identifier shorthand, or a conjunction of per-column
/// conditions written as column specs:
///
/// - `name` matches by equality (or `IN` for lists, `IS NULL` for null)
/// - `!name` negates the match
/// - `%name` matches a single value as a case-insensitive pattern
/// - `!%name` combines both; the flags must appear in this order
///
/// Values end up in the generated SQL only through dialect quoting, column
/// names only through identifier quoting.
use super::handle::Value;
use crate::core::backend::Dialect;
use crate::core::{Result, StoreError};

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Null,
    Scalar(Value),
    List(Vec<Value>),
}

impl From<Value> for ConditionValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConditionValue::Null,
            v => ConditionValue::Scalar(v),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::Scalar(value.into())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        ConditionValue::Scalar(value.into())
    }
}

impl From<&String> for ConditionValue {
    fn from(value: &String) -> Self {
        ConditionValue::Scalar(value.into())
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        ConditionValue::Scalar(value.into())
    }
}

impl From<i32> for ConditionValue {
    fn from(value: i32) -> Self {
        ConditionValue::Scalar(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for ConditionValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => ConditionValue::from(v.into()),
            None => ConditionValue::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for ConditionValue {
    fn from(values: Vec<T>) -> Self {
        ConditionValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for ConditionValue {
    fn from(values: [T; N]) -> Self {
        ConditionValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// A single column condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub negate: bool,
    pub pattern: bool,
    pub value: ConditionValue,
}

impl Condition {
    /// Parses a column spec (`[!][%]column`) into a condition on `value`.
    pub fn parse(spec: &str, value: impl Into<ConditionValue>) -> Self {
        let (negate, rest) = match spec.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        let (pattern, field) = match rest.strip_prefix('%') {
            Some(field) => (true, field),
            None => (false, rest),
        };
        Condition {
            field: field.to_string(),
            negate,
            pattern,
            value: value.into(),
        }
    }

    /// Compiles this condition to a SQL boolean expression.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConditionUsage` for an empty column name, an empty
    /// value list, or a pattern flag combined with a value list.
    pub fn compile(&self, dialect: Dialect) -> Result<String> {
        if self.field.is_empty() {
            return Err(StoreError::ConditionUsage(
                "condition without column name".to_string(),
            ));
        }
        let column = dialect.quote_identifier(&self.field);

        match &self.value {
            ConditionValue::Null | ConditionValue::Scalar(Value::Null) => {
                let test = if self.negate { "IS NOT NULL" } else { "IS NULL" };
                Ok(format!("{column} {test}"))
            }
            ConditionValue::List(values) => {
                if values.is_empty() {
                    return Err(StoreError::ConditionUsage(format!(
                        "{} - empty values list provided",
                        self.field
                    )));
                }
                if self.pattern {
                    return Err(StoreError::ConditionUsage(format!(
                        "{} - pattern match only supported for a single value",
                        self.field
                    )));
                }
                let quoted: Vec<String> = values.iter().map(|v| dialect.quote_value(v)).collect();
                let op = if self.negate { "NOT IN" } else { "IN" };
                Ok(format!("{column} {op} ({})", quoted.join(",")))
            }
            ConditionValue::Scalar(value) => {
                let op = if self.pattern {
                    dialect.pattern_operator(self.negate)
                } else if self.negate {
                    "<>".to_string()
                } else {
                    "=".to_string()
                };
                Ok(format!("{column} {op} {}", dialect.quote_value(value)))
            }
        }
    }
}

/// A complete filter as accepted by `get`, `lookup`, `update` and `delete`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Conditions {
    /// No filter; matches every row
    #[default]
    All,
    /// Shorthand for `id = value`
    Id(Value),
    /// Conjunction of column conditions
    Fields(Vec<Condition>),
}

impl Conditions {
    pub fn id(value: impl Into<Value>) -> Self {
        Conditions::Id(value.into())
    }

    /// Starts an empty conjunction, to be extended with [`Conditions::field`].
    pub fn filter() -> Self {
        Conditions::Fields(Vec::new())
    }

    /// Adds a column condition to the conjunction.
    pub fn field(self, spec: &str, value: impl Into<ConditionValue>) -> Self {
        let condition = Condition::parse(spec, value);
        let mut fields = match self {
            Conditions::All => Vec::new(),
            Conditions::Id(id) => vec![Condition::parse("id", id)],
            Conditions::Fields(fields) => fields,
        };
        fields.push(condition);
        Conditions::Fields(fields)
    }

    /// Compiles the filter to a WHERE clause.
    ///
    /// Returns an empty string when there is nothing to filter on, otherwise
    /// `" WHERE "` followed by the conditions joined with `AND`.
    pub fn compile(&self, dialect: Dialect) -> Result<String> {
        let parts = match self {
            Conditions::All => return Ok(String::new()),
            Conditions::Id(id) => vec![Condition::parse("id", id.clone()).compile(dialect)?],
            Conditions::Fields(fields) => fields
                .iter()
                .map(|c| c.compile(dialect))
                .collect::<Result<Vec<_>>>()?,
        };

        if parts.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", parts.join(" AND ")))
        }
    }
}

impl From<&str> for Conditions {
    fn from(id: &str) -> Self {
        Conditions::Id(id.into())
    }
}

impl From<String> for Conditions {
    fn from(id: String) -> Self {
        Conditions::Id(id.into())
    }
}

impl From<i64> for Conditions {
    fn from(id: i64) -> Self {
        Conditions::Id(id.into())
    }
}

impl<T: Into<Conditions>> From<Option<T>> for Conditions {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Conditions::All)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let c = Condition::parse("!%email", "foo");
        assert_eq!(c.field, "email");
        assert!(c.negate);
        assert!(c.pattern);

        let c = Condition::parse("name", "x");
        assert!(!c.negate && !c.pattern);

        // flags out of order are treated as part of the column name
        let c = Condition::parse("%!name", "x");
        assert!(c.pattern);
        assert!(!c.negate);
        assert_eq!(c.field, "!name");
    }

    #[test]
    fn test_no_filter() {
        assert_eq!(Conditions::All.compile(Dialect::Sqlite).unwrap(), "");
        assert_eq!(Conditions::filter().compile(Dialect::Sqlite).unwrap(), "");
        assert_eq!(Conditions::from(None::<&str>), Conditions::All);
    }

    #[test]
    fn test_id_shorthand() {
        assert_eq!(
            Conditions::from("abc").compile(Dialect::Sqlite).unwrap(),
            " WHERE \"id\" = 'abc'"
        );
        assert_eq!(
            Conditions::from("abc").compile(Dialect::MySql).unwrap(),
            " WHERE `id` = 'abc'"
        );
    }

    #[test]
    fn test_negated_list() {
        let sql = Conditions::filter()
            .field("!name", ["a", "b"])
            .compile(Dialect::Postgres)
            .unwrap();
        assert_eq!(sql, " WHERE \"name\" NOT IN ('a','b')");
    }

    #[test]
    fn test_null_conditions() {
        let sql = Conditions::filter()
            .field("etag", ConditionValue::Null)
            .field("!uri", None::<&str>)
            .compile(Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, " WHERE \"etag\" IS NULL AND \"uri\" IS NOT NULL");
    }

    #[test]
    fn test_pattern_per_dialect() {
        let conditions = Conditions::filter().field("%email", "foo%");
        assert_eq!(
            conditions.compile(Dialect::Postgres).unwrap(),
            " WHERE \"email\" ILIKE 'foo%'"
        );
        assert_eq!(
            conditions.compile(Dialect::MySql).unwrap(),
            " WHERE `email` COLLATE utf8mb4_unicode_ci LIKE 'foo%'"
        );
        assert_eq!(
            Conditions::filter()
                .field("!%email", "foo%")
                .compile(Dialect::Postgres)
                .unwrap(),
            " WHERE \"email\" NOT ILIKE 'foo%'"
        );
    }

    #[test]
    fn test_inequality() {
        let sql = Conditions::filter()
            .field("!abook_id", 7_i64)
            .compile(Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, " WHERE \"abook_id\" <> 7");
    }

    #[test]
    fn test_empty_list_is_usage_error() {
        let result = Conditions::filter()
            .field("x", Vec::<String>::new())
            .compile(Dialect::Sqlite);
        assert!(matches!(result, Err(StoreError::ConditionUsage(_))));
    }

    #[test]
    fn test_pattern_on_list_is_usage_error() {
        let result = Conditions::filter()
            .field("%x", ["a", "b"])
            .compile(Dialect::Sqlite);
        assert!(matches!(result, Err(StoreError::ConditionUsage(_))));
    }

    #[test]
    fn test_empty_column_is_usage_error() {
        let result = Conditions::filter().field("!", "a").compile(Dialect::Sqlite);
        assert!(matches!(result, Err(StoreError::ConditionUsage(_))));
    }

    #[test]
    fn test_field_after_id_keeps_id() {
        let sql = Conditions::id(3_i64)
            .field("abook_id", "1")
            .compile(Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, " WHERE \"id\" = 3 AND \"abook_id\" = '1'");
    }

    #[test]
    fn test_values_are_escaped() {
        let sql = Conditions::filter()
            .field("name", "x' OR '1'='1")
            .compile(Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, " WHERE \"name\" = 'x'' OR ''1''=''1'");
    }
}
