/// Backend Capability Module
///
/// Every backend-dependent decision of the persistence layer (transaction
/// setup, session reset, migration script selection, SQL dialect) reads the
/// single capability table defined here.
use crate::core::db::Value;
use std::fmt;

/// Isolation level used for read-only transactions.
pub const READONLY_ISOLATION: &str = "REPEATABLE READ";
/// Isolation level used for read-write transactions.
pub const READWRITE_ISOLATION: &str = "SERIALIZABLE";

/// The supported relational engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    MySql,
    Sqlite,
    Postgres,
}

/// How a backend selects the isolation level of the next transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationSyntax {
    /// No statement; the engine always runs serializable transactions
    Implicit,
    /// `SET TRANSACTION ISOLATION LEVEL ...` applying to the next transaction
    SetTransaction,
    /// `SET SESSION CHARACTERISTICS AS TRANSACTION ...` applying to the session
    SetSessionCharacteristics,
}

impl IsolationSyntax {
    /// Returns the statement selecting `level` and `mode`, if the backend needs one.
    pub fn statement(self, level: &str, mode: &str) -> Option<String> {
        match self {
            IsolationSyntax::Implicit => None,
            IsolationSyntax::SetTransaction => {
                Some(format!("SET TRANSACTION ISOLATION LEVEL {level}, {mode}"))
            }
            IsolationSyntax::SetSessionCharacteristics => Some(format!(
                "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL {level}, {mode}"
            )),
        }
    }
}

/// SQL dialect rules for quoting and pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
    Postgres,
    /// Fallback for providers without a capability entry
    Ansi,
}

impl Dialect {
    /// Quotes a column or table identifier.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Renders a value as a SQL literal.
    pub fn quote_value(self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) if f.is_finite() => f.to_string(),
            // NaN and infinities have no portable numeric literal
            Value::Real(f) => self.quote_text(&f.to_string()),
            Value::Text(s) => self.quote_text(s),
        }
    }

    fn quote_text(self, text: &str) -> String {
        let escaped = match self {
            Dialect::MySql => text.replace('\\', "\\\\").replace('\'', "''"),
            _ => text.replace('\'', "''"),
        };
        format!("'{escaped}'")
    }

    /// Returns the case-insensitive pattern match operator, negated if requested.
    pub fn pattern_operator(self, negate: bool) -> String {
        let (prefix, op) = match self {
            Dialect::MySql => ("COLLATE utf8mb4_unicode_ci ", "LIKE"),
            Dialect::Postgres => ("", "ILIKE"),
            Dialect::Sqlite | Dialect::Ansi => ("", "LIKE"),
        };
        if negate {
            format!("{prefix}NOT {op}")
        } else {
            format!("{prefix}{op}")
        }
    }
}

/// One row of the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub isolation_syntax: IsolationSyntax,
    /// Whether the isolation statement outlives the transaction and must be reset
    pub resets_session_on_commit: bool,
    pub dialect: Dialect,
    /// File name of the declarative migration script for this backend
    pub migration_file: &'static str,
    /// Whether DDL statements can be rolled back
    pub transactional_ddl: bool,
}

const MYSQL: Capabilities = Capabilities {
    isolation_syntax: IsolationSyntax::SetTransaction,
    resets_session_on_commit: false,
    dialect: Dialect::MySql,
    migration_file: "mysql.sql",
    transactional_ddl: false,
};

const SQLITE: Capabilities = Capabilities {
    isolation_syntax: IsolationSyntax::Implicit,
    resets_session_on_commit: false,
    dialect: Dialect::Sqlite,
    migration_file: "sqlite3.sql",
    transactional_ddl: true,
};

const POSTGRES: Capabilities = Capabilities {
    isolation_syntax: IsolationSyntax::SetSessionCharacteristics,
    resets_session_on_commit: true,
    dialect: Dialect::Postgres,
    migration_file: "postgres.sql",
    transactional_ddl: true,
};

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::MySql, Backend::Sqlite, Backend::Postgres];

    /// Resolves a provider identifier as reported by a connection handle.
    pub fn from_provider(provider: &str) -> Option<Backend> {
        match provider {
            "mysql" => Some(Backend::MySql),
            "sqlite" => Some(Backend::Sqlite),
            "postgres" => Some(Backend::Postgres),
            _ => None,
        }
    }

    pub fn provider(self) -> &'static str {
        match self {
            Backend::MySql => "mysql",
            Backend::Sqlite => "sqlite",
            Backend::Postgres => "postgres",
        }
    }

    pub fn capabilities(self) -> &'static Capabilities {
        match self {
            Backend::MySql => &MYSQL,
            Backend::Sqlite => &SQLITE,
            Backend::Postgres => &POSTGRES,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider())
    }
}

/// Returns the dialect for a provider, falling back to ANSI quoting.
pub fn dialect_for(provider: &str) -> Dialect {
    Backend::from_provider(provider)
        .map(|b| b.capabilities().dialect)
        .unwrap_or(Dialect::Ansi)
}
