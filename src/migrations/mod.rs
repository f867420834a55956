/// Migrations Module
///
/// Schema migrations for the contacts store.
///
/// Migrations live in numbered subdirectories (`0000-dbinit`, `0001-accounts`,
/// ...) of a script directory. Each one is either a procedural step registered
/// in a [`MigrationRegistry`] under its number, or a set of per-backend SQL
/// scripts. Applied migrations are recorded by directory name in the
/// `carddav_migrations` table.
///
/// The runner never fails its caller: problems are logged and reported through
/// [`MigrationOutcome`], leaving the schema at the last successful migration.
mod registry;
mod runner;
mod script;

pub use registry::{MigrationRegistry, MigrationStep, StepDatabase};
pub use script::{discover_migrations, split_statements, MigrationDir, TABLE_PREFIX_TOKEN};

use std::fmt;

/// Why a migration run stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The connection reports a provider without capability entry
    UnsupportedBackend(String),
    /// The script directory could not be listed
    ScriptDirectory(String),
    /// A transaction around a migration could not be opened or committed
    Transaction(String),
    /// A procedural step reported failure
    StepFailed,
    /// Neither a procedural step nor a script for this backend exists
    MissingScript,
    ScriptUnreadable(String),
    StatementFailed { statement: String, error: String },
    /// The migration ran but could not be recorded
    RecordFailed(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::UnsupportedBackend(p) => write!(f, "unsupported database backend: {p}"),
            AbortReason::ScriptDirectory(e) => write!(f, "cannot read migration directory: {e}"),
            AbortReason::Transaction(e) => write!(f, "migration transaction failed: {e}"),
            AbortReason::StepFailed => f.write_str("procedural migration step failed"),
            AbortReason::MissingScript => f.write_str("no migration script found"),
            AbortReason::ScriptUnreadable(e) => write!(f, "cannot read migration script: {e}"),
            AbortReason::StatementFailed { statement, error } => {
                write!(f, "migration query ({statement}) failed: {error}")
            }
            AbortReason::RecordFailed(e) => write!(f, "recording migration failed: {e}"),
        }
    }
}

/// Result of a migration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The schema was already up to date
    Skipped,
    /// All pending migrations were applied and recorded, in this order
    Applied(Vec<String>),
    /// The run stopped at `failed`; `applied` lists what succeeded before
    Aborted {
        applied: Vec<String>,
        failed: Option<String>,
        reason: AbortReason,
    },
}

impl MigrationOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, MigrationOutcome::Aborted { .. })
    }

    /// Migrations applied during this run.
    pub fn applied(&self) -> &[String] {
        match self {
            MigrationOutcome::Skipped => &[],
            MigrationOutcome::Applied(applied) | MigrationOutcome::Aborted { applied, .. } => applied,
        }
    }
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationOutcome::Skipped => f.write_str("schema is up to date"),
            MigrationOutcome::Applied(applied) => {
                write!(f, "applied {} migration(s): {}", applied.len(), applied.join(", "))
            }
            MigrationOutcome::Aborted {
                applied,
                failed,
                reason,
            } => {
                write!(f, "aborted")?;
                if let Some(failed) = failed {
                    write!(f, " in {failed}")?;
                }
                write!(f, ": {reason} ({} applied before)", applied.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        assert!(MigrationOutcome::Skipped.applied().is_empty());
        assert!(!MigrationOutcome::Skipped.is_aborted());

        let outcome = MigrationOutcome::Aborted {
            applied: vec!["0000-dbinit".to_string()],
            failed: Some("0001-accounts".to_string()),
            reason: AbortReason::MissingScript,
        };
        assert!(outcome.is_aborted());
        assert_eq!(outcome.applied(), ["0000-dbinit".to_string()]);
        assert_eq!(
            outcome.to_string(),
            "aborted in 0001-accounts: no migration script found (1 applied before)"
        );
    }
}
