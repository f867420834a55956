/// Migration Runner Module
///
/// Applies pending migrations and records them in the migrations table.
use super::registry::{MigrationRegistry, StepDatabase};
use super::script::{discover_migrations, split_statements, MigrationDir, TABLE_PREFIX_TOKEN};
use super::{AbortReason, MigrationOutcome};
use crate::core::backend::{Backend, Capabilities};
use crate::core::db::{Conditions, Database, DbHandle, TransactionState, Value};
use crate::core::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

type StepResult = std::result::Result<(), AbortReason>;

impl<H: DbHandle> Database<H> {
    /// Brings the schema up to date using the built-in procedural steps.
    ///
    /// See [`Database::check_migrations_with`].
    pub fn check_migrations(
        &mut self,
        table_prefix: &str,
        script_dir: impl AsRef<Path>,
    ) -> MigrationOutcome {
        self.check_migrations_with(table_prefix, script_dir, &MigrationRegistry::builtin())
    }

    /// Applies every migration below `script_dir` that is not yet recorded.
    ///
    /// `table_prefix` replaces the `TABLE_PREFIX` token in scripts and names
    /// the migrations table; it should match the prefix this instance was
    /// created with. On backends with transactional DDL each migration and its
    /// record are committed together.
    ///
    /// Never fails: any problem is logged and stops the run, see
    /// [`MigrationOutcome::Aborted`].
    pub fn check_migrations_with(
        &mut self,
        table_prefix: &str,
        script_dir: impl AsRef<Path>,
        registry: &MigrationRegistry,
    ) -> MigrationOutcome {
        let script_dir = script_dir.as_ref();

        let Some(backend) = self.backend() else {
            let provider = self.handle.provider().to_string();
            error!("FATAL: Unsupported database backend: {}", provider);
            return aborted(Vec::new(), None, AbortReason::UnsupportedBackend(provider));
        };

        if self.in_transaction() {
            error!("Migration check requested inside an active transaction");
            return aborted(
                Vec::new(),
                None,
                AbortReason::Transaction("a transaction is already active".to_string()),
            );
        }

        let available = match discover_migrations(script_dir) {
            Ok(found) => found,
            Err(e) => {
                error!("Cannot read migration directory {:?}: {}", script_dir, e);
                return aborted(
                    Vec::new(),
                    None,
                    AbortReason::ScriptDirectory(format!("{}: {}", script_dir.display(), e)),
                );
            }
        };

        let done = self.recorded_migrations(table_prefix);
        let pending: Vec<&MigrationDir> = available
            .iter()
            .filter(|m| !done.contains(&m.name))
            .collect();

        if pending.is_empty() {
            debug!("Schema is up to date ({} migrations recorded)", done.len());
            return MigrationOutcome::Skipped;
        }

        let mut applied = Vec::new();
        for migration in pending {
            info!("In migration: {}", migration.name);
            if let Err(reason) = self.apply_migration(backend, table_prefix, migration, registry) {
                return aborted(applied, Some(migration.name.clone()), reason);
            }
            applied.push(migration.name.clone());
        }

        info!("Applied {} migration(s)", applied.len());
        MigrationOutcome::Applied(applied)
    }

    /// Filenames of all recorded migrations, in ascending order.
    pub fn applied_migrations(&mut self) -> Result<Vec<String>> {
        let rows = self.get(Conditions::All, &["filename"], "migrations")?;
        let mut names: Vec<String> = rows
            .iter()
            .filter_map(|r| r.get("filename").and_then(Value::as_str).map(String::from))
            .collect();
        names.sort();
        Ok(names)
    }

    fn migrations_table(&self, table_prefix: &str) -> String {
        self.dialect()
            .quote_identifier(&format!("{table_prefix}carddav_migrations"))
    }

    /// Recorded migrations; a missing migrations table counts as none.
    fn recorded_migrations(&mut self, table_prefix: &str) -> BTreeSet<String> {
        let sql = format!("SELECT filename FROM {}", self.migrations_table(table_prefix));
        match self.handle.query(&sql, &[]) {
            Ok(rows) => rows
                .iter()
                .filter_map(|r| r.get("filename").and_then(Value::as_str).map(String::from))
                .collect(),
            Err(e) => {
                debug!("No migrations recorded yet: {}", e);
                BTreeSet::new()
            }
        }
    }

    fn apply_migration(
        &mut self,
        backend: Backend,
        table_prefix: &str,
        migration: &MigrationDir,
        registry: &MigrationRegistry,
    ) -> StepResult {
        let caps = backend.capabilities();
        let atomic = caps.transactional_ddl;

        if atomic {
            self.start_transaction(false)
                .map_err(|e| AbortReason::Transaction(e.to_string()))?;
        }

        let result = self
            .run_migration(caps, table_prefix, migration, registry)
            .and_then(|()| self.record_migration(table_prefix, &migration.name))
            .and_then(|()| {
                if atomic {
                    self.end_transaction()
                        .map_err(|e| AbortReason::Transaction(e.to_string()))
                } else {
                    Ok(())
                }
            });

        if result.is_err() && self.in_transaction() {
            if let Err(e) = self.rollback_transaction() {
                error!("Rollback of migration {} failed: {}", migration.name, e);
            }
        }
        result
    }

    fn run_migration(
        &mut self,
        caps: &Capabilities,
        table_prefix: &str,
        migration: &MigrationDir,
        registry: &MigrationRegistry,
    ) -> StepResult {
        if let Some(step) = registry.get(migration.number) {
            debug!("Running procedural step for {}", migration.name);
            let state = self.transaction_state();
            let mut step_db: StepDatabase<'_> =
                Database::new(&mut self.handle as &mut dyn DbHandle)
                    .with_table_prefix(table_prefix)
                    .with_transaction_state(state);
            let succeeded = step(&mut step_db);

            // a step may only leave the transaction state as it found it
            if step_db.transaction_state() != state {
                error!(
                    "Procedural step for {} changed the transaction state to {:?}",
                    migration.name,
                    step_db.transaction_state()
                );
                if state == TransactionState::Idle {
                    if let Err(e) = step_db.rollback_transaction() {
                        error!("Rollback after step {} failed: {}", migration.name, e);
                    }
                }
                return Err(AbortReason::Transaction(format!(
                    "procedural step for {} ended with transaction state {:?}",
                    migration.name,
                    step_db.transaction_state()
                )));
            }

            return if succeeded {
                Ok(())
            } else {
                Err(AbortReason::StepFailed)
            };
        }

        let script = migration.path.join(caps.migration_file);
        if script.is_file() {
            self.perform_sql_migration(&script, table_prefix)
        } else {
            warn!("No migration script found for: {}", migration.name);
            Err(AbortReason::MissingScript)
        }
    }

    fn perform_sql_migration(&mut self, script: &Path, table_prefix: &str) -> StepResult {
        let raw = fs::read_to_string(script).map_err(|e| {
            error!("Failed to read migration script: {:?} - aborting", script);
            AbortReason::ScriptUnreadable(format!("{}: {}", script.display(), e))
        })?;

        let statements = split_statements(&raw);
        info!("Found {} queries in {:?}", statements.len(), script);

        for statement in statements {
            let sql = statement.replace(TABLE_PREFIX_TOKEN, table_prefix);
            if let Err(e) = self.handle.execute(&sql, &[]) {
                error!("Migration query ({}) failed: {}", sql, e);
                return Err(AbortReason::StatementFailed {
                    statement: sql,
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }

    fn record_migration(&mut self, table_prefix: &str, name: &str) -> StepResult {
        let sql = format!(
            "INSERT INTO {} (filename) VALUES (?)",
            self.migrations_table(table_prefix)
        );
        self.handle
            .execute(&sql, &[Value::from(name)])
            .map(|_| ())
            .map_err(|e| {
                error!("Recording exec of migration {} failed: {}", name, e);
                AbortReason::RecordFailed(e.to_string())
            })
    }
}

fn aborted(applied: Vec<String>, failed: Option<String>, reason: AbortReason) -> MigrationOutcome {
    MigrationOutcome::Aborted {
        applied,
        failed,
        reason,
    }
}
