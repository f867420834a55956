/// Migration Registry Module
///
/// Procedural migration steps and the built-in ones.
use crate::core::db::{ConditionValue, Conditions, Database, DbHandle, Row, Value};
use std::collections::BTreeMap;
use tracing::{error, info};

/// The view of the database a procedural step works on.
///
/// It shares the runner's connection (and any transaction the runner opened
/// around the step) and carries the table prefix of the run.
pub type StepDatabase<'a> = Database<&'a mut dyn DbHandle>;

/// A procedural migration step. Returns `false` after logging its own error.
pub type MigrationStep = Box<dyn Fn(&mut StepDatabase<'_>) -> bool + Send + Sync>;

/// Procedural migration steps keyed by their 4-digit sequence number.
#[derive(Default)]
pub struct MigrationRegistry {
    steps: BTreeMap<u16, MigrationStep>,
}

impl MigrationRegistry {
    /// An empty registry; every migration is taken from SQL scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// The procedural steps shipped with the crate.
    pub fn builtin() -> Self {
        Self::new().register(2, account_entities)
    }

    /// Registers `step` for the migration numbered `number`, replacing any
    /// previous registration.
    pub fn register<F>(mut self, number: u16, step: F) -> Self
    where
        F: Fn(&mut StepDatabase<'_>) -> bool + Send + Sync + 'static,
    {
        self.steps.insert(number, Box::new(step));
        self
    }

    pub fn get(&self, number: u16) -> Option<&MigrationStep> {
        self.steps.get(&number)
    }

    pub fn numbers(&self) -> impl Iterator<Item = u16> + '_ {
        self.steps.keys().copied()
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn text(row: &Row, column: &str) -> String {
    row.get(column).map(Value::to_string).unwrap_or_default()
}

/// 0002: creates one account per distinct set of addressbook credentials and
/// links the addressbooks to it.
fn account_entities(db: &mut StepDatabase<'_>) -> bool {
    let abooks = match db.get(
        Conditions::filter().field("account_id", ConditionValue::Null),
        &["id", "user_id", "name", "username", "password", "url"],
        "addressbooks",
    ) {
        Ok(rows) => rows,
        Err(e) => {
            error!("Migration 0002: reading addressbooks failed: {}", e);
            return false;
        }
    };

    let mut accounts: BTreeMap<(String, String, String), String> = BTreeMap::new();
    for abook in &abooks {
        let key = (
            text(abook, "user_id"),
            text(abook, "username"),
            text(abook, "password"),
        );

        let account_id = match accounts.get(&key) {
            Some(id) => id.clone(),
            None => {
                let inserted = db.insert(
                    "accounts",
                    &["user_id", "accountname", "username", "password", "discovery_url"],
                    &[
                        key.0.clone().into(),
                        text(abook, "name").into(),
                        key.1.clone().into(),
                        key.2.clone().into(),
                        text(abook, "url").into(),
                    ],
                );
                match inserted {
                    Ok(id) => {
                        accounts.insert(key, id.clone());
                        id
                    }
                    Err(e) => {
                        error!("Migration 0002: creating account failed: {}", e);
                        return false;
                    }
                }
            }
        };

        let abook_id = text(abook, "id");
        if let Err(e) = db.update(
            Conditions::id(abook_id.as_str()),
            &["account_id"],
            &[account_id.into()],
            "addressbooks",
        ) {
            error!("Migration 0002: linking addressbook {} failed: {}", abook_id, e);
            return false;
        }
    }

    info!(
        "Migration 0002: created {} account(s) for {} addressbook(s)",
        accounts.len(),
        abooks.len()
    );
    true
}
