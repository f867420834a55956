/// Migration Script Module
///
/// Discovery of migration directories and splitting of SQL scripts into
/// statements.
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Replaced by the configured table prefix in every script statement.
pub const TABLE_PREFIX_TOKEN: &str = "TABLE_PREFIX";

static MIGRATION_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-").unwrap());
static STATEMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s).+?;").unwrap());

/// A migration directory found under the script root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDir {
    /// Directory name, as recorded in the migrations table
    pub name: String,
    /// The 4-digit sequence number
    pub number: u16,
    pub path: PathBuf,
}

/// Lists the migration directories below `script_dir`, in ascending order.
///
/// Entries that are not directories or whose name does not start with a
/// 4-digit number and `-` are ignored. The fixed width makes lexicographic
/// order numeric order.
pub fn discover_migrations(script_dir: &Path) -> io::Result<Vec<MigrationDir>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(script_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(String::from) else {
            continue;
        };
        let Some(number) = MIGRATION_NAME
            .captures(&name)
            .and_then(|c| c[1].parse::<u16>().ok())
        else {
            continue;
        };
        found.push(MigrationDir { name, number, path });
    }
    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

/// Splits a script into statements, each ending with `;`.
///
/// This is a plain scan for the next semicolon, not a SQL parser: semicolons
/// inside string literals or comments are not supported. Text after the last
/// semicolon is ignored.
pub fn split_statements(script: &str) -> Vec<&str> {
    STATEMENT
        .find_iter(script)
        .map(|m| m.as_str().trim())
        .filter(|s| *s != ";")
        .collect()
}
