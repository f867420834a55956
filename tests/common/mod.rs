//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use carddav_db::{Database, SqliteHandle, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The migration tree shipped with the crate.
pub fn shipped_migrations() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("dbmigrations")
}

/// Creates a migration tree from `(directory, [(file, content)])` entries.
pub fn script_tree(migrations: &[(&str, &[(&str, &str)])]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, files) in migrations {
        let path = dir.path().join(name);
        fs::create_dir(&path).unwrap();
        for (file, content) in *files {
            fs::write(path.join(file), content).unwrap();
        }
    }
    dir
}

/// Copies the named shipped migrations into `target`.
pub fn copy_shipped(target: &Path, names: &[&str]) {
    for name in names {
        let source = shipped_migrations().join(name);
        let dest = target.join(name);
        fs::create_dir_all(&dest).unwrap();
        for entry in fs::read_dir(&source).unwrap() {
            let entry = entry.unwrap();
            fs::copy(entry.path(), dest.join(entry.file_name())).unwrap();
        }
    }
}

/// A fresh SQLite database file inside its own temporary directory.
pub fn sqlite_db(prefix: &str) -> (TempDir, Database<SqliteHandle>) {
    let dir = TempDir::new().unwrap();
    let handle = SqliteHandle::open(dir.path().join("contacts.db")).unwrap();
    (dir, Database::new(handle).with_table_prefix(prefix))
}

/// A SQLite database with the shipped schema applied.
pub fn migrated_db(prefix: &str) -> (TempDir, Database<SqliteHandle>) {
    let (dir, mut db) = sqlite_db(prefix);
    let outcome = db.check_migrations(prefix, shipped_migrations());
    assert!(!outcome.is_aborted(), "{}", outcome);
    (dir, db)
}

/// Inserts an addressbook and returns its id.
pub fn add_addressbook<H: carddav_db::DbHandle>(
    db: &mut Database<H>,
    user_id: i64,
    name: &str,
    username: &str,
) -> String {
    db.insert(
        "addressbooks",
        &["user_id", "name", "username", "password", "url"],
        &[
            Value::from(user_id),
            name.into(),
            username.into(),
            "secret".into(),
            format!("https://dav.example.com/{username}/{name}/").into(),
        ],
    )
    .unwrap()
}

/// Names of the tables in a SQLite database.
pub fn sqlite_tables(db: &Database<SqliteHandle>) -> Vec<String> {
    let mut stmt = db
        .handle()
        .connection()
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    names
}
