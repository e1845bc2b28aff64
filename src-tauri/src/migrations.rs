use std::collections::HashSet;

use crate::db::DbPool;
use crate::error::Result;

pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            name: "001_option_cache",
            sql: "CREATE TABLE IF NOT EXISTS option_cache (
                      data_source TEXT NOT NULL,
                      section TEXT NOT NULL,
                      payload TEXT NOT NULL,
                      fetched_at TEXT NOT NULL DEFAULT (datetime('now')),
                      PRIMARY KEY (data_source, section)
                  );",
        },
        Migration {
            name: "002_export_log",
            sql: "CREATE TABLE IF NOT EXISTS exports (
                      id INTEGER PRIMARY KEY AUTOINCREMENT,
                      path TEXT NOT NULL,
                      data_source TEXT NOT NULL,
                      start_time TEXT NOT NULL,
                      end_time TEXT NOT NULL,
                      bytes INTEGER NOT NULL,
                      created_at TEXT NOT NULL DEFAULT (datetime('now'))
                  );
                  CREATE INDEX IF NOT EXISTS idx_exports_created ON exports(created_at);",
        },
    ]
}

pub fn run_pending(pool: &DbPool) -> Result<Vec<String>> {
    let mut conn = pool.get()?;
    let applied_set: HashSet<String> = conn
        .prepare("SELECT name FROM migrations ORDER BY id")?
        .query_map([], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();

    let mut newly_applied = Vec::new();

    for migration in all_migrations() {
        if applied_set.contains(migration.name) {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute("INSERT INTO migrations (name) VALUES (?1)", [migration.name])?;
        tx.commit()?;
        tracing::debug!(name = migration.name, "applied migration");
        newly_applied.push(migration.name.to_string());
    }

    Ok(newly_applied)
}

pub fn applied(pool: &DbPool) -> Result<Vec<String>> {
    let conn = pool.get()?;
    let names: Vec<String> = conn
        .prepare("SELECT name FROM migrations ORDER BY id")?
        .query_map([], |row| row.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(names)
}
