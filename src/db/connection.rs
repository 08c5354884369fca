use rusqlite::{Connection, Result};
use std::sync::Mutex;

use crate::db::migration_runner::MigrationRunner;

/// The journal's SQLite handle. Callers lock `conn` for the duration of one operation.
pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::migrated(conn, db_path)
    }

    /// Fresh database that lives only as long as the returned handle
    pub fn open_in_memory() -> Result<Self> {
        Self::migrated(Connection::open_in_memory()?, ":memory:")
    }

    fn migrated(conn: Connection, db_path: &str) -> Result<Self> {
        let runner = MigrationRunner::new();

        let applied = runner.run_pending_migrations(&conn, db_path)?;
        runner.verify_migrations(&conn)?;

        let version = runner.get_current_version(&conn)?;
        if applied > 0 {
            log::info!("Migrated {} to schema v{:?} ({} step(s))", db_path, version, applied);
        } else {
            log::debug!("Schema of {} is current at v{:?}", db_path, version);
        }

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }
}
