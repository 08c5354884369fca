use rusqlite::{params, Connection, OptionalExtension, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

// Printed instead of logged under test
macro_rules! log_info {
    ($($arg:tt)*) => {
        #[cfg(not(test))]
        log::info!($($arg)*);
        #[cfg(test)]
        println!("[INFO] {}", format!($($arg)*));
    };
}

macro_rules! log_warn {
    ($($arg:tt)*) => {
        #[cfg(not(test))]
        log::warn!($($arg)*);
        #[cfg(test)]
        println!("[WARN] {}", format!($($arg)*));
    };
}

macro_rules! log_error {
    ($($arg:tt)*) => {
        #[cfg(not(test))]
        log::error!($($arg)*);
        #[cfg(test)]
        eprintln!("[ERROR] {}", format!($($arg)*));
    };
}

const BACKUP_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "pre_migration_";
const BACKUPS_KEPT: usize = 5;

/// One schema step. Applied steps are fingerprinted so later edits to the SQL are caught.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    pub const fn new(version: u32, name: &'static str, sql: &'static str) -> Self {
        Self { version, name, sql }
    }

    pub fn checksum(&self) -> String {
        format!("{:x}", Sha256::digest(self.sql.as_bytes()))
    }
}

static MIGRATIONS: &[Migration] = &[
    Migration::new(0, "bootstrap", include_str!("migrations/000_bootstrap.sql")),
    Migration::new(1, "initial_schema", include_str!("migrations/001_initial_schema.sql")),
    Migration::new(
        2,
        "add_analysis_settings",
        include_str!("migrations/002_add_analysis_settings.sql"),
    ),
];

pub struct MigrationRunner {
    migrations: &'static [Migration],
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self {
            migrations: MIGRATIONS,
        }
    }

    /// Bring the schema up to the latest version and return how many steps ran.
    /// The bootstrap step is not counted. An existing journal is backed up first.
    pub fn run_pending_migrations(&self, conn: &Connection, db_path: &str) -> Result<usize> {
        if !has_migrations_table(conn)? {
            log_info!("New database, creating schema_migrations");
            self.apply_migration(conn, &self.migrations[0])?;
        }

        let current = self.get_current_version(conn)?.unwrap_or(0);
        let pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| m.version > current)
            .collect();

        let Some(target) = pending.last().map(|m| m.version) else {
            return Ok(0);
        };
        log_info!(
            "Schema at v{}, {} migration(s) pending up to v{}",
            current,
            pending.len(),
            target
        );

        let backup = if current > 0 && db_path != ":memory:" {
            Some(backup_database(db_path, target)?)
        } else {
            None
        };

        for (done, migration) in pending.iter().enumerate() {
            if let Err(e) = self.apply_migration(conn, migration) {
                log_error!(
                    "Migration v{} ({}) failed and was rolled back: {}",
                    migration.version,
                    migration.name,
                    e
                );
                if let Some(path) = &backup {
                    log_error!("Pre-migration copy: {}", path.display());
                }
                log_warn!("{} of {} pending migration(s) were applied", done, pending.len());
                return Err(e);
            }
        }

        Ok(pending.len())
    }

    /// Run one step in its own transaction and record it
    fn apply_migration(&self, conn: &Connection, migration: &Migration) -> Result<()> {
        let started = Instant::now();
        let tx = conn.unchecked_transaction()?;

        tx.execute_batch(migration.sql)?;
        let elapsed_ms = started.elapsed().as_millis() as i64;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL)",
            params![
                migration.version,
                migration.name,
                chrono::Utc::now().timestamp(),
                migration.checksum(),
                elapsed_ms
            ],
        )?;
        tx.commit()?;

        log_info!("Applied v{} {} ({}ms)", migration.version, migration.name, elapsed_ms);
        Ok(())
    }

    /// Fail if any recorded checksum differs from the SQL compiled into this binary
    pub fn verify_migrations(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(
            "SELECT version, checksum FROM schema_migrations WHERE checksum IS NOT NULL ORDER BY version",
        )?;
        let recorded = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        for (version, checksum) in recorded {
            let Some(migration) = self.migrations.iter().find(|m| m.version == version) else {
                continue;
            };
            let expected = migration.checksum();
            if checksum != expected {
                log_error!(
                    "Migration v{} ({}) was modified after it was applied: recorded {}, expected {}",
                    version,
                    migration.name,
                    checksum,
                    expected
                );
                return Err(failure(format!(
                    "checksum mismatch for migration v{} ({})",
                    version, migration.name
                )));
            }
        }

        Ok(())
    }

    pub fn get_current_version(&self, conn: &Connection) -> Result<Option<u32>> {
        if !has_migrations_table(conn)? {
            return Ok(None);
        }

        let version: Option<Option<u32>> = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .optional()?;
        Ok(version.flatten())
    }
}

fn has_migrations_table(conn: &Connection) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn failure(message: String) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(1), Some(message))
}

/// Copy the database to `backups/pre_migration_v{target}_{ts}.db` next to it and check the copy
fn backup_database(db_path: &str, target: u32) -> Result<PathBuf> {
    let db_dir = Path::new(db_path)
        .parent()
        .ok_or_else(|| rusqlite::Error::InvalidPath(PathBuf::from(db_path)))?;
    let backup_dir = db_dir.join(BACKUP_DIR);
    fs::create_dir_all(&backup_dir)
        .map_err(|e| failure(format!("cannot create {}: {}", backup_dir.display(), e)))?;

    let backup_path = backup_dir.join(format!(
        "{}v{}_{}.db",
        BACKUP_PREFIX,
        target,
        chrono::Utc::now().timestamp()
    ));

    let src = Connection::open(db_path)?;
    let mut dst = Connection::open(&backup_path)?;
    rusqlite::backup::Backup::new(&src, &mut dst)?.run_to_completion(
        5,
        Duration::from_millis(250),
        None,
    )?;

    let size = fs::metadata(&backup_path)
        .map_err(|e| failure(format!("cannot stat backup: {}", e)))?
        .len();
    if size == 0 {
        return Err(failure(format!("backup {} is empty", backup_path.display())));
    }

    let integrity: String = dst.pragma_query_value(None, "integrity_check", |row| row.get(0))?;
    if integrity != "ok" {
        return Err(failure(format!("backup integrity check failed: {}", integrity)));
    }

    log_info!("Backed up database to {} ({} bytes)", backup_path.display(), size);
    prune_backups(&backup_dir);
    Ok(backup_path)
}

/// Keep only the newest backups; failures here are logged and ignored
fn prune_backups(backup_dir: &Path) {
    let entries = match fs::read_dir(backup_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log_warn!("Cannot list {}: {}", backup_dir.display(), e);
            return;
        }
    };

    let mut backups: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(BACKUP_PREFIX) && name.ends_with(".db")
        })
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();

    if backups.len() <= BACKUPS_KEPT {
        return;
    }
    backups.sort();
    let excess = backups.len() - BACKUPS_KEPT;
    for (_, path) in backups.into_iter().take(excess) {
        if let Err(e) = fs::remove_file(&path) {
            log_warn!("Failed to delete old backup {}: {}", path.display(), e);
        }
    }
}
