//! SQLite database wrapper with versioned migrations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

/// Database handle shared between stores
pub type SharedDatabase = Arc<Mutex<Database>>;

/// SQLite database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database at the given path
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;

        // WAL lets a replay reader run alongside a live simulation
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// In-memory database, used by tools that only replay within one process
    pub fn in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }

    /// Get the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get the current schema version from database
    pub(crate) fn get_schema_version(&self) -> i32 {
        if let Err(e) = self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        ) {
            tracing::warn!("Failed to create schema_version table: {}", e);
            return 0;
        }

        self.conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0)
    }

    fn set_schema_version(&self, version: i32) -> Result<()> {
        self.conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
        Ok(())
    }

    /// Run database migrations incrementally
    pub(crate) fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version();
        info!(
            "Database schema version: {} (target: {})",
            current_version, SCHEMA_VERSION
        );

        if current_version >= SCHEMA_VERSION {
            return Ok(());
        }

        // Migration 1: Response cache
        if current_version < 1 {
            info!("Running migration 1: Response cache");
            self.conn.execute_batch(
                r#"
                -- One row per successful Send, in call order per actor/agent/session
                CREATE TABLE IF NOT EXISTS response_cache (
                    id TEXT PRIMARY KEY,
                    actor TEXT NOT NULL,
                    agent_type TEXT NOT NULL,
                    session TEXT NOT NULL,
                    sequence INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    tools TEXT NOT NULL DEFAULT '[]',
                    UNIQUE (actor, agent_type, session, sequence)
                );

                CREATE INDEX IF NOT EXISTS idx_response_cache_actor
                    ON response_cache(actor, agent_type);
                "#,
            )?;
            self.set_schema_version(1)?;
        }

        // Migration 2: Provider column for cross-provider replay comparisons
        if current_version < 2 {
            info!("Running migration 2: Add provider to response_cache");
            self.conn.execute_batch(
                r#"
                ALTER TABLE response_cache ADD COLUMN provider TEXT;

                CREATE INDEX IF NOT EXISTS idx_response_cache_session
                    ON response_cache(session, created_at);
                "#,
            )?;
            self.set_schema_version(2)?;
        }

        info!("Migrations complete");
        Ok(())
    }
}
