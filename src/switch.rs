//! Persisted trading switch
//!
//! A single boolean flag stored in SQLite that operators flip to enable or
//! disable live trading. The decision engine only ever reads the flag; the
//! `switch` subcommand writes it. A storage error surfaces as a typed
//! `Unknown` state instead of silently substituting a stale local value, and
//! the engine treats `Unknown` as disabled.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Name of the flag row the engine consults
const TRADING_FLAG: &str = "trading_enabled";

/// Result of querying the persisted switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Enabled,
    Disabled,
    /// Storage could not be consulted; callers decide the policy
    /// (the engine fails safe and treats this as disabled)
    Unknown,
}

impl SwitchState {
    pub fn is_enabled(self) -> bool {
        self == SwitchState::Enabled
    }
}

/// Read-side contract the decision engine depends on
pub trait TradingSwitch {
    fn state(&self) -> SwitchState;
}

/// SQLite-backed switch store
pub struct SqliteSwitch {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSwitch {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open switch database: {}", db_path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let switch = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        switch.create_tables()?;
        info!("Switch store initialized at {}", db_path.display());

        Ok(switch)
    }

    /// In-memory store for tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let switch = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        switch.create_tables()?;
        Ok(switch)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS switches (
                name TEXT PRIMARY KEY,
                enabled INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Flip the persisted flag (operator surface, never called by the engine)
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO switches (name, enabled, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET enabled = ?2, updated_at = ?3",
            params![TRADING_FLAG, enabled as i64, Utc::now().to_rfc3339()],
        )?;
        info!(
            "Trading switch set to {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    fn query_state(&self) -> Result<SwitchState> {
        let conn = self.conn.lock().unwrap();
        let enabled: Option<i64> = conn
            .query_row(
                "SELECT enabled FROM switches WHERE name = ?1",
                params![TRADING_FLAG],
                |row| row.get(0),
            )
            .optional()?;

        // A missing row means trading was never enabled
        Ok(match enabled {
            Some(v) if v != 0 => SwitchState::Enabled,
            _ => SwitchState::Disabled,
        })
    }
}

impl TradingSwitch for SqliteSwitch {
    fn state(&self) -> SwitchState {
        match self.query_state() {
            Ok(state) => state,
            Err(e) => {
                warn!("Switch store unavailable: {}", e);
                SwitchState::Unknown
            }
        }
    }
}
