use crate::error::{CoreError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

/// SQLite-backed storage shared by the vault, the resolution authority and
/// the engine's ledgers. All access goes through a single connection guarded
/// by an async mutex, so statements from one caller never interleave with
/// another's.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Collateral accounts
        conn.execute(
            "CREATE TABLE IF NOT EXISTS accounts (
                owner TEXT PRIMARY KEY,
                balance INTEGER NOT NULL
            )",
            [],
        )?;

        // Spending allowances
        conn.execute(
            "CREATE TABLE IF NOT EXISTS allowances (
                owner TEXT NOT NULL,
                spender TEXT NOT NULL,
                amount INTEGER NOT NULL,
                PRIMARY KEY (owner, spender)
            )",
            [],
        )?;

        // Resolution conditions; winning_index is NULL until reported
        conn.execute(
            "CREATE TABLE IF NOT EXISTS conditions (
                handle TEXT PRIMARY KEY,
                outcome_slots INTEGER NOT NULL,
                winning_index INTEGER,
                reported_at INTEGER
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
