use crate::types::{BetInfo, DistributionRecord, MatchInfo};
use chrono::{DateTime, Utc};
use matchpool_core::{Result, Storage};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

/// Create the engine's ledger tables on top of the core schema.
pub async fn init_schema(storage: &Storage) -> Result<()> {
    let conn = storage.get_connection().await;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rounds (
            round INTEGER PRIMARY KEY,
            match_count INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS matches (
            handle TEXT PRIMARY KEY,
            round INTEGER NOT NULL,
            position INTEGER NOT NULL,
            outcome_slots INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bets (
            round INTEGER NOT NULL,
            player TEXT NOT NULL,
            id TEXT NOT NULL,
            predictions TEXT NOT NULL,
            cost INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (round, player)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS distributions (
            round INTEGER NOT NULL,
            player TEXT NOT NULL,
            handle TEXT NOT NULL,
            winning_index INTEGER NOT NULL,
            paid INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (round, player, handle)
        )",
        [],
    )?;

    Ok(())
}

fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

pub struct MatchStore<'a> {
    storage: &'a Storage,
}

impl<'a> MatchStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Next unused round index.
    pub async fn next_round(&self) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(round) + 1, 0) FROM rounds",
            [],
            |row| row.get(0),
        )?;

        Ok(next as u64)
    }

    pub async fn insert_round(&self, round: u64, match_count: u32) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO rounds (round, match_count, created_at) VALUES (?1, ?2, ?3)",
            params![round as i64, match_count as i64, Utc::now().timestamp()],
        )?;

        Ok(())
    }

    pub async fn insert_match(&self, info: &MatchInfo) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO matches (handle, round, position, outcome_slots, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                info.handle,
                info.round as i64,
                info.position as i64,
                info.outcome_slots,
                info.created_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    pub async fn match_exists(&self, handle: &str) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM matches WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )
            .optional()?;

        Ok(found.is_some())
    }

    pub async fn round_matches(&self, round: u64) -> Result<Vec<MatchInfo>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT handle, round, position, outcome_slots, created_at
             FROM matches WHERE round = ?1 ORDER BY position ASC",
        )?;

        let match_iter = stmt.query_map(params![round as i64], |row| {
            let round: i64 = row.get(1)?;
            let position: i64 = row.get(2)?;
            let created_at: i64 = row.get(4)?;

            Ok(MatchInfo {
                handle: row.get(0)?,
                round: round as u64,
                position: position as u32,
                outcome_slots: row.get(3)?,
                created_at: timestamp_to_datetime(created_at),
            })
        })?;

        let mut matches = Vec::new();
        for info in match_iter {
            matches.push(info?);
        }

        Ok(matches)
    }
}

pub struct BetStore<'a> {
    storage: &'a Storage,
}

impl<'a> BetStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn insert_bet(&self, bet: &BetInfo) -> Result<()> {
        let conn = self.storage.get_connection().await;

        let predictions_json = serde_json::to_string(&bet.predictions)?;
        conn.execute(
            "INSERT INTO bets (round, player, id, predictions, cost, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                bet.round as i64,
                bet.player,
                bet.id.to_string(),
                predictions_json,
                bet.cost as i64,
                bet.created_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    pub async fn get_bet(&self, round: u64, player: &str) -> Result<Option<BetInfo>> {
        let conn = self.storage.get_connection().await;

        let bet = conn
            .query_row(
                "SELECT round, player, id, predictions, cost, created_at
                 FROM bets WHERE round = ?1 AND player = ?2",
                params![round as i64, player],
                Self::map_row,
            )
            .optional()?;

        Ok(bet)
    }

    /// All bets of a round, in placement order.
    pub async fn round_bets(&self, round: u64) -> Result<Vec<BetInfo>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT round, player, id, predictions, cost, created_at
             FROM bets WHERE round = ?1 ORDER BY created_at ASC, player ASC",
        )?;

        let bet_iter = stmt.query_map(params![round as i64], Self::map_row)?;

        let mut bets = Vec::new();
        for bet in bet_iter {
            bets.push(bet?);
        }

        Ok(bets)
    }

    pub async fn bettor_count(&self, round: u64) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bets WHERE round = ?1",
            params![round as i64],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BetInfo> {
        let round: i64 = row.get(0)?;
        let id_str: String = row.get(2)?;
        let predictions_str: String = row.get(3)?;
        let cost: i64 = row.get(4)?;
        let created_at: i64 = row.get(5)?;

        let id = Uuid::parse_str(&id_str).map_err(|_| {
            rusqlite::Error::InvalidColumnType(2, "id".to_string(), rusqlite::types::Type::Text)
        })?;

        let predictions: Vec<u8> = serde_json::from_str(&predictions_str).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                3,
                "predictions".to_string(),
                rusqlite::types::Type::Text,
            )
        })?;

        Ok(BetInfo {
            round: round as u64,
            player: row.get(1)?,
            id,
            predictions,
            cost: cost as u64,
            created_at: timestamp_to_datetime(created_at),
        })
    }
}

pub struct DistributionStore<'a> {
    storage: &'a Storage,
}

impl<'a> DistributionStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn insert(&self, record: &DistributionRecord) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO distributions (round, player, handle, winning_index, paid, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.round as i64,
                record.player,
                record.handle,
                record.winning_index,
                record.paid as i64,
                record.created_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    pub async fn get(
        &self,
        round: u64,
        player: &str,
        handle: &str,
    ) -> Result<Option<DistributionRecord>> {
        let conn = self.storage.get_connection().await;

        let record = conn
            .query_row(
                "SELECT round, player, handle, winning_index, paid, created_at
                 FROM distributions WHERE round = ?1 AND player = ?2 AND handle = ?3",
                params![round as i64, player, handle],
                Self::map_row,
            )
            .optional()?;

        Ok(record)
    }

    /// Abort an in-flight settlement whose payout could not be completed.
    pub async fn remove(&self, round: u64, player: &str, handle: &str) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "DELETE FROM distributions WHERE round = ?1 AND player = ?2 AND handle = ?3",
            params![round as i64, player, handle],
        )?;

        Ok(())
    }

    pub async fn player_records(
        &self,
        round: u64,
        player: &str,
    ) -> Result<Vec<DistributionRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT round, player, handle, winning_index, paid, created_at
             FROM distributions WHERE round = ?1 AND player = ?2 ORDER BY created_at ASC",
        )?;

        let record_iter = stmt.query_map(params![round as i64, player], Self::map_row)?;

        let mut records = Vec::new();
        for record in record_iter {
            records.push(record?);
        }

        Ok(records)
    }

    /// Total paid so far across all players for one match.
    pub async fn paid_total(&self, round: u64, handle: &str) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(paid), 0) FROM distributions WHERE round = ?1 AND handle = ?2",
            params![round as i64, handle],
            |row| row.get(0),
        )?;

        Ok(total as u64)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DistributionRecord> {
        let round: i64 = row.get(0)?;
        let paid: i64 = row.get(4)?;
        let created_at: i64 = row.get(5)?;

        Ok(DistributionRecord {
            round: round as u64,
            player: row.get(1)?,
            handle: row.get(2)?,
            winning_index: row.get(3)?,
            paid: paid as u64,
            created_at: timestamp_to_datetime(created_at),
        })
    }
}
