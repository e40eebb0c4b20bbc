use crate::error::{CoreError, Result};
use crate::storage::Storage;
use crate::types::{normalize_handle, ConditionInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

/// Read-side contract over the external outcome resolution service.
///
/// The engine registers a condition per match at registration time and only
/// ever reads resolution state afterwards; outcomes are authored by the
/// oracle role, never by the engine.
#[async_trait]
pub trait ResolutionAuthority: Send + Sync {
    /// Register a condition with its outcome cardinality. Write-once.
    async fn prepare_condition(&self, handle: &str, outcome_slots: u8) -> Result<()>;

    async fn is_resolved(&self, handle: &str) -> Result<bool>;

    /// The reported winning outcome index. Defined only once resolved;
    /// fails with `NotYetResolved` before the oracle has reported.
    async fn winning_index(&self, handle: &str) -> Result<u8>;
}

/// Storage-backed resolution authority with oracle-gated, write-once
/// outcome reporting.
pub struct OutcomeReporter {
    storage: Arc<Storage>,
    oracle: String,
}

impl OutcomeReporter {
    pub fn new(storage: Arc<Storage>, oracle: impl Into<String>) -> Self {
        Self {
            storage,
            oracle: oracle.into(),
        }
    }

    pub fn oracle(&self) -> &str {
        &self.oracle
    }

    /// Report the final outcome for a condition. Only the configured oracle
    /// identity may report, and each condition resolves exactly once.
    pub async fn report_outcome(
        &self,
        caller: &str,
        handle: &str,
        winning_index: u8,
    ) -> Result<()> {
        if caller != self.oracle {
            return Err(CoreError::unauthorized(caller));
        }

        let handle = normalize_handle(handle)?;
        let conn = self.storage.get_connection().await;

        let row: Option<(u8, Option<u8>)> = conn
            .query_row(
                "SELECT outcome_slots, winning_index FROM conditions WHERE handle = ?1",
                params![handle],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (outcome_slots, reported) = match row {
            Some(row) => row,
            None => return Err(CoreError::UnknownCondition(handle)),
        };
        if reported.is_some() {
            return Err(CoreError::AlreadyReported(handle));
        }
        if winning_index >= outcome_slots {
            return Err(CoreError::InvalidOutcomeIndex {
                index: winning_index,
                slots: outcome_slots,
            });
        }

        conn.execute(
            "UPDATE conditions SET winning_index = ?1, reported_at = ?2 WHERE handle = ?3",
            params![winning_index, Utc::now().timestamp(), handle],
        )?;

        tracing::info!(
            "Condition {} resolved to outcome index {}",
            handle,
            winning_index
        );
        Ok(())
    }

    pub async fn condition(&self, handle: &str) -> Result<Option<ConditionInfo>> {
        let handle = normalize_handle(handle)?;
        let conn = self.storage.get_connection().await;

        let info = conn
            .query_row(
                "SELECT handle, outcome_slots, winning_index, reported_at
                 FROM conditions WHERE handle = ?1",
                params![handle],
                |row| {
                    let reported_at: Option<i64> = row.get(3)?;
                    Ok(ConditionInfo {
                        handle: row.get(0)?,
                        outcome_slots: row.get(1)?,
                        winning_index: row.get(2)?,
                        reported_at: reported_at.and_then(|t| DateTime::from_timestamp(t, 0)),
                    })
                },
            )
            .optional()?;

        Ok(info)
    }
}

#[async_trait]
impl ResolutionAuthority for OutcomeReporter {
    async fn prepare_condition(&self, handle: &str, outcome_slots: u8) -> Result<()> {
        if outcome_slots < 2 {
            return Err(CoreError::config(format!(
                "condition needs at least 2 outcome slots, got {}",
                outcome_slots
            )));
        }

        let handle = normalize_handle(handle)?;
        let conn = self.storage.get_connection().await;

        let inserted = conn.execute(
            "INSERT INTO conditions (handle, outcome_slots) VALUES (?1, ?2)
             ON CONFLICT(handle) DO NOTHING",
            params![handle, outcome_slots],
        )?;
        if inserted == 0 {
            return Err(CoreError::ConditionPrepared(handle));
        }

        tracing::debug!(
            "Prepared condition {} with {} outcome slots",
            handle,
            outcome_slots
        );
        Ok(())
    }

    async fn is_resolved(&self, handle: &str) -> Result<bool> {
        match self.condition(handle).await? {
            Some(info) => Ok(info.is_resolved()),
            None => Err(CoreError::UnknownCondition(handle.to_string())),
        }
    }

    async fn winning_index(&self, handle: &str) -> Result<u8> {
        match self.condition(handle).await? {
            Some(info) => info
                .winning_index
                .ok_or_else(|| CoreError::NotYetResolved(info.handle)),
            None => Err(CoreError::UnknownCondition(handle.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn handle(byte: u8) -> String {
        hex::encode([byte; 32])
    }

    async fn reporter() -> (tempfile::TempDir, OutcomeReporter) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::new(&dir.path().join("outcomes.db")).await.unwrap());
        (dir, OutcomeReporter::new(storage, "oracle"))
    }

    #[tokio::test]
    async fn report_resolves_condition() {
        let (_dir, reporter) = reporter().await;
        let h = handle(1);

        reporter.prepare_condition(&h, 3).await.unwrap();
        assert!(!reporter.is_resolved(&h).await.unwrap());
        assert!(matches!(
            reporter.winning_index(&h).await,
            Err(CoreError::NotYetResolved(_))
        ));

        reporter.report_outcome("oracle", &h, 1).await.unwrap();
        assert!(reporter.is_resolved(&h).await.unwrap());
        assert_eq!(reporter.winning_index(&h).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn only_the_oracle_may_report() {
        let (_dir, reporter) = reporter().await;
        let h = handle(2);

        reporter.prepare_condition(&h, 2).await.unwrap();
        let err = reporter.report_outcome("mallory", &h, 0).await.unwrap_err();

        assert!(matches!(err, CoreError::Unauthorized { .. }));
        assert!(!reporter.is_resolved(&h).await.unwrap());
    }

    #[tokio::test]
    async fn outcomes_are_write_once() {
        let (_dir, reporter) = reporter().await;
        let h = handle(3);

        reporter.prepare_condition(&h, 2).await.unwrap();
        reporter.report_outcome("oracle", &h, 0).await.unwrap();
        let err = reporter.report_outcome("oracle", &h, 1).await.unwrap_err();

        assert!(matches!(err, CoreError::AlreadyReported(_)));
        assert_eq!(reporter.winning_index(&h).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejects_out_of_range_outcome() {
        let (_dir, reporter) = reporter().await;
        let h = handle(4);

        reporter.prepare_condition(&h, 3).await.unwrap();
        let err = reporter.report_outcome("oracle", &h, 3).await.unwrap_err();

        assert!(matches!(
            err,
            CoreError::InvalidOutcomeIndex { index: 3, slots: 3 }
        ));
    }

    #[tokio::test]
    async fn unknown_conditions_are_rejected() {
        let (_dir, reporter) = reporter().await;
        let h = handle(5);

        assert!(matches!(
            reporter.is_resolved(&h).await,
            Err(CoreError::UnknownCondition(_))
        ));
        assert!(matches!(
            reporter.report_outcome("oracle", &h, 0).await,
            Err(CoreError::UnknownCondition(_))
        ));
    }

    #[tokio::test]
    async fn conditions_are_prepare_once() {
        let (_dir, reporter) = reporter().await;
        let h = handle(6);

        reporter.prepare_condition(&h, 2).await.unwrap();
        assert!(matches!(
            reporter.prepare_condition(&h, 3).await,
            Err(CoreError::ConditionPrepared(_))
        ));
    }
}
