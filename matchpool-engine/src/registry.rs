use crate::error::{MatchpoolError, Result};
use crate::store::MatchStore;
use crate::types::MatchInfo;
use chrono::Utc;
use matchpool_core::{normalize_handle, ResolutionAuthority, Storage};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome cardinalities the engine supports: binary and three-way matches.
pub const SUPPORTED_CARDINALITIES: [u8; 2] = [2, 3];

/// Owner-curated catalogue of matches, grouped into rounds by registration.
///
/// One `add_matches` call allocates exactly one round; round indices are
/// monotonically increasing and matches are immutable once registered.
pub struct MatchRegistry {
    storage: Arc<Storage>,
    resolution: Arc<dyn ResolutionAuthority>,
    owner: String,
    rounds: RwLock<HashMap<u64, Vec<MatchInfo>>>,
}

impl MatchRegistry {
    pub fn new(
        storage: Arc<Storage>,
        resolution: Arc<dyn ResolutionAuthority>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            resolution,
            owner: owner.into(),
            rounds: RwLock::new(HashMap::new()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Register a batch of matches as the next round.
    ///
    /// Each handle is also registered as a condition with the resolution
    /// authority so the external service knows its cardinality.
    pub async fn add_matches(
        &self,
        caller: &str,
        handles: &[String],
        outcome_slots: u8,
    ) -> Result<(u64, Vec<MatchInfo>)> {
        if caller != self.owner {
            return Err(MatchpoolError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        if !SUPPORTED_CARDINALITIES.contains(&outcome_slots) {
            return Err(MatchpoolError::InvalidOutcomeCardinality(outcome_slots));
        }
        if handles.is_empty() {
            return Err(MatchpoolError::EmptyRound);
        }

        let mut normalized: Vec<String> = Vec::with_capacity(handles.len());
        for handle in handles {
            let handle = normalize_handle(handle)?;
            if normalized.contains(&handle) {
                return Err(MatchpoolError::DuplicateMatch(handle));
            }
            normalized.push(handle);
        }

        let store = MatchStore::new(&self.storage);
        for handle in &normalized {
            if store.match_exists(handle).await? {
                return Err(MatchpoolError::DuplicateMatch(handle.clone()));
            }
        }

        let round = store.next_round().await?;

        // Register conditions first: a match the resolution service does
        // not know about could never be settled.
        for handle in &normalized {
            self.resolution
                .prepare_condition(handle, outcome_slots)
                .await?;
        }

        let now = Utc::now();
        let mut infos = Vec::with_capacity(normalized.len());
        for (position, handle) in normalized.iter().enumerate() {
            let info = MatchInfo {
                handle: handle.clone(),
                round,
                position: position as u32,
                outcome_slots,
                created_at: now,
            };
            store.insert_match(&info).await?;
            infos.push(info);
        }
        store.insert_round(round, infos.len() as u32).await?;

        self.rounds.write().insert(round, infos.clone());

        tracing::info!(
            "Registered {} matches with {} outcome slots as round {}",
            infos.len(),
            outcome_slots,
            round
        );
        Ok((round, infos))
    }

    /// Matches of a round in registration order; empty for unknown rounds.
    pub async fn round_matches(&self, round: u64) -> Result<Vec<MatchInfo>> {
        if let Some(matches) = self.rounds.read().get(&round) {
            return Ok(matches.clone());
        }

        let matches = MatchStore::new(&self.storage).round_matches(round).await?;
        if !matches.is_empty() {
            self.rounds.write().insert(round, matches.clone());
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchpool_core::{CoreError, OutcomeReporter};
    use tempfile::tempdir;

    fn handle(byte: u8) -> String {
        hex::encode([byte; 32])
    }

    async fn registry() -> (tempfile::TempDir, MatchRegistry) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(
            Storage::new(&dir.path().join("registry.db"))
                .await
                .unwrap(),
        );
        crate::store::init_schema(&storage).await.unwrap();
        let reporter = Arc::new(OutcomeReporter::new(storage.clone(), "oracle"));
        (dir, MatchRegistry::new(storage, reporter, "owner"))
    }

    #[tokio::test]
    async fn each_call_allocates_the_next_round() {
        let (_dir, registry) = registry().await;

        let (first, _) = registry
            .add_matches("owner", &[handle(1), handle(2)], 3)
            .await
            .unwrap();
        let (second, _) = registry
            .add_matches("owner", &[handle(3)], 2)
            .await
            .unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, 1);

        let matches = registry.round_matches(0).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].handle, handle(1));
        assert_eq!(matches[1].position, 1);
    }

    #[tokio::test]
    async fn non_owner_registration_is_rejected() {
        let (_dir, registry) = registry().await;

        let err = registry
            .add_matches("mallory", &[handle(1)], 2)
            .await
            .unwrap_err();

        assert!(matches!(err, MatchpoolError::Unauthorized { .. }));
        assert!(registry.round_matches(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_cardinalities_are_rejected() {
        let (_dir, registry) = registry().await;

        for slots in [0u8, 1, 4, 255] {
            let err = registry
                .add_matches("owner", &[handle(slots)], slots)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                MatchpoolError::InvalidOutcomeCardinality(s) if s == slots
            ));
        }

        registry.add_matches("owner", &[handle(10)], 2).await.unwrap();
        registry.add_matches("owner", &[handle(11)], 3).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_handles_are_rejected() {
        let (_dir, registry) = registry().await;

        let err = registry
            .add_matches("owner", &[handle(1), handle(1)], 2)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchpoolError::DuplicateMatch(_)));

        registry.add_matches("owner", &[handle(1)], 2).await.unwrap();
        let err = registry
            .add_matches("owner", &[handle(1)], 2)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchpoolError::DuplicateMatch(_)));
    }

    #[tokio::test]
    async fn empty_batches_and_bad_handles_are_rejected() {
        let (_dir, registry) = registry().await;

        assert!(matches!(
            registry.add_matches("owner", &[], 2).await,
            Err(MatchpoolError::EmptyRound)
        ));
        assert!(matches!(
            registry
                .add_matches("owner", &["not-a-handle".to_string()], 2)
                .await,
            Err(MatchpoolError::Core(CoreError::InvalidHandle(_)))
        ));
    }
}
