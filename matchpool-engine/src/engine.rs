use crate::distribution::DistributionEngine;
use crate::error::Result;
use crate::events::EngineEvent;
use crate::ledger::BetLedger;
use crate::registry::MatchRegistry;
use crate::store::{self, BetStore, DistributionStore};
use crate::types::{BetInfo, DistributionRecord, MatchInfo, PoolReport};
use matchpool_core::{
    normalize_handle, Amount, CollateralEscrow, CoreError, ResolutionAuthority, Storage,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchpoolConfig {
    /// Identity allowed to register matches.
    pub owner: String,
    /// Fixed per-match stake in collateral base units, constant for the
    /// engine's lifetime.
    pub price: Amount,
    /// Buffer size of the notification channel.
    pub event_capacity: usize,
}

impl MatchpoolConfig {
    pub fn new(owner: impl Into<String>, price: Amount) -> Self {
        Self {
            owner: owner.into(),
            price,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.is_empty() {
            return Err(CoreError::config("owner identity must not be empty").into());
        }
        if self.price == 0 {
            return Err(CoreError::config("stake price must be positive").into());
        }
        if self.event_capacity == 0 {
            return Err(CoreError::config("event capacity must be positive").into());
        }
        Ok(())
    }
}

/// The settlement engine facade: match registry, bet ledger and
/// distribution behind one serialized operation surface.
///
/// Mutating operations run under a single operation lock, so every call
/// executes to completion before the next begins and either fully commits
/// or leaves no trace.
pub struct Matchpool {
    price: Amount,
    storage: Arc<Storage>,
    registry: MatchRegistry,
    ledger: BetLedger,
    distribution: DistributionEngine,
    events: broadcast::Sender<EngineEvent>,
    op_lock: Mutex<()>,
}

impl std::fmt::Debug for Matchpool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matchpool")
            .field("price", &self.price)
            .field("owner", &self.registry.owner())
            .finish_non_exhaustive()
    }
}

impl Matchpool {
    pub async fn new(
        config: MatchpoolConfig,
        storage: Arc<Storage>,
        escrow: Arc<dyn CollateralEscrow>,
        resolution: Arc<dyn ResolutionAuthority>,
    ) -> Result<Self> {
        config.validate()?;
        store::init_schema(&storage).await?;

        let (events, _) = broadcast::channel(config.event_capacity);
        let registry = MatchRegistry::new(storage.clone(), resolution.clone(), config.owner);
        let ledger = BetLedger::new(storage.clone(), escrow.clone(), config.price);
        let distribution =
            DistributionEngine::new(storage.clone(), escrow, resolution, config.price);

        tracing::info!(
            "Matchpool engine ready (owner: {}, price: {} units)",
            registry.owner(),
            config.price
        );
        Ok(Self {
            price: config.price,
            storage,
            registry,
            ledger,
            distribution,
            events,
            op_lock: Mutex::new(()),
        })
    }

    pub fn owner(&self) -> &str {
        self.registry.owner()
    }

    pub fn price(&self) -> Amount {
        self.price
    }

    /// Subscribe to engine notifications. Best-effort: slow receivers lag,
    /// they never block operations.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Register a batch of matches as the next round. Owner only.
    pub async fn add_matches(
        &self,
        caller: &str,
        handles: &[String],
        outcome_slots: u8,
    ) -> Result<u64> {
        let _guard = self.op_lock.lock().await;

        let (round, infos) = self
            .registry
            .add_matches(caller, handles, outcome_slots)
            .await?;
        for info in &infos {
            let _ = self.events.send(EngineEvent::MatchAdded {
                round,
                handle: info.handle.clone(),
                outcome_slots: info.outcome_slots,
            });
        }

        Ok(round)
    }

    /// Place the caller's one-shot bet for a round, escrowing
    /// price x match-count collateral.
    pub async fn place_bets(
        &self,
        player: &str,
        round: u64,
        predictions: &[u8],
    ) -> Result<BetInfo> {
        let _guard = self.op_lock.lock().await;

        let matches = self.registry.round_matches(round).await?;
        let bet = self
            .ledger
            .place_bets(player, round, predictions, &matches)
            .await?;
        let _ = self.events.send(EngineEvent::BetPlaced {
            round,
            player: bet.player.clone(),
            predictions: bet.predictions.clone(),
        });

        Ok(bet)
    }

    /// Settle the caller's share of every resolved match in the round.
    /// Safe to re-invoke as more matches resolve.
    pub async fn distribute_positions(
        &self,
        caller: &str,
        round: u64,
    ) -> Result<Vec<DistributionRecord>> {
        let _guard = self.op_lock.lock().await;

        let matches = self.registry.round_matches(round).await?;
        let records = self.distribution.distribute(caller, round, &matches).await?;
        for record in &records {
            let _ = self.events.send(EngineEvent::Distributed {
                round: record.round,
                player: record.player.clone(),
                handle: record.handle.clone(),
                winning_index: record.winning_index,
                paid: record.paid,
            });
        }

        Ok(records)
    }

    pub async fn round_matches(&self, round: u64) -> Result<Vec<MatchInfo>> {
        self.registry.round_matches(round).await
    }

    pub async fn bet(&self, round: u64, player: &str) -> Result<Option<BetInfo>> {
        Ok(BetStore::new(&self.storage).get_bet(round, player).await?)
    }

    pub async fn round_bettors(&self, round: u64) -> Result<u64> {
        Ok(BetStore::new(&self.storage).bettor_count(round).await?)
    }

    pub async fn distribution(
        &self,
        round: u64,
        player: &str,
        handle: &str,
    ) -> Result<Option<DistributionRecord>> {
        let handle = normalize_handle(handle)?;
        Ok(DistributionStore::new(&self.storage)
            .get(round, player, &handle)
            .await?)
    }

    pub async fn distributions_of(
        &self,
        round: u64,
        player: &str,
    ) -> Result<Vec<DistributionRecord>> {
        Ok(DistributionStore::new(&self.storage)
            .player_records(round, player)
            .await?)
    }

    /// Audit view of one match's pool.
    pub async fn pool_report(&self, round: u64, handle: &str) -> Result<PoolReport> {
        let handle = normalize_handle(handle)?;
        let matches = self.registry.round_matches(round).await?;
        let info = matches
            .iter()
            .find(|m| m.handle == handle)
            .ok_or(CoreError::UnknownCondition(handle))?;

        self.distribution.pool_report(info).await
    }
}
