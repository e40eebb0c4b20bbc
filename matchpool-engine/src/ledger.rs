use crate::error::{MatchpoolError, Result};
use crate::store::BetStore;
use crate::types::{BetInfo, MatchInfo};
use chrono::Utc;
use matchpool_core::{Amount, CollateralEscrow, CoreError, Storage};
use std::sync::Arc;
use uuid::Uuid;

/// Per-round, per-player bet bookkeeping.
///
/// A bet covers every match of its round and is placed exactly once; the
/// stake is escrowed at placement and no per-outcome positions are
/// materialized until distribution.
pub struct BetLedger {
    storage: Arc<Storage>,
    escrow: Arc<dyn CollateralEscrow>,
    price: Amount,
}

impl BetLedger {
    pub fn new(storage: Arc<Storage>, escrow: Arc<dyn CollateralEscrow>, price: Amount) -> Self {
        Self {
            storage,
            escrow,
            price,
        }
    }

    /// Record a player's predictions for a round and escrow the stake.
    ///
    /// All validation happens before any fund movement; the collateral pull
    /// is the last fallible business step, so a rejected bet never retains
    /// pulled funds.
    pub async fn place_bets(
        &self,
        player: &str,
        round: u64,
        predictions: &[u8],
        matches: &[MatchInfo],
    ) -> Result<BetInfo> {
        if matches.is_empty() {
            return Err(MatchpoolError::RoundUnknown(round));
        }
        if predictions.len() != matches.len() {
            return Err(MatchpoolError::LengthMismatch {
                expected: matches.len(),
                got: predictions.len(),
            });
        }
        for (info, &prediction) in matches.iter().zip(predictions) {
            if prediction >= info.outcome_slots {
                return Err(MatchpoolError::OutcomeIndexOutOfRange {
                    handle: info.handle.clone(),
                    index: prediction,
                    slots: info.outcome_slots,
                });
            }
        }

        let store = BetStore::new(&self.storage);
        if store.get_bet(round, player).await?.is_some() {
            return Err(MatchpoolError::AlreadyBet {
                round,
                player: player.to_string(),
            });
        }

        let cost = self
            .price
            .checked_mul(predictions.len() as u64)
            .ok_or_else(|| CoreError::internal("stake cost overflow"))?;
        self.escrow.pull(player, cost).await?;

        let bet = BetInfo {
            id: Uuid::new_v4(),
            round,
            player: player.to_string(),
            predictions: predictions.to_vec(),
            cost,
            created_at: Utc::now(),
        };
        if let Err(err) = store.insert_bet(&bet).await {
            // Return the stake before surfacing the failure.
            if let Err(refund_err) = self.escrow.push(player, cost).await {
                tracing::error!(
                    "Failed to return {} units to {} after aborted bet: {}",
                    cost,
                    player,
                    refund_err
                );
            }
            return Err(err.into());
        }

        tracing::info!(
            "Player {} staked {} units across {} matches in round {}",
            player,
            cost,
            predictions.len(),
            round
        );
        Ok(bet)
    }
}
