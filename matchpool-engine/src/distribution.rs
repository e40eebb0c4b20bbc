use crate::error::{MatchpoolError, Result};
use crate::store::{BetStore, DistributionStore};
use crate::types::{DistributionRecord, MatchInfo, PoolReport};
use chrono::Utc;
use matchpool_core::{Amount, CollateralEscrow, CoreError, ResolutionAuthority, Storage};
use std::sync::Arc;

/// Parimutuel settlement of resolved matches.
///
/// Distribution is a self-service claim: each call settles the caller's own
/// share of every resolved, not-yet-distributed match of the round. Matches
/// still awaiting resolution are skipped, so callers re-invoke as more
/// outcomes land; already-settled matches are idempotent no-ops.
pub struct DistributionEngine {
    storage: Arc<Storage>,
    escrow: Arc<dyn CollateralEscrow>,
    resolution: Arc<dyn ResolutionAuthority>,
    price: Amount,
}

impl DistributionEngine {
    pub fn new(
        storage: Arc<Storage>,
        escrow: Arc<dyn CollateralEscrow>,
        resolution: Arc<dyn ResolutionAuthority>,
        price: Amount,
    ) -> Self {
        Self {
            storage,
            escrow,
            resolution,
            price,
        }
    }

    /// Settle the caller's positions for a round. Returns the records
    /// created by this call (skipped matches produce none).
    pub async fn distribute(
        &self,
        caller: &str,
        round: u64,
        matches: &[MatchInfo],
    ) -> Result<Vec<DistributionRecord>> {
        let bet_store = BetStore::new(&self.storage);
        let dist_store = DistributionStore::new(&self.storage);

        let caller_bet =
            bet_store
                .get_bet(round, caller)
                .await?
                .ok_or_else(|| MatchpoolError::NoBetFound {
                    round,
                    player: caller.to_string(),
                })?;

        let round_bets = bet_store.round_bets(round).await?;
        // Every bettor staked on every match, so each match's pool is
        // price x bettors.
        let pool_total = self
            .price
            .checked_mul(round_bets.len() as u64)
            .ok_or_else(|| CoreError::internal("pool total overflow"))?;

        let mut settled = Vec::new();
        for info in matches {
            if !self.resolution.is_resolved(&info.handle).await? {
                tracing::debug!("Match {} not yet resolved, skipping", info.handle);
                continue;
            }
            if dist_store.get(round, caller, &info.handle).await?.is_some() {
                continue;
            }

            let winning_index = self.resolution.winning_index(&info.handle).await?;
            let position = info.position as usize;
            let correct_count = round_bets
                .iter()
                .filter(|bet| bet.predictions.get(position).copied() == Some(winning_index))
                .count() as u64;
            let caller_correct =
                caller_bet.predictions.get(position).copied() == Some(winning_index);

            // Equal split among correct predictors, floored; the division
            // remainder stays in custody.
            let paid = if caller_correct && correct_count > 0 {
                pool_total / correct_count
            } else {
                0
            };

            let record = DistributionRecord {
                round,
                player: caller.to_string(),
                handle: info.handle.clone(),
                winning_index,
                paid,
                created_at: Utc::now(),
            };
            dist_store.insert(&record).await?;

            if paid > 0 {
                if let Err(err) = self.escrow.push(caller, paid).await {
                    // Abort the settlement so a later retry can pay.
                    if let Err(cleanup_err) =
                        dist_store.remove(round, caller, &info.handle).await
                    {
                        tracing::error!(
                            "Failed to roll back settlement of match {} for {}: {}",
                            info.handle,
                            caller,
                            cleanup_err
                        );
                    }
                    return Err(err.into());
                }
            }

            tracing::info!(
                "Distributed {} units to {} for match {} (winning index {})",
                paid,
                caller,
                info.handle,
                winning_index
            );
            settled.push(record);
        }

        Ok(settled)
    }

    /// Audit view of one match's pool: totals, winner share and the
    /// undistributed remainder.
    pub async fn pool_report(&self, info: &MatchInfo) -> Result<PoolReport> {
        let bet_store = BetStore::new(&self.storage);
        let dist_store = DistributionStore::new(&self.storage);

        let round_bets = bet_store.round_bets(info.round).await?;
        let bettor_count = round_bets.len() as u64;
        let pool_total = self
            .price
            .checked_mul(bettor_count)
            .ok_or_else(|| CoreError::internal("pool total overflow"))?;
        let paid_total = dist_store.paid_total(info.round, &info.handle).await?;

        if !self.resolution.is_resolved(&info.handle).await? {
            return Ok(PoolReport {
                round: info.round,
                handle: info.handle.clone(),
                winning_index: None,
                bettor_count,
                pool_total,
                correct_count: 0,
                winner_share: 0,
                paid_total,
                remainder: 0,
            });
        }

        let winning_index = self.resolution.winning_index(&info.handle).await?;
        let position = info.position as usize;
        let correct_count = round_bets
            .iter()
            .filter(|bet| bet.predictions.get(position).copied() == Some(winning_index))
            .count() as u64;

        let winner_share = if correct_count > 0 {
            pool_total / correct_count
        } else {
            0
        };
        let remainder = if correct_count > 0 {
            pool_total - winner_share * correct_count
        } else {
            // Nobody guessed right: the whole pool stays in custody.
            pool_total
        };

        Ok(PoolReport {
            round: info.round,
            handle: info.handle.clone(),
            winning_index: Some(winning_index),
            bettor_count,
            pool_total,
            correct_count,
            winner_share,
            paid_total,
            remainder,
        })
    }
}
