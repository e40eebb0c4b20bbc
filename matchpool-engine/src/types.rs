use chrono::{DateTime, Utc};
use matchpool_core::Amount;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered match within a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchInfo {
    pub handle: String,
    pub round: u64,
    /// Registration order within the round; predictions are indexed by it.
    pub position: u32,
    pub outcome_slots: u8,
    pub created_at: DateTime<Utc>,
}

/// A player's one-shot bet covering every match of a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetInfo {
    pub id: Uuid,
    pub round: u64,
    pub player: String,
    pub predictions: Vec<u8>,
    /// Collateral debited at placement: price x match count.
    pub cost: Amount,
    pub created_at: DateTime<Utc>,
}

/// Terminal settlement record for one (round, player, match) cell.
///
/// Existence means the cell is distributed; `paid` is zero for incorrect
/// predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub round: u64,
    pub player: String,
    pub handle: String,
    pub winning_index: u8,
    pub paid: Amount,
    pub created_at: DateTime<Utc>,
}

/// Audit view of one match's collateral pool.
///
/// For a resolved match with winners, `remainder` is the floor-division
/// residue that stays in custody; with zero winners the whole pool is the
/// remainder. Unresolved matches report a zero share and remainder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolReport {
    pub round: u64,
    pub handle: String,
    pub winning_index: Option<u8>,
    pub bettor_count: u64,
    pub pool_total: Amount,
    pub correct_count: u64,
    pub winner_share: Amount,
    pub paid_total: Amount,
    pub remainder: Amount,
}
