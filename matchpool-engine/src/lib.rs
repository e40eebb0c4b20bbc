//! matchpool-engine - pool-based prediction-pool settlement
//!
//! Players stake a fixed amount per match to predict the outcomes of a
//! round of matches. Once the oracle reports final outcomes, each match's
//! collateral pool is split equally among the players who predicted it
//! correctly. Betting is cheap and one-shot per round; all settlement work
//! happens at distribution time, only for resolved matches.

pub mod distribution;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod registry;
pub mod store;
pub mod types;

pub use engine::{Matchpool, MatchpoolConfig};
pub use error::{MatchpoolError, Result};
pub use events::EngineEvent;
pub use registry::SUPPORTED_CARDINALITIES;
pub use types::{BetInfo, DistributionRecord, MatchInfo, PoolReport};

pub use matchpool_core::{
    normalize_handle, Amount, CollateralEscrow, CollateralVault, CoreError, OutcomeReporter,
    ResolutionAuthority, Storage,
};
