use matchpool_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MatchpoolError>;

#[derive(Error, Debug)]
pub enum MatchpoolError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Unauthorized caller: {caller}")]
    Unauthorized { caller: String },

    #[error("Unsupported outcome cardinality: {0}")]
    InvalidOutcomeCardinality(u8),

    #[error("Round {0} has no matches")]
    RoundUnknown(u64),

    #[error("Prediction count mismatch: round has {expected} matches, got {got} predictions")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Prediction {index} out of range for match {handle} with {slots} outcome slots")]
    OutcomeIndexOutOfRange {
        handle: String,
        index: u8,
        slots: u8,
    },

    #[error("Player {player} already bet in round {round}")]
    AlreadyBet { round: u64, player: String },

    #[error("No bet found for player {player} in round {round}")]
    NoBetFound { round: u64, player: String },

    #[error("Match handle already registered: {0}")]
    DuplicateMatch(String),

    #[error("A round needs at least one match")]
    EmptyRound,
}
