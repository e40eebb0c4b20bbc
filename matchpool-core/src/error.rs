use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Insufficient balance: need {need}, have {available}")]
    InsufficientBalance { need: u64, available: u64 },

    #[error("Insufficient allowance: need {need}, approved {available}")]
    InsufficientAllowance { need: u64, available: u64 },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Unauthorized caller: {caller}")]
    Unauthorized { caller: String },

    #[error("Unknown condition: {0}")]
    UnknownCondition(String),

    #[error("Condition already prepared: {0}")]
    ConditionPrepared(String),

    #[error("Outcome not yet resolved for condition: {0}")]
    NotYetResolved(String),

    #[error("Outcome already reported for condition: {0}")]
    AlreadyReported(String),

    #[error("Invalid outcome index {index} for condition with {slots} slots")]
    InvalidOutcomeIndex { index: u8, slots: u8 },

    #[error("Invalid match handle: {0}")]
    InvalidHandle(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::TransferFailed(msg.into())
    }

    pub fn unauthorized(caller: impl Into<String>) -> Self {
        Self::Unauthorized {
            caller: caller.into(),
        }
    }
}
