//! matchpool-core - platform primitives for the matchpool settlement engine
//!
//! This crate provides the SQLite-backed storage layer plus in-process
//! stand-ins for the engine's two external collaborators: the fungible
//! collateral asset (escrow vault) and the outcome resolution service
//! (oracle-reported conditions).

pub mod error;
pub mod escrow;
pub mod resolution;
pub mod storage;
pub mod types;

pub use error::{CoreError, Result};
pub use escrow::{CollateralEscrow, CollateralVault};
pub use resolution::{OutcomeReporter, ResolutionAuthority};
pub use storage::Storage;
pub use types::{normalize_handle, AccountBalance, Amount, ConditionInfo, HANDLE_LEN};
