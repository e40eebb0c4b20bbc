use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collateral amount in fixed-point base units.
///
/// All accounting is integer-only; the number of decimals is a convention
/// between the engine operator and the collateral asset (e.g. 1_000_000
/// base units = 1.0 with six decimals).
pub type Amount = u64;

/// Byte length of an opaque match handle.
pub const HANDLE_LEN: usize = 32;

/// Validate an opaque match handle and normalize it to lowercase hex.
///
/// Handles are 32-byte identifiers assigned by the external resolution
/// service, accepted with or without a `0x` prefix.
pub fn normalize_handle(handle: &str) -> Result<String> {
    let trimmed = handle.strip_prefix("0x").unwrap_or(handle);
    let bytes =
        hex::decode(trimmed).map_err(|_| CoreError::InvalidHandle(handle.to_string()))?;
    if bytes.len() != HANDLE_LEN {
        return Err(CoreError::InvalidHandle(handle.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub owner: String,
    pub balance: Amount,
}

/// A condition registered with the resolution authority.
///
/// `winning_index` stays `None` until the oracle reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionInfo {
    pub handle: String,
    pub outcome_slots: u8,
    pub winning_index: Option<u8>,
    pub reported_at: Option<DateTime<Utc>>,
}

impl ConditionInfo {
    pub fn is_resolved(&self) -> bool {
        self.winning_index.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_prefixed_handles() {
        let handle = format!("0x{}", "AB".repeat(32));
        assert_eq!(normalize_handle(&handle).unwrap(), "ab".repeat(32));
    }

    #[test]
    fn rejects_short_handles() {
        assert!(matches!(
            normalize_handle("0xdeadbeef"),
            Err(CoreError::InvalidHandle(_))
        ));
    }

    #[test]
    fn rejects_non_hex_handles() {
        assert!(matches!(
            normalize_handle(&"zz".repeat(32)),
            Err(CoreError::InvalidHandle(_))
        ));
    }
}
