use crate::error::{CoreError, Result};
use crate::storage::Storage;
use crate::types::{AccountBalance, Amount};
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

/// Transfer primitive for the fungible collateral asset.
///
/// `pull` moves funds from a player's account into engine custody and
/// requires a prior allowance; `push` moves funds out of custody. Amounts
/// are exact integers in collateral base units.
#[async_trait]
pub trait CollateralEscrow: Send + Sync {
    async fn pull(&self, from: &str, amount: Amount) -> Result<()>;
    async fn push(&self, to: &str, amount: Amount) -> Result<()>;
}

/// Storage-backed collateral vault with ERC20-like semantics.
///
/// Escrowed funds live on the custodian account; `mint` and `approve` exist
/// so operators and test harnesses can fund players and grant the custodian
/// spending rights.
pub struct CollateralVault {
    storage: Arc<Storage>,
    custodian: String,
}

impl CollateralVault {
    pub fn new(storage: Arc<Storage>, custodian: impl Into<String>) -> Self {
        Self {
            storage,
            custodian: custodian.into(),
        }
    }

    pub fn custodian(&self) -> &str {
        &self.custodian
    }

    pub async fn mint(&self, to: &str, amount: Amount) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO accounts (owner, balance) VALUES (?1, ?2)
             ON CONFLICT(owner) DO UPDATE SET balance = balance + ?2",
            params![to, amount as i64],
        )?;

        tracing::debug!("Minted {} units to {}", amount, to);
        Ok(())
    }

    /// Grant `spender` the right to pull up to `amount` units from `owner`.
    pub async fn approve(&self, owner: &str, spender: &str, amount: Amount) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO allowances (owner, spender, amount) VALUES (?1, ?2, ?3)",
            params![owner, spender, amount as i64],
        )?;

        Ok(())
    }

    pub async fn balance_of(&self, owner: &str) -> Result<Amount> {
        let conn = self.storage.get_connection().await;

        let balance: Option<i64> = conn
            .query_row(
                "SELECT balance FROM accounts WHERE owner = ?1",
                params![owner],
                |row| row.get(0),
            )
            .optional()?;

        Ok(balance.unwrap_or(0) as u64)
    }

    /// Every account and its balance, for conservation audits.
    pub async fn balances(&self) -> Result<Vec<AccountBalance>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare("SELECT owner, balance FROM accounts ORDER BY owner ASC")?;
        let balance_iter = stmt.query_map([], |row| {
            let balance: i64 = row.get(1)?;
            Ok(AccountBalance {
                owner: row.get(0)?,
                balance: balance as u64,
            })
        })?;

        let mut balances = Vec::new();
        for balance in balance_iter {
            balances.push(balance?);
        }

        Ok(balances)
    }

    pub async fn allowance(&self, owner: &str, spender: &str) -> Result<Amount> {
        let conn = self.storage.get_connection().await;

        let amount: Option<i64> = conn
            .query_row(
                "SELECT amount FROM allowances WHERE owner = ?1 AND spender = ?2",
                params![owner, spender],
                |row| row.get(0),
            )
            .optional()?;

        Ok(amount.unwrap_or(0) as u64)
    }
}

#[async_trait]
impl CollateralEscrow for CollateralVault {
    async fn pull(&self, from: &str, amount: Amount) -> Result<()> {
        let mut conn = self.storage.get_connection().await;

        let allowance: Option<i64> = conn
            .query_row(
                "SELECT amount FROM allowances WHERE owner = ?1 AND spender = ?2",
                params![from, self.custodian],
                |row| row.get(0),
            )
            .optional()?;
        let allowance = allowance.unwrap_or(0) as u64;
        if allowance < amount {
            return Err(CoreError::InsufficientAllowance {
                need: amount,
                available: allowance,
            });
        }

        let balance: Option<i64> = conn
            .query_row(
                "SELECT balance FROM accounts WHERE owner = ?1",
                params![from],
                |row| row.get(0),
            )
            .optional()?;
        let balance = balance.unwrap_or(0) as u64;
        if balance < amount {
            return Err(CoreError::InsufficientBalance {
                need: amount,
                available: balance,
            });
        }

        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE allowances SET amount = amount - ?1 WHERE owner = ?2 AND spender = ?3",
            params![amount as i64, from, self.custodian],
        )?;
        tx.execute(
            "UPDATE accounts SET balance = balance - ?1 WHERE owner = ?2",
            params![amount as i64, from],
        )?;
        tx.execute(
            "INSERT INTO accounts (owner, balance) VALUES (?1, ?2)
             ON CONFLICT(owner) DO UPDATE SET balance = balance + ?2",
            params![self.custodian, amount as i64],
        )?;
        tx.commit()?;

        tracing::info!("Pulled {} units from {} into custody", amount, from);
        Ok(())
    }

    async fn push(&self, to: &str, amount: Amount) -> Result<()> {
        let mut conn = self.storage.get_connection().await;

        let balance: Option<i64> = conn
            .query_row(
                "SELECT balance FROM accounts WHERE owner = ?1",
                params![self.custodian],
                |row| row.get(0),
            )
            .optional()?;
        let balance = balance.unwrap_or(0) as u64;
        if balance < amount {
            return Err(CoreError::transfer_failed(format!(
                "custody holds {} units, cannot pay out {}",
                balance, amount
            )));
        }

        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE accounts SET balance = balance - ?1 WHERE owner = ?2",
            params![amount as i64, self.custodian],
        )?;
        tx.execute(
            "INSERT INTO accounts (owner, balance) VALUES (?1, ?2)
             ON CONFLICT(owner) DO UPDATE SET balance = balance + ?2",
            params![to, amount as i64],
        )?;
        tx.commit()?;

        tracing::info!("Pushed {} units from custody to {}", amount, to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn vault() -> (tempfile::TempDir, CollateralVault) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::new(&dir.path().join("vault.db")).await.unwrap());
        (dir, CollateralVault::new(storage, "engine"))
    }

    #[tokio::test]
    async fn pull_moves_funds_into_custody() {
        let (_dir, vault) = vault().await;

        vault.mint("alice", 5_000_000).await.unwrap();
        vault.approve("alice", "engine", 2_000_000).await.unwrap();
        vault.pull("alice", 2_000_000).await.unwrap();

        assert_eq!(vault.balance_of("alice").await.unwrap(), 3_000_000);
        assert_eq!(vault.balance_of("engine").await.unwrap(), 2_000_000);
        assert_eq!(vault.allowance("alice", "engine").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pull_without_allowance_fails() {
        let (_dir, vault) = vault().await;

        vault.mint("alice", 5_000_000).await.unwrap();
        let err = vault.pull("alice", 1_000_000).await.unwrap_err();

        assert!(matches!(
            err,
            CoreError::InsufficientAllowance {
                need: 1_000_000,
                available: 0
            }
        ));
        assert_eq!(vault.balance_of("alice").await.unwrap(), 5_000_000);
    }

    #[tokio::test]
    async fn pull_beyond_balance_fails() {
        let (_dir, vault) = vault().await;

        vault.mint("alice", 500_000).await.unwrap();
        vault.approve("alice", "engine", 1_000_000).await.unwrap();
        let err = vault.pull("alice", 1_000_000).await.unwrap_err();

        assert!(matches!(
            err,
            CoreError::InsufficientBalance {
                need: 1_000_000,
                available: 500_000
            }
        ));
        assert_eq!(vault.allowance("alice", "engine").await.unwrap(), 1_000_000);
    }

    #[tokio::test]
    async fn push_pays_out_of_custody() {
        let (_dir, vault) = vault().await;

        vault.mint("engine", 3_000_000).await.unwrap();
        vault.push("bob", 1_500_000).await.unwrap();

        assert_eq!(vault.balance_of("engine").await.unwrap(), 1_500_000);
        assert_eq!(vault.balance_of("bob").await.unwrap(), 1_500_000);
    }

    #[tokio::test]
    async fn push_beyond_custody_fails() {
        let (_dir, vault) = vault().await;

        let err = vault.push("bob", 1).await.unwrap_err();
        assert!(matches!(err, CoreError::TransferFailed(_)));
        assert_eq!(vault.balance_of("bob").await.unwrap(), 0);
    }
}
