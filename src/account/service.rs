//! Single-account operations: create, read, deposit, withdraw

use std::sync::Arc;

use super::models::{Account, AccountId, normalize_name};
use crate::error::{LedgerError, store_failure};
use crate::store::{AccountStore, BalanceGuard, StoreError, UnitOfWork, discard};

pub struct AccountService<S> {
    store: Arc<S>,
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create(&self, name: &str) -> Result<Account, LedgerError> {
        let name = normalize_name(name)
            .ok_or_else(|| LedgerError::InvalidInput("name required".to_string()))?;
        let account = self
            .store
            .create(name)
            .await
            .map_err(|e| store_failure("create account", e))?;
        tracing::info!(account_id = %account.id, name = %account.name, "account created");
        Ok(account)
    }

    pub async fn get(&self, id: AccountId) -> Result<Account, LedgerError> {
        match self.store.get(id).await {
            Ok(account) => Ok(account),
            Err(StoreError::NotFound) => Err(LedgerError::NotFound),
            Err(e) => Err(store_failure("get account", e)),
        }
    }

    pub async fn list(&self) -> Result<Vec<Account>, LedgerError> {
        self.store
            .list()
            .await
            .map_err(|e| store_failure("list accounts", e))
    }

    /// Credit `amount` to an account.
    pub async fn deposit(&self, id: AccountId, amount: i64) -> Result<Account, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let account = self
            .apply(id, amount, BalanceGuard::Unchecked, LedgerError::NotFound)
            .await?;
        tracing::info!(account_id = %id, amount, balance = account.balance, "deposit applied");
        Ok(account)
    }

    /// Debit `amount` from an account.
    ///
    /// The balance pre-check only produces an early error; the guarded update
    /// is what keeps two concurrent withdrawals from overdrawing.
    pub async fn withdraw(&self, id: AccountId, amount: i64) -> Result<Account, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let current = self.get(id).await?;
        if amount > current.balance {
            tracing::warn!(account_id = %id, amount, balance = current.balance, "withdrawal rejected");
            return Err(LedgerError::InsufficientFunds);
        }

        // the row exists, so a failed guard can only mean the funds moved
        let account = self
            .apply(
                id,
                -amount,
                BalanceGuard::Covers(amount),
                LedgerError::InsufficientFunds,
            )
            .await?;
        tracing::info!(account_id = %id, amount, balance = account.balance, "withdrawal applied");
        Ok(account)
    }

    /// One guarded update in its own unit of work.
    async fn apply(
        &self,
        id: AccountId,
        delta: i64,
        guard: BalanceGuard,
        on_no_rows: LedgerError,
    ) -> Result<Account, LedgerError> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| store_failure("begin balance update", e))?;

        let account = match self.store.adjust_balance(&mut tx, id, delta, guard).await {
            Ok(account) => account,
            Err(e) => {
                discard(tx).await;
                return Err(match e {
                    StoreError::NoRowsAffected => on_no_rows,
                    other => store_failure("adjust balance", other),
                });
            }
        };

        if let Err(e) = tx.commit().await {
            tracing::error!(account_id = %id, error = %e, "balance update commit failed");
            return Err(LedgerError::CommitFailed);
        }
        Ok(account)
    }
}
