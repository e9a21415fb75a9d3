//! Account Store
//!
//! The only owner of persisted account rows. Everything above this layer
//! reaches accounts through [`AccountStore`] and mutates them inside a
//! [`UnitOfWork`].
//!
//! # Backends
//!
//! - [`PgAccountStore`]: PostgreSQL, row locks via `SELECT ... FOR UPDATE`
//! - [`MemoryAccountStore`]: in-process, one async mutex per row
//!
//! Both backends give the same guarantees:
//!
//! 1. **Row locks live as long as the unit of work**: released on commit,
//!    rollback or drop.
//! 2. **Bounded lock waits**: a wait longer than the configured lock timeout
//!    fails with [`StoreError::LockTimeout`].
//! 3. **Guarded writes**: `adjust_balance` checks its [`BalanceGuard`] in the
//!    same step as the write and never produces a negative balance.
//! 4. **No partial effects**: nothing staged in a unit of work is visible to
//!    plain reads until commit.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::account::{Account, AccountId};
use crate::transfer::TransferRecord;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

/// Condition checked atomically with a balance update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceGuard {
    /// Only the non-negative balance invariant applies (credits).
    Unchecked,
    /// The current balance must be at least this much (debits).
    Covers(i64),
}

impl BalanceGuard {
    /// Whether the update `balance + delta` may be applied.
    pub fn admits(self, balance: i64, delta: i64) -> bool {
        let covered = match self {
            BalanceGuard::Unchecked => true,
            BalanceGuard::Covers(required) => balance >= required,
        };
        covered && balance.checked_add(delta).is_some_and(|next| next >= 0)
    }
}

/// Store-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("account not found")]
    NotFound,

    /// Guard failed or the row does not exist. Callers tell the two apart
    /// with a prior existence check.
    #[error("no rows affected")]
    NoRowsAffected,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("balance would overflow")]
    Overflow,

    #[error("timed out waiting for row lock")]
    LockTimeout,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Backend(String),
}

/// An open transaction.
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] rolls it
/// back and releases every row lock it holds.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Roll back `tx`, logging rather than returning a rollback failure.
///
/// Used on paths that already carry the error the caller should see.
pub(crate) async fn discard<U: UnitOfWork>(tx: U) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed; transaction is void");
    }
}

/// Persistent account rows plus the transfer journal.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    type Tx: UnitOfWork;

    /// Open a unit of work with the store's lock timeout applied.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Plain read of the last committed row. Never waits on row locks.
    async fn get(&self, id: AccountId) -> Result<Account, StoreError>;

    /// All committed accounts ordered by id.
    async fn list(&self) -> Result<Vec<Account>, StoreError>;

    /// Insert a new account with balance 0.
    async fn create(&self, name: &str) -> Result<Account, StoreError>;

    /// Read a row under an exclusive lock held until `tx` ends.
    async fn get_for_update(&self, tx: &mut Self::Tx, id: AccountId)
    -> Result<Account, StoreError>;

    /// Apply `delta` to the balance if `guard` admits it.
    ///
    /// Returns [`StoreError::NoRowsAffected`] when the guard fails or the row
    /// does not exist.
    async fn adjust_balance(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
        delta: i64,
        guard: BalanceGuard,
    ) -> Result<Account, StoreError>;

    /// Append a journal entry for a transfer inside `tx`.
    async fn record_transfer(
        &self,
        tx: &mut Self::Tx,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<TransferRecord, StoreError>;

    /// Committed journal entries ordered by sequence number.
    async fn list_transfers(&self) -> Result<Vec<TransferRecord>, StoreError>;

    /// Cheap liveness check.
    async fn health_check(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_covers() {
        assert!(BalanceGuard::Covers(50).admits(50, -50));
        assert!(BalanceGuard::Covers(50).admits(80, -50));
        assert!(!BalanceGuard::Covers(50).admits(49, -50));
    }

    #[test]
    fn test_guard_unchecked_still_refuses_negative() {
        assert!(BalanceGuard::Unchecked.admits(0, 10));
        assert!(!BalanceGuard::Unchecked.admits(5, -6));
    }

    #[test]
    fn test_guard_refuses_overflow() {
        assert!(!BalanceGuard::Unchecked.admits(i64::MAX, 1));
    }
}
