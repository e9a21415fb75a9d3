//! PostgreSQL account store
//!
//! Row locks are plain `SELECT ... FOR UPDATE`; guarded debits are a single
//! conditional `UPDATE ... WHERE balance >= $n RETURNING ...` so the check
//! and the write cannot be separated by another transaction.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;

use super::{AccountStore, BalanceGuard, StoreError, UnitOfWork};
use crate::account::{Account, AccountId, InvalidAccountId};
use crate::transfer::TransferRecord;

/// SQLSTATE codes mapped onto [`StoreError`] variants.
mod sqlstate {
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(sqlstate::LOCK_NOT_AVAILABLE) | Some(sqlstate::DEADLOCK_DETECTED) => {
                    StoreError::LockTimeout
                }
                Some(sqlstate::CHECK_VIOLATION) => StoreError::NoRowsAffected,
                Some(sqlstate::NUMERIC_VALUE_OUT_OF_RANGE) => StoreError::Overflow,
                _ => StoreError::Backend(e.to_string()),
            },
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

impl From<InvalidAccountId> for StoreError {
    fn from(e: InvalidAccountId) -> Self {
        StoreError::Backend(format!("stored row is corrupt: {e}"))
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: AccountId::try_from(row.try_get::<i64, _>("id")?)?,
        name: row.try_get("name")?,
        balance: row.try_get("balance")?,
    })
}

fn transfer_from_row(row: &PgRow) -> Result<TransferRecord, StoreError> {
    Ok(TransferRecord {
        seq: row.try_get("seq")?,
        from: AccountId::try_from(row.try_get::<i64, _>("from_id")?)?,
        to: AccountId::try_from(row.try_get::<i64, _>("to_id")?)?,
        amount: row.try_get("amount")?,
        created_at: row.try_get("created_at")?,
    })
}

/// [`AccountStore`] backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgAccountStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

/// Unit of work wrapping a sqlx transaction.
///
/// sqlx rolls back a transaction that is dropped before commit, which also
/// releases every `FOR UPDATE` lock it took.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let mut tx = self.pool.begin().await?;

        // is_local = true scopes the setting to this transaction
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            // '0ms' would disable the timeout entirely
            .bind(format!("{}ms", self.lock_timeout.as_millis().max(1)))
            .execute(&mut *tx)
            .await?;

        Ok(PgUnitOfWork { tx })
    }

    async fn get(&self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query("SELECT id, name, balance FROM accounts WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        account_from_row(&row)
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query("SELECT id, name, balance FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(account_from_row).collect()
    }

    async fn create(&self, name: &str) -> Result<Account, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidInput("name required".to_string()));
        }

        let row = sqlx::query(
            "INSERT INTO accounts (name, balance) VALUES ($1, 0) RETURNING id, name, balance",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        account_from_row(&row)
    }

    async fn get_for_update(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query("SELECT id, name, balance FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx.tx)
            .await?
            .ok_or(StoreError::NotFound)?;
        account_from_row(&row)
    }

    async fn adjust_balance(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
        delta: i64,
        guard: BalanceGuard,
    ) -> Result<Account, StoreError> {
        let row = match guard {
            BalanceGuard::Unchecked => {
                sqlx::query(
                    "UPDATE accounts SET balance = balance + $1 WHERE id = $2 \
                     RETURNING id, name, balance",
                )
                .bind(delta)
                .bind(id.get())
                .fetch_optional(&mut *tx.tx)
                .await?
            }
            BalanceGuard::Covers(required) => {
                sqlx::query(
                    "UPDATE accounts SET balance = balance + $1 WHERE id = $2 AND balance >= $3 \
                     RETURNING id, name, balance",
                )
                .bind(delta)
                .bind(id.get())
                .bind(required)
                .fetch_optional(&mut *tx.tx)
                .await?
            }
        };

        let row = row.ok_or(StoreError::NoRowsAffected)?;
        account_from_row(&row)
    }

    async fn record_transfer(
        &self,
        tx: &mut Self::Tx,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<TransferRecord, StoreError> {
        let row = sqlx::query(
            "INSERT INTO transfers (from_id, to_id, amount) VALUES ($1, $2, $3) \
             RETURNING seq, from_id, to_id, amount, created_at",
        )
        .bind(from.get())
        .bind(to.get())
        .bind(amount)
        .fetch_one(&mut *tx.tx)
        .await?;
        transfer_from_row(&row)
    }

    async fn list_transfers(&self) -> Result<Vec<TransferRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT seq, from_id, to_id, amount, created_at FROM transfers ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(transfer_from_row).collect()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_unavailable() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
        assert_eq!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NotFound);
    }

    #[test]
    fn test_corrupt_stored_id_is_backend_error() {
        let err = StoreError::from(InvalidAccountId(0));
        assert!(matches!(err, StoreError::Backend(msg) if msg.contains("got 0")));
    }
}
