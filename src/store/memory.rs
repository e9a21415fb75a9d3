//! In-process account store
//!
//! Committed rows live in a [`DashMap`]. Each row has its own
//! [`tokio::sync::Mutex`] acting as the row lock; a unit of work keeps the
//! owned guards for every row it touched and stages its changes privately
//! until commit.
//!
//! Commits publish under the write side of a gate that plain reads take for
//! read, so a reader sees all of a commit or none of it.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{AccountStore, BalanceGuard, StoreError, UnitOfWork};
use crate::account::{Account, AccountId};
use crate::transfer::TransferRecord;

struct Inner {
    rows: DashMap<AccountId, Account>,
    row_locks: DashMap<AccountId, Arc<Mutex<()>>>,
    journal: RwLock<Vec<TransferRecord>>,
    commit_gate: RwLock<()>,
    next_account_id: AtomicI64,
    next_seq: AtomicI64,
    lock_timeout: Duration,
}

/// In-memory [`AccountStore`] with the same locking semantics as PostgreSQL.
#[derive(Clone)]
pub struct MemoryAccountStore {
    inner: Arc<Inner>,
}

impl MemoryAccountStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                rows: DashMap::new(),
                row_locks: DashMap::new(),
                journal: RwLock::new(Vec::new()),
                commit_gate: RwLock::new(()),
                next_account_id: AtomicI64::new(1),
                next_seq: AtomicI64::new(1),
                lock_timeout,
            }),
        }
    }

    /// Acquire the row lock for `id` unless `tx` already holds it.
    async fn lock_row(&self, tx: &mut MemoryUnitOfWork, id: AccountId) -> Result<(), StoreError> {
        if tx.held.contains_key(&id) {
            return Ok(());
        }

        let row_lock = self
            .inner
            .row_locks
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StoreError::NotFound)?;

        let guard = tokio::time::timeout(self.inner.lock_timeout, row_lock.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(account_id = %id, "row lock wait timed out");
                StoreError::LockTimeout
            })?;

        tx.held.insert(id, guard);
        Ok(())
    }

    fn committed(&self, id: AccountId) -> Result<Account, StoreError> {
        self.inner
            .rows
            .get(&id)
            .map(|row| row.value().clone())
            .ok_or(StoreError::NotFound)
    }
}

/// Unit of work for [`MemoryAccountStore`].
pub struct MemoryUnitOfWork {
    inner: Arc<Inner>,
    // BTreeMap so guards are released in id order on drop
    held: BTreeMap<AccountId, OwnedMutexGuard<()>>,
    staged: HashMap<AccountId, Account>,
    journal: Vec<TransferRecord>,
}

impl MemoryUnitOfWork {
    fn view(&self, store: &MemoryAccountStore, id: AccountId) -> Result<Account, StoreError> {
        match self.staged.get(&id) {
            Some(account) => Ok(account.clone()),
            None => store.committed(id),
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self) -> Result<(), StoreError> {
        let _publish = self.inner.commit_gate.write().await;
        if !self.journal.is_empty() {
            let mut journal = self.inner.journal.write().await;
            journal.append(&mut self.journal);
        }
        for (id, account) in self.staged.drain() {
            self.inner.rows.insert(id, account);
        }
        // row locks are released when `self.held` drops here
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        tracing::debug!(locks = self.held.len(), "rolling back unit of work");
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    type Tx = MemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(MemoryUnitOfWork {
            inner: Arc::clone(&self.inner),
            held: BTreeMap::new(),
            staged: HashMap::new(),
            journal: Vec::new(),
        })
    }

    async fn get(&self, id: AccountId) -> Result<Account, StoreError> {
        let _snapshot = self.inner.commit_gate.read().await;
        self.committed(id)
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        let _snapshot = self.inner.commit_gate.read().await;
        let mut accounts: Vec<Account> = self
            .inner
            .rows
            .iter()
            .map(|row| row.value().clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }

    async fn create(&self, name: &str) -> Result<Account, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidInput("name required".to_string()));
        }

        let raw = self.inner.next_account_id.fetch_add(1, Ordering::SeqCst);
        let id = AccountId::new(raw)
            .ok_or_else(|| StoreError::Backend(format!("account id sequence produced {raw}")))?;
        let account = Account {
            id,
            name: name.to_string(),
            balance: 0,
        };

        self.inner.row_locks.insert(id, Arc::new(Mutex::new(())));
        self.inner.rows.insert(id, account.clone());
        Ok(account)
    }

    async fn get_for_update(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
    ) -> Result<Account, StoreError> {
        self.lock_row(tx, id).await?;
        tx.view(self, id)
    }

    async fn adjust_balance(
        &self,
        tx: &mut Self::Tx,
        id: AccountId,
        delta: i64,
        guard: BalanceGuard,
    ) -> Result<Account, StoreError> {
        match self.lock_row(tx, id).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(StoreError::NoRowsAffected),
            Err(e) => return Err(e),
        }

        let mut account = tx.view(self, id).map_err(|_| StoreError::NoRowsAffected)?;
        let next = account
            .balance
            .checked_add(delta)
            .ok_or(StoreError::Overflow)?;
        if !guard.admits(account.balance, delta) {
            return Err(StoreError::NoRowsAffected);
        }

        account.balance = next;
        tx.staged.insert(id, account.clone());
        Ok(account)
    }

    async fn record_transfer(
        &self,
        tx: &mut Self::Tx,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<TransferRecord, StoreError> {
        // same constraints as the transfers table
        if amount <= 0 {
            return Err(StoreError::InvalidInput("amount must be greater than 0".to_string()));
        }
        let record = TransferRecord {
            seq: self.inner.next_seq.fetch_add(1, Ordering::SeqCst),
            from,
            to,
            amount,
            created_at: Utc::now(),
        };
        tx.journal.push(record.clone());
        Ok(record)
    }

    async fn list_transfers(&self) -> Result<Vec<TransferRecord>, StoreError> {
        let _snapshot = self.inner.commit_gate.read().await;
        let mut records = self.inner.journal.read().await.clone();
        records.sort_by_key(|record| record.seq);
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
