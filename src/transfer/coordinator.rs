//! Transfer Coordinator
//!
//! Runs one transfer as a single unit of work:
//!
//! ```text
//! validate ─▶ begin ─▶ lock(min id) ─▶ lock(max id) ─▶ debit (guarded) ─▶ credit ─▶ journal ─▶ commit
//!                          │                 │               │
//!                          └── not found ────┴── no funds ───┴──▶ rollback
//! ```
//!
//! Both rows are locked before either is written, so nothing can drain the
//! source between the funds check and the debit. The debit still carries its
//! own guard; the lock is the ordering mechanism, the guard is the invariant.

use std::sync::Arc;

use super::types::{TransferOutcome, TransferRecord, TransferRequest, ValidTransfer};
use crate::account::{Account, AccountId};
use crate::error::{LedgerError, store_failure};
use crate::store::{AccountStore, BalanceGuard, StoreError, UnitOfWork, discard};

pub struct TransferCoordinator<S> {
    store: Arc<S>,
}

impl<S: AccountStore> TransferCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate and execute a transfer.
    pub async fn transfer(&self, req: TransferRequest) -> Result<TransferOutcome, LedgerError> {
        let transfer = req.validate().inspect_err(|e| {
            tracing::warn!(
                from = req.from,
                to = req.to,
                amount = req.amount,
                code = e.code(),
                "transfer rejected"
            );
        })?;
        self.execute(transfer).await
    }

    /// Execute an already validated transfer.
    ///
    /// Any failure before commit rolls the unit of work back; nothing is
    /// applied. Dropping the returned future has the same effect.
    pub async fn execute(&self, transfer: ValidTransfer) -> Result<TransferOutcome, LedgerError> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| store_failure("begin transfer", e))?;

        let outcome = match self.apply(&mut tx, &transfer).await {
            Ok(outcome) => outcome,
            Err(e) => {
                discard(tx).await;
                tracing::warn!(
                    from = %transfer.from(),
                    to = %transfer.to(),
                    amount = transfer.amount(),
                    code = e.code(),
                    "transfer rolled back"
                );
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            tracing::error!(
                from = %transfer.from(),
                to = %transfer.to(),
                error = %e,
                "transfer commit failed"
            );
            return Err(LedgerError::CommitFailed);
        }

        tracing::info!(
            seq = outcome.record.seq,
            from = %transfer.from(),
            to = %transfer.to(),
            amount = transfer.amount(),
            "transfer committed"
        );
        Ok(outcome)
    }

    /// Committed transfers, oldest first.
    pub async fn history(&self) -> Result<Vec<TransferRecord>, LedgerError> {
        self.store
            .list_transfers()
            .await
            .map_err(|e| store_failure("list transfers", e))
    }

    async fn apply(
        &self,
        tx: &mut S::Tx,
        transfer: &ValidTransfer,
    ) -> Result<TransferOutcome, LedgerError> {
        let (first, second) = transfer.lock_order();
        let first_row = self.lock(tx, first).await?;
        let second_row = self.lock(tx, second).await?;

        let (from_row, to_row) = if first == transfer.from() {
            (first_row, second_row)
        } else {
            (second_row, first_row)
        };
        if from_row.is_none() {
            return Err(LedgerError::SourceNotFound);
        }
        if to_row.is_none() {
            return Err(LedgerError::DestinationNotFound);
        }

        let from = match self
            .store
            .adjust_balance(
                tx,
                transfer.from(),
                -transfer.amount(),
                BalanceGuard::Covers(transfer.amount()),
            )
            .await
        {
            Ok(account) => account,
            Err(StoreError::NoRowsAffected) => return Err(LedgerError::InsufficientFunds),
            Err(e) => return Err(store_failure("debit source", e)),
        };

        let to = match self
            .store
            .adjust_balance(
                tx,
                transfer.to(),
                transfer.amount(),
                BalanceGuard::Unchecked,
            )
            .await
        {
            Ok(account) => account,
            Err(StoreError::NoRowsAffected) => {
                // the row is locked by us, so it cannot have vanished
                tracing::error!(to = %transfer.to(), "credit to locked account affected no rows");
                return Err(LedgerError::Internal);
            }
            Err(e) => return Err(store_failure("credit destination", e)),
        };

        let record = self
            .store
            .record_transfer(tx, transfer.from(), transfer.to(), transfer.amount())
            .await
            .map_err(|e| store_failure("record transfer", e))?;

        Ok(TransferOutcome { from, to, record })
    }

    /// Lock one row; a missing row is `None`, not an error.
    async fn lock(&self, tx: &mut S::Tx, id: AccountId) -> Result<Option<Account>, LedgerError> {
        match self.store.get_for_update(tx, id).await {
            Ok(account) => Ok(Some(account)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(store_failure("lock account", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryAccountStore;
    use std::time::Duration;

    async fn setup(balances: &[i64]) -> (Arc<MemoryAccountStore>, Vec<AccountId>) {
        let store = Arc::new(MemoryAccountStore::new(Duration::from_millis(200)));
        let mut ids = Vec::new();
        for (i, opening) in balances.iter().enumerate() {
            let account = store.create(&format!("acct-{i}")).await.unwrap();
            if *opening > 0 {
                let mut tx = store.begin().await.unwrap();
                store
                    .adjust_balance(&mut tx, account.id, *opening, BalanceGuard::Unchecked)
                    .await
                    .unwrap();
                tx.commit().await.unwrap();
            }
            ids.push(account.id);
        }
        (store, ids)
    }

    async fn balance(store: &MemoryAccountStore, id: AccountId) -> i64 {
        store.get(id).await.unwrap().balance
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_and_conserves_total() {
        let (store, ids) = setup(&[100, 30]).await;
        let coordinator = TransferCoordinator::new(store.clone());

        let outcome = coordinator
            .transfer(TransferRequest::new(ids[0].get(), ids[1].get(), 40))
            .await
            .unwrap();

        assert_eq!(outcome.from.balance, 60);
        assert_eq!(outcome.to.balance, 70);
        assert_eq!(balance(&store, ids[0]).await + balance(&store, ids[1]).await, 130);
        assert_eq!(outcome.record.amount, 40);
        assert_eq!(store.list_transfers().await.unwrap(), vec![outcome.record]);
    }

    #[tokio::test]
    async fn test_transfer_from_higher_to_lower_id() {
        let (store, ids) = setup(&[0, 50]).await;
        let coordinator = TransferCoordinator::new(store.clone());

        let outcome = coordinator
            .transfer(TransferRequest::new(ids[1].get(), ids[0].get(), 50))
            .await
            .unwrap();

        assert_eq!(outcome.from.id, ids[1]);
        assert_eq!(outcome.from.balance, 0);
        assert_eq!(outcome.to.id, ids[0]);
        assert_eq!(outcome.to.balance, 50);
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_no_trace() {
        let (store, ids) = setup(&[10, 0]).await;
        let coordinator = TransferCoordinator::new(store.clone());

        let err = coordinator
            .transfer(TransferRequest::new(ids[0].get(), ids[1].get(), 11))
            .await
            .unwrap_err();

        assert_eq!(err, LedgerError::InsufficientFunds);
        assert_eq!(balance(&store, ids[0]).await, 10);
        assert_eq!(balance(&store, ids[1]).await, 0);
        assert!(store.list_transfers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_accounts() {
        let (store, ids) = setup(&[100]).await;
        let coordinator = TransferCoordinator::new(store.clone());

        let err = coordinator
            .transfer(TransferRequest::new(999, ids[0].get(), 10))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::SourceNotFound);

        let err = coordinator
            .transfer(TransferRequest::new(ids[0].get(), 999, 10))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::DestinationNotFound);

        // both missing: source is reported even though 998 locks first
        let err = coordinator
            .transfer(TransferRequest::new(999, 998, 10))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::SourceNotFound);

        assert_eq!(balance(&store, ids[0]).await, 100);
    }

    #[tokio::test]
    async fn test_same_account_regardless_of_existence() {
        let (store, ids) = setup(&[100]).await;
        let coordinator = TransferCoordinator::new(store);

        for (id, amount) in [(ids[0].get(), 10), (ids[0].get(), 0), (555, -3)] {
            let err = coordinator
                .transfer(TransferRequest::new(id, id, amount))
                .await
                .unwrap_err();
            assert_eq!(err, LedgerError::SameAccount);
        }
    }

    #[tokio::test]
    async fn test_held_lock_times_out_without_partial_effect() {
        let (store, ids) = setup(&[100, 0]).await;
        let coordinator = TransferCoordinator::new(store.clone());

        let mut holder = store.begin().await.unwrap();
        store.get_for_update(&mut holder, ids[1]).await.unwrap();

        let err = coordinator
            .transfer(TransferRequest::new(ids[0].get(), ids[1].get(), 10))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::LockTimeout);
        assert!(err.is_transient());

        drop(holder);
        assert_eq!(balance(&store, ids[0]).await, 100);
        assert_eq!(balance(&store, ids[1]).await, 0);

        // the lock on ids[0] was released by the rollback
        coordinator
            .transfer(TransferRequest::new(ids[0].get(), ids[1].get(), 10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_transfer_applies_nothing_and_releases_locks() {
        let (store, ids) = setup(&[100, 0]).await;
        let coordinator = TransferCoordinator::new(store.clone());

        let mut holder = store.begin().await.unwrap();
        store.get_for_update(&mut holder, ids[1]).await.unwrap();

        // parked on ids[1] while already holding ids[0]; the deadline drops it
        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            coordinator.transfer(TransferRequest::new(ids[0].get(), ids[1].get(), 10)),
        )
        .await;
        assert!(cancelled.is_err());

        assert_eq!(balance(&store, ids[0]).await, 100);
        assert_eq!(balance(&store, ids[1]).await, 0);
        assert!(store.list_transfers().await.unwrap().is_empty());

        let mut checker = store.begin().await.unwrap();
        assert!(store.get_for_update(&mut checker, ids[0]).await.is_ok());
        drop(checker);
        drop(holder);

        let outcome = coordinator
            .transfer(TransferRequest::new(ids[0].get(), ids[1].get(), 10))
            .await
            .unwrap();
        assert_eq!(outcome.from.balance, 90);
        assert_eq!(outcome.to.balance, 10);
    }

    #[tokio::test]
    async fn test_execute_runs_validated_transfer() {
        let (store, ids) = setup(&[20, 0]).await;
        let coordinator = TransferCoordinator::new(store.clone());

        let valid = TransferRequest::new(ids[0].get(), ids[1].get(), 20)
            .validate()
            .unwrap();
        let outcome = coordinator.execute(valid).await.unwrap();
        assert_eq!(outcome.record.amount, valid.amount());
        assert_eq!(balance(&store, ids[0]).await, 0);
        assert_eq!(balance(&store, ids[1]).await, 20);
    }
}
