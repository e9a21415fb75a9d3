//! Transfer command and result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{Account, AccountId};
use crate::error::LedgerError;

/// Raw transfer command as received from a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: i64,
    pub to: i64,
    pub amount: i64,
}

/// A transfer that passed validation.
///
/// Only [`TransferRequest::validate`] constructs one, so holders can rely on
/// distinct positive ids and a positive amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidTransfer {
    from: AccountId,
    to: AccountId,
    amount: i64,
}

impl TransferRequest {
    pub fn new(from: i64, to: i64, amount: i64) -> Self {
        Self { from, to, amount }
    }

    /// Check the request without touching the store.
    ///
    /// Checks run in a fixed order and stop at the first failure: account
    /// ids, then distinct accounts, then amount.
    pub fn validate(&self) -> Result<ValidTransfer, LedgerError> {
        let (Some(from), Some(to)) = (AccountId::new(self.from), AccountId::new(self.to)) else {
            return Err(LedgerError::InvalidAccountId);
        };
        if from == to {
            return Err(LedgerError::SameAccount);
        }
        if self.amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(ValidTransfer {
            from,
            to,
            amount: self.amount,
        })
    }
}

impl ValidTransfer {
    pub fn from(&self) -> AccountId {
        self.from
    }

    pub fn to(&self) -> AccountId {
        self.to
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// The two ids in the order their row locks must be taken.
    ///
    /// Ascending id order regardless of direction, so A->B and B->A running
    /// together always contend on the same first lock.
    pub fn lock_order(&self) -> (AccountId, AccountId) {
        if self.from < self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }
}

/// Journal entry for a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub seq: i64,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Both accounts as committed, plus the journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub from: Account,
    pub to: Account,
    pub record: TransferRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_valid_request() {
        let valid = TransferRequest::new(1, 2, 10).validate().unwrap();
        assert_eq!(valid.from().get(), 1);
        assert_eq!(valid.to().get(), 2);
        assert_eq!(valid.amount(), 10);
    }

    #[test]
    fn test_validate_rejections() {
        let cases = [
            ("from id is 0", TransferRequest::new(0, 2, 10), LedgerError::InvalidAccountId),
            ("to id is negative", TransferRequest::new(1, -2, 5), LedgerError::InvalidAccountId),
            ("same account", TransferRequest::new(2, 2, 10), LedgerError::SameAccount),
            ("zero amount", TransferRequest::new(1, 4, 0), LedgerError::InvalidAmount),
            ("negative amount", TransferRequest::new(3, 2, -10), LedgerError::InvalidAmount),
        ];
        for (name, req, expected) in cases {
            assert_eq!(req.validate().unwrap_err(), expected, "case: {name}");
        }
    }

    #[test]
    fn test_validation_order_ids_before_same_account() {
        // same and invalid: the id check wins
        assert_eq!(
            TransferRequest::new(-1, -1, 10).validate().unwrap_err(),
            LedgerError::InvalidAccountId
        );
        // same and bad amount: same account wins
        assert_eq!(
            TransferRequest::new(7, 7, -5).validate().unwrap_err(),
            LedgerError::SameAccount
        );
    }

    #[test]
    fn test_lock_order_ignores_direction() {
        let forward = TransferRequest::new(3, 9, 1).validate().unwrap();
        let backward = TransferRequest::new(9, 3, 1).validate().unwrap();
        assert_eq!(forward.lock_order(), backward.lock_order());
        assert_eq!(forward.lock_order().0.get(), 3);
    }
}
