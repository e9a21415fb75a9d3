//! Data models for ledger accounts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identity.
///
/// Always strictly positive. The derived `Ord` is the lock-ordering key used
/// when a unit of work has to lock more than one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    /// Returns `None` for zero and negative values.
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for AccountId {
    type Error = InvalidAccountId;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(InvalidAccountId(raw))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("account id must be positive, got {0}")]
pub struct InvalidAccountId(pub i64);

/// A ledger account row.
///
/// `balance` is in the smallest currency unit and is never negative in any
/// committed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub balance: i64,
}

/// Normalize a display name for a new account.
///
/// Surrounding whitespace is dropped; an empty result is rejected.
pub fn normalize_name(name: &str) -> Option<&str> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
