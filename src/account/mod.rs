//! Account management module
//!
//! Account identity and rows, plus the single-account operations.

pub mod models;
pub mod service;

pub use models::{Account, AccountId, InvalidAccountId, normalize_name};
pub use service::AccountService;
