//! Ledger Core - account balances and atomic transfers
//!
//! Moves integer amounts between accounts so that, under concurrent load,
//! no balance goes negative, every transfer applies fully or not at all,
//! and the sum of balances never changes across a transfer.
//!
//! # Modules
//!
//! - [`account`] - Account model, creation, deposit and withdraw
//! - [`transfer`] - Validated transfer requests and the coordinator
//! - [`store`] - Storage trait with PostgreSQL and in-memory backends
//! - [`error`] - Caller-visible error taxonomy
//! - [`db`] - PostgreSQL pool and schema
//! - [`gateway`] - HTTP adapter
//! - [`config`] / [`logging`] - Runtime configuration and tracing setup

pub mod account;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod store;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{Account, AccountId, AccountService};
pub use error::LedgerError;
pub use store::memory::MemoryAccountStore;
pub use store::postgres::PgAccountStore;
pub use store::{AccountStore, BalanceGuard, StoreError, UnitOfWork};
pub use transfer::{TransferCoordinator, TransferOutcome, TransferRecord, TransferRequest};
