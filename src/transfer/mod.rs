//! Atomic two-account transfers
//!
//! # Safety Invariants
//!
//! 1. **Validate first**: malformed requests never open a transaction
//! 2. **Lock before write**: both rows are locked before either balance moves
//! 3. **Fixed lock order**: rows are locked in ascending id order, never in
//!    request order, so opposite-direction transfers cannot deadlock
//! 4. **Guarded debit**: the source is debited by a conditional update
//! 5. **All or nothing**: balances and the journal entry commit together

pub mod coordinator;
pub mod types;

pub use coordinator::TransferCoordinator;
pub use types::{TransferOutcome, TransferRecord, TransferRequest, ValidTransfer};
