//! fin-ledger
//!
//! Ledger Transaction Manager: compound mutations that must leave a
//! transaction-like record and one or two wallet balances consistent from
//! the caller's perspective.
//!
//! Architectural decisions:
//! - Every operation is an ordered list of forward steps. Before each step
//!   its inverse is pushed onto an undo stack as a plain prior-value record
//!   (never a closure); on failure the stack replays in LIFO order and the
//!   originating error is returned.
//! - A failing inverse is a distinct, fatal [`LedgerError::RollbackFailure`]:
//!   balances may be inconsistent and the caller must run
//!   [`LedgerService::recalculate_wallet_balance`].
//! - All money math is exact decimal ([`fin_schemas::Money`]); floats never
//!   touch a balance.
//! - Ledger mutations and sync cycles serialize on one shared async mutex so
//!   a sync never observes a half-written wallet balance.

mod error;
mod service;
mod undo;

pub use error::LedgerError;
pub use service::LedgerService;
pub use undo::{UndoEntry, UndoStack};
