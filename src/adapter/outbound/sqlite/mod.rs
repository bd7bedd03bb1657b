//! SQLite persistence adapters.
//!
//! Provides the SQLite-backed ledger store and payout queue using Diesel ORM.

pub mod database;
pub mod queue;
pub mod store;

pub use queue::SqlitePayoutQueue;
pub use store::SqliteLedgerStore;
