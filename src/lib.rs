//! Bookie - a pari-mutuel betting ledger with Lightning payouts.
//!
//! Bettors stake sats on one choice of a competition; when the operator
//! declares the winner, the pool minus a house fee is split among winning
//! stakes in proportion to their size. Cancelled competitions refund every
//! stake. Payouts go out asynchronously through a durable queue.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **`domain`** - Competitions, tickets, amounts, destinations and memos
//! - **`port`** - Store, queue, gateway and wallet traits
//! - **`application`** - Stake accumulation, settlement, payout dispatch,
//!   reservation expiry, and the [`application::Bookie`] facade
//! - **`adapter`** - SQLite and in-memory storage, the LNURL-pay gateway,
//!   the LNbits wallet backend, and the CLI
//! - **`infrastructure`** - Configuration, wiring and the service runtime
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bookie::adapter::outbound::memory::{MemoryLedgerStore, MemoryPayoutQueue};
//! use bookie::application::Bookie;
//!
//! let bookie = Bookie::new(
//!     Arc::new(MemoryLedgerStore::new()),
//!     Arc::new(MemoryPayoutQueue::new()),
//! );
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
