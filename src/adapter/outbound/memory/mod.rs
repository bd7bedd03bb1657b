//! In-memory adapters, used by tests and the `memory` database backend.

pub mod queue;
pub mod store;

pub use queue::MemoryPayoutQueue;
pub use store::MemoryLedgerStore;
