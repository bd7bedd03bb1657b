//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the persistence and payment dependencies of the
//! ledger.

pub mod gateway;
pub mod queue;
pub mod store;
pub mod wallet;
