//! Outbound adapters (driven side).
//!
//! - [`sqlite`]: durable ledger store and payout queue
//! - [`memory`]: in-process store and queue
//! - [`lnurl`]: LNURL-pay payment gateway
//! - [`lnbits`]: LNbits wallet backend

pub mod lnbits;
pub mod lnurl;
pub mod memory;
pub mod sqlite;
