//! Inbound (driving) ports: events delivered to the ledger from outside.

pub mod funding;
