//! Implementations of ports (hexagonal adapters).
//!
//! - [`inbound`]: drivers of the application (the CLI)
//! - [`outbound`]: storage and payment backends

pub mod inbound;
pub mod outbound;
