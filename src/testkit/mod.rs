//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`domain`] - Builders for competitions, tickets and purchase requests.
//! - [`gateway`] - [`ScriptedGateway`](gateway::ScriptedGateway), a payment
//!   gateway that records calls and replays scripted outcomes.
//! - [`config`] - Canonical test configurations (dispatcher, sweeper).

pub mod config;
pub mod domain;
pub mod gateway;
