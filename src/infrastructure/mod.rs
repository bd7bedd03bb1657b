//! Infrastructure layer.
//!
//! Provides technical concerns that support the application without containing
//! business logic: configuration, composition of adapters, and the service
//! runtime.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`config`] - Configuration loading and validation
//! - [`runtime`] - Background services until shutdown

pub mod bootstrap;
pub mod config;
pub mod runtime;
