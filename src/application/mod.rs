//! Application services (use cases).
//!
//! These services orchestrate domain logic over the store, queue and payment
//! ports. [`Bookie`] is the facade the inbound adapters talk to; the
//! dispatcher and sweeper are the background services it hands out.

pub mod bookie;
pub mod dispatcher;
pub mod funding;
pub mod retry;
pub mod scheduler;
pub mod settlement;
pub mod stake;
pub mod sweeper;

pub use bookie::Bookie;
pub use dispatcher::{PayoutDispatcher, PayoutDispatcherHandle, PayoutSettings, ProcessOutcome};
pub use scheduler::PayoutScheduler;
pub use settlement::Settlement;
pub use stake::{StakeAccumulator, TicketRequest};
pub use sweeper::{ExpirySweeper, ExpirySweeperHandle, SweeperSettings};
