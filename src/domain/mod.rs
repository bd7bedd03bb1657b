//! Ledger domain: competitions, tickets, amounts and destinations.
//!
//! Everything here is storage- and transport-agnostic; state changes are
//! applied by the application services through the store port.

pub mod competition;
pub mod destination;
pub mod error;
pub mod id;
pub mod memo;
pub mod money;
pub mod ticket;

pub use competition::{
    Choice, Competition, CompetitionState, CompetitionUpdate, NewCompetition, Resolution,
};
pub use destination::RewardDestination;
pub use error::DomainError;
pub use id::{AccountId, CompetitionId, TicketId};
pub use memo::{MemoKind, PaymentMemo};
pub use money::{Msats, Sats};
pub use ticket::{Ticket, TicketState};
