//! Builders for domain primitives used across tests.
//!
//! Every competition built here is owned by `owner`, closes an hour from now,
//! holds 100 tickets and takes stakes between 10 and 1000 sats. Tickets are
//! bought by `bettor` and paid out to its internal wallet.

use chrono::{Duration, Utc};

use crate::application::TicketRequest;
use crate::domain::{
    AccountId, Choice, Competition, CompetitionId, CompetitionState, NewCompetition, Sats,
    TicketId,
};

pub const OWNER: &str = "owner";
pub const BETTOR: &str = "bettor";

/// An open competition with the given choice titles and no stakes.
pub fn competition(id: &str, choices: &[&str]) -> Competition {
    let now = Utc::now();
    Competition {
        id: CompetitionId::new(id),
        account: AccountId::new(OWNER),
        name: format!("Competition {id}"),
        info: String::new(),
        banner: String::new(),
        closing_datetime: now + Duration::hours(1),
        amount_tickets: 100,
        sold: 0,
        min_bet: Sats::new(10),
        max_bet: Sats::new(1_000),
        choices: choices.iter().map(|t| Choice::new(*t)).collect(),
        winning_choice: None,
        state: CompetitionState::Open,
        version: 0,
        time: now,
    }
}

/// A creation request matching [`competition`].
pub fn new_competition(choices: &[&str]) -> NewCompetition {
    NewCompetition {
        account: AccountId::new(OWNER),
        name: "Who wins?".to_string(),
        info: String::new(),
        banner: String::new(),
        closing_datetime: Utc::now() + Duration::hours(1),
        amount_tickets: 100,
        min_bet: Sats::new(10),
        max_bet: Sats::new(1_000),
        choices: choices.iter().map(|t| (*t).to_string()).collect(),
    }
}

/// A purchase of `amount` sats on `choice`.
pub fn ticket_request(id: &str, competition: &str, amount: u64, choice: i64) -> TicketRequest {
    TicketRequest {
        id: TicketId::new(id),
        competition: CompetitionId::new(competition),
        account: AccountId::new(BETTOR),
        amount: Sats::new(amount),
        choice,
        reward_target: format!("wallet:{BETTOR}"),
    }
}
