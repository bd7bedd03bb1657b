use bookie::application::Bookie;
use bookie::domain::{CompetitionId, Sats, Ticket, TicketId, TicketState};
use bookie::testkit::domain::{new_competition, ticket_request};

/// Open a two-choice competition and return its id.
pub async fn open(bookie: &Bookie) -> CompetitionId {
    bookie
        .create(new_competition(&["Home", "Away"]))
        .await
        .expect("create competition")
        .id
}

/// Fund a ticket of `amount` sats on `choice`.
pub async fn buy(bookie: &Bookie, competition: &CompetitionId, id: &str, amount: u64, choice: i64) -> Ticket {
    bookie
        .fund_ticket(&ticket_request(id, competition.as_str(), amount, choice))
        .await
        .expect("fund ticket")
}

pub async fn ticket(bookie: &Bookie, id: &str) -> Ticket {
    bookie
        .ticket(&TicketId::new(id))
        .await
        .expect("read ticket")
        .expect("ticket exists")
}

/// Sum of stakes held by tickets in `states`.
pub fn staked(tickets: &[Ticket], states: &[TicketState]) -> Sats {
    tickets
        .iter()
        .filter(|t| states.contains(&t.state))
        .map(|t| t.amount)
        .sum()
}
