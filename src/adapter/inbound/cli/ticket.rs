//! Handlers for the `ticket` command group.

use tabled::Tabled;

use super::command::{ListTicketsArgs, TicketCommand};
use super::output;
use crate::application::Bookie;
use crate::domain::{AccountId, CompetitionId, Msats, Sats, Ticket, TicketId};
use crate::error::{LedgerError, Result};

#[derive(Tabled)]
pub(crate) struct TicketRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Choice")]
    choice: usize,
    #[tabled(rename = "Stake (sat)")]
    amount: Sats,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Paid (msat)")]
    paid: Msats,
    #[tabled(rename = "Failure")]
    failure: String,
}

impl From<&Ticket> for TicketRow {
    fn from(t: &Ticket) -> Self {
        Self {
            id: t.id.to_string(),
            choice: t.choice,
            amount: t.amount,
            state: t.state.to_string(),
            paid: t.reward_msat,
            failure: t.reward_failure.clone().unwrap_or_default(),
        }
    }
}

pub async fn execute(bookie: &Bookie, command: TicketCommand) -> Result<()> {
    match command {
        TicketCommand::Show { id } => {
            let id = TicketId::new(id);
            let ticket = bookie
                .ticket(&id)
                .await?
                .ok_or(LedgerError::TicketNotFound(id))?;
            show(&ticket);
            Ok(())
        }
        TicketCommand::List(args) => list(bookie, args).await,
    }
}

fn show(ticket: &Ticket) {
    output::record("ticket", ticket);
    output::section(&format!("Ticket {}", ticket.id));
    output::field("Competition", &ticket.competition);
    output::field("Account", &ticket.account);
    output::field("Choice", ticket.choice);
    output::field("Stake", format!("{} sat", ticket.amount));
    output::field("State", ticket.state);
    output::field("Reward to", &ticket.reward_target);
    if let Some(hash) = &ticket.reward_payment_hash {
        output::field("Paid", format!("{} msat", ticket.reward_msat));
        output::field("Payment hash", hash);
    }
    if let Some(reason) = &ticket.reward_failure {
        output::warning(&format!("last payout failed: {reason}"));
    }
}

async fn list(bookie: &Bookie, args: ListTicketsArgs) -> Result<()> {
    let tickets = match (args.account, args.competition) {
        (Some(account), _) => bookie.tickets(&AccountId::new(account)).await?,
        (None, Some(competition)) => {
            bookie
                .competition_tickets(&CompetitionId::new(competition))
                .await?
        }
        (None, None) => Vec::new(),
    };
    let rows = tickets.iter().map(TicketRow::from).collect();
    output::table("ticket", &tickets, rows);
    Ok(())
}
