//! Handlers for the `payout` command group.

use super::command::PayoutCommand;
use super::output;
use crate::application::{Bookie, PayoutSettings};
use crate::domain::{CompetitionId, TicketId};
use crate::error::Result;

pub async fn execute(bookie: &Bookie, settings: &PayoutSettings, command: PayoutCommand) -> Result<()> {
    match command {
        PayoutCommand::Retry { ticket } => {
            let ticket = bookie.enqueue_payout(&TicketId::new(ticket)).await?;
            output::success(&format!("queued payout for ticket {}", ticket.id));
            if ticket.state.claim().is_none() {
                output::warning(&format!(
                    "ticket is {}; the dispatcher will skip it",
                    ticket.state
                ));
            }
        }
        PayoutCommand::RetryFailed { competition } => {
            let competition = competition.map(CompetitionId::new);
            let queued = bookie.retry_failed_payouts(competition.as_ref()).await?;
            output::success(&format!("queued {queued} failed payouts"));
        }
        PayoutCommand::Recover => {
            let recovered = bookie.recover_stuck_payouts(settings).await?;
            output::success(&format!("re-queued {recovered} interrupted payouts"));
        }
    }
    output::field("Queue length", bookie.pending_payouts().await?);
    Ok(())
}
