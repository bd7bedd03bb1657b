//! Handlers for the `competition` command group.

use tabled::Tabled;

use super::command::{CompetitionCommand, CreateArgs, ListCompetitionsArgs};
use super::output;
use super::ticket::TicketRow;
use crate::application::Bookie;
use crate::domain::{AccountId, Competition, CompetitionId, NewCompetition, Sats};
use crate::error::{LedgerError, Result};

#[derive(Tabled)]
struct CompetitionRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Closes")]
    closes: String,
    #[tabled(rename = "Sold")]
    sold: u32,
    #[tabled(rename = "Left")]
    left: u32,
    #[tabled(rename = "Pool (sat)")]
    pool: Sats,
}

impl From<&Competition> for CompetitionRow {
    fn from(c: &Competition) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name.clone(),
            state: c.state.to_string(),
            closes: c.closing_datetime.format("%Y-%m-%d %H:%M").to_string(),
            sold: c.sold,
            left: c.amount_tickets,
            pool: c.total_pool(),
        }
    }
}

pub async fn execute(bookie: &Bookie, command: CompetitionCommand) -> Result<()> {
    match command {
        CompetitionCommand::Create(args) => create(bookie, args).await,
        CompetitionCommand::Show { id } => show(bookie, &CompetitionId::new(id)).await,
        CompetitionCommand::List(args) => list(bookie, &args).await,
        CompetitionCommand::Complete { id, winning_choice } => {
            let completed = bookie
                .complete(&CompetitionId::new(id), winning_choice)
                .await?;
            output::success(&format!(
                "competition {} is {}",
                output::highlight(&completed.id),
                completed.state
            ));
            output::record("competition", &completed);
            Ok(())
        }
        CompetitionCommand::Delete { id, account } => {
            let id = CompetitionId::new(id);
            bookie
                .delete_competition(&id, &AccountId::new(account))
                .await?;
            output::success(&format!("deleted competition {id}"));
            Ok(())
        }
    }
}

async fn create(bookie: &Bookie, args: CreateArgs) -> Result<()> {
    let request = NewCompetition {
        account: AccountId::new(args.account),
        name: args.name,
        info: args.info,
        banner: args.banner,
        closing_datetime: args.closes,
        amount_tickets: args.tickets,
        min_bet: Sats::new(args.min_bet),
        max_bet: Sats::new(args.max_bet),
        choices: args.choices,
    };
    let created = bookie.create(request).await?;
    output::success(&format!("created competition {}", output::highlight(&created.id)));
    output::record("competition", &created);
    Ok(())
}

async fn show(bookie: &Bookie, id: &CompetitionId) -> Result<()> {
    let competition = bookie
        .competition(id)
        .await?
        .ok_or_else(|| LedgerError::CompetitionNotFound(id.clone()))?;
    let tickets = bookie.competition_tickets(id).await?;

    output::record("competition", &competition);
    output::section(&competition.name);
    output::field("Id", &competition.id);
    output::field("Owner", &competition.account);
    output::field("State", competition.state);
    output::field("Closes", competition.closing_datetime.to_rfc3339());
    output::field("Sold", competition.sold);
    output::field("Remaining", competition.amount_tickets);
    output::field(
        "Stake bounds",
        format!("{} - {} sat", competition.min_bet, competition.max_bet),
    );
    output::section("Choices");
    for (index, choice) in competition.choices.iter().enumerate() {
        let marker = if competition.winning_choice == Some(index) {
            " (winner)"
        } else {
            ""
        };
        output::field(
            &format!("#{index}"),
            format!("{}: {} sat{marker}", choice.title, choice.total),
        );
    }
    output::section("Tickets");
    let rows = tickets.iter().map(TicketRow::from).collect();
    output::table("ticket", &tickets, rows);
    Ok(())
}

async fn list(bookie: &Bookie, args: &ListCompetitionsArgs) -> Result<()> {
    let competitions = match &args.account {
        Some(account) => bookie.competitions(&AccountId::new(account.as_str())).await?,
        None => bookie.competitions_in_state(args.state).await?,
    };
    let rows = competitions.iter().map(CompetitionRow::from).collect();
    output::table("competition", &competitions, rows);
    Ok(())
}
