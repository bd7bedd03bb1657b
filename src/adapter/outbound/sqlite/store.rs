//! SQLite ledger store.
//!
//! Conditional writes are single `UPDATE ... WHERE` statements, or
//! `IMMEDIATE` transactions where rows are read and moved together, so
//! SQLite's write lock is the only synchronization needed between processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::sql_types::{BigInt, Text};

use super::database::connection::DbPool;
use super::database::model::{timestamp, CompetitionRow, TicketRow};
use super::database::schema::{competitions, payout_queue, tickets};
use crate::domain::{
    AccountId, Competition, CompetitionId, CompetitionState, Resolution, Ticket, TicketId,
    TicketState,
};
use crate::error::{Error, Result};
use crate::port::LedgerStore;

type Conn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// SQLite-backed [`LedgerStore`].
#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: DbPool,
}

impl SqliteLedgerStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<Conn> {
        self.pool.get().map_err(|e| Error::Connection(e.to_string()))
    }

    fn load_tickets(rows: Vec<TicketRow>) -> Result<Vec<Ticket>> {
        rows.into_iter().map(TicketRow::into_domain).collect()
    }

    fn load_competitions(rows: Vec<CompetitionRow>) -> Result<Vec<Competition>> {
        rows.into_iter().map(CompetitionRow::into_domain).collect()
    }
}

fn state_names(states: &[TicketState]) -> Vec<&'static str> {
    states.iter().map(|s| s.as_str()).collect()
}

fn db_err(e: diesel::result::Error) -> Error {
    Error::Database(e.to_string())
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn insert_competition(&self, competition: &Competition) -> Result<()> {
        let row = CompetitionRow::from_domain(competition)?;
        let mut conn = self.conn()?;
        diesel::insert_into(competitions::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }

    async fn competition(&self, id: &CompetitionId) -> Result<Option<Competition>> {
        let mut conn = self.conn()?;
        let row: Option<CompetitionRow> = competitions::table
            .find(id.as_str())
            .select(CompetitionRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        row.map(CompetitionRow::into_domain).transpose()
    }

    async fn competitions_by_account(&self, account: &AccountId) -> Result<Vec<Competition>> {
        let mut conn = self.conn()?;
        let rows = competitions::table
            .filter(competitions::account.eq(account.as_str()))
            .order(competitions::time.asc())
            .select(CompetitionRow::as_select())
            .load(&mut conn)
            .map_err(db_err)?;
        Self::load_competitions(rows)
    }

    async fn competitions_in_state(&self, state: CompetitionState) -> Result<Vec<Competition>> {
        let mut conn = self.conn()?;
        let rows = competitions::table
            .filter(competitions::state.eq(state.as_str()))
            .order(competitions::time.asc())
            .select(CompetitionRow::as_select())
            .load(&mut conn)
            .map_err(db_err)?;
        Self::load_competitions(rows)
    }

    async fn update_competition(&self, next: &Competition, expected_version: u64) -> Result<bool> {
        let row = CompetitionRow::from_domain(next)?;
        let expected = i64::try_from(expected_version)
            .map_err(|_| Error::Database(format!("version out of range: {expected_version}")))?;
        let mut conn = self.conn()?;
        let updated = diesel::update(
            competitions::table
                .filter(competitions::id.eq(next.id.as_str()))
                .filter(competitions::version.eq(expected)),
        )
        .set(&row)
        .execute(&mut conn)
        .map_err(db_err)?;
        Ok(updated == 1)
    }

    async fn delete_competition(&self, id: &CompetitionId) -> Result<bool> {
        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let ticket_ids = tickets::table
                .filter(tickets::competition.eq(id.as_str()))
                .select(tickets::id);
            diesel::delete(payout_queue::table.filter(payout_queue::ticket_id.eq_any(ticket_ids)))
                .execute(conn)?;
            diesel::delete(tickets::table.filter(tickets::competition.eq(id.as_str())))
                .execute(conn)?;
            let deleted = diesel::delete(competitions::table.find(id.as_str())).execute(conn)?;
            Ok(deleted > 0)
        })
        .map_err(db_err)
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<bool> {
        let row = TicketRow::from_domain(ticket)?;
        let mut conn = self.conn()?;
        let inserted = diesel::insert_or_ignore_into(tickets::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(inserted == 1)
    }

    async fn ticket(&self, id: &TicketId) -> Result<Option<Ticket>> {
        let mut conn = self.conn()?;
        let row: Option<TicketRow> = tickets::table
            .find(id.as_str())
            .select(TicketRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(db_err)?;
        row.map(TicketRow::into_domain).transpose()
    }

    async fn tickets_by_account(&self, account: &AccountId) -> Result<Vec<Ticket>> {
        let mut conn = self.conn()?;
        let rows = tickets::table
            .filter(tickets::account.eq(account.as_str()))
            .order(tickets::time.asc())
            .select(TicketRow::as_select())
            .load(&mut conn)
            .map_err(db_err)?;
        Self::load_tickets(rows)
    }

    async fn competition_tickets(&self, competition: &CompetitionId) -> Result<Vec<Ticket>> {
        let mut conn = self.conn()?;
        let rows = tickets::table
            .filter(tickets::competition.eq(competition.as_str()))
            .order(tickets::time.asc())
            .select(TicketRow::as_select())
            .load(&mut conn)
            .map_err(db_err)?;
        Self::load_tickets(rows)
    }

    async fn tickets_in_states(&self, states: &[TicketState]) -> Result<Vec<Ticket>> {
        let mut conn = self.conn()?;
        let rows = tickets::table
            .filter(tickets::state.eq_any(state_names(states)))
            .order(tickets::time.asc())
            .select(TicketRow::as_select())
            .load(&mut conn)
            .map_err(db_err)?;
        Self::load_tickets(rows)
    }

    async fn competition_tickets_in_states(
        &self,
        competition: &CompetitionId,
        states: &[TicketState],
    ) -> Result<Vec<Ticket>> {
        let mut conn = self.conn()?;
        let rows = tickets::table
            .filter(tickets::competition.eq(competition.as_str()))
            .filter(tickets::state.eq_any(state_names(states)))
            .order(tickets::time.asc())
            .select(TicketRow::as_select())
            .load(&mut conn)
            .map_err(db_err)?;
        Self::load_tickets(rows)
    }

    async fn count_competition_tickets(
        &self,
        competition: &CompetitionId,
        states: &[TicketState],
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let count: i64 = tickets::table
            .filter(tickets::competition.eq(competition.as_str()))
            .filter(tickets::state.eq_any(state_names(states)))
            .count()
            .get_result(&mut conn)
            .map_err(db_err)?;
        usize::try_from(count).map_err(|_| Error::Database(format!("negative count {count}")))
    }

    async fn update_ticket(&self, ticket: &Ticket, expected: TicketState) -> Result<bool> {
        let row = TicketRow::from_domain(ticket)?;
        let mut conn = self.conn()?;
        let updated = diesel::update(
            tickets::table
                .filter(tickets::id.eq(ticket.id.as_str()))
                .filter(tickets::state.eq(expected.as_str())),
        )
        .set(&row)
        .execute(&mut conn)
        .map_err(db_err)?;
        Ok(updated == 1)
    }

    async fn fail_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<Ticket>> {
        let cutoff = timestamp(claimed_before);
        let mut conn = self.conn()?;
        let rows = conn
            .immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                let mut stale = Vec::new();
                for paying in TicketState::PAYING {
                    let Some(failed) = paying.failed() else {
                        continue;
                    };
                    let claimed = tickets::table
                        .filter(tickets::state.eq(paying.as_str()))
                        .filter(
                            tickets::claimed_at
                                .is_null()
                                .or(tickets::claimed_at.assume_not_null().lt(cutoff.as_str())),
                        );
                    stale.extend(
                        claimed
                            .clone()
                            .select(TicketRow::as_select())
                            .load(conn)?
                            .into_iter()
                            .map(|row| (row, failed)),
                    );
                    diesel::update(claimed)
                        .set((
                            tickets::state.eq(failed.as_str()),
                            tickets::reward_failure.eq(reason),
                        ))
                        .execute(conn)?;
                }
                Ok(stale)
            })
            .map_err(db_err)?;
        rows.into_iter()
            .map(|(row, failed)| -> Result<Ticket> {
                Ok(row.into_domain()?.with_failure(failed, reason.to_string()))
            })
            .collect()
    }

    async fn delete_ticket(&self, id: &TicketId, expected: TicketState) -> Result<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            tickets::table
                .filter(tickets::id.eq(id.as_str()))
                .filter(tickets::state.eq(expected.as_str())),
        )
        .execute(&mut conn)
        .map_err(db_err)?;
        Ok(deleted == 1)
    }

    async fn assign_outcomes(
        &self,
        competition: &CompetitionId,
        resolution: Resolution,
    ) -> Result<Vec<Ticket>> {
        let winner = resolution
            .winner()
            .map(i64::try_from)
            .transpose()
            .map_err(|_| Error::Database("choice out of range".into()))?;
        let mut conn = self.conn()?;
        let funded = tickets::table
            .filter(tickets::competition.eq(competition.as_str()))
            .filter(tickets::state.eq(TicketState::Funded.as_str()));
        let rows = conn
            .immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                let rows = funded
                    .clone()
                    .order(tickets::time.asc())
                    .select(TicketRow::as_select())
                    .load(conn)?;
                match winner {
                    Some(choice) => {
                        diesel::sql_query(
                            "UPDATE tickets SET state = CASE WHEN choice = ? THEN ? ELSE ? END \
                             WHERE competition = ? AND state = ?",
                        )
                        .bind::<BigInt, _>(choice)
                        .bind::<Text, _>(TicketState::WonUnsettled.as_str())
                        .bind::<Text, _>(TicketState::Lost.as_str())
                        .bind::<Text, _>(competition.as_str())
                        .bind::<Text, _>(TicketState::Funded.as_str())
                        .execute(conn)?;
                    }
                    None => {
                        diesel::update(funded)
                            .set(tickets::state.eq(TicketState::CancelledUnsettled.as_str()))
                            .execute(conn)?;
                    }
                }
                Ok(rows)
            })
            .map_err(db_err)?;
        rows.into_iter()
            .map(|row| -> Result<Ticket> {
                let mut ticket = row.into_domain()?;
                ticket.state = resolution.outcome(ticket.choice);
                Ok(ticket)
            })
            .collect()
    }

    async fn delete_pending_tickets(
        &self,
        competition: &CompetitionId,
        created_before: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let pending = tickets::table
            .filter(tickets::competition.eq(competition.as_str()))
            .filter(tickets::state.eq(TicketState::PendingFunding.as_str()));
        let deleted = match created_before {
            Some(cutoff) => diesel::delete(pending.filter(tickets::time.lt(timestamp(cutoff))))
                .execute(&mut conn),
            None => diesel::delete(pending).execute(&mut conn),
        }
        .map_err(db_err)?;
        Ok(deleted)
    }
}
