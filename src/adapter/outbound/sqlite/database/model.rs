//! Database model types for Diesel ORM.
//!
//! Amounts are stored as `BIGINT`, timestamps as fixed-width RFC 3339 text so
//! that lexical order matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;

use super::schema::{competitions, payout_queue, tickets};
use crate::domain::{Choice, Competition, Msats, Sats, Ticket};
use crate::error::{Error, Result};
use crate::port::QueuedPayout;

/// Database row for a competition.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = competitions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CompetitionRow {
    pub id: String,
    pub account: String,
    pub name: String,
    pub info: String,
    pub banner: String,
    pub closing_datetime: String,
    pub amount_tickets: i64,
    pub sold: i64,
    pub min_bet: i64,
    pub max_bet: i64,
    pub choices: String,
    pub winning_choice: i64,
    pub state: String,
    pub version: i64,
    pub time: String,
}

impl CompetitionRow {
    pub fn from_domain(competition: &Competition) -> Result<Self> {
        Ok(Self {
            id: competition.id.to_string(),
            account: competition.account.to_string(),
            name: competition.name.clone(),
            info: competition.info.clone(),
            banner: competition.banner.clone(),
            closing_datetime: timestamp(competition.closing_datetime),
            amount_tickets: i64::from(competition.amount_tickets),
            sold: i64::from(competition.sold),
            min_bet: to_i64(competition.min_bet.value(), "min_bet")?,
            max_bet: to_i64(competition.max_bet.value(), "max_bet")?,
            choices: serde_json::to_string(&competition.choices)?,
            winning_choice: competition.winning_choice_index(),
            state: competition.state.as_str().to_string(),
            version: to_i64(competition.version, "version")?,
            time: timestamp(competition.time),
        })
    }

    pub fn into_domain(self) -> Result<Competition> {
        let choices: Vec<Choice> = serde_json::from_str(&self.choices)?;
        let winning_choice = usize::try_from(self.winning_choice).ok();
        Ok(Competition {
            id: self.id.into(),
            account: self.account.into(),
            name: self.name,
            info: self.info,
            banner: self.banner,
            closing_datetime: parse_timestamp(&self.closing_datetime)?,
            amount_tickets: to_u32(self.amount_tickets, "amount_tickets")?,
            sold: to_u32(self.sold, "sold")?,
            min_bet: Sats::new(to_u64(self.min_bet, "min_bet")?),
            max_bet: Sats::new(to_u64(self.max_bet, "max_bet")?),
            choices,
            winning_choice,
            state: self.state.parse()?,
            version: to_u64(self.version, "version")?,
            time: parse_timestamp(&self.time)?,
        })
    }
}

/// Database row for a ticket.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = tickets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct TicketRow {
    pub id: String,
    pub account: String,
    pub competition: String,
    pub amount: i64,
    pub choice: i64,
    pub reward_target: String,
    pub reward_msat: i64,
    pub reward_failure: Option<String>,
    pub reward_payment_hash: Option<String>,
    pub state: String,
    pub time: String,
    pub claimed_at: Option<String>,
}

impl TicketRow {
    pub fn from_domain(ticket: &Ticket) -> Result<Self> {
        Ok(Self {
            id: ticket.id.to_string(),
            account: ticket.account.to_string(),
            competition: ticket.competition.to_string(),
            amount: to_i64(ticket.amount.value(), "amount")?,
            choice: i64::try_from(ticket.choice)
                .map_err(|_| Error::Database("choice out of range".into()))?,
            reward_target: ticket.reward_target.clone(),
            reward_msat: to_i64(ticket.reward_msat.value(), "reward_msat")?,
            reward_failure: ticket.reward_failure.clone(),
            reward_payment_hash: ticket.reward_payment_hash.clone(),
            state: ticket.state.as_str().to_string(),
            time: timestamp(ticket.time),
            claimed_at: ticket.claimed_at.map(timestamp),
        })
    }

    pub fn into_domain(self) -> Result<Ticket> {
        Ok(Ticket {
            id: self.id.into(),
            account: self.account.into(),
            competition: self.competition.into(),
            amount: Sats::new(to_u64(self.amount, "amount")?),
            choice: usize::try_from(self.choice)
                .map_err(|_| Error::Database(format!("negative choice {}", self.choice)))?,
            reward_target: self.reward_target,
            reward_msat: Msats::new(to_u64(self.reward_msat, "reward_msat")?),
            reward_failure: self.reward_failure,
            reward_payment_hash: self.reward_payment_hash,
            state: self.state.parse()?,
            time: parse_timestamp(&self.time)?,
            claimed_at: self.claimed_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Database row for a queued payout.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = payout_queue)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueueRow {
    pub seq: i64,
    pub ticket_id: String,
    pub enqueued_at: String,
}

impl QueueRow {
    pub fn into_domain(self) -> Result<QueuedPayout> {
        Ok(QueuedPayout {
            seq: self.seq,
            ticket: self.ticket_id.into(),
            enqueued_at: parse_timestamp(&self.enqueued_at)?,
        })
    }
}

/// Database row for a new queue entry (seq is assigned by SQLite).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = payout_queue)]
pub struct NewQueueRow {
    pub ticket_id: String,
    pub enqueued_at: String,
}

/// Fixed-width UTC timestamp used for every stored time.
pub fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("timestamp {raw:?}: {e}")))
}

fn to_i64(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::Database(format!("{field} out of range: {value}")))
}

fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Database(format!("negative {field}: {value}")))
}

fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Database(format!("{field} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::milliseconds(1);
        let (a, b) = (timestamp(early), timestamp(late));
        assert_eq!(a, "2026-01-02T03:04:05.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&b).unwrap(), late);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(matches!(to_u64(-1, "amount"), Err(Error::Database(_))));
    }
}
