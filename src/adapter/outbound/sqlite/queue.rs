//! SQLite payout queue.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use super::database::connection::DbPool;
use super::database::model::{timestamp, NewQueueRow, QueueRow};
use super::database::schema::payout_queue;
use crate::domain::TicketId;
use crate::error::{Error, Result};
use crate::port::{PayoutQueue, QueuedPayout};

/// Durable [`PayoutQueue`] stored next to the ledger tables.
#[derive(Clone)]
pub struct SqlitePayoutQueue {
    pool: DbPool,
}

impl SqlitePayoutQueue {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PayoutQueue for SqlitePayoutQueue {
    async fn push(&self, ticket: &TicketId) -> Result<()> {
        let row = NewQueueRow {
            ticket_id: ticket.to_string(),
            enqueued_at: timestamp(Utc::now()),
        };
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        // REPLACE drops the old entry and assigns a fresh seq at the tail.
        diesel::replace_into(payout_queue::table)
            .values(&row)
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn peek(&self) -> Result<Option<QueuedPayout>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let row: Option<QueueRow> = payout_queue::table
            .order(payout_queue::seq.asc())
            .select(QueueRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        row.map(QueueRow::into_domain).transpose()
    }

    async fn ack(&self, seq: i64) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        diesel::delete(payout_queue::table.find(seq))
            .execute(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        let count: i64 = payout_queue::table
            .count()
            .get_result(&mut conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        usize::try_from(count).map_err(|_| Error::Database(format!("negative count {count}")))
    }
}
