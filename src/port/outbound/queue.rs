//! Durable payout work queue.
//!
//! Delivery is at-least-once: an entry stays queued until acknowledged, so a
//! crash between [`PayoutQueue::peek`] and [`PayoutQueue::ack`] re-delivers it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::TicketId;
use crate::error::Result;

/// An entry at the head of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPayout {
    /// Position in the queue; re-pushing a ticket gives it a new one.
    pub seq: i64,
    pub ticket: TicketId,
    pub enqueued_at: DateTime<Utc>,
}

#[async_trait]
pub trait PayoutQueue: Send + Sync {
    /// Queue a ticket for payout. A ticket is queued at most once; pushing it
    /// again moves it to the tail.
    async fn push(&self, ticket: &TicketId) -> Result<()>;

    /// Oldest entry, without removing it.
    async fn peek(&self) -> Result<Option<QueuedPayout>>;

    /// Remove the entry with this sequence number. A no-op if the ticket was
    /// re-pushed in the meantime.
    async fn ack(&self, seq: i64) -> Result<()>;

    async fn len(&self) -> Result<usize>;
}
