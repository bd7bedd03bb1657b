//! In-memory payout queue.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::domain::TicketId;
use crate::error::Result;
use crate::port::{PayoutQueue, QueuedPayout};

#[derive(Debug, Default)]
struct Inner {
    next_seq: i64,
    entries: BTreeMap<i64, QueuedPayout>,
}

/// Non-durable [`PayoutQueue`]; entries are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryPayoutQueue {
    inner: Mutex<Inner>,
}

impl MemoryPayoutQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayoutQueue for MemoryPayoutQueue {
    async fn push(&self, ticket: &TicketId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.entries.retain(|_, e| &e.ticket != ticket);
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.entries.insert(
            seq,
            QueuedPayout {
                seq,
                ticket: ticket.clone(),
                enqueued_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn peek(&self) -> Result<Option<QueuedPayout>> {
        Ok(self.inner.lock().entries.values().next().cloned())
    }

    async fn ack(&self, seq: i64) -> Result<()> {
        self.inner.lock().entries.remove(&seq);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.lock().entries.len())
    }
}
