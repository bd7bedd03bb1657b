//! Front door of the payout queue: enqueue work and wake the dispatcher.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

use crate::domain::TicketId;
use crate::error::Result;
use crate::port::PayoutQueue;

/// Shared by every producer of payout work and by the dispatcher.
#[derive(Clone)]
pub struct PayoutScheduler {
    queue: Arc<dyn PayoutQueue>,
    wake: Arc<Notify>,
}

impl PayoutScheduler {
    #[must_use]
    pub fn new(queue: Arc<dyn PayoutQueue>) -> Self {
        Self {
            queue,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Queue a ticket for payout. Queuing a ticket twice is harmless.
    ///
    /// # Errors
    /// Returns an error if the queue cannot be written.
    pub async fn enqueue(&self, ticket: &TicketId) -> Result<()> {
        self.queue.push(ticket).await?;
        debug!(ticket_id = %ticket, "payout enqueued");
        self.wake.notify_one();
        Ok(())
    }

    /// Queue several tickets, returning how many were queued.
    ///
    /// # Errors
    /// Returns an error if the queue cannot be written.
    pub async fn enqueue_all<'a, I>(&self, tickets: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a TicketId> + Send,
        I::IntoIter: Send,
    {
        let mut queued = 0;
        for ticket in tickets {
            self.queue.push(ticket).await?;
            queued += 1;
        }
        if queued > 0 {
            debug!(count = queued, "payouts enqueued");
            self.wake.notify_one();
        }
        Ok(queued)
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<dyn PayoutQueue> {
        &self.queue
    }

    /// Signalled whenever new work is queued.
    #[must_use]
    pub fn wake(&self) -> &Arc<Notify> {
        &self.wake
    }
}
