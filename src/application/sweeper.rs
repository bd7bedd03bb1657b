//! Reservation expiry.
//!
//! A reservation holds capacity for as long as its funding invoice can still
//! be paid. Once the invoice has expired, plus a safety margin, the pending
//! ticket is deleted and its capacity returned to the competition.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::retry::update_competition_with;
use crate::domain::CompetitionState;
use crate::error::{Error, Result};
use crate::port::LedgerStore;

#[derive(Debug, Clone)]
pub struct SweeperSettings {
    /// Time between sweeps.
    pub interval: Duration,
    /// Lifetime of a funding invoice.
    pub funding_window: Duration,
    /// Extra grace after the invoice expired.
    pub expiry_margin: Duration,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            funding_window: Duration::from_secs(3_600),
            expiry_margin: Duration::from_secs(300),
        }
    }
}

/// Handle for controlling the sweeper lifecycle.
pub struct ExpirySweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ExpirySweeperHandle {
    /// Signal the sweeper to stop and wait for it.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "expiry sweeper task failed");
        }
    }
}

pub struct ExpirySweeper {
    store: Arc<dyn LedgerStore>,
    settings: SweeperSettings,
}

impl ExpirySweeper {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, settings: SweeperSettings) -> Self {
        Self { store, settings }
    }

    /// Reservations created before this instant have expired.
    ///
    /// # Errors
    /// Returns an error if the configured window does not fit a timestamp.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let window = chrono::Duration::from_std(self.settings.funding_window + self.settings.expiry_margin)
            .map_err(|e| Error::Internal(format!("funding window out of range: {e}")))?;
        now.checked_sub_signed(window)
            .ok_or_else(|| Error::Internal("funding window out of range".into()))
    }

    /// Drop expired reservations on open competitions and release their
    /// capacity. Returns how many reservations were dropped.
    ///
    /// # Errors
    /// Returns a store error.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = self.cutoff(now)?;
        let mut released = 0;
        for competition in self.store.competitions_in_state(CompetitionState::Open).await? {
            let expired = self
                .store
                .delete_pending_tickets(&competition.id, Some(cutoff))
                .await?;
            if expired == 0 {
                continue;
            }
            let freed = u32::try_from(expired).unwrap_or(u32::MAX);
            update_competition_with(self.store.as_ref(), &competition.id, |c| {
                if !c.is_open() {
                    return Ok(None);
                }
                let mut next = c.clone();
                next.amount_tickets = next.amount_tickets.saturating_add(freed);
                Ok(Some(next))
            })
            .await?;
            debug!(competition = %competition.id, count = expired, "expired reservations released");
            released += expired;
        }
        if released > 0 {
            info!(count = released, "released expired reservations");
        }
        Ok(released)
    }

    /// Spawn the periodic sweep.
    pub fn start(self) -> ExpirySweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let interval = self.settings.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("expiry sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep(Utc::now()).await {
                            error!(error = %e, "reservation sweep failed");
                        }
                    }
                }
            }
        });

        ExpirySweeperHandle { shutdown_tx, task }
    }
}
