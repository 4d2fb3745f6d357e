use super::EventSource;
use crate::router::{Disposition, Router, Verdict};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Starting,
    Running,
    /// No new messages are pulled; the source is being closed.
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub applied: u64,
    pub acked: u64,
    pub requeued: u64,
    pub rejected: u64,
    pub unknown: u64,
}

impl ConsumerStats {
    fn record(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Applied { .. } => self.applied += 1,
            Verdict::Unknown(_) => self.unknown += 1,
            Verdict::Rejected { .. } => self.rejected += 1,
            Verdict::Retry { .. } => {}
        }
    }

    fn settled(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Ack => self.acked += 1,
            Disposition::Requeue => self.requeued += 1,
        }
    }
}

/// Creates the watch channel a consumer loop reports its lifecycle on.
pub fn state_channel() -> (watch::Sender<ConsumerState>, watch::Receiver<ConsumerState>) {
    watch::channel(ConsumerState::Starting)
}

/// Pulls and handles one message at a time until the source ends or
/// `shutdown` is cancelled. Cancellation is only observed between messages;
/// an in-flight message is always handled and settled first.
///
/// A message that still asks to be requeued on its `max_deliveries`-th
/// attempt stops the loop with an error. It is settled as a requeue first,
/// so it stays on the queue for whoever consumes next.
///
/// Handlers run on the blocking pool because every store call is synchronous.
pub async fn run_consume_loop<S: EventSource>(
    mut source: S,
    router: Router,
    max_deliveries: u32,
    shutdown: CancellationToken,
    state: watch::Sender<ConsumerState>,
) -> Result<ConsumerStats> {
    let max_deliveries = max_deliveries.max(1);
    let mut stats = ConsumerStats::default();
    let mut failure = None;
    state.send_replace(ConsumerState::Running);
    tracing::info!("consumer loop started");

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("shutdown requested; draining consumer");
                break;
            }
            next = source.next_delivery() => next,
        };
        let delivery = match next {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                tracing::info!("message source ended");
                break;
            }
            Err(err) => {
                tracing::error!(error = ?err, "message source failed");
                failure = Some(err);
                break;
            }
        };

        stats.received += 1;
        let disposition = match handle(&router, delivery.payload.clone()).await {
            Some(verdict) => {
                stats.record(&verdict);
                verdict.disposition()
            }
            None => Disposition::Requeue,
        };
        let attempt = delivery.attempt;
        match delivery.settle(disposition).await {
            Ok(()) => stats.settled(disposition),
            Err(err) => {
                tracing::warn!(error = ?err, ?disposition, attempt, "failed to settle message");
            }
        }

        if disposition == Disposition::Requeue && attempt >= max_deliveries {
            tracing::error!(attempt, max_deliveries, "message keeps failing; stopping consumer");
            failure = Some(anyhow!(
                "message still failing after {attempt} deliveries; consumer stopped with it left on the queue"
            ));
            break;
        }
    }

    state.send_replace(ConsumerState::Draining);
    if let Err(err) = source.close().await {
        tracing::warn!(error = ?err, "failed to close message source");
    }
    state.send_replace(ConsumerState::Stopped);
    tracing::info!(
        received = stats.received,
        applied = stats.applied,
        acked = stats.acked,
        requeued = stats.requeued,
        rejected = stats.rejected,
        unknown = stats.unknown,
        "consumer loop stopped"
    );

    match failure {
        Some(err) => Err(err),
        None => Ok(stats),
    }
}

/// `None` when the handler panicked; the message is requeued.
async fn handle(router: &Router, payload: Bytes) -> Option<Verdict> {
    let router = router.clone();
    match tokio::task::spawn_blocking(move || router.route(&payload)).await {
        Ok(verdict) => Some(verdict),
        Err(err) => {
            tracing::error!(error = %err, "action handler panicked");
            None
        }
    }
}
