//! Bounded market-data queue with a fill-level monitor.
//!
//! The WebSocket read loop must never block on slow consumers, so decoded
//! public frames go through a bounded queue: the producer side uses
//! `try_send` and, when the queue is full, drops the newest frame and counts
//! it (market data is staleness-tolerant; the next snapshot supersedes the
//! dropped one). Account and order events do NOT pass through this queue —
//! they ride an unbounded channel and are never dropped.
//!
//! A monitor task samples the fill percentage once per second and escalates
//! log severity: `warn!` at ≥ 80 %, `error!` at 100 %, always reporting the
//! cumulative drop count so saturation is visible rather than silent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::messages::StreamMessage;

/// Producer handle for the bounded market-data queue.
#[derive(Clone)]
pub struct MarketQueue {
    tx: mpsc::Sender<StreamMessage>,
    capacity: usize,
    dropped: Arc<AtomicU64>,
}

impl MarketQueue {
    /// Create a queue with the given capacity, returning the producer handle
    /// and the consumer end.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<StreamMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                capacity,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Enqueue a message. On a full queue the message is dropped and
    /// counted; on a closed queue (consumer gone during shutdown) it is
    /// discarded silently.
    pub fn push(&self, message: StreamMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Current fill level in percent (0–100).
    pub fn fill_percent(&self) -> f64 {
        let free = self.tx.capacity();
        let used = self.capacity.saturating_sub(free);
        used as f64 / self.capacity as f64 * 100.0
    }

    /// Messages dropped so far because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Spawn the fill-level monitor for one queue.
///
/// Runs until the shutdown signal fires.
pub fn spawn_queue_monitor(
    label: String,
    queue: MarketQueue,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("[queue-{label}] monitor started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_rx.changed() => {
                    info!("[queue-{label}] monitor stopped");
                    return;
                }
            }

            let fill = queue.fill_percent();
            let dropped = queue.dropped();
            if fill >= 100.0 {
                error!(
                    "[queue-{label}] message queue saturated: {fill:.2}% full, {dropped} dropped"
                );
            } else if fill >= 80.0 {
                warn!(
                    "[queue-{label}] message queue nearly full: {fill:.2}% full, {dropped} dropped"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overflow_drops_newest_and_counts() {
        let (queue, mut rx) = MarketQueue::bounded(2);
        queue.push(StreamMessage::Pong);
        queue.push(StreamMessage::Pong);
        assert_eq!(queue.fill_percent(), 100.0);

        // Third push exceeds capacity: dropped and counted, not blocked.
        queue.push(StreamMessage::Pong);
        assert_eq!(queue.dropped(), 1);

        // The two queued messages are intact.
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert_eq!(queue.dropped(), 1);
    }

    #[tokio::test]
    async fn fill_percent_tracks_consumption() {
        let (queue, mut rx) = MarketQueue::bounded(4);
        assert_eq!(queue.fill_percent(), 0.0);

        queue.push(StreamMessage::Pong);
        queue.push(StreamMessage::Pong);
        assert_eq!(queue.fill_percent(), 50.0);

        rx.recv().await.unwrap();
        assert_eq!(queue.fill_percent(), 25.0);
    }

    #[tokio::test]
    async fn closed_queue_discards_silently() {
        let (queue, rx) = MarketQueue::bounded(2);
        drop(rx);
        queue.push(StreamMessage::Pong);
        assert_eq!(queue.dropped(), 0);
    }
}
