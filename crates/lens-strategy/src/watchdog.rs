//! Stale buy-order watchdog.
//!
//! A one-sided strategy can leave a buy order resting indefinitely when the
//! market runs away from it. The watchdog tracks every buy order a strategy
//! places and scans the set every 10 seconds: a buy older than the timeout
//! with no resting sell order for the same user and symbol is cancelled and
//! untracked. A cancel failure keeps the entry so the next scan retries;
//! a successful cancel removes it, so each stale order is cancelled exactly
//! once.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use ahash::AHashMap;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info};

use crate::manager::StrategyManager;

#[derive(Debug, Clone)]
struct TrackedBuy {
    user_id: String,
    symbol: String,
    placed_at: Instant,
}

#[derive(Debug, Clone)]
struct TrackedSell {
    user_id: String,
    symbol: String,
}

/// Tracks resting orders and cancels timed-out buys.
pub struct OrderWatchdog {
    manager: Arc<StrategyManager>,
    timeout: Duration,
    buys: Mutex<AHashMap<String, TrackedBuy>>,
    sells: Mutex<AHashMap<String, TrackedSell>>,
}

impl OrderWatchdog {
    pub fn new(manager: Arc<StrategyManager>, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            manager,
            timeout,
            buys: Mutex::new(AHashMap::new()),
            sells: Mutex::new(AHashMap::new()),
        })
    }

    /// Register a freshly placed buy order.
    pub fn track_buy(&self, order_id: &str, user_id: &str, symbol: &str) {
        self.buys.lock().unwrap().insert(
            order_id.to_string(),
            TrackedBuy {
                user_id: user_id.to_string(),
                symbol: symbol.to_string(),
                placed_at: Instant::now(),
            },
        );
    }

    /// Register a freshly placed sell order; while it rests, buys for the
    /// same user and symbol are left alone.
    pub fn track_sell(&self, order_id: &str, user_id: &str, symbol: &str) {
        self.sells.lock().unwrap().insert(
            order_id.to_string(),
            TrackedSell {
                user_id: user_id.to_string(),
                symbol: symbol.to_string(),
            },
        );
    }

    /// Remove an order from tracking (filled, cancelled, or rejected).
    pub fn untrack(&self, order_id: &str) {
        self.buys.lock().unwrap().remove(order_id);
        self.sells.lock().unwrap().remove(order_id);
    }

    fn has_resting_sell(&self, user_id: &str, symbol: &str) -> bool {
        self.sells
            .lock()
            .unwrap()
            .values()
            .any(|s| s.user_id == user_id && s.symbol == symbol)
    }

    /// One scan round: cancel every expired buy with no counterpart sell.
    pub async fn scan(&self) {
        let now = Instant::now();
        let expired: Vec<(String, TrackedBuy)> = {
            let buys = self.buys.lock().unwrap();
            buys.iter()
                .filter(|(_, buy)| now.duration_since(buy.placed_at) > self.timeout)
                .map(|(id, buy)| (id.clone(), buy.clone()))
                .collect()
        };

        for (order_id, buy) in expired {
            if self.has_resting_sell(&buy.user_id, &buy.symbol) {
                continue;
            }
            match self
                .manager
                .cancel_order(&buy.user_id, &buy.symbol, &order_id)
                .await
            {
                Ok(_) => {
                    info!(
                        "[watchdog] stale buy {} ({}, {}) cancelled after timeout",
                        order_id, buy.user_id, buy.symbol,
                    );
                    self.untrack(&order_id);
                }
                Err(e) => {
                    // Entry stays tracked; the next scan retries.
                    error!("[watchdog] failed to cancel stale buy {order_id}: {e}");
                }
            }
        }
    }

    /// Spawn the periodic scan task. Runs until the shutdown signal fires.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("[watchdog] started (timeout {:?})", self.timeout);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.changed() => {
                        info!("[watchdog] stopped");
                        return;
                    }
                }
                self.scan().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::manager_fixture;

    #[tokio::test(start_paused = true)]
    async fn expired_buy_without_sell_is_cancelled_exactly_once() {
        let (manager, mock, _ui) = manager_fixture().await;
        let watchdog = OrderWatchdog::new(manager, Duration::from_secs(60));

        watchdog.track_buy("buy-1", "alice", "BTCUSDT");
        tokio::time::advance(Duration::from_secs(61)).await;

        watchdog.scan().await;
        assert_eq!(mock.cancelled_orders(), vec!["buy-1".to_string()]);

        // Entry removed: a second scan must not cancel again.
        watchdog.scan().await;
        assert_eq!(mock.cancelled_orders().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_buy_is_left_alone() {
        let (manager, mock, _ui) = manager_fixture().await;
        let watchdog = OrderWatchdog::new(manager, Duration::from_secs(60));

        watchdog.track_buy("buy-1", "alice", "BTCUSDT");
        tokio::time::advance(Duration::from_secs(30)).await;

        watchdog.scan().await;
        assert!(mock.cancelled_orders().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resting_sell_shields_the_buy() {
        let (manager, mock, _ui) = manager_fixture().await;
        let watchdog = OrderWatchdog::new(manager, Duration::from_secs(60));

        watchdog.track_buy("buy-1", "alice", "BTCUSDT");
        watchdog.track_sell("sell-1", "alice", "BTCUSDT");
        tokio::time::advance(Duration::from_secs(120)).await;

        watchdog.scan().await;
        assert!(mock.cancelled_orders().is_empty());

        // Once the sell completes, the stale buy becomes fair game.
        watchdog.untrack("sell-1");
        watchdog.scan().await;
        assert_eq!(mock.cancelled_orders(), vec!["buy-1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn sell_for_another_symbol_does_not_shield() {
        let (manager, mock, _ui) = manager_fixture().await;
        let watchdog = OrderWatchdog::new(manager, Duration::from_secs(60));

        watchdog.track_buy("buy-1", "alice", "BTCUSDT");
        watchdog.track_sell("sell-1", "alice", "ETHUSDT");
        tokio::time::advance(Duration::from_secs(120)).await;

        watchdog.scan().await;
        assert_eq!(mock.cancelled_orders(), vec!["buy-1".to_string()]);
    }
}
