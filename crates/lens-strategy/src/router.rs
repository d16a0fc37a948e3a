//! Stream frame routing: decoded messages → cache writes → dispatch.
//!
//! Public frames update the market cache first (snapshot, history, computed
//! spread) and then fan out through the [`StrategyManager`], so strategies
//! and external readers always observe cache state at least as fresh as the
//! event that triggered them.
//!
//! Private frames are user-scoped: order and wallet updates go straight to
//! dispatch; executions are additionally written to the trade log for a
//! durable audit trail. A cache or trade-log write failure is logged and the
//! event still dispatches — routing never drops an account event over a
//! persistence error.

use std::sync::Arc;

use lens_core::cache::MarketCache;
use lens_core::repository::TradeLogRepository;
use lens_exchange::StreamMessage;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::manager::StrategyManager;

/// Routes decoded stream messages into the cache and the dispatcher.
pub struct MarketRouter {
    cache: Arc<dyn MarketCache>,
    manager: Arc<StrategyManager>,
    trade_log: Arc<dyn TradeLogRepository>,
}

impl MarketRouter {
    pub fn new(
        cache: Arc<dyn MarketCache>,
        manager: Arc<StrategyManager>,
        trade_log: Arc<dyn TradeLogRepository>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cache,
            manager,
            trade_log,
        })
    }

    /// Route one public-stream message.
    pub async fn handle_public(&self, message: StreamMessage) {
        match message {
            StreamMessage::Ticker { symbol, ticker } => {
                if let Err(e) = self.cache.save_ticker(&symbol, ticker.clone()).await {
                    error!("[router] ticker cache write failed: {e}");
                }
                self.manager.handle_ticker(&ticker).await;
            }
            StreamMessage::OrderBook { symbol, book } => {
                if let Err(e) = self.cache.save_order_book(&symbol, book.clone()).await {
                    error!("[router] book cache write failed: {e}");
                }
                if let Some(spread) = book.spread() {
                    if let Err(e) = self.cache.save_spread(&symbol, spread).await {
                        error!("[router] spread cache write failed: {e}");
                    }
                }
                self.manager.handle_order_book(&book).await;
            }
            StreamMessage::Trades { symbol, trades } => {
                for trade in trades {
                    if let Err(e) = self.cache.save_public_trade(&symbol, trade.clone()).await {
                        error!("[router] trade cache write failed: {e}");
                    }
                    self.manager.handle_trade(&trade).await;
                }
            }
            StreamMessage::SubscribeAck { success, ret_msg } => {
                if success {
                    info!("[router] public subscription confirmed");
                } else {
                    error!("[router] public subscription failed: {ret_msg}");
                }
            }
            StreamMessage::Pong => {}
            StreamMessage::Unknown { topic } => {
                debug!("[router] unhandled public topic: {topic}");
            }
            other => warn!("[router] unexpected frame on public stream: {other:?}"),
        }
    }

    /// Route one private-stream message for the given user.
    pub async fn handle_private(&self, user_id: &str, message: StreamMessage) {
        match message {
            StreamMessage::Order(orders) => {
                for order in orders {
                    debug!(
                        "[router] order for {user_id}: {} {:?}",
                        order.order_id, order.order_status,
                    );
                    self.manager.handle_order(&order).await;
                }
            }
            StreamMessage::Execution(executions) => {
                for execution in executions {
                    if let Err(e) = self.trade_log.save_execution(user_id, &execution).await {
                        error!("[router] trade log write failed for {user_id}: {e}");
                    }
                    self.manager.handle_execution(&execution).await;
                }
            }
            StreamMessage::Wallet(accounts) => {
                self.manager.handle_wallet(&accounts).await;
            }
            StreamMessage::SubscribeAck { success, ret_msg } => {
                if success {
                    info!("[router] private subscription confirmed for {user_id}");
                } else {
                    error!("[router] private subscription failed for {user_id}: {ret_msg}");
                }
            }
            StreamMessage::AuthAck { .. } | StreamMessage::Pong => {}
            StreamMessage::Unknown { topic } => {
                debug!("[router] unhandled private topic: {topic}");
            }
            other => warn!("[router] unexpected frame on private stream: {other:?}"),
        }
    }
}

/// Drain the bounded public queue into the router until shutdown.
pub fn spawn_public_consumer(
    router: Arc<MarketRouter>,
    mut rx: mpsc::Receiver<StreamMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => return,
                message = rx.recv() => match message {
                    Some(message) => router.handle_public(message).await,
                    None => return,
                },
            }
        }
    })
}

/// Drain one user's unbounded private queue into the router until shutdown.
pub fn spawn_private_consumer(
    router: Arc<MarketRouter>,
    user_id: String,
    mut rx: mpsc::UnboundedReceiver<StreamMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => return,
                message = rx.recv() => match message {
                    Some(message) => router.handle_private(&user_id, message).await,
                    None => return,
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CountingStrategy, manager_fixture};
    use lens_core::cache::{MarketCache, MemoryMarketCache};
    use lens_core::repository::MemoryTradeLogRepository;
    use lens_exchange::messages::decode_frame;

    async fn router_fixture() -> (
        Arc<MarketRouter>,
        Arc<MemoryMarketCache>,
        Arc<MemoryTradeLogRepository>,
        Arc<CountingStrategy>,
    ) {
        let (manager, _mock, user_instruments) = manager_fixture().await;
        let strategy = CountingStrategy::shared();
        manager.add_strategy("alice", strategy.clone()).await;
        user_instruments
            .set_active("alice", vec!["BTCUSDT".into()])
            .await;
        manager.update_user_instruments("alice").await.unwrap();

        let cache = MemoryMarketCache::new();
        let trade_log = MemoryTradeLogRepository::new();
        let router = MarketRouter::new(cache.clone(), manager, trade_log.clone());
        (router, cache, trade_log, strategy)
    }

    #[tokio::test]
    async fn order_book_frame_caches_snapshot_and_spread_then_dispatches() {
        let (router, cache, _log, strategy) = router_fixture().await;
        let frame = r#"{
            "topic": "orderbook.1.BTCUSDT",
            "type": "snapshot",
            "ts": 1672304484978,
            "data": {
                "s": "BTCUSDT",
                "b": [["29999.9", "0.3"]],
                "a": [["30000.1", "0.5"]],
                "u": 10
            }
        }"#;

        router.handle_public(decode_frame(frame).unwrap()).await;

        let book = cache.get_order_book("BTCUSDT").await.unwrap();
        assert_eq!(book.update_id, 10);
        assert_eq!(cache.get_spread("BTCUSDT").await.unwrap().to_string(), "0.2");
        assert_eq!(strategy.events(), vec!["book:BTCUSDT"]);
    }

    #[tokio::test]
    async fn executions_are_persisted_and_dispatched() {
        let (router, _cache, trade_log, strategy) = router_fixture().await;
        let frame = r#"{
            "topic": "execution.spot",
            "creationTime": 1672364174455,
            "data": [{
                "execId": "7e2ae69c",
                "orderId": "1523347543495541248",
                "symbol": "BTCUSDT",
                "side": "Buy",
                "execPrice": "30000.1",
                "execQty": "0.003333",
                "execFee": "0.01",
                "feeRate": "0.001",
                "isMaker": true,
                "orderType": "Limit",
                "execTime": "1672364174443"
            }]
        }"#;

        router
            .handle_private("alice", decode_frame(frame).unwrap())
            .await;

        let saved = trade_log.executions().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "alice");
        assert_eq!(saved[0].1.exec_id, "7e2ae69c");
        assert_eq!(strategy.events(), vec!["execution:7e2ae69c"]);
    }

    #[tokio::test]
    async fn trade_batch_fans_out_per_print() {
        let (router, cache, _log, strategy) = router_fixture().await;
        let frame = r#"{
            "topic": "publicTrade.BTCUSDT",
            "type": "snapshot",
            "ts": 1672304486868,
            "data": [
                {"i": "t1", "T": 1, "p": "30000", "v": "0.1", "S": "Buy", "s": "BTCUSDT"},
                {"i": "t2", "T": 2, "p": "30001", "v": "0.2", "S": "Sell", "s": "BTCUSDT"}
            ]
        }"#;

        router.handle_public(decode_frame(frame).unwrap()).await;

        assert_eq!(cache.public_trades("BTCUSDT", 10).await.unwrap().len(), 2);
        assert_eq!(
            strategy.events(),
            vec!["trade:BTCUSDT", "trade:BTCUSDT"]
        );
    }

    #[tokio::test]
    async fn wallet_frame_dispatches_without_symbol_filter() {
        let (router, _cache, _log, strategy) = router_fixture().await;
        let frame = r#"{
            "topic": "wallet",
            "creationTime": 1700034722104,
            "data": [{
                "accountType": "UNIFIED",
                "coin": [{"coin": "USDT", "walletBalance": "100"}]
            }]
        }"#;

        router
            .handle_private("alice", decode_frame(frame).unwrap())
            .await;
        assert_eq!(strategy.events(), vec!["wallet"]);
    }

    #[tokio::test]
    async fn control_frames_are_absorbed() {
        let (router, _cache, _log, strategy) = router_fixture().await;
        let pong = r#"{"success":true,"ret_msg":"pong","op":"ping"}"#;
        let ack = r#"{"success":true,"ret_msg":"","op":"subscribe"}"#;

        router.handle_public(decode_frame(pong).unwrap()).await;
        router.handle_public(decode_frame(ack).unwrap()).await;
        router.handle_private("alice", decode_frame(pong).unwrap()).await;

        assert!(strategy.events().is_empty());
    }
}
