//! Log-everything strategy.
//!
//! Places no orders; logs each event it receives. Useful for verifying the
//! full stream → dispatch path on a new deployment before enabling a real
//! strategy.

use async_trait::async_trait;
use lens_core::{
    ExecutionUpdate, OrderBookUpdate, OrderUpdate, TickerUpdate, TradeUpdate, WalletAccount,
};
use tracing::info;

use crate::Strategy;

/// A strategy that only records what it sees.
pub struct RecorderStrategy {
    user_id: String,
}

impl RecorderStrategy {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }
}

#[async_trait]
impl Strategy for RecorderStrategy {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn on_ticker(&self, ticker: &TickerUpdate) {
        info!(
            "[recorder:{}] ticker {}: last={}",
            self.user_id, ticker.symbol, ticker.last_price,
        );
    }

    async fn on_order_book(&self, book: &OrderBookUpdate) {
        info!(
            "[recorder:{}] book {}: {} bids, {} asks",
            self.user_id,
            book.symbol,
            book.bids.len(),
            book.asks.len(),
        );
    }

    async fn on_trade(&self, trade: &TradeUpdate) {
        info!(
            "[recorder:{}] trade {}: {} {} @ {}",
            self.user_id, trade.symbol, trade.side, trade.qty, trade.price,
        );
    }

    async fn on_order(&self, order: &OrderUpdate) {
        info!(
            "[recorder:{}] order {}: {:?}",
            self.user_id, order.order_id, order.order_status,
        );
    }

    async fn on_execution(&self, execution: &ExecutionUpdate) {
        info!(
            "[recorder:{}] execution {}: {} {} @ {}",
            self.user_id,
            execution.exec_id,
            execution.side,
            execution.exec_qty,
            execution.exec_price,
        );
    }

    async fn on_wallet(&self, accounts: &[WalletAccount]) {
        for account in accounts {
            for coin in &account.coin {
                info!(
                    "[recorder:{}] balance {}: {}",
                    self.user_id, coin.coin, coin.wallet_balance,
                );
            }
        }
    }

    async fn start(&self) {
        info!("[recorder:{}] started", self.user_id);
    }

    async fn stop(&self) {
        info!("[recorder:{}] stopped", self.user_id);
    }
}
