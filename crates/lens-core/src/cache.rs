//! Market-data cache — latest snapshot plus bounded history per symbol.
//!
//! The engine publishes every decoded public event here so external readers
//! (and strategies, for the spread gate) see the freshest view without
//! re-reading the stream. Snapshots are last-write-wins per symbol; history
//! lists are bounded to [`HISTORY_CAP`] entries, newest first.
//!
//! The production deployment backs this with an external key/value store;
//! [`MemoryMarketCache`] is the in-process implementation used by the runner
//! and by tests.

use std::collections::VecDeque;
use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::error::LensError;
use crate::types::{OrderBookUpdate, TickerUpdate, TradeUpdate};

/// Maximum retained history entries per symbol and data kind.
pub const HISTORY_CAP: usize = 1000;

/// Read-through cache for the latest market data.
#[async_trait]
pub trait MarketCache: Send + Sync {
    async fn save_ticker(&self, symbol: &str, ticker: TickerUpdate) -> Result<(), LensError>;
    async fn get_ticker(&self, symbol: &str) -> Result<TickerUpdate, LensError>;
    async fn ticker_history(&self, symbol: &str, limit: usize)
    -> Result<Vec<TickerUpdate>, LensError>;

    async fn save_order_book(&self, symbol: &str, book: OrderBookUpdate)
    -> Result<(), LensError>;
    async fn get_order_book(&self, symbol: &str) -> Result<OrderBookUpdate, LensError>;
    async fn order_book_history(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<OrderBookUpdate>, LensError>;

    async fn save_public_trade(&self, symbol: &str, trade: TradeUpdate) -> Result<(), LensError>;
    async fn public_trades(&self, symbol: &str, limit: usize)
    -> Result<Vec<TradeUpdate>, LensError>;

    async fn save_spread(&self, symbol: &str, spread: Decimal) -> Result<(), LensError>;
    async fn get_spread(&self, symbol: &str) -> Result<Decimal, LensError>;
}

/// In-process [`MarketCache`] backed by hash maps.
#[derive(Default)]
pub struct MemoryMarketCache {
    tickers: RwLock<AHashMap<String, TickerUpdate>>,
    ticker_hist: RwLock<AHashMap<String, VecDeque<TickerUpdate>>>,
    books: RwLock<AHashMap<String, OrderBookUpdate>>,
    book_hist: RwLock<AHashMap<String, VecDeque<OrderBookUpdate>>>,
    trades: RwLock<AHashMap<String, VecDeque<TradeUpdate>>>,
    spreads: RwLock<AHashMap<String, Decimal>>,
}

impl MemoryMarketCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// Push into a bounded per-symbol history, newest first.
fn push_history<T>(map: &mut AHashMap<String, VecDeque<T>>, symbol: &str, value: T) {
    let hist = map.entry(symbol.to_string()).or_default();
    hist.push_front(value);
    hist.truncate(HISTORY_CAP);
}

#[async_trait]
impl MarketCache for MemoryMarketCache {
    async fn save_ticker(&self, symbol: &str, ticker: TickerUpdate) -> Result<(), LensError> {
        push_history(&mut *self.ticker_hist.write().await, symbol, ticker.clone());
        self.tickers
            .write()
            .await
            .insert(symbol.to_string(), ticker);
        Ok(())
    }

    async fn get_ticker(&self, symbol: &str) -> Result<TickerUpdate, LensError> {
        self.tickers
            .read()
            .await
            .get(symbol)
            .cloned()
            .ok_or_else(|| LensError::NotFound(format!("ticker {symbol}")))
    }

    async fn ticker_history(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<TickerUpdate>, LensError> {
        Ok(self
            .ticker_hist
            .read()
            .await
            .get(symbol)
            .map(|h| h.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn save_order_book(
        &self,
        symbol: &str,
        book: OrderBookUpdate,
    ) -> Result<(), LensError> {
        push_history(&mut *self.book_hist.write().await, symbol, book.clone());
        self.books.write().await.insert(symbol.to_string(), book);
        Ok(())
    }

    async fn get_order_book(&self, symbol: &str) -> Result<OrderBookUpdate, LensError> {
        self.books
            .read()
            .await
            .get(symbol)
            .cloned()
            .ok_or_else(|| LensError::NotFound(format!("order book {symbol}")))
    }

    async fn order_book_history(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<OrderBookUpdate>, LensError> {
        Ok(self
            .book_hist
            .read()
            .await
            .get(symbol)
            .map(|h| h.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn save_public_trade(&self, symbol: &str, trade: TradeUpdate) -> Result<(), LensError> {
        push_history(&mut *self.trades.write().await, symbol, trade);
        Ok(())
    }

    async fn public_trades(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<TradeUpdate>, LensError> {
        Ok(self
            .trades
            .read()
            .await
            .get(symbol)
            .map(|h| h.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn save_spread(&self, symbol: &str, spread: Decimal) -> Result<(), LensError> {
        self.spreads
            .write()
            .await
            .insert(symbol.to_string(), spread);
        Ok(())
    }

    async fn get_spread(&self, symbol: &str) -> Result<Decimal, LensError> {
        self.spreads
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| LensError::NotFound(format!("spread {symbol}")))
    }
}
