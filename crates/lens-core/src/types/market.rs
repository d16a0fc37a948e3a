//! Public market data payloads — tickers, order books, trade prints.
//!
//! These structs map 1:1 onto the `data` field of Bybit v5 public stream
//! frames (`tickers.*`, `orderbook.*`, `publicTrade.*`). All monetary values
//! deserialize from the exchange's decimal strings into
//! [`rust_decimal::Decimal`]; binary floats are never used for money.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::Side;

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// A ticker snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerUpdate {
    pub symbol: String,
    pub last_price: Decimal,
    #[serde(default)]
    pub high_price_24h: Option<Decimal>,
    #[serde(default)]
    pub low_price_24h: Option<Decimal>,
    #[serde(default)]
    pub prev_price_24h: Option<Decimal>,
    #[serde(default)]
    pub volume_24h: Option<Decimal>,
    #[serde(default)]
    pub turnover_24h: Option<Decimal>,
    #[serde(default)]
    pub price_24h_pcnt: Option<Decimal>,
    #[serde(default)]
    pub usd_index_price: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Order book
// ---------------------------------------------------------------------------

/// One price level: `[price, quantity]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel(pub Decimal, pub Decimal);

impl BookLevel {
    pub fn price(&self) -> Decimal {
        self.0
    }

    pub fn qty(&self) -> Decimal {
        self.1
    }
}

/// An order book update for one symbol.
///
/// Cached last-write-wins per symbol; depth-1 subscriptions deliver a full
/// snapshot per frame, so no local book reconstruction is performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "b")]
    pub bids: Vec<BookLevel>,
    #[serde(rename = "a")]
    pub asks: Vec<BookLevel>,
    #[serde(rename = "u")]
    pub update_id: u64,
    #[serde(default)]
    pub seq: u64,
}

impl OrderBookUpdate {
    /// Best bid price, if any bid level is present.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(BookLevel::price)
    }

    /// Best ask price, if any ask level is present.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(BookLevel::price)
    }

    /// Best-ask minus best-bid. `None` when either side is empty.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Public trade
// ---------------------------------------------------------------------------

/// A single public trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeUpdate {
    #[serde(rename = "i")]
    pub trade_id: String,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "T")]
    pub time_ms: i64,
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "v")]
    pub qty: Decimal,
    #[serde(rename = "S")]
    pub side: Side,
    #[serde(rename = "BT", default)]
    pub is_block_trade: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_book_spread_from_wire_frame() {
        let json = r#"{
            "s": "BTCUSDT",
            "b": [["29999.9", "0.3"]],
            "a": [["30000.1", "0.5"]],
            "u": 123456789,
            "seq": 7
        }"#;
        let book: OrderBookUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(book.symbol, "BTCUSDT");
        assert_eq!(book.best_bid().unwrap().to_string(), "29999.9");
        assert_eq!(book.best_ask().unwrap().to_string(), "30000.1");
        assert_eq!(book.spread().unwrap().to_string(), "0.2");
    }

    #[test]
    fn order_book_spread_needs_both_sides() {
        let json = r#"{"s":"BTCUSDT","b":[],"a":[["30000.1","0.5"]],"u":1}"#;
        let book: OrderBookUpdate = serde_json::from_str(json).unwrap();
        assert!(book.best_bid().is_none());
        assert!(book.spread().is_none());
    }

    #[test]
    fn trade_decodes_side_and_decimals() {
        let json = r#"{
            "i": "2290000000073285494",
            "T": 1672515782135,
            "p": "16578.50",
            "v": "0.001",
            "S": "Sell",
            "s": "BTCUSDT",
            "BT": false
        }"#;
        let trade: TradeUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(trade.side, Side::Sell);
        assert_eq!(trade.price.to_string(), "16578.50");
    }

    #[test]
    fn ticker_tolerates_missing_optionals() {
        let json = r#"{"symbol":"BTCUSDT","lastPrice":"30000"}"#;
        let ticker: TickerUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(ticker.last_price.to_string(), "30000");
        assert!(ticker.volume_24h.is_none());
    }
}
