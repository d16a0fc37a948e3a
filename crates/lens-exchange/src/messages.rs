//! WebSocket frame decode.
//!
//! Every Bybit stream frame carries an envelope `{topic, type, data, ts}`;
//! control frames (subscribe/auth acks, pong) have an empty topic. The first
//! dot-separated topic segment selects the payload type and the last segment
//! is the instrument symbol for public topics
//! (`orderbook.50.BTCUSDT` → order book for `BTCUSDT`).
//!
//! Decoding produces the [`StreamMessage`] tagged enum, so the set of
//! supported topics is exhaustively matchable downstream; unrecognized
//! topics decode to [`StreamMessage::Unknown`] and are logged and dropped by
//! the consumer rather than killing the connection.

use lens_core::{
    ExecutionUpdate, LensError, OrderBookUpdate, OrderUpdate, TickerUpdate, TradeUpdate,
    WalletAccount,
};

/// A decoded stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// `tickers.<symbol>` — ticker snapshot.
    Ticker {
        symbol: String,
        ticker: TickerUpdate,
    },
    /// `orderbook.<depth>.<symbol>` — book snapshot/delta.
    OrderBook {
        symbol: String,
        book: OrderBookUpdate,
    },
    /// `publicTrade.<symbol>` — batch of trade prints.
    Trades {
        symbol: String,
        trades: Vec<TradeUpdate>,
    },
    /// `order.spot` — private order status updates.
    Order(Vec<OrderUpdate>),
    /// `execution.spot` — private fills.
    Execution(Vec<ExecutionUpdate>),
    /// `wallet` — private wallet snapshots.
    Wallet(Vec<WalletAccount>),
    /// Subscribe acknowledgement control frame.
    SubscribeAck { success: bool, ret_msg: String },
    /// Auth acknowledgement control frame.
    AuthAck { success: bool, ret_msg: String },
    /// Heartbeat response; discarded by consumers.
    Pong,
    /// A topic this engine does not handle.
    Unknown { topic: String },
}

/// Decode one raw text frame.
///
/// A malformed frame is a protocol error: the caller logs it and drops the
/// single frame while the connection stays up.
pub fn decode_frame(text: &str) -> Result<StreamMessage, LensError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| LensError::Parse(e.to_string()))?;

    let topic = value
        .get("topic")
        .and_then(|t| t.as_str())
        .unwrap_or_default();

    if topic.is_empty() {
        return Ok(decode_control(&value));
    }

    let head = topic.split('.').next().unwrap_or_default();
    let symbol = topic.rsplit('.').next().unwrap_or_default().to_string();
    let data = value
        .get("data")
        .cloned()
        .ok_or_else(|| LensError::Parse(format!("frame for {topic} missing data")))?;

    let message = match head {
        "tickers" => StreamMessage::Ticker {
            symbol,
            ticker: from_data(data)?,
        },
        "orderbook" => StreamMessage::OrderBook {
            symbol,
            book: from_data(data)?,
        },
        "publicTrade" => StreamMessage::Trades {
            symbol,
            trades: from_data(data)?,
        },
        "order" => StreamMessage::Order(from_data(data)?),
        "execution" => StreamMessage::Execution(from_data(data)?),
        "wallet" => StreamMessage::Wallet(from_data(data)?),
        _ => StreamMessage::Unknown {
            topic: topic.to_string(),
        },
    };
    Ok(message)
}

/// Control frames: pong markers, subscribe acks, auth acks.
fn decode_control(value: &serde_json::Value) -> StreamMessage {
    let op = value.get("op").and_then(|o| o.as_str()).unwrap_or_default();
    let ret_msg = value
        .get("ret_msg")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    let success = value
        .get("success")
        .and_then(|s| s.as_bool())
        .unwrap_or(false);

    // Public streams answer ping with op "ping" and ret_msg "pong";
    // private streams answer with op "pong".
    if op == "pong" || ret_msg == "pong" {
        return StreamMessage::Pong;
    }

    match op {
        "subscribe" => StreamMessage::SubscribeAck { success, ret_msg },
        "auth" => StreamMessage::AuthAck { success, ret_msg },
        _ => StreamMessage::Unknown {
            topic: String::new(),
        },
    }
}

fn from_data<T: serde::de::DeserializeOwned>(data: serde_json::Value) -> Result<T, LensError> {
    serde_json::from_value(data).map_err(|e| LensError::Parse(e.to_string()))
}

/// Build the subscription op for a channel list.
pub fn build_subscribe(channels: &[String]) -> String {
    serde_json::json!({
        "op": "subscribe",
        "args": channels,
    })
    .to_string()
}

/// Build the public channel list for one symbol at the given book depth.
pub fn public_channels(symbol: &str, orderbook_depth: u32) -> Vec<String> {
    vec![
        format!("tickers.{symbol}"),
        format!("orderbook.{orderbook_depth}.{symbol}"),
        format!("publicTrade.{symbol}"),
    ]
}

/// The private channel list (account-scoped, not per symbol).
pub fn private_channels() -> Vec<String> {
    vec![
        "order.spot".to_string(),
        "execution.spot".to_string(),
        "wallet".to_string(),
    ]
}
