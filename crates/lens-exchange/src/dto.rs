//! Typed Bybit v5 REST responses.
//!
//! Every endpoint returns the generic envelope
//! `{retCode, retMsg, result, retExtInfo, time}`; [`ApiResponse::into_result`]
//! converts a non-zero `retCode` into [`LensError::Api`] carrying the
//! exchange's message verbatim, which callers must surface unchanged.

use lens_core::{
    Category, Instrument, LensError, OrderUpdate, Side, TickerUpdate, WalletAccount,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The generic Bybit response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub ret_ext_info: Option<serde_json::Value>,
    #[serde(default)]
    pub time: i64,
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload, mapping a non-zero `retCode` to
    /// [`LensError::Api`] with the exchange message passed through.
    pub fn into_result(self) -> Result<T, LensError> {
        if self.ret_code != 0 {
            return Err(LensError::Api {
                code: self.ret_code,
                message: self.ret_msg,
            });
        }
        self.result
            .ok_or_else(|| LensError::Parse("missing result in success response".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Wallet balance
// ---------------------------------------------------------------------------

/// `GET /v5/account/wallet-balance` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalanceResult {
    pub list: Vec<WalletAccount>,
}

impl WalletBalanceResult {
    /// Available balance of one coin in the first account entry.
    pub fn available(&self, coin: &str) -> Option<Decimal> {
        self.list
            .first()
            .and_then(|acct| acct.coin_balance(coin))
            .map(|c| c.available())
    }

    /// USD valuation of one coin in the first account entry.
    pub fn usd_value(&self, coin: &str) -> Option<Decimal> {
        self.list
            .first()
            .and_then(|acct| acct.coin_balance(coin))
            .and_then(|c| c.usd_value)
    }
}

// ---------------------------------------------------------------------------
// Instruments
// ---------------------------------------------------------------------------

/// `GET /v5/market/instruments-info` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentsResult {
    pub category: Category,
    pub list: Vec<InstrumentInfo>,
}

/// One instrument entry with its nested filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentInfo {
    pub symbol: String,
    pub base_coin: String,
    pub quote_coin: String,
    pub status: String,
    pub lot_size_filter: LotSizeFilter,
    pub price_filter: PriceFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSizeFilter {
    pub base_precision: Decimal,
    pub quote_precision: Decimal,
    pub min_order_qty: Decimal,
    pub max_order_qty: Decimal,
    pub min_order_amt: Decimal,
    pub max_order_amt: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFilter {
    pub tick_size: Decimal,
}

impl InstrumentInfo {
    /// Flatten into the repository's [`Instrument`] row.
    pub fn into_instrument(self, category: Category) -> Instrument {
        Instrument {
            symbol: self.symbol,
            category,
            base_coin: self.base_coin,
            quote_coin: self.quote_coin,
            status: self.status,
            base_precision: self.lot_size_filter.base_precision,
            quote_precision: self.lot_size_filter.quote_precision,
            min_order_qty: self.lot_size_filter.min_order_qty,
            max_order_qty: self.lot_size_filter.max_order_qty,
            min_order_amt: self.lot_size_filter.min_order_amt,
            max_order_amt: self.lot_size_filter.max_order_amt,
            tick_size: self.price_filter.tick_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// `GET /v5/market/tickers` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickersResult {
    pub category: Category,
    pub list: Vec<TickerUpdate>,
}

/// One kline row: `[start, open, high, low, close, volume, turnover]`.
pub type KlineRow = [String; 7];

/// `GET /v5/market/kline` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlinesResult {
    pub category: Category,
    pub symbol: String,
    pub list: Vec<KlineRow>,
}

/// One public trade from the recent-trade endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTrade {
    pub exec_id: String,
    pub symbol: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
    pub time: String,
    #[serde(default)]
    pub is_block_trade: bool,
}

/// `GET /v5/market/recent-trade` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTradesResult {
    pub category: Category,
    pub list: Vec<RecentTrade>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Acknowledgement from order create/amend/cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
}

/// `GET /v5/order/realtime` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrdersResult {
    pub list: Vec<OrderUpdate>,
    #[serde(default)]
    pub next_page_cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Fee rate
// ---------------------------------------------------------------------------

/// One symbol's fee rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeRate {
    pub symbol: String,
    pub taker_fee_rate: Decimal,
    pub maker_fee_rate: Decimal,
}

/// `GET /v5/account/fee-rate` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRateResult {
    pub list: Vec<FeeRate>,
}

impl FeeRateResult {
    /// The worst-case (higher) of maker and taker for the first entry.
    pub fn max_rate(&self) -> Option<Decimal> {
        self.list
            .first()
            .map(|f| f.taker_fee_rate.max(f.maker_fee_rate))
    }
}
