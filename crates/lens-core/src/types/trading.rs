//! Trading-related data structures — orders, executions, wallets,
//! instruments, and account credentials.
//!
//! Private stream payloads (`order.spot`, `execution.spot`, `wallet`) and the
//! instrument metadata rows flow between the exchange layer and the strategy
//! layer through these types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{Category, OrderStatus, OrderType, Side, TimeInForce};

/// Deserialize an optional decimal, treating `null` and `""` as `None`.
///
/// Bybit sends empty strings for fields that do not apply to a given order
/// (e.g. the price of a market order).
fn opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Private order update (order.spot)
// ---------------------------------------------------------------------------

/// An order status update from the private stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub order_status: OrderStatus,
    pub price: Decimal,
    pub qty: Decimal,
    #[serde(default)]
    pub time_in_force: Option<TimeInForce>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub cum_exec_qty: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub cum_exec_value: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub cum_exec_fee: Option<Decimal>,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub updated_time: String,
    #[serde(default)]
    pub category: Option<Category>,
}

// ---------------------------------------------------------------------------
// Execution (execution.spot)
// ---------------------------------------------------------------------------

/// A fill notification from the private stream. One order can produce many
/// executions (partial fills).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionUpdate {
    pub exec_id: String,
    pub order_id: String,
    #[serde(default)]
    pub order_link_id: String,
    pub symbol: String,
    pub side: Side,
    pub exec_price: Decimal,
    pub exec_qty: Decimal,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub exec_fee: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub fee_rate: Option<Decimal>,
    #[serde(default)]
    pub is_maker: bool,
    #[serde(default)]
    pub order_type: Option<OrderType>,
    #[serde(default)]
    pub exec_time: String,
    #[serde(default)]
    pub category: Option<Category>,
}

// ---------------------------------------------------------------------------
// Wallet (wallet stream + REST wallet-balance)
// ---------------------------------------------------------------------------

/// Per-coin balance entry inside a wallet account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCoin {
    pub coin: String,
    pub wallet_balance: Decimal,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub free: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub locked: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub usd_value: Option<Decimal>,
}

impl WalletCoin {
    /// Balance available for new orders: `free` when the exchange reports
    /// it, otherwise the total wallet balance.
    pub fn available(&self) -> Decimal {
        self.free.unwrap_or(self.wallet_balance)
    }
}

/// One account entry in a wallet snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    #[serde(default)]
    pub account_type: String,
    pub coin: Vec<WalletCoin>,
}

impl WalletAccount {
    /// Find the balance entry for a coin (e.g. `"USDT"`).
    pub fn coin_balance(&self, coin: &str) -> Option<&WalletCoin> {
        self.coin.iter().find(|c| c.coin == coin)
    }
}

// ---------------------------------------------------------------------------
// Instrument metadata
// ---------------------------------------------------------------------------

/// Trading rules for one instrument, flattened from the exchange's lot-size
/// and price filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub symbol: String,
    pub category: Category,
    pub base_coin: String,
    pub quote_coin: String,
    pub status: String,
    /// Quantity precision of the base coin (e.g. `0.000001`).
    pub base_precision: Decimal,
    pub quote_precision: Decimal,
    pub min_order_qty: Decimal,
    pub max_order_qty: Decimal,
    pub min_order_amt: Decimal,
    pub max_order_amt: Decimal,
    pub tick_size: Decimal,
}

impl Instrument {
    /// True when the exchange reports the instrument as tradeable.
    pub fn is_trading(&self) -> bool {
        self.status == "Trading"
    }

    /// Number of decimal places implied by `base_precision`
    /// (`0.001` → 3, `1` → 0).
    pub fn base_precision_places(&self) -> u32 {
        self.base_precision.normalize().scale()
    }
}

// ---------------------------------------------------------------------------
// Account credentials
// ---------------------------------------------------------------------------

/// Exchange API credentials for one user account.
///
/// Owned by the hosting application and passed by reference into the REST
/// client per call; never persisted by this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub user_id: String,
    pub api_key: String,
    pub api_secret: String,
    /// Bybit account type (`"UNIFIED"`, `"SPOT"`).
    pub account_type: String,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Order request (strategy → exchange)
// ---------------------------------------------------------------------------

/// A new-order request issued by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Quantity in base-coin units.
    pub qty: Decimal,
    /// Limit price; `None` for market orders.
    pub price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    /// Optional client-assigned order link id.
    pub order_link_id: Option<String>,
}

impl OrderRequest {
    /// A GTC limit order.
    pub fn limit(symbol: &str, side: Side, qty: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Limit,
            qty,
            price: Some(price),
            time_in_force: TimeInForce::Gtc,
            order_link_id: None,
        }
    }
}
