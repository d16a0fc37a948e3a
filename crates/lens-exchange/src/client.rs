//! Exchange capability trait.
//!
//! The strategy layer talks to the exchange only through [`ExchangeClient`],
//! so it can run against [`BybitClient`](crate::rest::BybitClient) in
//! production and a recording mock in tests. Credentials are passed by
//! reference per call; implementations hold no account state.

use async_trait::async_trait;
use lens_core::{AccountCredentials, Category, LensError, OrderRequest};
use rust_decimal::Decimal;

use crate::dto::{
    FeeRateResult, InstrumentsResult, KlinesResult, OpenOrdersResult, OrderAck,
    RecentTradesResult, TickersResult, WalletBalanceResult,
};

/// Uniform interface over the exchange's REST surface.
///
/// All methods take `&self` and are safe to call from multiple tasks
/// concurrently. Failures are never retried inside the implementation;
/// retry policy belongs to the caller.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    // -- Account --

    async fn get_wallet_balance(
        &self,
        account: &AccountCredentials,
    ) -> Result<WalletBalanceResult, LensError>;

    async fn get_fee_rate(
        &self,
        account: &AccountCredentials,
        category: Category,
        symbol: Option<&str>,
    ) -> Result<FeeRateResult, LensError>;

    // -- Public market data --

    async fn get_instruments(&self, category: Category) -> Result<InstrumentsResult, LensError>;

    async fn get_tickers(
        &self,
        category: Category,
        symbol: Option<&str>,
    ) -> Result<TickersResult, LensError>;

    async fn get_klines(
        &self,
        category: Category,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<KlinesResult, LensError>;

    async fn get_recent_trades(
        &self,
        category: Category,
        symbol: &str,
        limit: u32,
    ) -> Result<RecentTradesResult, LensError>;

    // -- Orders --

    async fn create_order(
        &self,
        account: &AccountCredentials,
        request: &OrderRequest,
    ) -> Result<OrderAck, LensError>;

    async fn amend_order(
        &self,
        account: &AccountCredentials,
        symbol: &str,
        order_id: &str,
        price: Option<Decimal>,
        qty: Option<Decimal>,
    ) -> Result<OrderAck, LensError>;

    async fn cancel_order(
        &self,
        account: &AccountCredentials,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderAck, LensError>;

    async fn cancel_all_orders(
        &self,
        account: &AccountCredentials,
        symbol: &str,
    ) -> Result<(), LensError>;

    async fn get_open_orders(
        &self,
        account: &AccountCredentials,
        symbol: &str,
        limit: u32,
    ) -> Result<OpenOrdersResult, LensError>;
}
