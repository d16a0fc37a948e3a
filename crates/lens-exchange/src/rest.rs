//! Signed Bybit v5 REST client.
//!
//! One method per endpoint. Authenticated calls attach a millisecond
//! timestamp, the API key, the receive window, and an HMAC-SHA256 signature
//! over `timestamp + apiKey + recvWindow + canonical` (see [`crate::auth`]).
//! Public market-data calls are unsigned.
//!
//! | Operation          | Method | Path                        |
//! |--------------------|--------|-----------------------------|
//! | Wallet balance     | GET    | `/v5/account/wallet-balance`|
//! | Fee rate           | GET    | `/v5/account/fee-rate`      |
//! | Instruments info   | GET    | `/v5/market/instruments-info`|
//! | Tickers            | GET    | `/v5/market/tickers`        |
//! | Klines             | GET    | `/v5/market/kline`          |
//! | Recent trades      | GET    | `/v5/market/recent-trade`   |
//! | Create order       | POST   | `/v5/order/create`          |
//! | Amend order        | POST   | `/v5/order/amend`           |
//! | Cancel order       | POST   | `/v5/order/cancel`          |
//! | Cancel all orders  | POST   | `/v5/order/cancel-all`      |
//! | Open orders        | GET    | `/v5/order/realtime`        |
//!
//! The client holds no order or account state; transport and decode failures
//! are terminal for the call and returned to the caller unretried.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use lens_core::{AccountCredentials, Category, LensError, OrderRequest};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth;
use crate::client::ExchangeClient;
use crate::dto::*;

/// Fixed timeout applied to every HTTP round trip.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Bybit v5 REST client.
pub struct BybitClient {
    http: reqwest::Client,
    base_url: String,
    recv_window_ms: u64,
}

impl BybitClient {
    /// Create a new client against `base_url`
    /// (e.g. `https://api.bybit.com`).
    pub fn new(base_url: String, recv_window_ms: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            http,
            base_url,
            recv_window_ms,
        }
    }

    // -----------------------------------------------------------------------
    // Transport helpers
    // -----------------------------------------------------------------------

    /// Unsigned GET returning the decoded `result` payload.
    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<T, LensError> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LensError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    /// Signed GET. The query string is the canonical signature input.
    async fn signed_get<T: DeserializeOwned>(
        &self,
        account: &AccountCredentials,
        path: &str,
        query: &str,
    ) -> Result<T, LensError> {
        let timestamp = current_timestamp_ms();
        let signature = auth::sign_rest(
            &account.api_secret,
            &timestamp,
            &account.api_key,
            self.recv_window_ms,
            query,
        );

        let url = format!("{}{}?{}", self.base_url, path, query);
        let response = self
            .http
            .get(&url)
            .header("X-BAPI-API-KEY", &account.api_key)
            .header("X-BAPI-TIMESTAMP", &timestamp)
            .header("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string())
            .header("X-BAPI-SIGN", signature)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| LensError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    /// Signed POST. The serialized JSON body is the canonical signature
    /// input, so it is rendered exactly once and signed byte-for-byte.
    async fn signed_post<T: DeserializeOwned>(
        &self,
        account: &AccountCredentials,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, LensError> {
        let timestamp = current_timestamp_ms();
        let payload = body.to_string();
        let signature = auth::sign_rest(
            &account.api_secret,
            &timestamp,
            &account.api_key,
            self.recv_window_ms,
            &payload,
        );

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .header("X-BAPI-API-KEY", &account.api_key)
            .header("X-BAPI-TIMESTAMP", &timestamp)
            .header("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string())
            .header("X-BAPI-SIGN", signature)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| LensError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    /// Decode the response envelope, mapping HTTP failures to transport
    /// errors and `retCode != 0` to application errors.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LensError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LensError::Transport(format!("http {status}: {body}")));
        }
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| LensError::Parse(e.to_string()))?;
        envelope.into_result()
    }
}

#[async_trait]
impl ExchangeClient for BybitClient {
    async fn get_wallet_balance(
        &self,
        account: &AccountCredentials,
    ) -> Result<WalletBalanceResult, LensError> {
        let query = auth::encode_query(&[("accountType", &account.account_type)]);
        self.signed_get(account, "/v5/account/wallet-balance", &query)
            .await
    }

    async fn get_fee_rate(
        &self,
        account: &AccountCredentials,
        category: Category,
        symbol: Option<&str>,
    ) -> Result<FeeRateResult, LensError> {
        let mut params = vec![("category", category.as_str())];
        if let Some(sym) = symbol {
            params.push(("symbol", sym));
        }
        let query = auth::encode_query(&params);
        self.signed_get(account, "/v5/account/fee-rate", &query).await
    }

    async fn get_instruments(&self, category: Category) -> Result<InstrumentsResult, LensError> {
        let query = auth::encode_query(&[("category", category.as_str())]);
        self.public_get("/v5/market/instruments-info", &query).await
    }

    async fn get_tickers(
        &self,
        category: Category,
        symbol: Option<&str>,
    ) -> Result<TickersResult, LensError> {
        let mut params = vec![("category", category.as_str())];
        if let Some(sym) = symbol {
            params.push(("symbol", sym));
        }
        let query = auth::encode_query(&params);
        self.public_get("/v5/market/tickers", &query).await
    }

    async fn get_klines(
        &self,
        category: Category,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<KlinesResult, LensError> {
        let limit = limit.to_string();
        let query = auth::encode_query(&[
            ("category", category.as_str()),
            ("symbol", symbol),
            ("interval", interval),
            ("limit", &limit),
        ]);
        self.public_get("/v5/market/kline", &query).await
    }

    async fn get_recent_trades(
        &self,
        category: Category,
        symbol: &str,
        limit: u32,
    ) -> Result<RecentTradesResult, LensError> {
        let limit = limit.to_string();
        let query = auth::encode_query(&[
            ("category", category.as_str()),
            ("symbol", symbol),
            ("limit", &limit),
        ]);
        self.public_get("/v5/market/recent-trade", &query).await
    }

    async fn create_order(
        &self,
        account: &AccountCredentials,
        request: &OrderRequest,
    ) -> Result<OrderAck, LensError> {
        if request.symbol.is_empty() {
            return Err(LensError::Trading("order symbol must not be empty".into()));
        }

        let order_link_id = request
            .order_link_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut body = serde_json::json!({
            "category": Category::Spot.as_str(),
            "symbol": request.symbol,
            "side": request.side.as_str(),
            "orderType": request.order_type.as_str(),
            "qty": request.qty.to_string(),
            "timeInForce": request.time_in_force.as_str(),
            "orderLinkId": order_link_id,
        });
        if let Some(price) = request.price {
            body["price"] = serde_json::Value::String(price.to_string());
        }

        let ack: OrderAck = self.signed_post(account, "/v5/order/create", body).await?;
        info!(
            "[bybit-rest] order placed: {} {} {} qty={} → id={}",
            request.symbol,
            request.side,
            request.order_type.as_str(),
            request.qty,
            ack.order_id,
        );
        Ok(ack)
    }

    async fn amend_order(
        &self,
        account: &AccountCredentials,
        symbol: &str,
        order_id: &str,
        price: Option<Decimal>,
        qty: Option<Decimal>,
    ) -> Result<OrderAck, LensError> {
        let mut body = serde_json::json!({
            "category": Category::Spot.as_str(),
            "symbol": symbol,
            "orderId": order_id,
        });
        if let Some(price) = price {
            body["price"] = serde_json::Value::String(price.to_string());
        }
        if let Some(qty) = qty {
            body["qty"] = serde_json::Value::String(qty.to_string());
        }

        let ack: OrderAck = self.signed_post(account, "/v5/order/amend", body).await?;
        debug!("[bybit-rest] order amended: {} id={}", symbol, ack.order_id);
        Ok(ack)
    }

    async fn cancel_order(
        &self,
        account: &AccountCredentials,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderAck, LensError> {
        let body = serde_json::json!({
            "category": Category::Spot.as_str(),
            "symbol": symbol,
            "orderId": order_id,
        });

        let ack: OrderAck = self.signed_post(account, "/v5/order/cancel", body).await?;
        info!("[bybit-rest] order cancelled: {} id={}", symbol, ack.order_id);
        Ok(ack)
    }

    async fn cancel_all_orders(
        &self,
        account: &AccountCredentials,
        symbol: &str,
    ) -> Result<(), LensError> {
        let body = serde_json::json!({
            "category": Category::Spot.as_str(),
            "symbol": symbol,
        });

        // The result lists the cancelled ids; only the retCode matters here.
        let _: serde_json::Value = self
            .signed_post(account, "/v5/order/cancel-all", body)
            .await?;
        info!("[bybit-rest] all orders cancelled: {symbol}");
        Ok(())
    }

    async fn get_open_orders(
        &self,
        account: &AccountCredentials,
        symbol: &str,
        limit: u32,
    ) -> Result<OpenOrdersResult, LensError> {
        let limit = limit.to_string();
        let query = auth::encode_query(&[
            ("category", Category::Spot.as_str()),
            ("symbol", symbol),
            ("limit", &limit),
        ]);
        self.signed_get(account, "/v5/order/realtime", &query).await
    }
}

/// Returns the current Unix timestamp in milliseconds.
fn current_timestamp_ms() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string()
}
