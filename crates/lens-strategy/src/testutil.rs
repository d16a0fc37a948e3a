//! Test doubles shared across the strategy-layer tests: a recording
//! [`ExchangeClient`] mock and a counting [`Strategy`].

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use lens_core::repository::{MemoryAccountRepository, MemoryUserInstrumentRepository};
use lens_core::{
    AccountCredentials, Category, ExecutionUpdate, LensError, OrderBookUpdate, OrderRequest,
    OrderUpdate, TickerUpdate, TradeUpdate, WalletAccount,
};
use lens_exchange::ExchangeClient;
use lens_exchange::dto::{
    FeeRateResult, InstrumentsResult, KlinesResult, OpenOrdersResult, OrderAck,
    RecentTradesResult, TickersResult, WalletBalanceResult,
};
use rust_decimal::Decimal;

use crate::Strategy;
use crate::manager::StrategyManager;

/// One recorded call against the mock exchange.
#[derive(Debug, Clone)]
pub enum Call {
    GetWalletBalance { user: String },
    GetFeeRate { symbol: Option<String> },
    CreateOrder { user: String, request: OrderRequest },
    AmendOrder { symbol: String, order_id: String },
    CancelOrder { symbol: String, order_id: String },
    CancelAll { symbol: String },
    GetOpenOrders { symbol: String },
}

/// Recording [`ExchangeClient`] with a configurable wallet and fee rate.
pub struct MockExchange {
    calls: Mutex<Vec<Call>>,
    wallet: Mutex<WalletBalanceResult>,
    fee: Mutex<Option<FeeRateResult>>,
    next_id: AtomicU64,
}

impl MockExchange {
    pub fn new() -> Arc<Self> {
        let wallet = serde_json::from_str(
            r#"{"list":[{"accountType":"UNIFIED","coin":[
                {"coin":"USDT","walletBalance":"1000","free":"1000","usdValue":"1000"},
                {"coin":"BTC","walletBalance":"1","free":"1"}
            ]}]}"#,
        )
        .unwrap();
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            wallet: Mutex::new(wallet),
            fee: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn set_wallet_json(&self, json: &str) {
        *self.wallet.lock().unwrap() = serde_json::from_str(json).unwrap();
    }

    pub fn set_fee(&self, taker: &str, maker: &str) {
        *self.fee.lock().unwrap() = Some(
            serde_json::from_str(&format!(
                r#"{{"list":[{{"symbol":"BTCUSDT","takerFeeRate":"{taker}","makerFeeRate":"{maker}"}}]}}"#
            ))
            .unwrap(),
        );
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created_orders(&self) -> Vec<OrderRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateOrder { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn cancelled_orders(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CancelOrder { order_id, .. } => Some(order_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn get_wallet_balance(
        &self,
        account: &AccountCredentials,
    ) -> Result<WalletBalanceResult, LensError> {
        self.record(Call::GetWalletBalance {
            user: account.user_id.clone(),
        });
        Ok(self.wallet.lock().unwrap().clone())
    }

    async fn get_fee_rate(
        &self,
        _account: &AccountCredentials,
        _category: Category,
        symbol: Option<&str>,
    ) -> Result<FeeRateResult, LensError> {
        self.record(Call::GetFeeRate {
            symbol: symbol.map(str::to_string),
        });
        self.fee
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| LensError::NotFound("fee rate".into()))
    }

    async fn get_instruments(&self, category: Category) -> Result<InstrumentsResult, LensError> {
        Ok(InstrumentsResult {
            category,
            list: vec![],
        })
    }

    async fn get_tickers(
        &self,
        category: Category,
        _symbol: Option<&str>,
    ) -> Result<TickersResult, LensError> {
        Ok(TickersResult {
            category,
            list: vec![],
        })
    }

    async fn get_klines(
        &self,
        category: Category,
        symbol: &str,
        _interval: &str,
        _limit: u32,
    ) -> Result<KlinesResult, LensError> {
        Ok(KlinesResult {
            category,
            symbol: symbol.to_string(),
            list: vec![],
        })
    }

    async fn get_recent_trades(
        &self,
        category: Category,
        _symbol: &str,
        _limit: u32,
    ) -> Result<RecentTradesResult, LensError> {
        Ok(RecentTradesResult {
            category,
            list: vec![],
        })
    }

    async fn create_order(
        &self,
        account: &AccountCredentials,
        request: &OrderRequest,
    ) -> Result<OrderAck, LensError> {
        self.record(Call::CreateOrder {
            user: account.user_id.clone(),
            request: request.clone(),
        });
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(OrderAck {
            order_id: format!("mock-{id}"),
            order_link_id: request.order_link_id.clone().unwrap_or_default(),
        })
    }

    async fn amend_order(
        &self,
        _account: &AccountCredentials,
        symbol: &str,
        order_id: &str,
        _price: Option<Decimal>,
        _qty: Option<Decimal>,
    ) -> Result<OrderAck, LensError> {
        self.record(Call::AmendOrder {
            symbol: symbol.to_string(),
            order_id: order_id.to_string(),
        });
        Ok(OrderAck {
            order_id: order_id.to_string(),
            order_link_id: String::new(),
        })
    }

    async fn cancel_order(
        &self,
        _account: &AccountCredentials,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderAck, LensError> {
        self.record(Call::CancelOrder {
            symbol: symbol.to_string(),
            order_id: order_id.to_string(),
        });
        Ok(OrderAck {
            order_id: order_id.to_string(),
            order_link_id: String::new(),
        })
    }

    async fn cancel_all_orders(
        &self,
        _account: &AccountCredentials,
        symbol: &str,
    ) -> Result<(), LensError> {
        self.record(Call::CancelAll {
            symbol: symbol.to_string(),
        });
        Ok(())
    }

    async fn get_open_orders(
        &self,
        _account: &AccountCredentials,
        symbol: &str,
        _limit: u32,
    ) -> Result<OpenOrdersResult, LensError> {
        self.record(Call::GetOpenOrders {
            symbol: symbol.to_string(),
        });
        Ok(OpenOrdersResult {
            list: vec![],
            next_page_cursor: None,
        })
    }
}

/// A strategy that records which callbacks fired.
pub struct CountingStrategy {
    events: Mutex<Vec<String>>,
}

impl CountingStrategy {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Strategy for CountingStrategy {
    fn name(&self) -> &str {
        "counting"
    }

    async fn on_ticker(&self, ticker: &TickerUpdate) {
        self.push(format!("ticker:{}", ticker.symbol));
    }

    async fn on_order_book(&self, book: &OrderBookUpdate) {
        self.push(format!("book:{}", book.symbol));
    }

    async fn on_trade(&self, trade: &TradeUpdate) {
        self.push(format!("trade:{}", trade.symbol));
    }

    async fn on_order(&self, order: &OrderUpdate) {
        self.push(format!("order:{}", order.order_id));
    }

    async fn on_execution(&self, execution: &ExecutionUpdate) {
        self.push(format!("execution:{}", execution.exec_id));
    }

    async fn on_wallet(&self, _accounts: &[WalletAccount]) {
        self.push("wallet".to_string());
    }

    async fn start(&self) {
        self.push("start".to_string());
    }

    async fn stop(&self) {
        self.push("stop".to_string());
    }
}

/// A manager wired to a mock exchange, with an active account for `alice`.
pub async fn manager_fixture() -> (
    Arc<StrategyManager>,
    Arc<MockExchange>,
    Arc<MemoryUserInstrumentRepository>,
) {
    let mock = MockExchange::new();
    let accounts = MemoryAccountRepository::new();
    accounts
        .insert(AccountCredentials {
            user_id: "alice".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            account_type: "UNIFIED".to_string(),
            is_active: true,
        })
        .await;
    let user_instruments = MemoryUserInstrumentRepository::new();
    let manager = StrategyManager::new(
        mock.clone(),
        accounts,
        user_instruments.clone(),
    );
    (manager, mock, user_instruments)
}
