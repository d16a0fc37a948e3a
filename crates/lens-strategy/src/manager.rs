//! Strategy manager — per-user registry and event dispatcher.
//!
//! Owns two maps under a single mutex: `user → strategies` and
//! `user → active symbols`. Both are mutated only by explicit
//! add/remove/update calls, and dispatch reads them under the same lock, so
//! concurrent configuration changes can never race an in-flight event.
//!
//! Public events are delivered to exactly the strategies of users whose
//! active-symbol set contains the event's symbol, synchronously and in
//! registration order. Wallet events are not symbol-scoped and go to every
//! strategy of every user.
//!
//! The relevance check is a linear scan under the shared lock; user and
//! strategy cardinality is small relative to event rate, so this stays well
//! below the cost of the decode step. Revisit before scaling user counts by
//! orders of magnitude.
//!
//! Order placement goes through the manager so strategies never see
//! credentials: the manager resolves the user's account and delegates to the
//! exchange client. A credential failure for one user is returned to that
//! caller alone and never disturbs dispatch for other users.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use lens_core::repository::{AccountRepository, UserInstrumentRepository};
use lens_core::{
    AccountCredentials, Category, ExecutionUpdate, LensError, OrderBookUpdate, OrderRequest,
    OrderUpdate, TickerUpdate, TradeUpdate, WalletAccount,
};
use lens_exchange::ExchangeClient;
use lens_exchange::dto::{FeeRateResult, OrderAck, WalletBalanceResult};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use crate::Strategy;

/// Registry state guarded by one mutex (see module docs).
#[derive(Default)]
struct Registry {
    strategies: AHashMap<String, Vec<Arc<dyn Strategy>>>,
    user_symbols: AHashMap<String, AHashSet<String>>,
}

/// Per-user strategy registry and event dispatcher.
pub struct StrategyManager {
    registry: Mutex<Registry>,
    client: Arc<dyn ExchangeClient>,
    accounts: Arc<dyn AccountRepository>,
    user_instruments: Arc<dyn UserInstrumentRepository>,
}

impl StrategyManager {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        accounts: Arc<dyn AccountRepository>,
        user_instruments: Arc<dyn UserInstrumentRepository>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(Registry::default()),
            client,
            accounts,
            user_instruments,
        })
    }

    // -----------------------------------------------------------------------
    // Registry mutation
    // -----------------------------------------------------------------------

    /// Register a strategy for a user. Strategies are dispatched in
    /// registration order.
    pub async fn add_strategy(&self, user_id: &str, strategy: Arc<dyn Strategy>) {
        let mut registry = self.registry.lock().await;
        info!("[manager] strategy '{}' added for {user_id}", strategy.name());
        registry
            .strategies
            .entry(user_id.to_string())
            .or_default()
            .push(strategy);
    }

    /// Remove a strategy by instance identity, so two strategies of the same
    /// type registered for one user are never silently merged.
    pub async fn remove_strategy(&self, user_id: &str, strategy: &Arc<dyn Strategy>) {
        let mut registry = self.registry.lock().await;
        if let Some(list) = registry.strategies.get_mut(user_id) {
            if let Some(pos) = list.iter().position(|s| Arc::ptr_eq(s, strategy)) {
                let removed = list.remove(pos);
                info!("[manager] strategy '{}' removed for {user_id}", removed.name());
            }
        }
    }

    /// Re-read the user's active-symbol set from the repository and replace
    /// the cached set atomically. Must be called after any instrument
    /// add/remove/status change so filtering reflects the latest
    /// configuration without a repository read per event.
    pub async fn update_user_instruments(&self, user_id: &str) -> Result<(), LensError> {
        let symbols = self
            .user_instruments
            .get_active_instruments_by_user(user_id)
            .await?;
        let mut registry = self.registry.lock().await;
        registry
            .user_symbols
            .insert(user_id.to_string(), symbols.into_iter().collect());
        Ok(())
    }

    /// The user's registered strategies, in registration order.
    pub async fn get_strategies(&self, user_id: &str) -> Vec<Arc<dyn Strategy>> {
        self.registry
            .lock()
            .await
            .strategies
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// `user → strategy names` snapshot for the service layer's listings.
    pub async fn strategies_info(&self) -> AHashMap<String, Vec<String>> {
        let registry = self.registry.lock().await;
        registry
            .strategies
            .iter()
            .map(|(user, list)| {
                (
                    user.clone(),
                    list.iter().map(|s| s.name().to_string()).collect(),
                )
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Event dispatch
    // -----------------------------------------------------------------------

    pub async fn handle_ticker(&self, ticker: &TickerUpdate) {
        let registry = self.registry.lock().await;
        for (user_id, strategies) in &registry.strategies {
            if Self::is_relevant(&registry, user_id, &ticker.symbol) {
                for strategy in strategies {
                    strategy.on_ticker(ticker).await;
                }
            }
        }
    }

    pub async fn handle_order_book(&self, book: &OrderBookUpdate) {
        let registry = self.registry.lock().await;
        for (user_id, strategies) in &registry.strategies {
            if Self::is_relevant(&registry, user_id, &book.symbol) {
                for strategy in strategies {
                    strategy.on_order_book(book).await;
                }
            }
        }
    }

    pub async fn handle_trade(&self, trade: &TradeUpdate) {
        let registry = self.registry.lock().await;
        for (user_id, strategies) in &registry.strategies {
            if Self::is_relevant(&registry, user_id, &trade.symbol) {
                for strategy in strategies {
                    strategy.on_trade(trade).await;
                }
            }
        }
    }

    pub async fn handle_order(&self, order: &OrderUpdate) {
        let registry = self.registry.lock().await;
        for (user_id, strategies) in &registry.strategies {
            if Self::is_relevant(&registry, user_id, &order.symbol) {
                for strategy in strategies {
                    strategy.on_order(order).await;
                }
            }
        }
    }

    pub async fn handle_execution(&self, execution: &ExecutionUpdate) {
        let registry = self.registry.lock().await;
        for (user_id, strategies) in &registry.strategies {
            if Self::is_relevant(&registry, user_id, &execution.symbol) {
                for strategy in strategies {
                    strategy.on_execution(execution).await;
                }
            }
        }
    }

    /// Wallet updates carry no symbol and go to everyone.
    pub async fn handle_wallet(&self, accounts: &[WalletAccount]) {
        let registry = self.registry.lock().await;
        for strategies in registry.strategies.values() {
            for strategy in strategies {
                strategy.on_wallet(accounts).await;
            }
        }
    }

    fn is_relevant(registry: &Registry, user_id: &str, symbol: &str) -> bool {
        registry
            .user_symbols
            .get(user_id)
            .is_some_and(|set| set.contains(symbol))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start every registered strategy.
    pub async fn start_all(&self) {
        let registry = self.registry.lock().await;
        for strategies in registry.strategies.values() {
            for strategy in strategies {
                strategy.start().await;
            }
        }
    }

    /// Stop every registered strategy (resting orders are cancelled by each
    /// strategy's own stop).
    pub async fn stop_all(&self) {
        let registry = self.registry.lock().await;
        for strategies in registry.strategies.values() {
            for strategy in strategies {
                strategy.stop().await;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Credential-resolving passthroughs
    // -----------------------------------------------------------------------

    async fn account(&self, user_id: &str) -> Result<AccountCredentials, LensError> {
        self.accounts.get_active_account(user_id).await
    }

    pub async fn create_order(
        &self,
        user_id: &str,
        request: &OrderRequest,
    ) -> Result<OrderAck, LensError> {
        let account = self.account(user_id).await?;
        self.client.create_order(&account, request).await
    }

    pub async fn amend_order(
        &self,
        user_id: &str,
        symbol: &str,
        order_id: &str,
        price: Option<Decimal>,
        qty: Option<Decimal>,
    ) -> Result<OrderAck, LensError> {
        let account = self.account(user_id).await?;
        self.client
            .amend_order(&account, symbol, order_id, price, qty)
            .await
    }

    pub async fn cancel_order(
        &self,
        user_id: &str,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderAck, LensError> {
        let account = self.account(user_id).await?;
        self.client.cancel_order(&account, symbol, order_id).await
    }

    pub async fn get_wallet_balance(
        &self,
        user_id: &str,
    ) -> Result<WalletBalanceResult, LensError> {
        let account = self.account(user_id).await?;
        self.client.get_wallet_balance(&account).await
    }

    pub async fn get_fee_rate(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> Result<FeeRateResult, LensError> {
        let account = self.account(user_id).await?;
        self.client
            .get_fee_rate(&account, Category::Spot, Some(symbol))
            .await
    }
}
