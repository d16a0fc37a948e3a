//! Spread-scalping reference strategy.
//!
//! Two phases: `Buying` (seeking to open a position) and `Selling` (holding
//! one, seeking to close it profitably), with at most one resting order at a
//! time. On every order-book update with a wide-enough spread the strategy
//! re-quotes: a limit buy one tick above the best bid while buying, a limit
//! sell one tick below the best ask while selling — the sell gated on the
//! recorded entry so the round trip clears fees plus a fixed margin.
//!
//! Phase changes ONLY on matching-side execution events, never on order
//! status updates: a partial fill must not flip the phase, and order-status
//! frames may arrive out of order relative to the market data that caused
//! them.
//!
//! Event callbacks enqueue into an internal bounded channel; a dedicated
//! task consumes it, so dispatch never blocks on REST round trips and no two
//! tasks ever touch the strategy state. Trading parameters (minimum spread,
//! order quantity, minimum profit) are recomputed from live balance,
//! instrument, ticker, and fee data at start and on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lens_core::cache::MarketCache;
use lens_core::config::StrategyConfig;
use lens_core::repository::InstrumentRepository;
use lens_core::{
    ExecutionUpdate, LensError, OrderBookUpdate, OrderRequest, OrderUpdate, Side, TickerUpdate,
    TradeUpdate, WalletAccount,
};
use lens_exchange::dto::WalletBalanceResult;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::Strategy;
use crate::manager::StrategyManager;
use crate::sizing;
use crate::watchdog::OrderWatchdog;

/// Internal event queue depth per strategy instance.
const QUEUE_CAPACITY: usize = 1000;

/// Tunables, usually taken from [`StrategyConfig`].
#[derive(Debug, Clone)]
pub struct SpreadScalpingConfig {
    pub refresh_interval: Duration,
    pub min_quote_balance: Decimal,
    pub balance_fraction: Decimal,
    pub spread_floor: Decimal,
    pub profit_margin: Decimal,
    pub fallback_fee_rate: Decimal,
}

impl SpreadScalpingConfig {
    pub fn from_app(config: &StrategyConfig) -> Self {
        Self {
            refresh_interval: Duration::from_secs(config.effective_refresh_interval_sec()),
            min_quote_balance: config.effective_min_quote_balance(),
            balance_fraction: config.effective_balance_fraction(),
            spread_floor: config.effective_spread_floor(),
            profit_margin: config.effective_profit_margin(),
            fallback_fee_rate: config.effective_fallback_fee_rate(),
        }
    }
}

impl Default for SpreadScalpingConfig {
    fn default() -> Self {
        Self::from_app(&StrategyConfig::default())
    }
}

/// Which side of the round trip the strategy is currently working.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Buying,
    Selling,
}

/// Mutable strategy state, touched only by the processing task (and by
/// `stop`, which runs after the task is signalled).
#[derive(Debug)]
struct State {
    phase: Phase,
    /// Entry price of the last buy fill; zero while buying.
    buy_price: Decimal,
    /// Entry quantity of the last buy fill; zero while buying.
    buy_qty: Decimal,
    /// The one resting order, if any.
    active_order_id: Option<String>,
    // Parameters recomputed by `update_parameters`.
    min_spread: Decimal,
    min_profit: Decimal,
    qty: Decimal,
    tick_size: Decimal,
    base_coin: String,
}

impl State {
    fn new(symbol: &str) -> Self {
        Self {
            phase: Phase::Buying,
            buy_price: Decimal::ZERO,
            buy_qty: Decimal::ZERO,
            active_order_id: None,
            min_spread: Decimal::ONE,
            min_profit: Decimal::new(1, 1),
            qty: Decimal::ZERO,
            tick_size: Decimal::new(1, 2),
            // Refined from instrument metadata on the first refresh.
            base_coin: symbol.strip_suffix("USDT").unwrap_or(symbol).to_string(),
        }
    }
}

/// Queued stream event.
#[derive(Debug)]
enum Event {
    Ticker(TickerUpdate),
    OrderBook(OrderBookUpdate),
    Trade(TradeUpdate),
    Order(OrderUpdate),
    Execution(ExecutionUpdate),
    Wallet(Vec<WalletAccount>),
}

/// Everything the processing task needs, clonable into spawned tasks.
#[derive(Clone)]
struct Ctx {
    user_id: String,
    symbol: String,
    manager: Arc<StrategyManager>,
    cache: Arc<dyn MarketCache>,
    instruments: Arc<dyn InstrumentRepository>,
    watchdog: Option<Arc<OrderWatchdog>>,
    config: SpreadScalpingConfig,
    state: Arc<Mutex<State>>,
}

/// The spread-scalping strategy instance for one user and symbol.
pub struct SpreadScalpingStrategy {
    ctx: Ctx,
    tx: mpsc::Sender<Event>,
    rx: std::sync::Mutex<Option<mpsc::Receiver<Event>>>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl SpreadScalpingStrategy {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: &str,
        symbol: &str,
        manager: Arc<StrategyManager>,
        cache: Arc<dyn MarketCache>,
        instruments: Arc<dyn InstrumentRepository>,
        watchdog: Option<Arc<OrderWatchdog>>,
        config: SpreadScalpingConfig,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        Arc::new(Self {
            ctx: Ctx {
                user_id: user_id.to_string(),
                symbol: symbol.to_string(),
                manager,
                cache,
                instruments,
                watchdog,
                config,
                state: Arc::new(Mutex::new(State::new(symbol))),
            },
            tx,
            rx: std::sync::Mutex::new(Some(rx)),
            stop_tx,
            stop_rx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    fn enqueue(&self, event: Event) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    "[scalp:{}:{}] queue full, event dropped: {event:?}",
                    self.ctx.user_id, self.ctx.symbol,
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[async_trait]
impl Strategy for SpreadScalpingStrategy {
    fn name(&self) -> &str {
        "spread-scalping"
    }

    async fn on_ticker(&self, ticker: &TickerUpdate) {
        if ticker.symbol == self.ctx.symbol {
            self.enqueue(Event::Ticker(ticker.clone()));
        }
    }

    async fn on_order_book(&self, book: &OrderBookUpdate) {
        if book.symbol == self.ctx.symbol {
            self.enqueue(Event::OrderBook(book.clone()));
        }
    }

    async fn on_trade(&self, trade: &TradeUpdate) {
        if trade.symbol == self.ctx.symbol {
            self.enqueue(Event::Trade(trade.clone()));
        }
    }

    async fn on_order(&self, order: &OrderUpdate) {
        if order.symbol == self.ctx.symbol {
            self.enqueue(Event::Order(order.clone()));
        }
    }

    async fn on_execution(&self, execution: &ExecutionUpdate) {
        if execution.symbol == self.ctx.symbol {
            self.enqueue(Event::Execution(execution.clone()));
        }
    }

    async fn on_wallet(&self, accounts: &[WalletAccount]) {
        self.enqueue(Event::Wallet(accounts.to_vec()));
    }

    async fn start(&self) {
        let Some(mut rx) = self.rx.lock().unwrap().take() else {
            warn!("[scalp:{}:{}] already started", self.ctx.user_id, self.ctx.symbol);
            return;
        };
        info!("[scalp:{}:{}] started", self.ctx.user_id, self.ctx.symbol);

        if let Err(e) = self.ctx.update_parameters().await {
            error!(
                "[scalp:{}:{}] initial parameter refresh failed: {e}",
                self.ctx.user_id, self.ctx.symbol,
            );
        }

        let ctx = self.ctx.clone();
        let mut stop_rx = self.stop_rx.clone();
        let process = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => return,
                    event = rx.recv() => match event {
                        Some(event) => ctx.process(event).await,
                        None => return,
                    },
                }
            }
        });

        let ctx = self.ctx.clone();
        let mut stop_rx = self.stop_rx.clone();
        let interval = self.ctx.config.refresh_interval;
        let refresh = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // parameters were just loaded above
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => return,
                    _ = ticker.tick() => {
                        if let Err(e) = ctx.update_parameters().await {
                            error!(
                                "[scalp:{}:{}] parameter refresh failed: {e}",
                                ctx.user_id, ctx.symbol,
                            );
                        }
                    }
                }
            }
        });

        let mut tasks = self.tasks.lock().await;
        tasks.push(process);
        tasks.push(refresh);
    }

    async fn stop(&self) {
        let _ = self.stop_tx.send(true);

        // Release the resting order; a cancel failure is logged but must not
        // block shutdown.
        let active = self.ctx.state.lock().await.active_order_id.take();
        if let Some(order_id) = active {
            match self
                .ctx
                .manager
                .cancel_order(&self.ctx.user_id, &self.ctx.symbol, &order_id)
                .await
            {
                Ok(_) => {
                    info!(
                        "[scalp:{}:{}] resting order {order_id} cancelled on stop",
                        self.ctx.user_id, self.ctx.symbol,
                    );
                    if let Some(watchdog) = &self.ctx.watchdog {
                        watchdog.untrack(&order_id);
                    }
                }
                Err(e) => error!(
                    "[scalp:{}:{}] failed to cancel {order_id} on stop: {e}",
                    self.ctx.user_id, self.ctx.symbol,
                ),
            }
        }

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        info!("[scalp:{}:{}] stopped", self.ctx.user_id, self.ctx.symbol);
    }
}

impl Ctx {
    async fn process(&self, event: Event) {
        match event {
            Event::Ticker(ticker) => {
                debug!(
                    "[scalp:{}:{}] ticker: last={}",
                    self.user_id, self.symbol, ticker.last_price,
                );
            }
            Event::OrderBook(book) => self.handle_order_book(book).await,
            // Book-driven strategy; public trade prints carry no extra signal.
            Event::Trade(_) => {}
            Event::Order(order) => self.handle_order(order).await,
            Event::Execution(execution) => self.handle_execution(execution).await,
            Event::Wallet(_) => {
                debug!("[scalp:{}:{}] wallet update", self.user_id, self.symbol);
            }
        }
    }

    /// Re-quote on a fresh book when the spread is worth crossing.
    async fn handle_order_book(&self, book: OrderBookUpdate) {
        let spread = match self.cache.get_spread(&self.symbol).await {
            Ok(spread) => spread,
            Err(e) => {
                debug!("[scalp:{}:{}] no cached spread: {e}", self.user_id, self.symbol);
                return;
            }
        };

        let (phase, min_spread, qty) = {
            let state = self.state.lock().await;
            (state.phase, state.min_spread, state.qty)
        };

        if spread < min_spread {
            return;
        }
        if qty <= Decimal::ZERO {
            // No feasible quantity under the current instrument limits.
            return;
        }

        let wallet = match self.manager.get_wallet_balance(&self.user_id).await {
            Ok(wallet) => wallet,
            Err(e) => {
                error!("[scalp:{}:{}] wallet query failed: {e}", self.user_id, self.symbol);
                return;
            }
        };

        match phase {
            Phase::Buying => self.try_buy(&book, &wallet, qty).await,
            Phase::Selling => self.try_sell(&book, &wallet, qty).await,
        }
    }

    async fn try_buy(&self, book: &OrderBookUpdate, wallet: &WalletBalanceResult, qty: Decimal) {
        let free = wallet.available("USDT").unwrap_or_default();
        if free < self.config.min_quote_balance {
            info!(
                "[scalp:{}:{}] insufficient USDT: {free}",
                self.user_id, self.symbol,
            );
            return;
        }

        self.cancel_active().await;

        let Some(best_bid) = book.best_bid() else {
            error!("[scalp:{}:{}] empty bid side", self.user_id, self.symbol);
            return;
        };
        let tick = self.state.lock().await.tick_size;
        let price = best_bid + tick;

        let request = OrderRequest::limit(&self.symbol, Side::Buy, qty, price);
        match self.manager.create_order(&self.user_id, &request).await {
            Ok(ack) => {
                info!(
                    "[scalp:{}:{}] buy placed at {price} qty={qty} id={}",
                    self.user_id, self.symbol, ack.order_id,
                );
                if let Some(watchdog) = &self.watchdog {
                    watchdog.track_buy(&ack.order_id, &self.user_id, &self.symbol);
                }
                self.state.lock().await.active_order_id = Some(ack.order_id);
            }
            Err(e) => error!("[scalp:{}:{}] buy failed: {e}", self.user_id, self.symbol),
        }
    }

    async fn try_sell(&self, book: &OrderBookUpdate, wallet: &WalletBalanceResult, qty: Decimal) {
        let (base_coin, buy_price, buy_qty, min_profit) = {
            let state = self.state.lock().await;
            (
                state.base_coin.clone(),
                state.buy_price,
                state.buy_qty,
                state.min_profit,
            )
        };

        let free = wallet.available(&base_coin).unwrap_or_default();
        if free < qty {
            info!(
                "[scalp:{}:{}] insufficient {base_coin}: {free}",
                self.user_id, self.symbol,
            );
            return;
        }

        self.cancel_active().await;

        let Some(best_ask) = book.best_ask() else {
            error!("[scalp:{}:{}] empty ask side", self.user_id, self.symbol);
            return;
        };
        let tick = self.state.lock().await.tick_size;
        let price = best_ask - tick;

        let expected = (price - buy_price) * buy_qty;
        if expected < min_profit {
            info!(
                "[scalp:{}:{}] expected profit too small: {expected}",
                self.user_id, self.symbol,
            );
            return;
        }

        let request = OrderRequest::limit(&self.symbol, Side::Sell, qty, price);
        match self.manager.create_order(&self.user_id, &request).await {
            Ok(ack) => {
                info!(
                    "[scalp:{}:{}] sell placed at {price} qty={qty} id={}",
                    self.user_id, self.symbol, ack.order_id,
                );
                if let Some(watchdog) = &self.watchdog {
                    watchdog.track_sell(&ack.order_id, &self.user_id, &self.symbol);
                }
                self.state.lock().await.active_order_id = Some(ack.order_id);
            }
            Err(e) => error!("[scalp:{}:{}] sell failed: {e}", self.user_id, self.symbol),
        }
    }

    /// Cancel the resting order, if any. The tracked id is cleared only on a
    /// confirmed cancel; on failure it stays so the next tick retries.
    async fn cancel_active(&self) {
        let active = self.state.lock().await.active_order_id.clone();
        let Some(order_id) = active else { return };

        match self
            .manager
            .cancel_order(&self.user_id, &self.symbol, &order_id)
            .await
        {
            Ok(_) => {
                info!("[scalp:{}:{}] order {order_id} cancelled", self.user_id, self.symbol);
                self.state.lock().await.active_order_id = None;
                if let Some(watchdog) = &self.watchdog {
                    watchdog.untrack(&order_id);
                }
            }
            Err(e) => error!(
                "[scalp:{}:{}] cancel of {order_id} failed: {e}",
                self.user_id, self.symbol,
            ),
        }
    }

    /// Order status updates only clear the tracked order slot; they never
    /// change the phase.
    async fn handle_order(&self, order: OrderUpdate) {
        debug!(
            "[scalp:{}:{}] order {} status {:?}",
            self.user_id, self.symbol, order.order_id, order.order_status,
        );
        let mut state = self.state.lock().await;
        if state.active_order_id.as_deref() == Some(order.order_id.as_str())
            && order.order_status.is_terminal()
        {
            state.active_order_id = None;
            drop(state);
            if let Some(watchdog) = &self.watchdog {
                watchdog.untrack(&order.order_id);
            }
        }
    }

    /// Executions drive the phase machine: a buy fill while buying records
    /// the entry and flips to selling; a sell fill while selling clears the
    /// entry and flips back.
    async fn handle_execution(&self, execution: ExecutionUpdate) {
        if execution.symbol != self.symbol {
            return;
        }

        let mut state = self.state.lock().await;
        match (execution.side, state.phase) {
            (Side::Buy, Phase::Buying) => {
                state.buy_price = execution.exec_price;
                state.buy_qty = execution.exec_qty;
                state.phase = Phase::Selling;
                info!(
                    "[scalp:{}:{}] buy filled at {} qty={}, switching to sell",
                    self.user_id, self.symbol, execution.exec_price, execution.exec_qty,
                );
                drop(state);
                if let Some(watchdog) = &self.watchdog {
                    watchdog.untrack(&execution.order_id);
                }
            }
            (Side::Sell, Phase::Selling) => {
                state.buy_price = Decimal::ZERO;
                state.buy_qty = Decimal::ZERO;
                state.phase = Phase::Buying;
                info!(
                    "[scalp:{}:{}] sell filled at {}, back to buying",
                    self.user_id, self.symbol, execution.exec_price,
                );
                drop(state);
                if let Some(watchdog) = &self.watchdog {
                    watchdog.untrack(&execution.order_id);
                }
            }
            _ => {}
        }
    }

    /// Recompute minimum spread, order quantity, and minimum profit from
    /// live instrument, ticker, wallet, and fee data.
    async fn update_parameters(&self) -> Result<(), LensError> {
        let instrument = self.instruments.get_by_symbol(&self.symbol).await?;
        let ticker = self.cache.get_ticker(&self.symbol).await?;
        let last_price = ticker.last_price;

        let wallet = self.manager.get_wallet_balance(&self.user_id).await?;
        let quote_balance = wallet
            .usd_value("USDT")
            .or_else(|| wallet.available("USDT"))
            .unwrap_or_default();

        let fee_rate = match self.manager.get_fee_rate(&self.user_id, &self.symbol).await {
            Ok(fees) => fees
                .max_rate()
                .unwrap_or(self.config.fallback_fee_rate),
            Err(e) => {
                debug!(
                    "[scalp:{}:{}] fee-rate query failed ({e}), using fallback",
                    self.user_id, self.symbol,
                );
                self.config.fallback_fee_rate
            }
        };

        let min_spread = sizing::min_spread(last_price, self.config.spread_floor);
        let qty = sizing::order_quantity(
            &instrument,
            last_price,
            quote_balance,
            self.config.balance_fraction,
        );

        let mut state = self.state.lock().await;
        state.min_spread = min_spread;
        state.tick_size = instrument.tick_size;
        state.base_coin = instrument.base_coin.clone();
        match qty {
            Some(qty) => {
                state.qty = qty;
                state.min_profit =
                    sizing::min_profit(last_price, qty, fee_rate, self.config.profit_margin);
            }
            None => {
                state.qty = Decimal::ZERO;
                warn!(
                    "[scalp:{}:{}] no feasible order quantity at price {last_price}",
                    self.user_id, self.symbol,
                );
            }
        }

        info!(
            "[scalp:{}:{}] parameters: minSpread={} minProfit={} qty={} lastPrice={last_price}",
            self.user_id, self.symbol, state.min_spread, state.min_profit, state.qty,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockExchange, manager_fixture};
    use lens_core::cache::{MarketCache, MemoryMarketCache};
    use lens_core::repository::{
        InstrumentRepository, MemoryInstrumentRepository, MemoryUserInstrumentRepository,
    };
    use lens_core::{Category, Instrument};

    fn btc_instrument() -> Instrument {
        Instrument {
            symbol: "BTCUSDT".into(),
            category: Category::Spot,
            base_coin: "BTC".into(),
            quote_coin: "USDT".into(),
            status: "Trading".into(),
            base_precision: "0.000001".parse().unwrap(),
            quote_precision: "0.01".parse().unwrap(),
            min_order_qty: "0.00004".parse().unwrap(),
            max_order_qty: "500".parse().unwrap(),
            min_order_amt: "1".parse().unwrap(),
            max_order_amt: "2000000".parse().unwrap(),
            tick_size: "0.1".parse().unwrap(),
        }
    }

    fn ticker(price: &str) -> TickerUpdate {
        serde_json::from_str(&format!(
            r#"{{"symbol":"BTCUSDT","lastPrice":"{price}"}}"#
        ))
        .unwrap()
    }

    fn book(bid: &str, ask: &str) -> OrderBookUpdate {
        serde_json::from_str(&format!(
            r#"{{"s":"BTCUSDT","b":[["{bid}","1"]],"a":[["{ask}","1"]],"u":1}}"#
        ))
        .unwrap()
    }

    fn execution(order_id: &str, side: &str, price: &str, qty: &str) -> ExecutionUpdate {
        serde_json::from_str(&format!(
            r#"{{"execId":"e-{order_id}","orderId":"{order_id}","symbol":"BTCUSDT",
                "side":"{side}","execPrice":"{price}","execQty":"{qty}"}}"#
        ))
        .unwrap()
    }

    fn order_update(order_id: &str, status: &str) -> OrderUpdate {
        serde_json::from_str(&format!(
            r#"{{"orderId":"{order_id}","symbol":"BTCUSDT","side":"Buy",
                "orderType":"Limit","orderStatus":"{status}","price":"30000","qty":"0.003"}}"#
        ))
        .unwrap()
    }

    struct Fixture {
        ctx: Ctx,
        strategy: Arc<SpreadScalpingStrategy>,
        mock: Arc<MockExchange>,
        cache: Arc<MemoryMarketCache>,
        _user_instruments: Arc<MemoryUserInstrumentRepository>,
    }

    async fn fixture() -> Fixture {
        let (manager, mock, user_instruments) = manager_fixture().await;
        let cache = MemoryMarketCache::new();
        let instruments = MemoryInstrumentRepository::new();
        instruments
            .save_instruments(vec![btc_instrument()])
            .await
            .unwrap();
        cache.save_ticker("BTCUSDT", ticker("30000")).await.unwrap();

        let watchdog = OrderWatchdog::new(manager.clone(), Duration::from_secs(60));
        let strategy = SpreadScalpingStrategy::new(
            "alice",
            "BTCUSDT",
            manager,
            cache.clone(),
            instruments,
            Some(watchdog),
            SpreadScalpingConfig::default(),
        );
        Fixture {
            ctx: strategy.ctx.clone(),
            strategy,
            mock,
            cache,
            _user_instruments: user_instruments,
        }
    }

    #[tokio::test]
    async fn buy_then_sell_cycle() {
        let f = fixture().await;
        f.ctx.update_parameters().await.unwrap();
        // 10% of the 1000 USDT valuation at 30000 → 0.003333 BTC.
        assert_eq!(f.ctx.state.lock().await.qty.to_string(), "0.003333");

        // Wide spread, buying phase: exactly one buy at bestBid + tick.
        f.cache
            .save_spread("BTCUSDT", "10".parse().unwrap())
            .await
            .unwrap();
        f.ctx
            .process(Event::OrderBook(book("30000", "30010")))
            .await;

        let orders = f.mock.created_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Buy);
        assert_eq!(orders[0].price.unwrap().to_string(), "30000.1");
        assert_eq!(orders[0].qty.to_string(), "0.003333");
        assert!(f.mock.cancelled_orders().is_empty()); // nothing was resting

        // The buy fills: phase flips to selling with the entry recorded.
        f.ctx
            .process(Event::Execution(execution(
                "mock-1", "Buy", "30000.1", "0.003333",
            )))
            .await;
        {
            let state = f.ctx.state.lock().await;
            assert_eq!(state.phase, Phase::Selling);
            assert_eq!(state.buy_price.to_string(), "30000.1");
            assert_eq!(state.buy_qty.to_string(), "0.003333");
        }

        // Terminal status clears the tracked order without touching phase.
        f.ctx
            .process(Event::Order(order_update("mock-1", "Filled")))
            .await;
        {
            let state = f.ctx.state.lock().await;
            assert_eq!(state.active_order_id, None);
            assert_eq!(state.phase, Phase::Selling);
        }

        // Market moves up enough to clear fees: one sell at bestAsk − tick.
        f.cache
            .save_spread("BTCUSDT", "10".parse().unwrap())
            .await
            .unwrap();
        f.ctx
            .process(Event::OrderBook(book("30100", "30110")))
            .await;

        let orders = f.mock.created_orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].side, Side::Sell);
        assert_eq!(orders[1].price.unwrap().to_string(), "30109.9");
        assert!(f.mock.cancelled_orders().is_empty()); // slot was already clear

        // The sell fills: back to buying with the entry reset.
        f.ctx
            .process(Event::Execution(execution(
                "mock-2", "Sell", "30109.9", "0.003333",
            )))
            .await;
        {
            let state = f.ctx.state.lock().await;
            assert_eq!(state.phase, Phase::Buying);
            assert_eq!(state.buy_price, Decimal::ZERO);
            assert_eq!(state.buy_qty, Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn narrow_spread_does_nothing() {
        let f = fixture().await;
        f.ctx.update_parameters().await.unwrap();
        // min_spread is 6 (0.02% of 30000); a 2-wide book is ignored.
        f.cache
            .save_spread("BTCUSDT", "2".parse().unwrap())
            .await
            .unwrap();
        f.ctx
            .process(Event::OrderBook(book("30000", "30002")))
            .await;
        assert!(f.mock.created_orders().is_empty());
    }

    #[tokio::test]
    async fn insufficient_quote_balance_places_no_order() {
        let f = fixture().await;
        f.ctx.update_parameters().await.unwrap();
        // Balance drops below the 10 USDT minimum after the refresh.
        f.mock.set_wallet_json(
            r#"{"list":[{"accountType":"UNIFIED","coin":[
                {"coin":"USDT","walletBalance":"5","free":"5","usdValue":"5"}
            ]}]}"#,
        );

        f.cache
            .save_spread("BTCUSDT", "10".parse().unwrap())
            .await
            .unwrap();
        f.ctx
            .process(Event::OrderBook(book("30000", "30010")))
            .await;

        assert!(f.mock.created_orders().is_empty());
        assert!(f.mock.cancelled_orders().is_empty());
    }

    #[tokio::test]
    async fn requote_cancels_the_resting_order_first() {
        let f = fixture().await;
        f.ctx.update_parameters().await.unwrap();
        f.cache
            .save_spread("BTCUSDT", "10".parse().unwrap())
            .await
            .unwrap();

        f.ctx
            .process(Event::OrderBook(book("30000", "30010")))
            .await;
        f.ctx
            .process(Event::OrderBook(book("30001", "30011")))
            .await;

        // Second tick cancelled the first order before re-quoting.
        assert_eq!(f.mock.cancelled_orders(), vec!["mock-1".to_string()]);
        let orders = f.mock.created_orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].price.unwrap().to_string(), "30001.1");
    }

    #[tokio::test]
    async fn unprofitable_sell_is_rejected() {
        let f = fixture().await;
        f.ctx.update_parameters().await.unwrap();

        // Enter the selling phase at 30000.1.
        f.ctx
            .process(Event::Execution(execution("x", "Buy", "30000.1", "0.003333")))
            .await;

        // Ask barely above entry: (30009.9 − 30000.1) × 0.003333 ≈ 0.0327,
        // far below the fee-covering minimum.
        f.cache
            .save_spread("BTCUSDT", "10".parse().unwrap())
            .await
            .unwrap();
        f.ctx
            .process(Event::OrderBook(book("30000", "30010")))
            .await;

        assert!(f.mock.created_orders().is_empty());
        assert_eq!(f.ctx.state.lock().await.phase, Phase::Selling);
    }

    #[tokio::test]
    async fn phase_never_flips_on_mismatched_side_or_status() {
        let f = fixture().await;
        f.ctx.update_parameters().await.unwrap();

        // A sell execution while buying is ignored.
        f.ctx
            .process(Event::Execution(execution("y", "Sell", "30000", "0.001")))
            .await;
        assert_eq!(f.ctx.state.lock().await.phase, Phase::Buying);

        // An order-status update alone never flips phase either.
        f.ctx
            .process(Event::Order(order_update("z", "Filled")))
            .await;
        let state = f.ctx.state.lock().await;
        assert_eq!(state.phase, Phase::Buying);
        // Invariant: buying phase keeps a zeroed entry.
        assert_eq!(state.buy_qty, Decimal::ZERO);
    }

    #[tokio::test]
    async fn infeasible_quantity_blocks_trading() {
        let f = fixture().await;
        // Min notional needs 3.33 BTC at this price but max qty is 0.001:
        // no feasible quantity exists, so the strategy must not trade.
        let mut inst = btc_instrument();
        inst.min_order_amt = "100000".parse().unwrap();
        inst.max_order_qty = "0.001".parse().unwrap();
        f.ctx
            .instruments
            .save_instruments(vec![inst])
            .await
            .unwrap();
        f.ctx.update_parameters().await.unwrap();
        assert_eq!(f.ctx.state.lock().await.qty, Decimal::ZERO);

        f.cache
            .save_spread("BTCUSDT", "10".parse().unwrap())
            .await
            .unwrap();
        f.ctx
            .process(Event::OrderBook(book("30000", "30010")))
            .await;
        assert!(f.mock.created_orders().is_empty());
    }

    #[tokio::test]
    async fn stop_cancels_the_resting_order_and_proceeds_on_failure() {
        let f = fixture().await;
        f.ctx.state.lock().await.active_order_id = Some("mock-9".to_string());

        f.strategy.stop().await;

        assert_eq!(f.mock.cancelled_orders(), vec!["mock-9".to_string()]);
        assert_eq!(f.ctx.state.lock().await.active_order_id, None);
    }

    #[tokio::test]
    async fn callbacks_filter_foreign_symbols() {
        let f = fixture().await;
        let eth: ExecutionUpdate = serde_json::from_str(
            r#"{"execId":"e1","orderId":"o1","symbol":"ETHUSDT",
                "side":"Buy","execPrice":"2000","execQty":"1"}"#,
        )
        .unwrap();
        f.strategy.on_execution(&eth).await;

        let own: ExecutionUpdate = serde_json::from_str(
            r#"{"execId":"e2","orderId":"o2","symbol":"BTCUSDT",
                "side":"Buy","execPrice":"30000","execQty":"0.001"}"#,
        )
        .unwrap();
        f.strategy.on_execution(&own).await;

        // Only the matching-symbol execution was queued.
        let mut rx = f.strategy.rx.lock().unwrap().take().unwrap();
        match rx.try_recv().unwrap() {
            Event::Execution(execution) => assert_eq!(execution.exec_id, "e2"),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }
}
