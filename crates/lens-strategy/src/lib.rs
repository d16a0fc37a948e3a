//! # lens-strategy
//!
//! Strategy execution layer:
//!
//! - [`Strategy`] — the trait every trading strategy implements
//! - [`manager::StrategyManager`] — per-user registry and event dispatcher
//! - [`router::MarketRouter`] — stream frames → cache writes → dispatch
//! - [`spread_scalping::SpreadScalpingStrategy`] — two-phase reference
//!   strategy
//! - [`watchdog::OrderWatchdog`] — stale buy-order cancellation
//! - [`sizing`] — order quantity and threshold math
//! - [`recorder::RecorderStrategy`] — log-everything strategy for smoke runs

pub mod manager;
pub mod recorder;
pub mod router;
pub mod sizing;
pub mod spread_scalping;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod testutil;

use async_trait::async_trait;
use lens_core::{
    ExecutionUpdate, OrderBookUpdate, OrderUpdate, TickerUpdate, TradeUpdate, WalletAccount,
};

/// A trading strategy.
///
/// The dispatcher invokes the event callbacks synchronously and sequentially
/// for every relevant event; implementations must return quickly (the
/// reference strategies enqueue into an internal channel and do their work on
/// a dedicated task, so no two tasks ever touch one strategy's state).
///
/// Lifecycle: [`start`](Strategy::start) when the user activates the
/// strategy, [`stop`](Strategy::stop) when it is deactivated, removed, or the
/// process shuts down. `stop` must release any resting order.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Short name for logs and the registry listing.
    fn name(&self) -> &str;

    /// A ticker snapshot for a symbol this strategy's user trades.
    async fn on_ticker(&self, ticker: &TickerUpdate);

    /// An order book update for a relevant symbol.
    async fn on_order_book(&self, book: &OrderBookUpdate);

    /// A public trade print for a relevant symbol.
    async fn on_trade(&self, trade: &TradeUpdate);

    /// A private order status update.
    async fn on_order(&self, order: &OrderUpdate);

    /// A private fill.
    async fn on_execution(&self, execution: &ExecutionUpdate);

    /// A wallet snapshot. Delivered unconditionally (not symbol-scoped).
    async fn on_wallet(&self, accounts: &[WalletAccount]);

    /// Activate: spawn internal tasks, load initial parameters.
    async fn start(&self);

    /// Deactivate: cancel any resting order, stop internal tasks.
    async fn stop(&self);
}
