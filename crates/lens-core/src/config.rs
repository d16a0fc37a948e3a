//! Configuration parsing for the trading system.
//!
//! All components read their settings from a single JSON config file. The
//! top-level structure contains service metadata, the Bybit endpoint block,
//! stream tuning, strategy parameters, and the seeded accounts the runner
//! loads into the in-memory repositories.
//!
//! # Example config
//!
//! ```json
//! {
//!   "service": { "name": "lens-runner", "log_path": "/tmp/log" },
//!   "bybit": {
//!     "rest_url": "https://api.bybit.com",
//!     "ws_url": "wss://stream.bybit.com",
//!     "recv_window_ms": 5000
//!   },
//!   "stream": { "orderbook_depth": 1, "queue_capacity": 1000 },
//!   "strategy": { "refresh_interval_sec": 300, "buy_order_timeout_sec": 60 },
//!   "accounts": [{
//!     "user_id": "alice",
//!     "api_key": "...",
//!     "api_secret": "...",
//!     "symbols": ["BTCUSDT"]
//!   }]
//! }
//! ```

use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Service metadata (name, log path).
    pub service: Option<ServiceMeta>,

    /// Bybit endpoint configuration.
    #[serde(default)]
    pub bybit: BybitConfig,

    /// Stream/queue tuning.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Strategy parameters.
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Accounts seeded into the in-memory repositories at startup.
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
}

/// Service metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceMeta {
    pub name: Option<String>,
    pub log_path: Option<String>,
}

/// Bybit REST/WebSocket endpoint configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BybitConfig {
    /// REST base URL (default: production).
    pub rest_url: Option<String>,

    /// WebSocket base URL; `/v5/public/spot` and `/v5/private` are appended.
    pub ws_url: Option<String>,

    /// Signed-request receive window in milliseconds.
    pub recv_window_ms: Option<u64>,
}

impl BybitConfig {
    pub fn effective_rest_url(&self) -> String {
        self.rest_url
            .clone()
            .unwrap_or_else(|| "https://api.bybit.com".to_string())
    }

    pub fn public_ws_url(&self) -> String {
        format!("{}/v5/public/spot", self.ws_base())
    }

    pub fn private_ws_url(&self) -> String {
        format!("{}/v5/private", self.ws_base())
    }

    pub fn effective_recv_window_ms(&self) -> u64 {
        self.recv_window_ms.unwrap_or(5000)
    }

    fn ws_base(&self) -> String {
        self.ws_url
            .clone()
            .unwrap_or_else(|| "wss://stream.bybit.com".to_string())
    }
}

/// Stream and queue tuning.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamConfig {
    /// Order book subscription depth (default: 1 — full snapshot per frame).
    pub orderbook_depth: Option<u32>,

    /// Bounded market-data queue capacity.
    pub queue_capacity: Option<usize>,

    /// Heartbeat ping interval in seconds.
    pub ping_interval_sec: Option<u64>,

    /// Queue fill-level sampling interval in seconds.
    pub monitor_interval_sec: Option<u64>,
}

impl StreamConfig {
    pub fn effective_orderbook_depth(&self) -> u32 {
        self.orderbook_depth.unwrap_or(1)
    }

    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(1000)
    }

    pub fn effective_ping_interval_sec(&self) -> u64 {
        self.ping_interval_sec.unwrap_or(20)
    }

    pub fn effective_monitor_interval_sec(&self) -> u64 {
        self.monitor_interval_sec.unwrap_or(1)
    }
}

/// Spread-scalping strategy parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrategyConfig {
    /// Parameter refresh period in seconds (default: 300).
    pub refresh_interval_sec: Option<u64>,

    /// Buy-order age limit before the watchdog cancels it (default: 60).
    pub buy_order_timeout_sec: Option<u64>,

    /// Watchdog scan period in seconds (default: 10).
    pub watchdog_interval_sec: Option<u64>,

    /// Instrument metadata refresh period in seconds (default: 300).
    pub instruments_update_interval_sec: Option<u64>,

    /// Minimum free quote balance required before buying (default: 10).
    pub min_quote_balance: Option<Decimal>,

    /// Fraction of the quote balance committed per order (default: 0.1).
    pub balance_fraction: Option<Decimal>,

    /// Absolute spread floor in quote units (default: 1).
    pub spread_floor: Option<Decimal>,

    /// Fixed profit margin added on top of fees (default: 0.1).
    pub profit_margin: Option<Decimal>,

    /// Fee rate used when the live fee-rate query fails (default: 0.001).
    pub fallback_fee_rate: Option<Decimal>,
}

impl StrategyConfig {
    pub fn effective_refresh_interval_sec(&self) -> u64 {
        self.refresh_interval_sec.unwrap_or(300)
    }

    pub fn effective_buy_order_timeout_sec(&self) -> u64 {
        self.buy_order_timeout_sec.unwrap_or(60)
    }

    pub fn effective_watchdog_interval_sec(&self) -> u64 {
        self.watchdog_interval_sec.unwrap_or(10)
    }

    pub fn effective_instruments_update_interval_sec(&self) -> u64 {
        self.instruments_update_interval_sec.unwrap_or(300)
    }

    pub fn effective_min_quote_balance(&self) -> Decimal {
        self.min_quote_balance.unwrap_or_else(|| Decimal::from(10))
    }

    pub fn effective_balance_fraction(&self) -> Decimal {
        self.balance_fraction
            .unwrap_or_else(|| Decimal::new(1, 1)) // 0.1
    }

    pub fn effective_spread_floor(&self) -> Decimal {
        self.spread_floor.unwrap_or_else(|| Decimal::from(1))
    }

    pub fn effective_profit_margin(&self) -> Decimal {
        self.profit_margin.unwrap_or_else(|| Decimal::new(1, 1)) // 0.1
    }

    pub fn effective_fallback_fee_rate(&self) -> Decimal {
        self.fallback_fee_rate
            .unwrap_or_else(|| Decimal::new(1, 3)) // 0.001
    }
}

/// One account seeded at startup, with the symbols the user trades.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSeed {
    pub user_id: String,
    pub api_key: String,
    pub api_secret: String,

    /// Bybit account type (default: `"UNIFIED"`).
    pub account_type: Option<String>,

    /// Active symbols for this user.
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl AccountSeed {
    pub fn effective_account_type(&self) -> String {
        self.account_type
            .clone()
            .unwrap_or_else(|| "UNIFIED".to_string())
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_sections_missing() {
        let config: AppConfig = serde_json::from_str(r#"{"service": null}"#).unwrap();
        assert_eq!(config.bybit.effective_rest_url(), "https://api.bybit.com");
        assert_eq!(
            config.bybit.public_ws_url(),
            "wss://stream.bybit.com/v5/public/spot"
        );
        assert_eq!(config.bybit.effective_recv_window_ms(), 5000);
        assert_eq!(config.stream.effective_queue_capacity(), 1000);
        assert_eq!(config.strategy.effective_buy_order_timeout_sec(), 60);
        assert_eq!(
            config.strategy.effective_balance_fraction().to_string(),
            "0.1"
        );
    }

    #[test]
    fn explicit_values_override_defaults() {
        let json = r#"{
            "service": { "name": "test" },
            "bybit": { "rest_url": "https://api-testnet.bybit.com", "recv_window_ms": 9000 },
            "stream": { "queue_capacity": 64 },
            "strategy": { "spread_floor": "2.5" },
            "accounts": [{ "user_id": "alice", "api_key": "k", "api_secret": "s" }]
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.bybit.effective_rest_url(),
            "https://api-testnet.bybit.com"
        );
        assert_eq!(config.bybit.effective_recv_window_ms(), 9000);
        assert_eq!(config.stream.effective_queue_capacity(), 64);
        assert_eq!(config.strategy.effective_spread_floor().to_string(), "2.5");
        assert_eq!(config.accounts[0].effective_account_type(), "UNIFIED");
    }
}
