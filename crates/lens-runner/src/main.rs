//! # lens-runner
//!
//! Main entry point for the CryptoLens trading engine.
//!
//! Loads a JSON configuration file, seeds the in-memory repositories from
//! it, opens the public market stream plus one authenticated private stream
//! per active account, registers a spread-scalping strategy per user and
//! symbol, and runs until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! lens-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use lens_core::cache::MemoryMarketCache;
use lens_core::repository::{
    AccountRepository, MemoryAccountRepository, MemoryInstrumentRepository,
    MemoryTradeLogRepository, MemoryUserInstrumentRepository, UserInstrumentRepository,
};
use lens_core::{AccountCredentials, config};
use lens_exchange::ws::OnFrameCallback;
use lens_exchange::{BybitClient, WsClient, WsConfig, instruments, messages, stream};
use lens_strategy::router::{self, MarketRouter};
use lens_strategy::spread_scalping::{SpreadScalpingConfig, SpreadScalpingStrategy};
use lens_strategy::watchdog::OrderWatchdog;
use lens_strategy::{Strategy, manager::StrategyManager};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// CryptoLens Bybit spot trading engine.
#[derive(Parser)]
#[command(name = "lens-runner", about = "CryptoLens Bybit Spot Trading Engine")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Logging + configuration
    lens_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "lens-runner");
    let config = config::load_config(&cli.config)?;
    info!(
        "lens-runner starting — config={}, {} account(s)",
        cli.config.display(),
        config.accounts.len(),
    );

    // 2. Repositories and cache, seeded from the config
    let accounts = MemoryAccountRepository::new();
    let user_instruments = MemoryUserInstrumentRepository::new();
    let instruments_repo = MemoryInstrumentRepository::new();
    let trade_log = MemoryTradeLogRepository::new();
    let cache = MemoryMarketCache::new();

    for seed in &config.accounts {
        accounts
            .insert(AccountCredentials {
                user_id: seed.user_id.clone(),
                api_key: seed.api_key.clone(),
                api_secret: seed.api_secret.clone(),
                account_type: seed.effective_account_type(),
                is_active: true,
            })
            .await;
        user_instruments
            .set_active(&seed.user_id, seed.symbols.clone())
            .await;
    }

    // 3. Exchange client, manager, watchdog, router
    let client = Arc::new(BybitClient::new(
        config.bybit.effective_rest_url(),
        config.bybit.effective_recv_window_ms(),
    ));
    let manager = StrategyManager::new(
        client.clone(),
        accounts.clone(),
        user_instruments.clone(),
    );
    let watchdog = OrderWatchdog::new(
        manager.clone(),
        Duration::from_secs(config.strategy.effective_buy_order_timeout_sec()),
    );
    let router = MarketRouter::new(cache.clone(), manager.clone(), trade_log.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();
    let mut ws_clients = Vec::new();

    // 4. Background maintenance: instrument refresh + watchdog
    tasks.push(instruments::spawn_instrument_refresh(
        client.clone(),
        instruments_repo.clone(),
        Duration::from_secs(config.strategy.effective_instruments_update_interval_sec()),
        shutdown_rx.clone(),
    ));
    tasks.push(watchdog.clone().spawn(
        Duration::from_secs(config.strategy.effective_watchdog_interval_sec()),
        shutdown_rx.clone(),
    ));

    // 5. Strategies: one spread-scalper per user and enabled symbol
    let scalping_config = SpreadScalpingConfig::from_app(&config.strategy);
    for seed in &config.accounts {
        for symbol in &seed.symbols {
            let strategy: Arc<dyn Strategy> = SpreadScalpingStrategy::new(
                &seed.user_id,
                symbol,
                manager.clone(),
                cache.clone(),
                instruments_repo.clone(),
                Some(watchdog.clone()),
                scalping_config.clone(),
            );
            manager.add_strategy(&seed.user_id, strategy).await;
        }
        manager.update_user_instruments(&seed.user_id).await?;
    }

    // 6. Public stream: all enabled symbols → bounded queue → router
    let symbols = user_instruments.get_active_instruments().await?;
    if symbols.is_empty() {
        warn!("no active symbols configured — public stream not started");
    } else {
        let channels: Vec<String> = symbols
            .iter()
            .flat_map(|s| {
                messages::public_channels(s, config.stream.effective_orderbook_depth())
            })
            .collect();
        info!("subscribing {} public channel(s)", channels.len());

        let (queue, queue_rx) =
            stream::MarketQueue::bounded(config.stream.effective_queue_capacity());
        tasks.push(stream::spawn_queue_monitor(
            "public".to_string(),
            queue.clone(),
            Duration::from_secs(config.stream.effective_monitor_interval_sec()),
            shutdown_rx.clone(),
        ));
        tasks.push(router::spawn_public_consumer(
            router.clone(),
            queue_rx,
            shutdown_rx.clone(),
        ));

        let mut ws = WsClient::new(WsConfig {
            url: config.bybit.public_ws_url(),
            label: "public".to_string(),
            credentials: None,
            recv_window_ms: config.bybit.effective_recv_window_ms(),
            channels,
            ping_interval: Duration::from_secs(config.stream.effective_ping_interval_sec()),
        });
        let on_frame: OnFrameCallback = Arc::new(move |raw| match messages::decode_frame(raw) {
            Ok(message) => queue.push(message),
            Err(e) => warn!("[public] dropped malformed frame: {e}"),
        });
        ws.start(on_frame);
        ws_clients.push(ws);
    }

    // 7. Private streams: one authenticated connection per active account
    for account in accounts.get_active_accounts().await? {
        let (private_tx, private_rx) = mpsc::unbounded_channel();
        tasks.push(router::spawn_private_consumer(
            router.clone(),
            account.user_id.clone(),
            private_rx,
            shutdown_rx.clone(),
        ));

        let mut ws = WsClient::new(WsConfig {
            url: config.bybit.private_ws_url(),
            label: format!("private:{}", account.user_id),
            credentials: Some((account.api_key.clone(), account.api_secret.clone())),
            recv_window_ms: config.bybit.effective_recv_window_ms(),
            channels: messages::private_channels(),
            ping_interval: Duration::from_secs(config.stream.effective_ping_interval_sec()),
        });
        let user_id = account.user_id.clone();
        let on_frame: OnFrameCallback = Arc::new(move |raw| match messages::decode_frame(raw) {
            Ok(message) => {
                let _ = private_tx.send(message);
            }
            Err(e) => warn!("[private:{user_id}] dropped malformed frame: {e}"),
        });
        ws.start(on_frame);
        ws_clients.push(ws);
    }

    // 8. Start strategies and wait for shutdown
    manager.start_all().await;
    info!("engine running — press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // 9. Graceful teardown: strategies first (they cancel resting orders),
    //    then streams and background tasks.
    manager.stop_all().await;
    let _ = shutdown_tx.send(true);
    for ws in &mut ws_clients {
        ws.stop().await;
    }
    for task in tasks {
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                error!("task join error: {e}");
            }
        }
    }

    info!("engine stopped — goodbye");
    Ok(())
}
