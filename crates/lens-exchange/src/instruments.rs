//! Periodic instrument metadata refresh.
//!
//! Pulls the spot instrument list from the exchange on a fixed interval and
//! upserts it into the [`InstrumentRepository`], so order sizing always sees
//! current lot-size and price filters. The first refresh runs immediately at
//! startup; refresh failures are logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use lens_core::Category;
use lens_core::repository::InstrumentRepository;
use tokio::sync::watch;
use tracing::{error, info};

use crate::client::ExchangeClient;

/// Spawn the refresh task. Runs until the shutdown signal fires.
pub fn spawn_instrument_refresh(
    client: Arc<dyn ExchangeClient>,
    repository: Arc<dyn InstrumentRepository>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.changed() => {
                    info!("[instruments] refresh task stopped");
                    return;
                }
            }

            if let Err(e) = refresh(client.as_ref(), repository.as_ref()).await {
                error!("[instruments] refresh failed: {e}");
            }
        }
    })
}

/// One refresh round: fetch, flatten, upsert.
async fn refresh(
    client: &dyn ExchangeClient,
    repository: &dyn InstrumentRepository,
) -> anyhow::Result<()> {
    let response = client.get_instruments(Category::Spot).await?;
    let category = response.category;
    let instruments: Vec<_> = response
        .list
        .into_iter()
        .map(|info| info.into_instrument(category))
        .collect();

    let count = instruments.len();
    repository.save_instruments(instruments).await?;
    info!("[instruments] updated {count} instruments");
    Ok(())
}
