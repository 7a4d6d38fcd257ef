use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use watchdog_service::config::{Config, Settings};
use watchdog_service::monitoring::HttpProber;
use watchdog_service::notify::LogNotifier;
use watchdog_service::store::JsonFileStore;
use watchdog_service::Watchdog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_tracing();

    let config = Config::from_config(None::<&std::path::Path>)?;
    let settings = Settings::from(&config);

    let store = Arc::new(JsonFileStore::new(&config.storage.data_dir));
    let prober = Arc::new(HttpProber::new(settings.default_timeout)?);

    let watchdog = Watchdog::new(settings, store, prober, Arc::new(LogNotifier));
    watchdog.start().await?;
    info!("watchdog service started");

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutting down");
    watchdog.shutdown().await;
    Ok(())
}
