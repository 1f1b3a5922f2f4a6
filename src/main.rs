use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use weatherwatch_core::Config;
use weatherwatch_server::AppState;
use weatherwatch_services::{
    LogNotifier, Notifier, PollScheduler, ReadingStore, SmtpNotifier, SqliteReadingStore,
};
use weatherwatch_weather::{OpenWeatherProvider, ReadingFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    weatherwatch_core::init()?;

    let (config, _validation) = Config::load_validated()?;

    let store: Arc<dyn ReadingStore> = Arc::new(
        SqliteReadingStore::open(&config.storage.database_path).with_context(|| {
            format!(
                "Failed to open database {}",
                config.storage.database_path.display()
            )
        })?,
    );
    tracing::info!("Storing readings in {}", config.storage.database_path.display());

    let fetcher: Arc<dyn ReadingFetcher> = Arc::new(
        OpenWeatherProvider::from_config(&config.provider)
            .context("Failed to create weather provider client")?,
    );

    let notifier: Arc<dyn Notifier> = if config.mail.is_configured() {
        Arc::new(SmtpNotifier::new(&config.mail).context("Failed to set up alert mail")?)
    } else {
        tracing::warn!("Mail is not configured; alerts will only be logged");
        Arc::new(LogNotifier)
    };

    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.server.bind))?;

    let shutdown = CancellationToken::new();

    let scheduler = PollScheduler::new(
        fetcher.clone(),
        store.clone(),
        config.poller.cities.clone(),
        Duration::from_secs(config.poller.interval_secs),
    );
    let poller = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let result = scheduler.run(shutdown.clone()).await;
            // Stop the API too once polling ends.
            shutdown.cancel();
            result
        })
    };

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!("Cannot listen for shutdown signal: {}", e),
            }
        });
    }

    let state = AppState::new(
        store,
        fetcher,
        notifier,
        config.poller.cities.clone(),
        &config.poller.summary_city,
    );
    weatherwatch_server::serve(bind, state, shutdown.clone())
        .await
        .with_context(|| format!("Failed to start HTTP API on {bind}"))?;

    shutdown.cancel();
    poller
        .await
        .context("Poll scheduler task panicked")?
        .context("Poll scheduler stopped on a storage fault")?;

    tracing::info!("WeatherWatch stopped");
    Ok(())
}
