use agileview::config::Config;
use agileview::dashboard::Dashboard;
use agileview::store::open_store;
use agileview::sync::DaySynchronizer;
use agileview::timewindow::SystemClock;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config.validate()?;
    agileview::logging::init_logging(&config.logging)?;

    info!("AgileView starting up");

    let store = open_store(&config.storage)?;
    let fetcher = build_fetcher(&config).await?;
    let sync = DaySynchronizer::new(
        store,
        fetcher,
        Arc::new(SystemClock),
        config.reference_tz()?,
        config.sync.clone(),
    );
    let dashboard = Dashboard::from_config(&config, Arc::new(sync))?;

    agileview::web::serve(
        Arc::new(Mutex::new(dashboard)),
        &config.web.host,
        config.web.port,
    )
    .await
}

#[cfg(feature = "octopus")]
async fn build_fetcher(config: &Config) -> Result<Arc<dyn agileview::fetcher::SeriesFetcher>> {
    use agileview::fetcher::StaticCredential;
    use agileview::octopus::OctopusClient;

    let credentials = Arc::new(StaticCredential::api_key(&config.octopus.api_key));
    let mut client = OctopusClient::new(&config.octopus, credentials)?;

    let account = config.octopus.account_number.trim();
    if client.meter().is_none() {
        if account.is_empty() {
            warn!("No meter configured; consumption and cost graphs will be empty");
        } else if let Err(e) = client.discover_meter(account).await {
            warn!("Meter discovery failed, consumption unavailable: {}", e);
        }
    }

    Ok(Arc::new(client))
}

#[cfg(not(feature = "octopus"))]
async fn build_fetcher(_config: &Config) -> Result<Arc<dyn agileview::fetcher::SeriesFetcher>> {
    anyhow::bail!("built without the octopus feature; no provider available")
}
