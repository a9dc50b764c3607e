//! Component wiring and loop supervision for the daemon.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use avatar_core::{
    AvatarRender, AvatarRenderer, Config, HttpProfilePublisher, IconCache, LoopConfig,
    PollingLoop, WeatherClient, WeatherSource,
};

/// Everything a cycle needs except the publisher, built from one config.
struct Components {
    weather: WeatherClient,
    renderer: AvatarRenderer,
    http: reqwest::Client,
}

async fn build_components(config: &Config) -> Result<Components> {
    config.ensure_api_key()?;

    // One long-lived HTTP client shared by the weather fetch, the icon
    // cache and the publisher.
    let http = reqwest::Client::new();

    let cache_dir = config.cache_dir()?;
    tokio::fs::create_dir_all(&cache_dir)
        .await
        .with_context(|| format!("Failed to create icon cache dir {}", cache_dir.display()))?;

    let icons = IconCache::new(cache_dir, config.icon_url_template.clone(), http.clone());

    let weather = WeatherClient::new(
        config.api_url.clone(),
        config.api_key.clone(),
        config.location_id.clone(),
        icons.clone(),
        http.clone(),
    );

    let renderer = AvatarRenderer::new(config.render_config(), icons)?;

    Ok(Components { weather, renderer, http })
}

/// Run the polling loop until Ctrl+C or a non-recoverable failure.
pub async fn run_daemon() -> Result<()> {
    let config = Config::load()?;
    let publisher_cfg = config.publisher()?.clone();

    info!(location = %config.location_id, "starting weather avatar daemon");

    let components = build_components(&config).await?;
    let publisher = HttpProfilePublisher::new(
        publisher_cfg.base_url,
        publisher_cfg.token,
        components.http.clone(),
    );

    let cancel = CancellationToken::new();
    let polling = PollingLoop::new(
        Box::new(components.weather),
        Box::new(components.renderer),
        Box::new(publisher),
        LoopConfig::default(),
        cancel.clone(),
    );

    let mut loop_task = tokio::spawn(polling.run());

    tokio::select! {
        result = &mut loop_task => {
            result.context("Polling loop panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            cancel.cancel();
            loop_task.await.context("Polling loop panicked")??;
        }
    }

    info!("daemon stopped");
    Ok(())
}

/// Fetch once and render, printing the artifact path. No publish step.
pub async fn run_once() -> Result<()> {
    let config = Config::load()?;
    let components = build_components(&config).await?;

    let snapshot = components.weather.fetch_current().await?;
    let artifact = components.renderer.render(&snapshot).await?;

    println!("{}", artifact.path.display());
    Ok(())
}
