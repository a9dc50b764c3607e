use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::AvatarError;
use crate::publish::{ProfilePublisher, replace_profile};
use crate::render::AvatarRender;
use crate::weather::WeatherSource;

/// Sleep cadences between cycles. Defaults match the production loop:
/// ten minutes after a published avatar, one minute after a weather
/// outage.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub success_interval: Duration,
    pub failure_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            success_interval: Duration::from_secs(600),
            failure_interval: Duration::from_secs(60),
        }
    }
}

/// Supervising loop: fetch → render → publish, forever, one cycle in
/// flight at a time.
///
/// A weather outage is the only recoverable failure; the loop logs it and
/// retries on the short cadence. Render and publish failures abort the
/// loop with an error so the process supervisor sees them. Cancellation
/// is cooperative: every sleep and the in-flight cycle race the token.
pub struct PollingLoop {
    weather: Box<dyn WeatherSource>,
    renderer: Box<dyn AvatarRender>,
    publisher: Box<dyn ProfilePublisher>,
    config: LoopConfig,
    cancel: CancellationToken,
}

impl PollingLoop {
    pub fn new(
        weather: Box<dyn WeatherSource>,
        renderer: Box<dyn AvatarRender>,
        publisher: Box<dyn ProfilePublisher>,
        config: LoopConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self { weather, renderer, publisher, config, cancel }
    }

    /// Run until cancelled (`Ok`) or until a non-recoverable cycle
    /// failure (`Err`).
    pub async fn run(self) -> Result<(), AvatarError> {
        info!(
            success_interval_s = self.config.success_interval.as_secs(),
            failure_interval_s = self.config.failure_interval.as_secs(),
            "polling loop started"
        );

        loop {
            let delay = tokio::select! {
                _ = self.cancel.cancelled() => break,
                outcome = self.run_cycle() => match outcome {
                    Ok(()) => self.config.success_interval,
                    Err(err) if err.is_recoverable() => {
                        warn!(error = %format!("{err:#}"), "cycle failed, will retry");
                        self.config.failure_interval
                    }
                    Err(err) => {
                        error!(error = %format!("{err:#}"), "unrecoverable pipeline failure");
                        return Err(err);
                    }
                },
            };

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("polling loop cancelled");
        Ok(())
    }

    async fn run_cycle(&self) -> Result<(), AvatarError> {
        let snapshot = self.weather.fetch_current().await?;
        let artifact = self.renderer.render(&snapshot).await?;
        let handle = replace_profile(self.publisher.as_ref(), &artifact).await?;

        info!(
            artifact = %artifact.path.display(),
            remote_id = %handle.id,
            "cycle complete"
        );

        Ok(())
    }
}
