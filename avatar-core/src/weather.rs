use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::AvatarError;
use crate::icons::IconCache;
use crate::model::WeatherSnapshot;

/// Total attempts per fetch, including the first one.
pub const FETCH_ATTEMPTS: usize = 3;

/// Fixed pause before each retry.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Seam between the polling loop and the concrete weather provider,
/// so the loop can be exercised against scripted sources.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_current(&self) -> Result<WeatherSnapshot, AvatarError>;
}

/// OpenWeatherMap client owning the retry policy for the current-weather
/// endpoint. Shares the long-lived HTTP client built at startup.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    api_url: String,
    api_key: String,
    location_id: String,
    http: Client,
    icons: IconCache,
}

impl WeatherClient {
    pub fn new(
        api_url: String,
        api_key: String,
        location_id: String,
        icons: IconCache,
        http: Client,
    ) -> Self {
        Self { api_url, api_key, location_id, http, icons }
    }

    /// One request-parse-validate pass. Connection errors, non-2xx
    /// statuses and schema mismatches are all transient here: the caller
    /// retries them uniformly.
    async fn fetch_once(&self) -> Result<WeatherSnapshot> {
        let res = self
            .http
            .get(&self.api_url)
            .query(&[
                ("id", self.location_id.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .context("Failed to send request to OpenWeatherMap")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeatherMap response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeatherMap request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: OwResponse =
            serde_json::from_str(&body).context("Failed to parse OpenWeatherMap JSON")?;

        snapshot_from_response(parsed)
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn fetch_current(&self) -> Result<WeatherSnapshot, AvatarError> {
        info!(url = %self.api_url, location = %self.location_id, "requesting current weather");

        let snapshot = retry_with_delay(FETCH_ATTEMPTS, RETRY_DELAY, || self.fetch_once())
            .await
            .map_err(|source| AvatarError::WeatherUnavailable {
                attempts: FETCH_ATTEMPTS,
                source,
            })?;

        // Best effort: a missing icon degrades the render, but the
        // temperature text must not be blocked by icon availability.
        if let Err(err) = self.icons.ensure(&snapshot.condition_code).await {
            warn!(
                code = %snapshot.condition_code,
                error = %err,
                "icon fetch failed, rendering may proceed without a cached icon"
            );
        }

        info!(
            code = %snapshot.condition_code,
            temperature_c = snapshot.temperature_celsius,
            humidity_pct = snapshot.humidity_percent,
            wind_mps = snapshot.wind_speed_mps,
            "weather updated"
        );

        Ok(snapshot)
    }
}

/// Run `op` up to `attempts` times, sleeping `delay` before each retry.
/// Returns the first success or the last error once attempts are spent.
pub async fn retry_with_delay<T, F, Fut>(
    attempts: usize,
    delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(attempt, attempts, error = %format!("{err:#}"), "attempt failed");
                last_err = Some(err);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("retry helper called with zero attempts")))
}

fn snapshot_from_response(parsed: OwResponse) -> Result<WeatherSnapshot> {
    let entry = parsed
        .weather
        .first()
        .ok_or_else(|| anyhow!("OpenWeatherMap response contained no weather entries"))?;

    if entry.icon.is_empty() {
        return Err(anyhow!("OpenWeatherMap response contained an empty icon code"));
    }

    Ok(WeatherSnapshot {
        condition_code: entry.icon.clone(),
        temperature_celsius: parsed.main.temp,
        // The snapshot invariant is 0-100; a malformed payload is clamped
        // rather than failing a whole cycle over a cosmetic field.
        humidity_percent: parsed.main.humidity.min(100),
        wind_speed_mps: parsed.wind.map(|w| w.speed).unwrap_or(0.0),
        retrieved_at: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwResponse {
    weather: Vec<OwWeather>,
    main: OwMain,
    wind: Option<OwWind>,
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    // Provider error bodies are not guaranteed to be ASCII; cut on a char
    // boundary so a multibyte character straddling MAX cannot panic.
    let mut cut = MAX;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &body[..cut])
}
