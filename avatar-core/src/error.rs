use thiserror::Error;

/// Error taxonomy for one pipeline cycle.
///
/// `WeatherUnavailable` is the only class the polling loop recovers from;
/// everything else aborts the loop so the failure is visible to the
/// supervising process instead of dying silently in a background task.
#[derive(Debug, Error)]
pub enum AvatarError {
    /// Weather fetch exhausted its retries.
    #[error("weather data unavailable after {attempts} attempts")]
    WeatherUnavailable {
        attempts: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Icon download failed; the cache is left untouched.
    #[error("failed to download icon \"{code}\"")]
    IconDownload {
        code: String,
        #[source]
        source: anyhow::Error,
    },

    /// Missing or corrupt icon, font or background asset, or a failed
    /// transcode. The cycle cannot produce a meaningful artifact.
    #[error("failed to render avatar")]
    Render(#[source] anyhow::Error),

    /// Upload or delete against the remote profile service failed.
    #[error("publish step \"{operation}\" failed")]
    Publish {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl AvatarError {
    /// True for failures the polling loop retries on its short cadence.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AvatarError::WeatherUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn only_weather_unavailable_is_recoverable() {
        let weather = AvatarError::WeatherUnavailable {
            attempts: 3,
            source: anyhow!("connection reset"),
        };
        let render = AvatarError::Render(anyhow!("missing icon"));
        let publish = AvatarError::Publish {
            operation: "upload",
            source: anyhow!("503"),
        };

        assert!(weather.is_recoverable());
        assert!(!render.is_recoverable());
        assert!(!publish.is_recoverable());
    }

    #[test]
    fn messages_do_not_leak_sources_without_chain() {
        let err = AvatarError::WeatherUnavailable {
            attempts: 3,
            source: anyhow!("appid rejected"),
        };

        assert_eq!(err.to_string(), "weather data unavailable after 3 attempts");
    }
}
