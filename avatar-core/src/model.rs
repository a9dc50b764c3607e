use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Validated weather telemetry for one cycle. Immutable once built; the
/// pipeline passes it by reference, nothing keeps a "last known" copy.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// Icon key from the provider, e.g. "01d" or "04n". Never empty.
    pub condition_code: String,
    pub temperature_celsius: f64,
    /// Clamped to 0-100 at the provider boundary.
    pub humidity_percent: u8,
    pub wind_speed_mps: f64,
    pub retrieved_at: DateTime<Utc>,
}

/// Which render path produced the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Video,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Video => "video",
        }
    }
}

/// The rendered output of one cycle, owned by the renderer and handed to
/// the publisher by path. Overwritten on the next cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_kind_maps_to_upload_mode() {
        assert_eq!(ArtifactKind::Image.as_str(), "image");
        assert_eq!(ArtifactKind::Video.as_str(), "video");
    }
}
