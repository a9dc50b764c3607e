use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::AvatarError;

/// On-disk cache of weather icons, keyed by condition code.
///
/// Existence of `{cache_dir}/{code}.png` is the sole source of truth;
/// there is no index and no freshness check. Codes are stable identifiers,
/// so a cached icon is never re-fetched.
#[derive(Debug, Clone)]
pub struct IconCache {
    dir: PathBuf,
    url_template: String,
    http: Client,
}

impl IconCache {
    pub fn new(dir: PathBuf, url_template: String, http: Client) -> Self {
        Self { dir, url_template, http }
    }

    /// Deterministic path for a condition code, cached or not.
    pub fn icon_path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{code}.png"))
    }

    /// Return the icon path, downloading it first on a cache miss.
    /// A hit performs no network activity.
    pub async fn ensure(&self, code: &str) -> Result<PathBuf, AvatarError> {
        let path = self.icon_path(code);
        if path.exists() {
            debug!(code, path = %path.display(), "icon cache hit");
            return Ok(path);
        }

        info!(code, "downloading weather icon");
        let url = self.url_template.replace("{}", code);
        let body = self
            .download(&url)
            .await
            .map_err(|source| AvatarError::IconDownload { code: code.to_string(), source })?;

        write_atomic(&path, &body)
            .await
            .map_err(|source| AvatarError::IconDownload { code: code.to_string(), source })?;

        info!(code, bytes = body.len(), "icon cached");
        Ok(path)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("Failed to send icon request")?;

        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("Icon request failed with status {status}"));
        }

        // Buffer the full body before touching the filesystem so a
        // truncated transfer never reaches the target path.
        let body = res.bytes().await.context("Failed to read icon body")?;
        Ok(body.to_vec())
    }
}

/// Write to a temporary sibling and rename over the target, so the target
/// path either holds the complete file or nothing.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("png.part");

    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;

    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move icon into place at {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Port 9 (discard) refuses connections, so any network attempt fails
    // fast instead of hanging the test.
    const DEAD_TEMPLATE: &str = "http://127.0.0.1:9/{}.png";

    fn cache_in(dir: &Path) -> IconCache {
        IconCache::new(dir.to_path_buf(), DEAD_TEMPLATE.to_string(), Client::new())
    }

    #[tokio::test]
    async fn ensure_is_a_pure_hit_when_file_exists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let seeded = dir.path().join("01d.png");
        std::fs::write(&seeded, b"png-bytes").expect("seed icon");

        // The template points at a dead endpoint: success proves no
        // network request was issued.
        let cache = cache_in(dir.path());
        let path = cache.ensure("01d").await.expect("hit must not fetch");

        assert_eq!(path, seeded);
        assert_eq!(std::fs::read(&path).expect("read icon"), b"png-bytes");
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = cache_in(dir.path());

        let err = cache.ensure("02d").await.unwrap_err();

        assert!(matches!(err, AvatarError::IconDownload { ref code, .. } if code == "02d"));
        assert!(!dir.path().join("02d.png").exists());
        assert!(!dir.path().join("02d.png.part").exists());
    }

    #[tokio::test]
    async fn write_atomic_replaces_target_in_one_step() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("10n.png");

        write_atomic(&target, b"fresh").await.expect("atomic write");

        assert_eq!(std::fs::read(&target).expect("read target"), b"fresh");
        assert!(!target.with_extension("png.part").exists());
    }

    #[test]
    fn icon_path_is_deterministic() {
        let cache = IconCache::new(
            PathBuf::from("/var/cache/avatard/icons"),
            DEAD_TEMPLATE.to_string(),
            Client::new(),
        );

        assert_eq!(
            cache.icon_path("04n"),
            PathBuf::from("/var/cache/avatard/icons/04n.png")
        );
    }
}
