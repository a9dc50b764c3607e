use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AvatarError;
use crate::model::Artifact;

/// Remote handle of one published profile photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoHandle {
    pub id: String,
}

/// Contract the pipeline needs from the remote profile service.
/// The service itself is an external collaborator; anything that can
/// upload, enumerate and delete profile photos satisfies the loop.
#[async_trait]
pub trait ProfilePublisher: Send + Sync {
    /// Upload the artifact, selecting image vs video mode from its kind.
    async fn upload(&self, artifact: &Artifact) -> Result<PhotoHandle, AvatarError>;

    /// Handles of every photo currently set on the profile.
    async fn current_photos(&self) -> Result<Vec<PhotoHandle>, AvatarError>;

    async fn delete(&self, handles: &[PhotoHandle]) -> Result<(), AvatarError>;
}

/// One publish step: retire everything currently set, then upload the
/// fresh artifact. A failure here surfaces to the loop — a stale avatar
/// staying visible is not something to swallow.
pub async fn replace_profile(
    publisher: &dyn ProfilePublisher,
    artifact: &Artifact,
) -> Result<PhotoHandle, AvatarError> {
    let current = publisher.current_photos().await?;
    if !current.is_empty() {
        publisher.delete(&current).await?;
    }

    let handle = publisher.upload(artifact).await?;
    info!(
        retired = current.len(),
        remote_id = %handle.id,
        mode = artifact.kind.as_str(),
        "profile photo replaced"
    );

    Ok(handle)
}

/// Publisher backed by a plain HTTP profile service: multipart upload,
/// JSON listing and deletion, bearer-token auth.
#[derive(Debug, Clone)]
pub struct HttpProfilePublisher {
    base_url: String,
    token: String,
    http: Client,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    ids: Vec<&'a str>,
}

impl HttpProfilePublisher {
    pub fn new(base_url: String, token: String, http: Client) -> Self {
        Self { base_url, token, http }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ProfilePublisher for HttpProfilePublisher {
    async fn upload(&self, artifact: &Artifact) -> Result<PhotoHandle, AvatarError> {
        let upload = async {
            let bytes = tokio::fs::read(&artifact.path)
                .await
                .with_context(|| format!("Failed to read artifact {}", artifact.path.display()))?;

            let file_name = artifact
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("avatar")
                .to_string();

            let form = Form::new()
                .text("mode", artifact.kind.as_str())
                .part("file", Part::bytes(bytes).file_name(file_name));

            let res = self
                .http
                .post(self.endpoint("photos"))
                .bearer_auth(&self.token)
                .multipart(form)
                .send()
                .await
                .context("Failed to send upload request")?;

            let status = res.status();
            if !status.is_success() {
                return Err(anyhow!("Upload failed with status {status}"));
            }

            res.json::<PhotoHandle>()
                .await
                .context("Failed to parse upload response")
        };

        upload
            .await
            .map_err(|source| AvatarError::Publish { operation: "upload", source })
    }

    async fn current_photos(&self) -> Result<Vec<PhotoHandle>, AvatarError> {
        let list = async {
            let res = self
                .http
                .get(self.endpoint("photos"))
                .bearer_auth(&self.token)
                .send()
                .await
                .context("Failed to list current photos")?;

            let status = res.status();
            if !status.is_success() {
                return Err(anyhow!("Listing failed with status {status}"));
            }

            res.json::<Vec<PhotoHandle>>()
                .await
                .context("Failed to parse photo list")
        };

        list.await
            .map_err(|source| AvatarError::Publish { operation: "list", source })
    }

    async fn delete(&self, handles: &[PhotoHandle]) -> Result<(), AvatarError> {
        if handles.is_empty() {
            return Ok(());
        }

        let body = DeleteRequest { ids: handles.iter().map(|h| h.id.as_str()).collect() };

        let delete = async {
            let res = self
                .http
                .delete(self.endpoint("photos"))
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .await
                .context("Failed to send delete request")?;

            let status = res.status();
            if !status.is_success() {
                return Err(anyhow!("Delete failed with status {status}"));
            }

            Ok(())
        };

        delete
            .await
            .map_err(|source| AvatarError::Publish { operation: "delete", source })
    }
}
