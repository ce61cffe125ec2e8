//! Turns task outputs into locally saved binaries.
//!
//! A source is either a remote URL (fetched through the gateway, optionally
//! via the `/dl` relay) or an inline base64 payload decoded with no network
//! call. Filenames carry a `YYYYMMDD_HHMMSS` timestamp so repeated runs do not
//! collide.
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::Local;

use crate::error::{AppError, AppResult};
use crate::gateway::GatewayClient;

/// Where an artifact's bytes come from.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    /// Absolute `http(s)://` URL reported by the upstream task.
    Url(String),
    /// Base64-encoded payload embedded in the response.
    Inline(String),
}

/// A materialized binary output, held in memory until saved or bundled.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Local-time timestamp used in generated filenames, `YYYYMMDD_HHMMSS`.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn timestamped_name(stem: &str, ext: &str) -> String {
    format!("{}-{}.{}", stem, timestamp(), ext)
}

/// Resolve a source into an [`Artifact`] with the given file name.
pub async fn materialize(
    client: &GatewayClient,
    source: ArtifactSource,
    file_name: String,
) -> AppResult<Artifact> {
    let bytes = match source {
        ArtifactSource::Url(url) => {
            tracing::info!("Fetching artifact from {}", url);
            client.fetch_artifact(&url, None).await?.to_vec()
        }
        ArtifactSource::Inline(b64) => base64::engine::general_purpose::STANDARD
            .decode(b64.as_bytes())
            .map_err(|e| AppError::Validation(format!("invalid base64 image payload: {}", e)))?,
    };
    Ok(Artifact { file_name, bytes })
}

/// Write an artifact into `dir`, creating the directory if needed.
pub async fn save(artifact: &Artifact, dir: &Path) -> AppResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&artifact.file_name);
    tokio::fs::write(&path, &artifact.bytes).await?;
    tracing::info!("Saved {} ({} bytes)", path.display(), artifact.bytes.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_has_fixed_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(ts.as_bytes()[8], b'_');
        assert!(ts.chars().filter(|c| *c == '_').count() == 1);
        assert!(ts.replace('_', "").chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn timestamped_name_joins_stem_and_extension() {
        let name = timestamped_name("z-image", "png");
        assert!(name.starts_with("z-image-"));
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    async fn inline_source_decodes_without_network() {
        let client = GatewayClient::new("http://127.0.0.1:1".to_string(), "k".to_string());
        let b64 = base64::engine::general_purpose::STANDARD.encode(b"png-bytes");
        let artifact = materialize(&client, ArtifactSource::Inline(b64), "a.png".to_string())
            .await
            .unwrap();
        assert_eq!(artifact.bytes, b"png-bytes");
        assert_eq!(artifact.file_name, "a.png");
    }

    #[tokio::test]
    async fn inline_source_rejects_bad_base64() {
        let client = GatewayClient::new("http://127.0.0.1:1".to_string(), "k".to_string());
        let result = materialize(
            &client,
            ArtifactSource::Inline("!!not-base64!!".to_string()),
            "a.png".to_string(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("outputs").join("nested");
        let artifact = Artifact {
            file_name: "out.bin".to_string(),
            bytes: vec![1, 2, 3],
        };
        let path = save(&artifact, &nested).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), vec![1, 2, 3]);
    }
}
