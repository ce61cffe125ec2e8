//! Text-to-image driver (`z-image-turbo`).
//!
//! Unlike the video modes this endpoint is synchronous: the response already
//! carries the finished outputs as `{data: [{url? | b64_json?}, ...]}`, so
//! there is no task to poll.
use serde_json::{json, Value};

use crate::artifact::{materialize, timestamp, Artifact, ArtifactSource};
use crate::error::{AppError, AppResult};
use crate::gateway::GatewayClient;
use crate::workflow::params::TextToImageParams;

pub const MODEL: &str = "z-image-turbo";

#[derive(Debug)]
pub struct TextToImageOutcome {
    pub artifacts: Vec<Artifact>,
    /// Data items that carried neither a URL nor an inline payload.
    pub skipped: usize,
    pub raw: Value,
}

pub async fn run(
    client: &GatewayClient,
    params: &TextToImageParams,
) -> AppResult<TextToImageOutcome> {
    let payload = json!({
        "prompt": params.prompt,
        "model": MODEL,
        "n": params.n,
        "size": params.size(),
    });

    let response = client.generate_images(&payload).await?;
    if response.data.is_empty() {
        // HTTP success with an empty data array is still a failed creation.
        return Err(AppError::TaskCreation {
            status: 200,
            body: response.raw,
        });
    }

    let ts = timestamp();
    let mut artifacts = Vec::new();
    let mut skipped = 0;
    for (i, item) in response.data.iter().enumerate() {
        let source = if let Some(url) = &item.url {
            ArtifactSource::Url(url.clone())
        } else if let Some(b64) = &item.b64_json {
            ArtifactSource::Inline(b64.clone())
        } else {
            tracing::warn!("Image {} has neither url nor b64_json, skipping", i + 1);
            skipped += 1;
            continue;
        };
        let file_name = format!("z-image-{}-{}.png", ts, i + 1);
        artifacts.push(materialize(client, source, file_name).await?);
    }

    Ok(TextToImageOutcome {
        artifacts,
        skipped,
        raw: response.raw,
    })
}
