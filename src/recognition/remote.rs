use super::{Detection, MatchOutcome, Recognizer, Region};
use crate::recognition::render::encode_jpeg;
use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbImage;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// One face reported by the recognition service
#[derive(Debug, Deserialize)]
struct RemoteFace {
    top: u32,
    right: u32,
    bottom: u32,
    left: u32,
    /// Matched reference (file name or enrolled name)
    #[serde(default, rename = "match")]
    matched: Option<String>,
    /// False when the region produced no encoding
    #[serde(default = "default_encoded")]
    encoded: bool,
}

fn default_encoded() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    faces: Vec<RemoteFace>,
}

/// Recognizer backed by an external face-matching service.
///
/// Posts the frame as JPEG to `<base_url>/recognize`.
pub struct HttpRecognizer {
    endpoint: String,
    http_client: Client,
}

impl HttpRecognizer {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            endpoint: format!("{}/recognize", base_url.trim_end_matches('/')),
            http_client,
        })
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn detect_and_identify(&self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let body = encode_jpeg(frame, 90).context("Failed to encode frame for recognition")?;

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(body)
            .send()
            .await
            .context("Failed to send recognize request")?
            .error_for_status()
            .context("Recognition service error")?;

        let parsed: RecognizeResponse = response
            .json()
            .await
            .context("Failed to parse recognize response")?;

        Ok(parsed
            .faces
            .into_iter()
            .map(|face| Detection {
                region: Region {
                    top: face.top,
                    right: face.right,
                    bottom: face.bottom,
                    left: face.left,
                },
                outcome: match (face.encoded, face.matched) {
                    (false, _) => MatchOutcome::NoEncoding,
                    (true, Some(reference)) => MatchOutcome::Matched(reference),
                    (true, None) => MatchOutcome::Unmatched,
                },
            })
            .collect())
    }
}
