//! Image captioning fallback
//!
//! Asks an Ollama-compatible vision model to describe an image directly in
//! the target language. Used only when no OCR text survives reconstruction.

use base64::Engine;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::CaptionProvider;
use crate::config::CaptionSettings;

/// Errors from the captioning service
#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("captioning is disabled")]
    Disabled,

    #[error("empty image")]
    EmptyImage,

    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

/// Captioning client for the Ollama `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaCaptioner {
    base_url: String,
    model: String,
    language: String,
    timeout: Duration,
}

impl OllamaCaptioner {
    pub fn new(base_url: &str, model: &str, language: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            language: language.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_settings(settings: &CaptionSettings) -> Self {
        Self::new(&settings.base_url, &settings.model, &settings.language)
            .with_timeout(Duration::from_secs(settings.timeout_secs))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn prompt(&self) -> String {
        format!(
            "Describe this image in one short sentence. Answer only in {}, with no other text.",
            self.language
        )
    }

    fn request_body(&self, image: &[u8]) -> serde_json::Value {
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(image);
        serde_json::json!({
            "model": self.model,
            "prompt": self.prompt(),
            "images": [image_base64],
            "stream": false
        })
    }

    async fn describe_async(&self, image: &[u8]) -> Result<String, CaptionError> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let response = client
            .post(self.endpoint())
            .json(&self.request_body(image))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value = response.json().await?;
        parse_caption(&payload)
    }
}

impl CaptionProvider for OllamaCaptioner {
    fn name(&self) -> &str {
        "ollama"
    }

    fn describe(&self, image: &[u8]) -> Result<String, CaptionError> {
        if image.is_empty() {
            return Err(CaptionError::EmptyImage);
        }

        info!("Requesting image description from {} ({})", self.endpoint(), self.model);

        // Private runtime so callers stay synchronous
        let rt = Runtime::new()?;
        let caption = rt.block_on(self.describe_async(image))?;

        debug!("Caption: {} chars", caption.chars().count());
        Ok(caption)
    }
}

/// Extract the generated text from an `/api/generate` response
fn parse_caption(payload: &serde_json::Value) -> Result<String, CaptionError> {
    let text = payload["response"]
        .as_str()
        .ok_or_else(|| CaptionError::InvalidResponse("missing `response` field".to_string()))?
        .trim();

    if text.is_empty() {
        return Err(CaptionError::InvalidResponse("empty description".to_string()));
    }

    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = CaptionSettings {
            base_url: "http://vision.local:8080/".to_string(),
            model: "bakllava".to_string(),
            language: "Persian".to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        let captioner = OllamaCaptioner::from_settings(&settings);

        assert_eq!(captioner.endpoint(), "http://vision.local:8080/api/generate");
        assert_eq!(captioner.timeout, Duration::from_secs(5));
        assert!(captioner.prompt().contains("Persian"));
    }

    #[test]
    fn test_request_body_encodes_image() {
        let captioner = OllamaCaptioner::new("http://localhost:11434", "llava", "Arabic");
        let body = captioner.request_body(b"abc");

        assert_eq!(body["model"], "llava");
        assert_eq!(body["images"][0], "YWJj");
        assert_eq!(body["stream"], false);
        assert!(body["prompt"].as_str().unwrap().contains("Arabic"));
    }

    #[test]
    fn test_parse_caption() {
        let payload = serde_json::json!({ "response": "  قطة على طاولة \n", "done": true });
        assert_eq!(parse_caption(&payload).unwrap(), "قطة على طاولة");
    }

    #[test]
    fn test_parse_caption_rejects_missing_or_empty() {
        let payload = serde_json::json!({ "error": "model not found" });
        assert!(matches!(parse_caption(&payload), Err(CaptionError::InvalidResponse(_))));

        let payload = serde_json::json!({ "response": "   " });
        assert!(matches!(parse_caption(&payload), Err(CaptionError::InvalidResponse(_))));
    }

    #[test]
    fn test_empty_image_rejected_before_request() {
        let captioner = OllamaCaptioner::new("http://127.0.0.1:9", "llava", "Arabic");
        assert!(matches!(captioner.describe(&[]), Err(CaptionError::EmptyImage)));
    }

    #[test]
    fn test_unreachable_service_is_request_error() {
        // Reserve a free local port, then close it so the connection is refused
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let captioner = OllamaCaptioner::new(&format!("http://127.0.0.1:{}", port), "llava", "Arabic")
            .with_timeout(Duration::from_secs(2));
        assert!(matches!(captioner.describe(b"png"), Err(CaptionError::Request(_))));
    }
}
