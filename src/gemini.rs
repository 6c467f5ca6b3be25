//! Gemini `generateContent` client implementing [`Generator`].

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::generator::Generator;

/// Default image-capable model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Default API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection settings for the Gemini API.
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Model name, e.g. `gemini-2.0-flash-exp`.
    pub model: String,
    /// Base URL up to and including the API version.
    pub endpoint: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Config with default model, endpoint and timeout.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 120,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    Image {
        #[serde(rename = "inlineData")]
        inline_data: RequestBlob<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBlob<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 2],
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<ResponseBlob>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlob {
    data: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Build the JSON request body: prompt text first, then the inline image.
fn request_body(image: &[u8], mime_type: &str, prompt: &str) -> Result<Vec<u8>> {
    let request = GenerateRequest {
        contents: [Content {
            parts: [
                RequestPart::Text { text: prompt },
                RequestPart::Image {
                    inline_data: RequestBlob {
                        mime_type,
                        data: general_purpose::STANDARD.encode(image),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_modalities: ["TEXT", "IMAGE"],
        },
    };
    serde_json::to_vec(&request).map_err(|e| Error::Http(format!("cannot encode request: {e}")))
}

/// Pull the first inline image out of the first candidate of a response body.
fn extract_image(name: &str, body: &[u8]) -> Result<Vec<u8>> {
    let response: GenerateResponse = serde_json::from_slice(body).map_err(|e| Error::Generation {
        name: name.to_string(),
        message: format!("malformed response: {e}"),
    })?;

    let data = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
        .map(|blob| blob.data)
        .filter(|data| !data.is_empty())
        .ok_or_else(|| Error::NoImageReturned {
            name: name.to_string(),
        })?;

    general_purpose::STANDARD
        .decode(data.as_bytes())
        .map_err(|e| Error::Generation {
            name: name.to_string(),
            message: format!("invalid base64 image data: {e}"),
        })
}

/// [`Generator`] backed by the Gemini REST API.
pub struct GeminiGenerator {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiGenerator {
    /// Create a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn map_reqwest_error(&self, name: &str, e: &reqwest::Error) -> Error {
        let message = if e.is_timeout() {
            format!("request timed out after {}s", self.config.timeout_secs)
        } else if e.is_connect() {
            format!("cannot connect: {e}")
        } else {
            format!("request failed: {e}")
        };
        Error::Generation {
            name: name.to_string(),
            message,
        }
    }
}

impl Generator for GeminiGenerator {
    async fn generate(
        &self,
        name: &str,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<Vec<u8>> {
        let body = request_body(image, mime_type, prompt)?;
        log::debug!(
            "sending {name} ({} bytes, {mime_type}) to {}",
            image.len(),
            self.config.model
        );

        let response = self
            .http_client
            .post(self.config.url())
            .header("x-goog-api-key", &self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(name, &e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest_error(name, &e))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorEnvelope>(&bytes).map_or_else(
                |_| format!("HTTP {status}"),
                |env| format!("HTTP {status}: {}", env.error.message),
            );
            return Err(Error::Generation {
                name: name.to_string(),
                message,
            });
        }

        extract_image(name, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_puts_prompt_before_inline_image() {
        let body = request_body(&[1, 2, 3], "image/png", "erase it").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "erase it");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
        assert_eq!(
            value["generationConfig"]["responseModalities"],
            serde_json::json!(["TEXT", "IMAGE"])
        );
    }

    #[test]
    fn extracts_first_inline_image_part() {
        let body = br#"{"candidates":[{"content":{"parts":[
            {"text":"here you go"},
            {"inlineData":{"mimeType":"image/png","data":"AQID"}},
            {"inlineData":{"mimeType":"image/png","data":"BAUG"}}
        ]}}]}"#;
        assert_eq!(extract_image("a", body).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_image_part_is_an_error() {
        let text_only = br#"{"candidates":[{"content":{"parts":[{"text":"sorry"}]}}]}"#;
        assert!(matches!(
            extract_image("a", text_only),
            Err(Error::NoImageReturned { .. })
        ));
        let no_candidates = br"{}";
        assert!(matches!(
            extract_image("a", no_candidates),
            Err(Error::NoImageReturned { .. })
        ));
    }

    #[test]
    fn malformed_body_is_a_generation_error() {
        assert!(matches!(
            extract_image("a", b"<html>"),
            Err(Error::Generation { .. })
        ));
    }

    #[test]
    fn url_and_debug_output() {
        let mut config = GeminiConfig::new("secret-key");
        config.endpoint = "http://localhost:9/v1beta/".to_string();
        assert_eq!(
            config.url(),
            "http://localhost:9/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}
