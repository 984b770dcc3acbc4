//! Client for the Gemini `generateContent` REST endpoint.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Production base URL of the Gemini API.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// Default request timeout. Video understanding is slow.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One multimodal generation request: a video reference plus an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub video_uri: String,
    pub prompt: String,
}

/// Why a generation call failed.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The API answered with an error status.
    #[error("{code} {status}. {message}")]
    Api {
        code: u16,
        status: String,
        message: String,
    },
    #[error("request to Gemini failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode Gemini response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
}

impl GenerateError {
    /// Whether the failure came back from the API itself, as opposed to never reaching it or
    /// not being understood. Only those are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerateError::Api { .. })
    }
}

/// Something that can turn a [`GenerateRequest`] into text.
#[async_trait::async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Runs one generation.
    ///
    /// Returns `Ok(None)` when the model answered without any text.
    async fn generate(&self, request: &GenerateRequest) -> Result<Option<String>, GenerateError>;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    File { file_data: FileData<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct FileData<'a> {
    mime_type: &'static str,
    file_uri: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
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
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() { None } else { Some(text) }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Builds a client. A missing key is only reported when a request is attempted.
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> eyre::Result<Self> {
        use eyre::Context;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build Gemini HTTP client")?;
        Ok(Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl ContentGenerator for GeminiClient {
    #[tracing::instrument(skip(self, request), fields(model = %self.model, video_uri = %request.video_uri))]
    async fn generate(&self, request: &GenerateRequest) -> Result<Option<String>, GenerateError> {
        let api_key = self.api_key.as_deref().ok_or(GenerateError::MissingApiKey)?;

        let body = GenerateContentRequest {
            contents: [RequestContent {
                role: "user",
                parts: [
                    RequestPart::File {
                        file_data: FileData {
                            mime_type: "video/mp4",
                            file_uri: &request.video_uri,
                        },
                    },
                    RequestPart::Text {
                        text: &request.prompt,
                    },
                ],
            }],
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let err = api_error(status, &bytes);
            tracing::debug!(%err, "Gemini returned an error status");
            return Err(err);
        }

        let decoded: GenerateContentResponse = serde_json::from_slice(&bytes)?;
        Ok(decoded.text())
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> GenerateError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => GenerateError::Api {
            code: status.as_u16(),
            status: if error.status.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                error.status
            },
            message: error.message,
        },
        Err(_) => GenerateError::Api {
            code: status.as_u16(),
            status: status.canonical_reason().unwrap_or_default().to_string(),
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_body_shape() {
        let body = GenerateContentRequest {
            contents: [RequestContent {
                role: "user",
                parts: [
                    RequestPart::File {
                        file_data: FileData {
                            mime_type: "video/mp4",
                            file_uri: "https://www.youtube.com/watch?v=abc",
                        },
                    },
                    RequestPart::Text { text: "write" },
                ],
            }],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "file_data": { "mime_type": "video/mp4", "file_uri": "https://www.youtube.com/watch?v=abc" } },
                        { "text": "write" }
                    ]
                }]
            })
        );
    }

    #[test]
    fn text_joins_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "<h1>A</h1>" }, { "text": "<p>B</p>" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("<h1>A</h1><p>B</p>"));
    }

    #[test]
    fn blocked_prompt_has_no_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn error_status_is_parsed_from_envelope() {
        let err = api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            br#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#,
        );
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "503 UNAVAILABLE. The model is overloaded.");
    }

    #[test]
    fn unparseable_error_body_is_kept_verbatim() {
        let err = api_error(StatusCode::BAD_GATEWAY, b"upstream hiccup");
        assert_eq!(err.to_string(), "502 Bad Gateway. upstream hiccup");
    }

    #[test]
    fn only_api_errors_are_retryable() {
        assert!(!GenerateError::MissingApiKey.is_retryable());
        let decode = serde_json::from_str::<GenerateContentResponse>("nope").unwrap_err();
        assert!(!GenerateError::from(decode).is_retryable());
    }
}
