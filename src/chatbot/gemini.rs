//! Gemini API client for text and text+image prompts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::transport::{BoxError, RoundTrip};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Anything that can turn a prompt into a single text answer.
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn handle_text_prompt(&self, prompt: &str) -> Result<String, AiError>;

    /// `image` must have an extension naming a supported image type.
    async fn handle_text_and_image_prompt(&self, image: &Path, prompt: &str) -> Result<String, AiError>;
}

/// A failure together with the operation that produced it.
#[derive(Debug, thiserror::Error)]
#[error("{op}: {kind}")]
pub struct AiError {
    pub op: &'static str,
    #[source]
    pub kind: AiErrorKind,
}

impl AiError {
    fn new(op: &'static str, kind: impl Into<AiErrorKind>) -> Self {
        Self { op, kind: kind.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AiErrorKind {
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("unsupported image format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("failed to read image '{}': {source}", .path.display())]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("transport: {0}")]
    Transport(#[source] BoxError),
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("gemini returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("no candidates in response (block reason: {})", .block_reason.as_deref().unwrap_or("none"))]
    NoCandidates { block_reason: Option<String> },
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Position of a text part that could not be written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPosition {
    pub candidate: usize,
    pub part: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("failed to write {} response part(s): {failed:?}", .failed.len())]
    PartialWrite { failed: Vec<PartPosition> },
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: String,
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

// -- request --

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
enum Part {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "inlineData")]
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: &'static str,
        data: String,
    },
}

// -- response --

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub prompt_feedback: Option<PromptFeedback>,
    pub error: Option<ApiError>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
    #[serde(default)]
    pub role: String,
}

/// Only text parts contribute to the answer; inline data and function calls are skipped.
#[derive(Deserialize, Debug, Default)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize, Debug, Default)]
pub struct ApiError {
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
}

pub struct GeminiClient {
    endpoint: Url,
    transport: Arc<dyn RoundTrip>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, transport: Arc<dyn RoundTrip>) -> Result<Self, AiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            config.api_base.trim_end_matches('/'),
            config.model
        );
        let endpoint = Url::parse(&url).map_err(|e| {
            AiError::new(
                "new",
                AiErrorKind::InvalidEndpoint {
                    url: url.clone(),
                    reason: e.to_string(),
                },
            )
        })?;

        Ok(Self { endpoint, transport })
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, AiErrorKind> {
        let request = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
        };
        let body = serde_json::to_vec(&request).map_err(AiErrorKind::Encode)?;

        let mut req = Request::new(Method::POST, self.endpoint.clone());
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(body.into());

        let response = self
            .transport
            .round_trip(req)
            .await
            .map_err(AiErrorKind::Transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(AiErrorKind::Body)?;
        debug!("Gemini response status: {status}");

        if !status.is_success() {
            let message = match serde_json::from_slice::<ErrorEnvelope>(&body) {
                Ok(envelope) => envelope.error.message,
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };
            return Err(AiErrorKind::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        extract_text(&body)
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn handle_text_prompt(&self, prompt: &str) -> Result<String, AiError> {
        const OP: &str = "handle_text_prompt";

        info!("💬 Text prompt ({} chars)", prompt.chars().count());
        self.generate(vec![Part::Text(prompt.to_string())])
            .await
            .map_err(|kind| AiError::new(OP, kind))
    }

    async fn handle_text_and_image_prompt(&self, image: &Path, prompt: &str) -> Result<String, AiError> {
        const OP: &str = "handle_text_and_image_prompt";

        let mime_type = image_mime_type(image)
            .ok_or_else(|| AiError::new(OP, AiErrorKind::UnsupportedFormat(image.to_path_buf())))?;

        let data = tokio::fs::read(image).await.map_err(|source| {
            AiError::new(
                OP,
                AiErrorKind::ReadImage {
                    path: image.to_path_buf(),
                    source,
                },
            )
        })?;
        info!("🖼️ Image prompt ({} bytes, {})", data.len(), mime_type);

        let mut parts = vec![Part::InlineData {
            mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(&data),
        }];
        if !prompt.is_empty() {
            parts.push(Part::Text(prompt.to_string()));
        }

        self.generate(parts).await.map_err(|kind| AiError::new(OP, kind))
    }
}

/// MIME type for an image path, from its extension.
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// Decode a `generateContent` body and concatenate its text parts.
pub fn extract_text(body: &[u8]) -> Result<String, AiErrorKind> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(AiErrorKind::Decode)?;
    let response: GenerateResponse = serde_json::from_value(value).map_err(AiErrorKind::Decode)?;

    // The error envelope can arrive with a 2xx status too.
    if let Some(error) = response.error {
        return Err(AiErrorKind::Upstream {
            status: error.code.unwrap_or(200),
            message: error.message,
        });
    }

    let Some(candidates) = response.candidates else {
        return Err(AiErrorKind::NoCandidates {
            block_reason: response.prompt_feedback.and_then(|f| f.block_reason),
        });
    };

    let mut answer = String::new();
    write_text(&candidates, &mut answer)?;
    Ok(answer)
}

/// Write every text part into `out`, candidate by candidate, with no separator.
///
/// Candidates without content are skipped. A failed write does not stop the
/// remaining parts; all failures are reported together afterwards.
pub fn write_text<W: fmt::Write>(candidates: &[Candidate], out: &mut W) -> Result<(), ExtractError> {
    let mut failed = Vec::new();

    for (ci, candidate) in candidates.iter().enumerate() {
        let Some(content) = &candidate.content else {
            continue;
        };
        for (pi, part) in content.parts.iter().enumerate() {
            let Some(text) = &part.text else {
                continue;
            };
            if out.write_str(text).is_err() {
                failed.push(PartPosition {
                    candidate: ci,
                    part: pi,
                });
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(ExtractError::PartialWrite { failed })
    }
}
