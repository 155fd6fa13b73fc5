//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use futures::Stream;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::sse::{chunk_stream, EndOfStream, SseEvent};
use super::{ChunkStream, CompletionClient, SecretString, UpstreamReply};
use crate::error::{PlaygroundError, Result};
use crate::types::{StreamChunk, UpstreamRequest};

/// Normalize base URL by stripping trailing slashes
fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatClient {
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(base_url: &str, api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: normalize_base_url(base_url),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, request: &UpstreamRequest) -> Result<reqwest::Response> {
        let url = self.endpoint();
        tracing::debug!(
            url = %url,
            model = %request.model,
            messages = request.messages.len(),
            stream = request.stream,
            "Sending upstream request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Upstream rejected request");
            return Err(PlaygroundError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, request: &UpstreamRequest) -> Result<UpstreamReply> {
        let response = self.send(request).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let body = response.bytes().await?;

        // The body is returned untouched, but only if it is a real reply.
        serde_json::from_slice::<serde_json::Value>(&body)
            .map_err(|e| PlaygroundError::MalformedResponse(e.to_string()))?;

        Ok(UpstreamReply { content_type, body })
    }

    async fn complete_streaming(&self, request: &UpstreamRequest) -> Result<ChunkStream> {
        let response = self.send(request).await?;
        Ok(delta_stream(response.bytes_stream()))
    }
}

/// Turn an upstream SSE byte stream into reply fragments.
///
/// Yields `Done` on `[DONE]` or at end of body, and stops after the first
/// error. Dropping the returned stream drops `bytes`, which closes the
/// upstream connection.
pub fn delta_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<PlaygroundError> + Send + 'static,
{
    chunk_stream(bytes, parse_event, EndOfStream::Done)
}

/// Map one upstream event to a fragment. `Ok(None)` means the event
/// carries no text (role announcements, usage reports, finish reasons).
fn parse_event(event: &SseEvent) -> Result<Option<StreamChunk>> {
    if event.is_done() {
        return Ok(Some(StreamChunk::Done));
    }

    let chunk: OpenAiStreamChunk = serde_json::from_str(&event.data)
        .map_err(|e| PlaygroundError::MalformedResponse(format!("bad stream event: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(PlaygroundError::UpstreamStream(error.to_string()));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty())
        .map(StreamChunk::Delta))
}

// OpenAI streaming event types
#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: Option<OpenAiDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}
