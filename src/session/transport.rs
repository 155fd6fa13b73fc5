//! How a session reaches the relay endpoint.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::api::sse::{DeltaPayload, ErrorPayload, SSE_ERROR_EVENT};
use crate::error::{PlaygroundError, Result};
use crate::types::{RelayRequest, StreamChunk};
use crate::upstream::sse::{chunk_stream, EndOfStream, SseEvent};
use crate::upstream::ChunkStream;

/// The relay's answer to one request.
pub enum RelayReply {
    /// Fragments to apply one by one, ending with `StreamChunk::Done`.
    Stream(ChunkStream),
    /// The whole assistant reply at once.
    Complete(String),
}

impl std::fmt::Debug for RelayReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("RelayReply::Stream(..)"),
            Self::Complete(content) => f.debug_tuple("RelayReply::Complete").field(content).finish(),
        }
    }
}

/// Sends relay requests on behalf of a session.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send(&self, request: RelayRequest) -> Result<RelayReply>;
}

/// Talks to a running relay over HTTP.
pub struct HttpRelayTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpRelayTransport {
    /// `relay_url` is the server root, e.g. `http://127.0.0.1:11436`.
    pub fn new(relay_url: &str) -> Self {
        Self {
            endpoint: format!("{}/api/chat", relay_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn send(&self, request: RelayRequest) -> Result<RelayReply> {
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(PlaygroundError::ClientInput(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlaygroundError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));

        if is_event_stream {
            Ok(RelayReply::Stream(relay_stream(response.bytes_stream())))
        } else {
            let body = response.bytes().await?;
            Ok(RelayReply::Complete(completion_content(&body)?))
        }
    }
}

/// Decode the relay's SSE framing. A missing `[DONE]` is a truncated reply.
pub fn relay_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: futures::Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<PlaygroundError> + Send + 'static,
{
    chunk_stream(bytes, parse_relay_event, EndOfStream::Truncated)
}

fn parse_relay_event(event: &SseEvent) -> Result<Option<StreamChunk>> {
    if event.event.as_deref() == Some(SSE_ERROR_EVENT) {
        let message = serde_json::from_str::<ErrorPayload>(&event.data)
            .map(|p| p.error)
            .unwrap_or_else(|_| event.data.clone());
        return Err(PlaygroundError::UpstreamStream(message));
    }
    if event.is_done() {
        return Ok(Some(StreamChunk::Done));
    }

    let payload: DeltaPayload = serde_json::from_str(&event.data)
        .map_err(|e| PlaygroundError::MalformedResponse(format!("bad relay event: {e}")))?;
    Ok(Some(StreamChunk::Delta(payload.content)))
}

/// Pull the assistant text out of a chat-completions response body.
pub fn completion_content(body: &[u8]) -> Result<String> {
    let response: CompletionBody = serde_json::from_slice(body)
        .map_err(|e| PlaygroundError::MalformedResponse(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| PlaygroundError::MalformedResponse("no choices returned".to_string()))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}
