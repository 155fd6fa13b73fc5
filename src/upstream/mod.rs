//! Client side of the upstream chat-completions API.

pub mod openai;
pub mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::Result;
use crate::types::{StreamChunk, UpstreamRequest};

pub use openai::OpenAiCompatClient;

/// A lazy, finite, non-restartable sequence of reply fragments.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// A string wrapper that redacts its value in Debug and Display output.
/// Prevents API keys from leaking into logs and error messages.
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Access the secret value (only for HTTP headers)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A complete, non-streamed upstream reply, kept byte for byte.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub content_type: String,
    pub body: Bytes,
}

/// Anything that can answer a chat-completions request.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Await the whole reply.
    async fn complete(&self, request: &UpstreamRequest) -> Result<UpstreamReply>;

    /// Open a streamed reply. Errors before the first byte (connect
    /// failures, non-2xx status) are returned here; later failures arrive
    /// as `Err` items on the stream.
    async fn complete_streaming(&self, request: &UpstreamRequest) -> Result<ChunkStream>;
}
