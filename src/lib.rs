//! # a3s-playground
//!
//! Streaming chat relay and client session adapter for OpenAI-compatible
//! completion APIs.
//!
//! ## Overview
//!
//! The relay accepts a conversation plus generation parameters at
//! `POST /api/chat`, forwards it to the configured upstream with the server's
//! credential, and answers either with a server-sent event stream of text
//! fragments or with the upstream's complete JSON body.
//!
//! The session adapter is the client half: it owns one conversation, sends
//! it to the relay, applies streamed fragments in order, and refuses new
//! submissions while a request is in flight.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use a3s_playground::{GenerationParameters, HttpRelayTransport, SessionAdapter};
//!
//! # async fn example() -> Result<(), a3s_playground::session::SessionError> {
//! let transport = HttpRelayTransport::new("http://127.0.0.1:11436");
//! let session = SessionAdapter::new(Arc::new(transport));
//!
//! let mut params = GenerationParameters::default();
//! params.extra.online_search = true;
//! params.extra.location = "london".to_string();
//!
//! let reply = session.submit("What's the weather?", params).await?;
//! println!("{}", reply.content);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **CompletionClient** trait: how the relay reaches the upstream
//! - **RelayTransport** trait: how a session reaches the relay
//! - **SseDecoder**: incremental event-stream decoding shared by both sides
//! - **SessionAdapter**: conversation state and request lifecycle

pub mod api;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod dirs;
pub mod error;
pub mod server;
pub mod session;
pub mod types;
pub mod upstream;

// Re-export core types
pub use config::PlaygroundConfig;
pub use error::{PlaygroundError, Result};
pub use session::{
    HttpRelayTransport, RelayReply, RelayTransport, SessionAdapter, SessionError, SessionEvent,
    SessionFailure, SessionState,
};
pub use types::{
    ExtraOptions, GenerationParameters, Message, RelayRequest, Role, StreamChunk, UpstreamRequest,
};
pub use upstream::{CompletionClient, OpenAiCompatClient, SecretString};
