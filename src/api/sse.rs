use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::types::StreamChunk;
use crate::upstream::sse::SSE_DONE;
use crate::upstream::ChunkStream;

/// SSE event name the relay uses to report a failure after streaming began.
pub const SSE_ERROR_EVENT: &str = "error";

/// Payload of one relayed fragment: `data: {"content":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaPayload {
    pub content: String,
}

/// Payload of the terminal error event: `event: error` / `data: {"error":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// Create an SSE response that relays reply fragments as they arrive.
///
/// Each fragment becomes one `data` event and `[DONE]` closes a complete
/// reply. A failing stream ends with a single `error` event instead and no
/// `[DONE]`.
pub fn sse_response(chunks: ChunkStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(relay_events(chunks)).keep_alive(KeepAlive::default())
}

fn relay_events(mut chunks: ChunkStream) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut fragments = 0usize;
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(StreamChunk::Delta(content)) => {
                    fragments += 1;
                    if let Some(data) = format_sse_data(&DeltaPayload { content }) {
                        yield Ok(Event::default().data(data));
                    }
                }
                Ok(StreamChunk::Done) => {
                    tracing::debug!(fragments, "Relay stream complete");
                    yield Ok(Event::default().data(SSE_DONE));
                    break;
                }
                Err(e) => {
                    tracing::warn!(fragments, error = %e, "Upstream stream failed");
                    let payload = ErrorPayload { error: e.to_string() };
                    if let Some(data) = format_sse_data(&payload) {
                        yield Ok(Event::default().event(SSE_ERROR_EVENT).data(data));
                    }
                    break;
                }
            }
        }
    }
}

/// Format a single SSE data line from a serializable value.
///
/// JSON escapes line breaks, so the result is always a single data line.
pub fn format_sse_data<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value).ok()
}
