//! Incremental `text/event-stream` decoder.
//!
//! Network reads split events at arbitrary byte offsets, including in the
//! middle of a multi-byte character. The decoder buffers raw bytes and only
//! decodes complete lines, so every event it returns is whole.

use futures::{Stream, StreamExt};

use super::ChunkStream;
use crate::error::{PlaygroundError, Result};
use crate::types::StreamChunk;

/// The standard SSE termination marker used by OpenAI-compatible APIs.
pub const SSE_DONE: &str = "[DONE]";

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if any.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

impl SseEvent {
    pub fn is_done(&self) -> bool {
        self.data.trim() == SSE_DONE
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event whose blank-line terminator never arrived.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).into_owned();
            let line = line.trim_end_matches('\r');
            if let Some(event) = self.process_line(line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id and retry carry nothing the relay needs
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data_lines.is_empty() {
            self.event = None;
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(SseEvent {
            event: self.event.take(),
            data,
        })
    }
}

/// What a stream that closes without `[DONE]` means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfStream {
    /// Treat end of body as a normal end of reply.
    Done,
    /// Treat end of body as a truncated reply.
    Truncated,
}

/// Decode an SSE byte stream into reply fragments using `parse` per event.
///
/// `parse` returns `Ok(None)` for events without text. The stream ends
/// after the first `Done` or the first error; nothing is yielded after
/// either.
pub fn chunk_stream<S, B, E, F>(bytes: S, parse: F, at_end: EndOfStream) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<PlaygroundError> + Send + 'static,
    F: Fn(&SseEvent) -> Result<Option<StreamChunk>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::new();
        let mut finished = false;

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e.into());
                    finished = true;
                    break 'read;
                }
            };
            for event in decoder.push(chunk.as_ref()) {
                match parse(&event) {
                    Ok(Some(StreamChunk::Done)) => {
                        yield Ok(StreamChunk::Done);
                        finished = true;
                        break 'read;
                    }
                    Ok(Some(delta)) => yield Ok(delta),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        finished = true;
                        break 'read;
                    }
                }
            }
        }

        if !finished {
            let tail = decoder.finish().map(|event| parse(&event));
            match tail {
                Some(Err(e)) => yield Err(e),
                Some(Ok(Some(StreamChunk::Done))) => yield Ok(StreamChunk::Done),
                tail => {
                    if let Some(Ok(Some(delta))) = tail {
                        yield Ok(delta);
                    }
                    match at_end {
                        EndOfStream::Done => {
                            tracing::debug!("Stream closed without [DONE]");
                            yield Ok(StreamChunk::Done);
                        }
                        EndOfStream::Truncated => {
                            yield Err(PlaygroundError::UpstreamStream(
                                "stream ended before [DONE]".to_string(),
                            ));
                        }
                    }
                }
            }
        }
    })
}
