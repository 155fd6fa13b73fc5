//! Client session adapter
//!
//! Owns one conversation and its request lifecycle:
//!
//! ```text
//! Idle → Submitting → (Streaming*) → Idle
//!                   ↘ (Streaming*) → Errored → Idle
//! ```
//!
//! A presentation layer calls [`SessionAdapter::submit`] and renders from
//! the [`SessionEvent`]s it receives through [`SessionAdapter::subscribe`].
//! While a request is in flight every further submit is refused with
//! [`SessionError::Busy`], so one session never has two requests open.

pub mod transport;

use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::error::PlaygroundError;
use crate::types::{GenerationParameters, Message, RelayRequest, Role, StreamChunk};

pub use transport::{HttpRelayTransport, RelayReply, RelayTransport};

const EVENT_CAPACITY: usize = 256;

/// Where the session is in its request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Submitting,
    Streaming,
    Errored,
}

impl SessionState {
    /// True while a request is in flight and submissions are refused.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Submitting | Self::Streaming)
    }
}

/// Change notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A fragment appended to the in-progress assistant message.
    Delta(String),
    /// A message added to the conversation history.
    Committed(Message),
}

/// Why the last request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The relay rejected the request (HTTP 400).
    ClientInput,
    /// The relay or the upstream API failed.
    Upstream,
    /// The relay could not be reached.
    Transport,
    /// The request was cancelled locally.
    Cancelled,
}

/// The error indicator shown in place of a missing assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Text streamed before the failure. Never committed to history.
    pub partial: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("A request is already in progress")]
    Busy,

    #[error("Message is empty")]
    EmptyInput,

    #[error("Nothing to retry: the last message is not from the user")]
    NothingToRetry,

    #[error("Request cancelled")]
    Cancelled,

    #[error(transparent)]
    Relay(#[from] PlaygroundError),
}

impl SessionError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Cancelled => FailureKind::Cancelled,
            Self::Relay(PlaygroundError::ClientInput(_)) => FailureKind::ClientInput,
            Self::Relay(PlaygroundError::Transport(_)) => FailureKind::Transport,
            _ => FailureKind::Upstream,
        }
    }
}

#[derive(Debug)]
struct Inner {
    history: Vec<Message>,
    in_progress: Option<String>,
    state: SessionState,
    last_failure: Option<SessionFailure>,
    cancel: Option<CancellationToken>,
}

/// One conversation with the relay.
pub struct SessionAdapter {
    transport: Arc<dyn RelayTransport>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionAdapter {
    pub fn new(transport: Arc<dyn RelayTransport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            transport,
            inner: Mutex::new(Inner {
                history: Vec::new(),
                in_progress: None,
                state: SessionState::Idle,
                last_failure: None,
                cancel: None,
            }),
            events,
        }
    }

    /// Seed the conversation, e.g. with a greeting from the assistant.
    pub fn with_history(self, messages: Vec<Message>) -> Self {
        self.lock().history = messages;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    /// Committed messages, in turn order.
    pub fn history(&self) -> Vec<Message> {
        self.lock().history.clone()
    }

    /// Text of the assistant reply currently streaming, if any.
    pub fn in_progress(&self) -> Option<String> {
        self.lock().in_progress.clone()
    }

    /// The failure of the most recent request, cleared by the next submit.
    pub fn last_failure(&self) -> Option<SessionFailure> {
        self.lock().last_failure.clone()
    }

    /// Cancel the request in flight. Returns false when there is none.
    pub fn cancel(&self) -> bool {
        match self.lock().cancel.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Send `text` as the next user turn and wait for the reply.
    ///
    /// `params` is snapshotted into the request; later changes by the caller
    /// do not touch the request in flight.
    pub async fn submit(
        &self,
        text: &str,
        params: GenerationParameters,
    ) -> Result<Message, SessionError> {
        let (request, token, user) = {
            let mut inner = self.lock();
            if inner.state.is_loading() {
                return Err(SessionError::Busy);
            }
            let text = text.trim();
            if text.is_empty() {
                return Err(SessionError::EmptyInput);
            }
            let user = Message::user(text);
            inner.history.push(user.clone());
            let (request, token) = self.begin(&mut inner, &params);
            (request, token, user)
        };
        self.emit(SessionEvent::Committed(user));
        self.emit(SessionEvent::StateChanged(SessionState::Submitting));

        self.run(request, token).await
    }

    /// Re-send the conversation after a failed turn, without a new user
    /// message.
    pub async fn retry(&self, params: GenerationParameters) -> Result<Message, SessionError> {
        let (request, token) = {
            let mut inner = self.lock();
            if inner.state.is_loading() {
                return Err(SessionError::Busy);
            }
            if inner.history.last().map(|m| m.role) != Some(Role::User) {
                return Err(SessionError::NothingToRetry);
            }
            self.begin(&mut inner, &params)
        };
        self.emit(SessionEvent::StateChanged(SessionState::Submitting));

        self.run(request, token).await
    }

    fn begin(
        &self,
        inner: &mut Inner,
        params: &GenerationParameters,
    ) -> (RelayRequest, CancellationToken) {
        let token = CancellationToken::new();
        inner.state = SessionState::Submitting;
        inner.last_failure = None;
        inner.in_progress = None;
        inner.cancel = Some(token.clone());
        (params.to_request(inner.history.clone()), token)
    }

    async fn run(
        &self,
        request: RelayRequest,
        token: CancellationToken,
    ) -> Result<Message, SessionError> {
        tracing::debug!(
            messages = request.messages.len(),
            stream = request.stream,
            "Submitting conversation"
        );

        // Settles the turn as cancelled if this future is dropped first.
        let guard = TurnGuard::new(self);

        // Dropping the exchange on cancel drops the relay stream, which
        // closes the connection and lets the relay cancel upstream.
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(SessionError::Cancelled),
            outcome = self.exchange(request) => outcome,
        };
        guard.disarm();

        match outcome {
            Ok(message) => {
                {
                    let mut inner = self.lock();
                    inner.history.push(message.clone());
                    inner.in_progress = None;
                    inner.cancel = None;
                    inner.state = SessionState::Idle;
                }
                self.emit(SessionEvent::Committed(message.clone()));
                self.emit(SessionEvent::StateChanged(SessionState::Idle));
                Ok(message)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn exchange(&self, request: RelayRequest) -> Result<Message, SessionError> {
        match self.transport.send(request).await? {
            RelayReply::Complete(content) => Ok(Message::assistant(content)),
            RelayReply::Stream(mut chunks) => {
                self.set_streaming();
                loop {
                    match chunks.next().await {
                        Some(Ok(StreamChunk::Delta(text))) => self.append(text),
                        Some(Ok(StreamChunk::Done)) => break,
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(PlaygroundError::UpstreamStream(
                                "stream ended before completion".to_string(),
                            )
                            .into())
                        }
                    }
                }
                let content = self.lock().in_progress.take().unwrap_or_default();
                Ok(Message::assistant(content))
            }
        }
    }

    fn set_streaming(&self) {
        {
            let mut inner = self.lock();
            inner.state = SessionState::Streaming;
            inner.in_progress = Some(String::new());
        }
        self.emit(SessionEvent::StateChanged(SessionState::Streaming));
    }

    fn append(&self, text: String) {
        self.lock()
            .in_progress
            .get_or_insert_with(String::new)
            .push_str(&text);
        self.emit(SessionEvent::Delta(text));
    }

    fn fail(&self, error: &SessionError) {
        let failure = SessionFailure {
            kind: error.failure_kind(),
            message: error.to_string(),
            partial: None,
        };
        tracing::warn!(kind = ?failure.kind, error = %failure.message, "Session request failed");

        {
            let mut inner = self.lock();
            let partial = inner.in_progress.take().filter(|p| !p.is_empty());
            inner.last_failure = Some(SessionFailure { partial, ..failure });
            inner.cancel = None;
            inner.state = SessionState::Errored;
        }
        self.emit(SessionEvent::StateChanged(SessionState::Errored));

        self.lock().state = SessionState::Idle;
        self.emit(SessionEvent::StateChanged(SessionState::Idle));
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner holds plain data; a panic elsewhere cannot leave it torn.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Owns an open turn. Dropped while armed, it records the turn as
/// cancelled so the session never stays loading.
struct TurnGuard<'a> {
    session: &'a SessionAdapter,
    armed: bool,
}

impl<'a> TurnGuard<'a> {
    fn new(session: &'a SessionAdapter) -> Self {
        Self {
            session,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Request future dropped before completion");
            self.session.fail(&SessionError::Cancelled);
        }
    }
}
