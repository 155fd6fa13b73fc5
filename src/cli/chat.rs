use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::Result;
use crate::session::{HttpRelayTransport, SessionAdapter, SessionError, SessionEvent, SessionState};
use crate::types::{GenerationParameters, Message};

/// First assistant message of every conversation.
pub const GREETING: &str = "Hi! Ask me anything.";

const RETRY_COMMAND: &str = "/retry";

/// Execute the `chat` command: talk to the model through a running relay.
pub async fn execute(relay: &str, prompt: Option<&str>, params: GenerationParameters) -> Result<()> {
    let transport = HttpRelayTransport::new(relay);
    tracing::debug!(endpoint = transport.endpoint(), "Using relay");

    let session = Arc::new(
        SessionAdapter::new(Arc::new(transport)).with_history(vec![Message::assistant(GREETING)]),
    );

    if let Some(prompt) = prompt {
        // Non-interactive: send a single prompt
        run_turn(&session, Turn::Submit(prompt), &params, std::io::stdout()).await;
        return Ok(());
    }

    println!("{GREETING}");
    println!("(type 'exit' to quit, '{RETRY_COMMAND}' to resend after an error, Ctrl+C to cancel a reply)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match line.trim() {
            "" => continue,
            "exit" | "quit" => break,
            RETRY_COMMAND => run_turn(&session, Turn::Retry, &params, std::io::stdout()).await,
            text => run_turn(&session, Turn::Submit(text), &params, std::io::stdout()).await,
        }
    }

    Ok(())
}

enum Turn<'a> {
    Submit(&'a str),
    Retry,
}

/// Run one request, rendering session events to `out` until it settles.
///
/// Ctrl+C while the request is open cancels it instead of exiting.
async fn run_turn<W: Write>(
    session: &Arc<SessionAdapter>,
    turn: Turn<'_>,
    params: &GenerationParameters,
    out: W,
) {
    let mut events = BroadcastStream::new(session.subscribe());
    let mut view = TurnView::new(out);

    let request = async {
        match turn {
            Turn::Submit(text) => session.submit(text, params.clone()).await,
            Turn::Retry => session.retry(params.clone()).await,
        }
    };
    tokio::pin!(request);

    let outcome = loop {
        tokio::select! {
            outcome = &mut request => break outcome,
            Some(event) = events.next() => view.handle(session, event),
            _ = tokio::signal::ctrl_c() => {
                if session.cancel() {
                    tracing::debug!("Cancel requested");
                }
            }
        }
    };

    // Everything the request emitted is already queued.
    while let Some(Some(event)) = events.next().now_or_never() {
        view.handle(session, event);
    }
    view.finish(&outcome);

    if let Err(e) = outcome {
        report(session, &e);
    }
}

fn report(session: &SessionAdapter, error: &SessionError) {
    match error {
        SessionError::Busy | SessionError::EmptyInput | SessionError::NothingToRetry => {
            eprintln!("{error}");
        }
        _ => {
            let failure = session.last_failure();
            if let Some(partial) = failure.as_ref().and_then(|f| f.partial.as_deref()) {
                eprintln!("[partial reply discarded: {} chars]", partial.chars().count());
            }
            eprintln!("Error: {error}");
            eprintln!("Type '{RETRY_COMMAND}' to try again.");
        }
    }
}

/// Terminal rendering of one request.
///
/// Streamed text is printed from the session's in-progress reply rather
/// than from the delta payloads, so events lost to a lagging receiver
/// never leave gaps on screen.
struct TurnView<W: Write> {
    out: W,
    spinner: Option<ProgressBar>,
    streamed: bool,
    /// Bytes of the reply already written to `out`.
    printed: usize,
}

impl<W: Write> TurnView<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            spinner: None,
            streamed: false,
            printed: 0,
        }
    }

    fn handle(
        &mut self,
        session: &SessionAdapter,
        event: std::result::Result<SessionEvent, BroadcastStreamRecvError>,
    ) {
        match event {
            Ok(SessionEvent::StateChanged(SessionState::Submitting)) => self.start_spinner(),
            Ok(SessionEvent::StateChanged(SessionState::Streaming)) => {
                self.clear_spinner();
                self.streamed = true;
            }
            Ok(SessionEvent::StateChanged(_)) | Ok(SessionEvent::Committed(_)) => {}
            Ok(SessionEvent::Delta(_)) => self.catch_up_with(session),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event receiver lagged, resyncing");
                self.catch_up_with(session);
            }
        }
    }

    fn catch_up_with(&mut self, session: &SessionAdapter) {
        if let Some(text) = session.in_progress() {
            self.clear_spinner();
            self.streamed = true;
            self.catch_up(&text);
        }
    }

    /// Print whatever part of `text` is not on screen yet.
    fn catch_up(&mut self, text: &str) {
        if let Some(rest) = text.get(self.printed..) {
            if !rest.is_empty() {
                let _ = write!(self.out, "{rest}");
                let _ = self.out.flush();
                self.printed = text.len();
            }
        }
    }

    fn finish(&mut self, outcome: &std::result::Result<Message, SessionError>) {
        self.clear_spinner();
        match outcome {
            Ok(message) if self.streamed => {
                self.catch_up(&message.content);
                let _ = writeln!(self.out);
            }
            Ok(message) => {
                let _ = writeln!(self.out, "{}", message.content);
            }
            Err(_) if self.printed > 0 => {
                let _ = writeln!(self.out);
            }
            Err(_) => {}
        }
        let _ = self.out.flush();
    }

    fn start_spinner(&mut self) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message("Thinking...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}
