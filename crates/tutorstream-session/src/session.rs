// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation state machine that drives one exchange at a time.
//!
//! States: Idle -> Sending -> Streaming -> {Completed, Cancelled, Failed}.
//! A terminal state stays visible until the next `send`.
//!
//! The session wires the pieces together:
//! - **Transport**: opens the exchange and yields the raw body
//! - **Decoder + router**: bytes to frames to effects
//! - **Accumulator**: folds effects into the in-flight assistant message
//! - **Identity**: reconciles server-reported session ids
//! - **Persistence**: debounced saves of the message list

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tutorstream_client::{
    Effect, Frame, FrameDecoder, HttpConversationStore, HttpTransport, RecoveryThresholds, route,
};
use tutorstream_config::TutorConfig;
use tutorstream_core::{
    ChatTransport, ConversationStore, ExchangeContext, ExchangeRequest, Message, MessageId, Role,
    TutorError,
};

use crate::accumulator::ContentAccumulator;
use crate::cancel::{CancellationController, ExchangeToken};
use crate::identity::SessionIdentity;
use crate::persistence::PersistenceDebouncer;

/// States in the session FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No exchange has run yet.
    Idle,
    /// Request issued, waiting for the response line.
    Sending,
    /// Reading the response body.
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    /// True while an exchange is outstanding.
    pub fn is_busy(self) -> bool {
        matches!(self, SessionState::Sending | SessionState::Streaming)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Sending => write!(f, "sending"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Cancelled => write!(f, "cancelled"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// How a successful `send` ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    /// The finalized assistant message.
    Completed(Message),
    /// The user cancelled. The placeholder was removed.
    Cancelled,
}

/// Construction parameters for a [`StreamSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub session_id: Option<String>,
    /// Identity from the external provider. `None` means not authenticated.
    pub user_id: Option<String>,
    pub thresholds: RecoveryThresholds,
    pub title_max_chars: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            session_id: None,
            user_id: None,
            thresholds: RecoveryThresholds::default(),
            title_max_chars: 60,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &TutorConfig) -> Self {
        Self {
            session_id: config.tutor.session_id.clone(),
            user_id: config.tutor.user_id.clone(),
            thresholds: RecoveryThresholds::from(&config.decoder),
            title_max_chars: config.persistence.title_max_chars,
        }
    }
}

/// Callback for failed exchanges.
pub type ErrorHandler = Box<dyn Fn(&TutorError) + Send + Sync>;

/// One conversation with the tutoring backend.
pub struct StreamSession {
    transport: Arc<dyn ChatTransport>,
    identity: Arc<SessionIdentity>,
    persistence: Option<PersistenceDebouncer>,
    cancel: CancellationController,
    messages: watch::Sender<Vec<Message>>,
    state: watch::Sender<SessionState>,
    user_id: Option<String>,
    thresholds: RecoveryThresholds,
    title_max_chars: usize,
    on_error: Option<ErrorHandler>,
}

impl StreamSession {
    pub fn new(transport: Arc<dyn ChatTransport>, options: SessionOptions) -> Self {
        let (messages, _) = watch::channel(Vec::new());
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            transport,
            identity: Arc::new(SessionIdentity::new(options.session_id)),
            persistence: None,
            cancel: CancellationController::new(),
            messages,
            state,
            user_id: options.user_id.filter(|id| !id.trim().is_empty()),
            thresholds: options.thresholds,
            title_max_chars: options.title_max_chars,
            on_error: None,
        }
    }

    /// Builds a session with the HTTP transport and, when enabled, the HTTP store.
    ///
    /// Must be called inside a Tokio runtime when persistence is enabled.
    pub fn connect(config: &TutorConfig) -> Result<Self, TutorError> {
        let transport = Arc::new(HttpTransport::new(&config.backend)?);
        let mut session = Self::new(transport, SessionOptions::from_config(config));
        if config.persistence.enabled {
            let store = HttpConversationStore::new(&config.persistence, &config.backend)?;
            session = session.with_store(Arc::new(store));
        }
        Ok(session)
    }

    /// Enables persistence. Must be called inside a Tokio runtime.
    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        debug!(store = store.name(), "persistence enabled");
        self.persistence = Some(PersistenceDebouncer::new(store, Arc::clone(&self.identity)));
        self
    }

    /// Installs the callback invoked once for every failed `send`.
    pub fn with_error_handler(mut self, handler: impl Fn(&TutorError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Watch the ordered message list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.subscribe()
    }

    /// Watch the state machine.
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.identity.session_id()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.identity.conversation_id()
    }

    /// Cancels the exchange in flight. No-op when idle.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// Starts a new thread: clears the messages and unlinks the persisted record.
    pub fn reset(&self, session_id: Option<String>) -> Result<(), TutorError> {
        if self.state().is_busy() {
            return Err(TutorError::SendInProgress);
        }
        self.identity.reset(session_id);
        self.messages.send_replace(Vec::new());
        if let Some(persistence) = &self.persistence {
            persistence.set_title(None);
            persistence.invalidate_fingerprint();
        }
        self.state.send_replace(SessionState::Idle);
        info!(session_id = ?self.identity.session_id(), "session reset");
        Ok(())
    }

    /// Runs one exchange to a terminal state.
    ///
    /// Cancellation is reported as [`ExchangeOutcome::Cancelled`], not an error.
    /// Every error is also passed to the error handler, once.
    pub async fn send(
        &self,
        text: impl Into<String>,
        context: ExchangeContext,
    ) -> Result<ExchangeOutcome, TutorError> {
        let result = self.run_exchange(text.into(), context).await;
        if let Err(e) = &result {
            if e.is_precondition() || matches!(e, TutorError::SendInProgress) {
                warn!(error = %e, "exchange rejected");
            } else {
                error!(error = %e, "exchange failed");
            }
            if let Some(handler) = &self.on_error {
                handler(e);
            }
        }
        result
    }

    async fn run_exchange(
        &self,
        text: String,
        context: ExchangeContext,
    ) -> Result<ExchangeOutcome, TutorError> {
        let session_id = self.identity.require_session()?;
        let user_id = self.user_id.clone().ok_or(TutorError::NotAuthenticated)?;

        let acquired = self.state.send_if_modified(|state| {
            if state.is_busy() {
                false
            } else {
                *state = SessionState::Sending;
                true
            }
        });
        if !acquired {
            return Err(TutorError::SendInProgress);
        }

        let mut user = Message::user(text.clone());
        user.uploaded_docs = context.uploaded_docs.clone();
        let placeholder = Message::assistant_placeholder();
        let exchange = ActiveExchange {
            session: self,
            token: self.cancel.start(),
            placeholder: placeholder.clone(),
            finished: false,
        };
        self.messages.send_modify(|messages| {
            messages.push(user);
            messages.push(placeholder);
        });
        self.refresh_title();

        info!(
            session_id = %session_id,
            exchange = exchange.token.id(),
            transport = self.transport.name(),
            "exchange started"
        );

        let request = ExchangeRequest {
            session_id,
            user_id,
            message: text,
            context: context.fields,
        };
        let opened = tokio::select! {
            biased;
            _ = exchange.token.cancelled() => None,
            opened = self.transport.open(request) => Some(opened),
        };
        let response = match opened {
            None => return Ok(exchange.cancelled()),
            Some(Err(e)) => return Err(exchange.failed(e)),
            Some(Ok(response)) => response,
        };

        self.state.send_replace(SessionState::Streaming);
        self.observe_session(response.session_id.as_deref());

        let mut decoder = FrameDecoder::with_thresholds(self.thresholds);
        let mut accumulator = ContentAccumulator::new();
        let mut body = response.body;
        let mut received = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = exchange.token.cancelled() => None,
                next = body.next() => Some(next),
            };
            let Some(next) = next else {
                return Ok(exchange.cancelled());
            };

            match next {
                Some(Ok(bytes)) => {
                    received += bytes.len();
                    for frame in decoder.feed_bytes(&bytes) {
                        if let Err(e) = self.apply_frame(frame, &mut accumulator, &exchange) {
                            return Err(exchange.failed(e));
                        }
                    }
                }
                Some(Err(e)) => return Err(exchange.failed(e)),
                None => break,
            }
        }

        for frame in decoder.flush() {
            if let Err(e) = self.apply_frame(frame, &mut accumulator, &exchange) {
                return Err(exchange.failed(e));
            }
        }

        if received == 0 {
            return Err(exchange.failed(TutorError::protocol(
                "backend returned an empty response body",
            )));
        }

        Ok(exchange.completed(&accumulator).await)
    }

    fn apply_frame(
        &self,
        frame: Frame,
        accumulator: &mut ContentAccumulator,
        exchange: &ActiveExchange<'_>,
    ) -> Result<(), TutorError> {
        match route(frame) {
            Effect::Content(delta) => {
                if accumulator.apply(delta) {
                    let id = &exchange.placeholder.id;
                    self.messages
                        .send_if_modified(|messages| accumulator.apply_to(messages, id));
                    self.schedule_snapshot();
                }
            }
            Effect::Done { session_id } => {
                debug!(exchange = exchange.token.id(), "done frame received");
                self.observe_session(session_id.as_deref());
                self.schedule_snapshot();
            }
            Effect::Fail { message } => return Err(TutorError::protocol(message)),
            Effect::Ignore => {}
        }
        Ok(())
    }

    fn observe_session(&self, reported: Option<&str>) {
        if self.identity.observe(reported).is_renegotiated()
            && let Some(persistence) = &self.persistence
        {
            persistence.invalidate_fingerprint();
        }
    }

    /// Serialized message list, the unit of persistence.
    fn snapshot(&self) -> Option<String> {
        match serde_json::to_string(&*self.messages.borrow()) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "failed to serialize conversation snapshot");
                None
            }
        }
    }

    fn schedule_snapshot(&self) {
        if let Some(persistence) = &self.persistence
            && let Some(snapshot) = self.snapshot()
        {
            persistence.schedule(snapshot);
        }
    }

    fn refresh_title(&self) {
        if let Some(persistence) = &self.persistence
            && persistence.title().is_none()
        {
            let title = derive_title(&self.messages.borrow(), self.title_max_chars);
            persistence.set_title(title);
        }
    }

    fn remove_message(&self, id: &MessageId) {
        self.messages.send_if_modified(|messages| {
            let before = messages.len();
            messages.retain(|m| &m.id != id);
            messages.len() != before
        });
    }
}

/// Title from the first user message: whitespace collapsed, at most `max_chars` characters.
pub fn derive_title(messages: &[Message], max_chars: usize) -> Option<String> {
    let first = messages.iter().find(|m| m.role == Role::User)?;
    let text = first.content.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }
    Some(match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text,
    })
}

/// The exchange in flight. Every exit path goes through exactly one of
/// `completed`, `cancelled` or `failed`. Dropping it before any of them ran
/// (the `send` future was dropped) counts as a cancellation.
struct ActiveExchange<'a> {
    session: &'a StreamSession,
    token: ExchangeToken,
    placeholder: Message,
    finished: bool,
}

impl ActiveExchange<'_> {
    async fn completed(mut self, accumulator: &ContentAccumulator) -> ExchangeOutcome {
        self.token.settle();

        let mut message = self.placeholder.clone();
        accumulator.write_to(&mut message);
        self.session.messages.send_if_modified(|messages| {
            accumulator.apply_to(messages, &message.id)
        });

        if let Some(persistence) = &self.session.persistence
            && let Some(snapshot) = self.session.snapshot()
        {
            persistence.flush_final(snapshot).await;
        }

        self.finish(SessionState::Completed);
        info!(
            exchange = self.token.id(),
            chars = message.content.chars().count(),
            images = message.image_urls.as_ref().map_or(0, Vec::len),
            "exchange completed"
        );
        ExchangeOutcome::Completed(message)
    }

    fn cancelled(mut self) -> ExchangeOutcome {
        self.token.settle();
        self.discard();
        self.finish(SessionState::Cancelled);
        info!(exchange = self.token.id(), "exchange cancelled");
        ExchangeOutcome::Cancelled
    }

    fn failed(mut self, error: TutorError) -> TutorError {
        self.token.settle();
        self.discard();
        self.finish(SessionState::Failed);
        error
    }

    /// Removes the placeholder and drops any snapshot still waiting to be saved.
    fn discard(&self) {
        self.session.remove_message(&self.placeholder.id);
        if let Some(persistence) = &self.session.persistence {
            persistence.discard_pending();
        }
    }

    fn finish(&mut self, state: SessionState) {
        self.finished = true;
        self.session.state.send_replace(state);
        self.session.cancel.finish(&self.token);
    }
}

impl Drop for ActiveExchange<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(exchange = self.token.id(), "exchange dropped before finishing");
        if self.token.settle() {
            self.discard();
            self.finish(SessionState::Cancelled);
        } else {
            // Dropped during the final flush; the content is already in place.
            self.finish(SessionState::Completed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use tutorstream_test_utils::{MockTransport, ScriptedExchange, chunk_line, done_line};

    fn session(transport: MockTransport) -> StreamSession {
        let options = SessionOptions {
            session_id: Some("s1".into()),
            user_id: Some("u1".into()),
            ..SessionOptions::default()
        };
        StreamSession::new(Arc::new(transport), options)
    }

    #[test]
    fn busy_states() {
        assert!(!SessionState::Idle.is_busy());
        assert!(SessionState::Sending.is_busy());
        assert!(SessionState::Streaming.is_busy());
        assert!(!SessionState::Failed.is_busy());
        assert_eq!(SessionState::Streaming.to_string(), "streaming");
    }

    #[test]
    fn title_comes_from_first_user_message() {
        let messages = vec![
            Message::assistant_placeholder(),
            Message::user("  What is\n photosynthesis?  "),
            Message::user("second"),
        ];
        assert_eq!(
            derive_title(&messages, 60).as_deref(),
            Some("What is photosynthesis?")
        );
        assert_eq!(derive_title(&messages, 7).as_deref(), Some("What is"));
        assert_eq!(derive_title(&[], 60), None);
    }

    #[test]
    fn title_truncates_on_char_boundary() {
        let messages = vec![Message::user("ééééé")];
        assert_eq!(derive_title(&messages, 3).as_deref(), Some("ééé"));
    }

    #[test]
    fn options_follow_config() {
        let mut config = TutorConfig::default();
        config.tutor.session_id = Some("s1".into());
        config.tutor.user_id = Some("u1".into());
        config.persistence.title_max_chars = 20;
        let options = SessionOptions::from_config(&config);
        assert_eq!(options.session_id.as_deref(), Some("s1"));
        assert_eq!(options.user_id.as_deref(), Some("u1"));
        assert_eq!(options.title_max_chars, 20);
        assert_eq!(options.thresholds, RecoveryThresholds::default());
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_exchange_is_logged_and_reported_once() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let transport =
            MockTransport::with_exchanges(vec![ScriptedExchange::failing(503, "overloaded")]);
        let session = session(transport).with_error_handler(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let err = session.send("hi", ExchangeContext::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "overloaded");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(logs_contain("exchange failed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn rejected_send_is_logged_as_warning() {
        let session = StreamSession::new(Arc::new(MockTransport::new()), SessionOptions::default());
        let err = session.send("hi", ExchangeContext::default()).await.unwrap_err();
        assert!(matches!(err, TutorError::SessionNotInitialized));
        assert!(logs_contain("exchange rejected"));
    }

    #[tokio::test]
    async fn completed_message_replaces_placeholder() {
        let transport = MockTransport::with_exchanges(vec![ScriptedExchange::lines([
            chunk_line("Hi"),
            chunk_line(" there"),
            done_line(None),
        ])]);
        let session = session(transport);

        let outcome = session.send("hello", ExchangeContext::default()).await.unwrap();
        let ExchangeOutcome::Completed(message) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(message.content, "Hi there");
        assert_eq!(session.messages()[1], message);
        assert_eq!(session.state(), SessionState::Completed);
        assert!(!session.cancel());
    }

    #[tokio::test]
    async fn reset_refused_while_busy() {
        let transport = MockTransport::with_exchanges(vec![
            ScriptedExchange::lines([chunk_line("Hel")]).hanging(),
        ]);
        let session = Arc::new(session(transport));
        let task = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send("hi", ExchangeContext::default()).await })
        };

        let mut state = session.state_watch();
        state
            .wait_for(|s| *s == SessionState::Streaming)
            .await
            .unwrap();
        assert!(matches!(session.reset(None), Err(TutorError::SendInProgress)));

        session.cancel();
        assert_eq!(task.await.unwrap().unwrap(), ExchangeOutcome::Cancelled);
        assert!(session.reset(None).is_ok());
    }
}
