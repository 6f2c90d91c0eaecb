// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end session tests.
//!
//! `TestHarness` assembles a [`StreamSession`] over a [`MockTransport`] and,
//! optionally, a [`MockStore`]. Errors delivered to the session's error
//! handler are captured for assertions.

use std::sync::{Arc, Mutex, PoisonError};

use tutorstream_core::{ExchangeContext, TutorError};
use tutorstream_session::{ExchangeOutcome, SessionOptions, StreamSession};

use crate::mock_store::MockStore;
use crate::mock_transport::{MockTransport, ScriptedExchange};

/// Builder for configuring a test session.
pub struct TestHarnessBuilder {
    session_id: Option<String>,
    user_id: Option<String>,
    exchanges: Vec<ScriptedExchange>,
    store: Option<MockStore>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            session_id: Some("s1".to_string()),
            user_id: Some("u1".to_string()),
            exchanges: Vec::new(),
            store: None,
        }
    }

    /// Initial session id. `None` leaves the session uninitialized.
    pub fn with_session_id(mut self, session_id: Option<&str>) -> Self {
        self.session_id = session_id.map(str::to_string);
        self
    }

    /// Authenticated user. `None` leaves the session unauthenticated.
    pub fn with_user_id(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(str::to_string);
        self
    }

    /// Queue one scripted exchange. Exchanges replay in order.
    pub fn with_exchange(mut self, exchange: ScriptedExchange) -> Self {
        self.exchanges.push(exchange);
        self
    }

    /// Enable persistence against `store`.
    pub fn with_store(mut self, store: MockStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the harness. Spawns the persistence worker when a store is set.
    pub async fn build(self) -> TestHarness {
        let transport = MockTransport::with_exchanges(self.exchanges);
        let options = SessionOptions {
            session_id: self.session_id,
            user_id: self.user_id,
            ..SessionOptions::default()
        };

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let mut session = StreamSession::new(Arc::new(transport.clone()), options)
            .with_error_handler(move |e: &TutorError| {
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(e.to_string());
            });
        if let Some(store) = &self.store {
            session = session.with_store(Arc::new(store.clone()));
        }

        TestHarness {
            session: Arc::new(session),
            transport,
            store: self.store,
            errors,
        }
    }
}

/// A session wired to scripted collaborators.
pub struct TestHarness {
    /// The session under test.
    pub session: Arc<StreamSession>,
    /// The scripted transport; inspect `requests()` for what was sent.
    pub transport: MockTransport,
    /// The recording store, when persistence is enabled.
    pub store: Option<MockStore>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Send `text` with an empty context.
    pub async fn send(&self, text: &str) -> Result<ExchangeOutcome, TutorError> {
        self.session.send(text, ExchangeContext::default()).await
    }

    /// Send `text` and return the finalized assistant content.
    pub async fn send_text(&self, text: &str) -> Result<String, TutorError> {
        match self.send(text).await? {
            ExchangeOutcome::Completed(message) => Ok(message.content),
            ExchangeOutcome::Cancelled => Ok(String::new()),
        }
    }

    /// Messages passed to the error handler, in order.
    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Saves recorded by the store; empty without one.
    pub fn saves(&self) -> Vec<tutorstream_core::SaveRequest> {
        self.store.as_ref().map(MockStore::saves).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_transport::{chunk_line, done_line};

    #[tokio::test]
    async fn default_harness_streams_mock_response() {
        let harness = TestHarness::builder().build().await;
        let text = harness.send_text("hello").await.unwrap();
        assert_eq!(text, "mock response");
        assert!(harness.errors().is_empty());
        assert!(harness.saves().is_empty());
    }

    #[tokio::test]
    async fn scripted_exchange_is_used() {
        let harness = TestHarness::builder()
            .with_exchange(ScriptedExchange::lines([chunk_line("scripted"), done_line(None)]))
            .build()
            .await;
        assert_eq!(harness.send_text("hi").await.unwrap(), "scripted");
        assert_eq!(harness.transport.requests()[0].message, "hi");
    }

    #[tokio::test]
    async fn errors_are_captured() {
        let harness = TestHarness::builder().with_user_id(None).build().await;
        assert!(harness.send("hi").await.is_err());
        assert_eq!(harness.errors().len(), 1);
    }
}
