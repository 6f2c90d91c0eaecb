// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted chat transport for deterministic exchange tests.
//!
//! `MockTransport` implements `ChatTransport` by popping one
//! [`ScriptedExchange`] per `open` call. Every request is recorded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use tutorstream_core::{
    ByteStream, ChatTransport, ExchangeRequest, ExchangeResponse, TutorError,
};

/// Formats one protocol line: `data: <json>\n`.
pub fn sse_line(value: serde_json::Value) -> String {
    format!("data: {value}\n")
}

pub fn chunk_line(text: &str) -> String {
    sse_line(serde_json::json!({"type": "content", "data": {"chunk": text}}))
}

pub fn full_response_line(text: &str) -> String {
    sse_line(serde_json::json!({"type": "content", "data": {"full_response": text}}))
}

pub fn done_line(session_id: Option<&str>) -> String {
    match session_id {
        Some(id) => sse_line(serde_json::json!({"type": "done", "data": {"session_id": id}})),
        None => sse_line(serde_json::json!({"type": "done", "data": {}})),
    }
}

pub fn error_line(message: &str) -> String {
    sse_line(serde_json::json!({"type": "error", "data": {"error": message}}))
}

/// What one `open` call produces.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExchange {
    /// Body reads, delivered in order.
    pub chunks: Vec<Bytes>,
    /// Value of the session header on the response.
    pub session_header: Option<String>,
    /// Fail `open` with this status and message instead of streaming.
    pub failure: Option<(u16, String)>,
    /// Yield a transport error after the chunks.
    pub read_error: Option<String>,
    /// Never end the body after the chunks.
    pub hang: bool,
    pub chunk_delay: Option<Duration>,
    /// Delay before `open` returns.
    pub open_delay: Option<Duration>,
}

impl ScriptedExchange {
    /// One body read per line.
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::chunks(lines.into_iter().map(|l| Bytes::from(l.into())))
    }

    /// Arbitrary body reads.
    pub fn chunks(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
            ..Self::default()
        }
    }

    /// All lines concatenated, then cut into reads of `size` bytes.
    pub fn split_every<I, S>(lines: I, size: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let body: String = lines.into_iter().map(Into::into).collect();
        let bytes = Bytes::from(body);
        let size = size.max(1);
        let chunks = (0..bytes.len())
            .step_by(size)
            .map(|start| bytes.slice(start..(start + size).min(bytes.len())))
            .collect::<Vec<_>>();
        Self::chunks(chunks)
    }

    pub fn failing(status: u16, message: impl Into<String>) -> Self {
        Self {
            failure: Some((status, message.into())),
            ..Self::default()
        }
    }

    pub fn with_session_header(mut self, session_id: impl Into<String>) -> Self {
        self.session_header = Some(session_id.into());
        self
    }

    pub fn with_read_error(mut self, message: impl Into<String>) -> Self {
        self.read_error = Some(message.into());
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    fn into_body(self) -> ByteStream {
        let delay = self.chunk_delay;
        let mut items: Vec<Result<Bytes, TutorError>> = self.chunks.into_iter().map(Ok).collect();
        if let Some(message) = self.read_error {
            items.push(Err(TutorError::Transport {
                message,
                source: None,
            }));
        }

        let body = stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });

        let body: ByteStream = if self.hang {
            Box::pin(body.chain(stream::pending()))
        } else {
            Box::pin(body)
        };
        body
    }
}

#[derive(Default)]
struct TransportState {
    script: Mutex<VecDeque<ScriptedExchange>>,
    requests: Mutex<Vec<ExchangeRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A chat transport that replays scripted exchanges.
///
/// When the script is empty, `open` streams a single "mock response" chunk
/// followed by `done`.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<TransportState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exchanges(exchanges: Vec<ScriptedExchange>) -> Self {
        let transport = Self::new();
        lock(&transport.state.script).extend(exchanges);
        transport
    }

    pub fn push_exchange(&self, exchange: ScriptedExchange) {
        lock(&self.state.script).push_back(exchange);
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ExchangeRequest> {
        lock(&self.state.requests).clone()
    }

    fn next_exchange(&self) -> ScriptedExchange {
        lock(&self.state.script).pop_front().unwrap_or_else(|| {
            ScriptedExchange::lines([chunk_line("mock response"), done_line(None)])
        })
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    async fn open(&self, request: ExchangeRequest) -> Result<ExchangeResponse, TutorError> {
        lock(&self.state.requests).push(request);
        let mut exchange = self.next_exchange();

        if let Some(delay) = exchange.open_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((status, message)) = exchange.failure.take() {
            return Err(TutorError::Protocol {
                status: Some(status),
                message,
            });
        }

        Ok(ExchangeResponse {
            session_id: exchange.session_header.clone(),
            body: exchange.into_body(),
        })
    }
}
