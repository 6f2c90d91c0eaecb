// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP implementation of [`ChatTransport`].
//!
//! Opens one session-scoped POST per exchange and hands back the unread
//! response body. Transient statuses (429, 500, 503, 529) are retried before
//! any body byte has been read.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};
use tutorstream_config::BackendConfig;
use tutorstream_core::{ChatTransport, ExchangeRequest, ExchangeResponse, TutorError};

use crate::types::ErrorBody;

/// Pause between retry attempts.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Builds the shared reqwest client from backend settings.
pub(crate) fn build_http_client(config: &BackendConfig) -> Result<reqwest::Client, TutorError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = config.api_token.as_deref().filter(|t| !t.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TutorError::Config(format!("invalid api_token header value: {e}")))?;
        headers.insert(AUTHORIZATION, value);
    }

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder.build().map_err(|e| TutorError::Transport {
        message: format!("failed to build HTTP client: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Streams exchanges from the tutoring backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    chat_path: String,
    session_header: HeaderName,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(config: &BackendConfig) -> Result<Self, TutorError> {
        let session_header = HeaderName::from_bytes(config.session_header.trim().as_bytes())
            .map_err(|e| {
                TutorError::Config(format!(
                    "invalid session header name `{}`: {e}",
                    config.session_header
                ))
            })?;

        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_path: config.chat_path.clone(),
            session_header,
            max_retries: config.max_retries,
        })
    }

    /// Full URL of the chat endpoint for `session_id`.
    pub fn endpoint(&self, session_id: &str) -> String {
        let path = self
            .chat_path
            .replace("{session_id}", &encode_path_segment(session_id));
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self, request: ExchangeRequest) -> Result<ExchangeResponse, TutorError> {
        let url = self.endpoint(&request.session_id);
        let body = request_body(&request);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying chat request after transient error");
                tokio::time::sleep(RETRY_DELAY).await;
            }

            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| TutorError::Transport {
                    message: format!("chat request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "chat response received");

            if status.is_success() {
                let session_id = response
                    .headers()
                    .get(&self.session_header)
                    .and_then(|v| v.to_str().ok())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);

                let body = response.bytes_stream().map(|chunk| {
                    chunk.map_err(|e| TutorError::Transport {
                        message: format!("failed to read response body: {e}"),
                        source: Some(Box::new(e)),
                    })
                });
                return Ok(ExchangeResponse {
                    session_id,
                    body: Box::pin(body),
                });
            }

            if is_transient_error(status) && attempt < self.max_retries {
                let text = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %text, "transient error, will retry");
                continue;
            }

            let text = response.text().await.unwrap_or_default();
            return Err(TutorError::Protocol {
                status: Some(status.as_u16()),
                message: error_message(status, &text),
            });
        }

        Err(TutorError::protocol("chat request failed after retries"))
    }
}

/// Context fields first, then the fixed fields so they cannot be overridden.
fn request_body(request: &ExchangeRequest) -> serde_json::Value {
    let mut body = request.context.clone();
    body.insert("message".into(), request.message.clone().into());
    body.insert("session_id".into(), request.session_id.clone().into());
    body.insert("user_id".into(), request.user_id.clone().into());
    serde_json::Value::Object(body)
}

/// Readable message for a non-2xx response.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
    {
        Some(message) => message,
        None if body.trim().is_empty() => format!("backend returned {status}"),
        None => format!("backend returned {status}: {}", body.trim()),
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

/// Everything outside the RFC 3986 unreserved set.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}
