// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types of the tutoring backend's streaming protocol.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;
use tutorstream_core::TokenUsage;

/// Frame kind carrying incremental or replacement content.
pub const KIND_CONTENT: &str = "content";
/// Frame kind marking the end of generation.
pub const KIND_DONE: &str = "done";
/// Frame kind reporting a backend failure.
pub const KIND_ERROR: &str = "error";

/// One decoded protocol event: `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Frame {
    /// A content frame carrying a raw text delta.
    pub fn content_chunk(text: impl Into<String>) -> Self {
        Self {
            kind: KIND_CONTENT.to_string(),
            data: serde_json::json!({ "chunk": text.into() }),
        }
    }
}

/// Payload of a `content` frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentData {
    /// Incremental text to append.
    #[serde(default)]
    pub chunk: Option<String>,
    /// Replacement for everything accumulated so far.
    #[serde(default)]
    pub full_response: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub image_result: Option<ImageResult>,
    #[serde(default, deserialize_with = "lenient")]
    pub img_urls: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub video_urls: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub token_usage: Option<WireTokenUsage>,
}

/// Attachment fields never fail the frame: a malformed value is logged and
/// treated as absent so the text of the frame still applies.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!(error = %e, "skipping malformed attachment field");
            Ok(None)
        }
    }
}

/// `image_result` arrives either as one string or as a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ImageResult {
    One(String),
    Many(Vec<String>),
}

impl ImageResult {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ImageResult::One(image) => vec![image],
            ImageResult::Many(images) => images,
        }
    }
}

/// Token counters as the backend names them.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WireTokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

impl From<WireTokenUsage> for TokenUsage {
    fn from(wire: WireTokenUsage) -> Self {
        TokenUsage {
            input: wire.input_tokens,
            output: wire.output_tokens,
            total: wire
                .total_tokens
                .unwrap_or(wire.input_tokens + wire.output_tokens),
        }
    }
}

/// Payload of a `done` frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoneData {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Payload of an `error` frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorData {
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

/// Error body returned with a non-2xx status.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error
            .or(self.detail)
            .or(self.message)
            .filter(|m| !m.trim().is_empty())
    }
}
