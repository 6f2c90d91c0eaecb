// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation data model and collaborator request/response types.

use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::TutorError;

/// Identifier of a message, unique within a session and prefixed by role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Prefix for messages typed by the user.
    pub const USER_PREFIX: &'static str = "user-";
    /// Prefix for streamed assistant messages.
    pub const ASSISTANT_PREFIX: &'static str = "assistant-";
    /// Prefix for turns produced by the voice role.
    pub const VOICE_PREFIX: &'static str = "role-voice-";

    fn with_prefix(prefix: &str) -> Self {
        Self(format!("{prefix}{}", uuid::Uuid::new_v4()))
    }

    /// A fresh id for a user message.
    pub fn user() -> Self {
        Self::with_prefix(Self::USER_PREFIX)
    }

    /// A fresh id for an assistant message.
    pub fn assistant() -> Self {
        Self::with_prefix(Self::ASSISTANT_PREFIX)
    }

    /// A fresh id for a voice-role message.
    pub fn voice() -> Self {
        Self::with_prefix(Self::VOICE_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of a conversational turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Token accounting for one assistant message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

/// A document the user attached to their message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDoc {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A citation attached to an assistant answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One conversational turn, serialized as part of every persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_docs: Option<Vec<UploadedDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
}

impl Message {
    fn new(id: MessageId, role: Role, content: String) -> Self {
        Self {
            id,
            role,
            content,
            timestamp: Utc::now(),
            uploaded_docs: None,
            image_urls: None,
            video_urls: None,
            token_usage: None,
            sources: None,
        }
    }

    /// A user turn carrying the typed text.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageId::user(), Role::User, content.into())
    }

    /// An empty assistant turn, the in-flight placeholder of an exchange.
    pub fn assistant_placeholder() -> Self {
        Self::new(MessageId::assistant(), Role::Assistant, String::new())
    }
}

/// Caller-supplied fields sent alongside the user's message.
#[derive(Debug, Clone, Default)]
pub struct ExchangeContext {
    /// Extra request-body fields (subject, grade level, mode, ...).
    pub fields: serde_json::Map<String, serde_json::Value>,
    /// Documents attached to the user message.
    pub uploaded_docs: Option<Vec<UploadedDoc>>,
}

impl ExchangeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one request-body field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_uploaded_docs(mut self, docs: Vec<UploadedDoc>) -> Self {
        self.uploaded_docs = Some(docs);
        self
    }
}

/// Everything a transport needs to open one streaming exchange.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub session_id: String,
    pub user_id: String,
    pub message: String,
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// Raw response body as a stream of network reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TutorError>> + Send>>;

/// An opened exchange: response metadata plus the unread body.
pub struct ExchangeResponse {
    /// Authoritative session id from the response header, if the backend sent one.
    pub session_id: Option<String>,
    pub body: ByteStream,
}

impl std::fmt::Debug for ExchangeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeResponse")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// One upsert handed to the conversation store.
///
/// Omitting `conversation_id` asks the store to create a new record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    /// The serialized message list (the snapshot).
    pub messages: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// What the conversation store reported for one upsert.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
