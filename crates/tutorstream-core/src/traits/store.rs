// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation store trait: the external document-store upsert.

use async_trait::async_trait;

use crate::error::TutorError;
use crate::types::{SaveOutcome, SaveRequest};

/// Persists serialized conversations.
///
/// A request without a conversation id creates a record; a request with one
/// updates that record. A store may report failure either as `Err` or as an
/// outcome with `success == false`; the engine treats both the same way.
#[async_trait]
pub trait ConversationStore: Send + Sync + 'static {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    async fn save_conversation(&self, request: SaveRequest) -> Result<SaveOutcome, TutorError>;
}
