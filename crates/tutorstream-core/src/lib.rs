// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the tutorstream chat engine.
//!
//! Holds the error type, the conversation data model that gets persisted,
//! and the two collaborator traits the engine talks to: the chat transport
//! that opens a streaming exchange, and the conversation store that upserts
//! serialized conversations.

pub mod error;
pub mod traits;
pub mod types;

pub use error::TutorError;
pub use traits::{ChatTransport, ConversationStore};
pub use types::{
    ByteStream, ExchangeContext, ExchangeRequest, ExchangeResponse, Message, MessageId, Role,
    SaveOutcome, SaveRequest, Source, TokenUsage, UploadedDoc,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_are_classified() {
        assert!(TutorError::SessionNotInitialized.is_precondition());
        assert!(TutorError::NotAuthenticated.is_precondition());
        assert!(TutorError::Config("bad".into()).is_precondition());
        assert!(!TutorError::SendInProgress.is_precondition());
        assert!(!TutorError::protocol("rate limited").is_precondition());
    }

    #[test]
    fn protocol_error_displays_bare_message() {
        let err = TutorError::protocol("rate limited");
        assert_eq!(err.to_string(), "rate limited");

        let err = TutorError::Protocol {
            status: Some(502),
            message: "backend returned 502 Bad Gateway".into(),
        };
        assert_eq!(err.to_string(), "backend returned 502 Bad Gateway");
    }

    #[test]
    fn all_collaborator_traits_are_exported() {
        fn _assert_transport<T: ChatTransport>() {}
        fn _assert_store<T: ConversationStore>() {}
    }
}
