// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every tutorstream crate.

use thiserror::Error;

/// The primary error type for exchanges, collaborators, and configuration.
///
/// Transient decode problems never surface here: the frame decoder recovers
/// or logs them locally. User cancellation is not an error either; it is
/// reported as an exchange outcome.
#[derive(Debug, Error)]
pub enum TutorError {
    /// Invalid configuration or a client that could not be constructed.
    #[error("configuration error: {0}")]
    Config(String),

    /// An exchange was started without a non-empty session id.
    #[error("session not initialized: a session id is required before sending")]
    SessionNotInitialized,

    /// An exchange was started without an authenticated identity.
    #[error("not authenticated: an identity is required before sending")]
    NotAuthenticated,

    /// A second exchange was started while one is still outstanding.
    #[error("an exchange is already in progress for this session")]
    SendInProgress,

    /// Network-level failure (connect, read, transport timeout).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend rejected the exchange or reported an error mid-stream.
    #[error("{message}")]
    Protocol {
        /// HTTP status, when the failure came from the response line.
        status: Option<u16>,
        message: String,
    },

    /// The persistence collaborator failed. Never fails an exchange.
    #[error("storage error: {message}")]
    Storage {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TutorError {
    /// Builds a protocol error carrying only a message (no HTTP status).
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            status: None,
            message: message.into(),
        }
    }

    /// True for failures detected before any network call is made.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::SessionNotInitialized | Self::NotAuthenticated
        )
    }
}
