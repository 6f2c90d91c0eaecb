// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming response reconciliation for the tutor chat.
//!
//! A [`StreamSession`] owns one conversation. For each exchange it:
//! - Opens a streaming request through a [`ChatTransport`](tutorstream_core::ChatTransport)
//! - Decodes the body into frames and folds them into the assistant message
//! - Reconciles the session id the server reports
//! - Saves debounced snapshots through a [`ConversationStore`](tutorstream_core::ConversationStore)
//! - Honors user cancellation at any point before the exchange settles

pub mod accumulator;
pub mod cancel;
pub mod identity;
pub mod persistence;
pub mod session;

pub use accumulator::ContentAccumulator;
pub use cancel::{CancellationController, ExchangeToken};
pub use identity::{Observation, SessionIdentity};
pub use persistence::PersistenceDebouncer;
pub use session::{
    ErrorHandler, ExchangeOutcome, SessionOptions, SessionState, StreamSession, derive_title,
};
