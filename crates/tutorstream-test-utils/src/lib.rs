// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for tutorstream integration tests.
//!
//! Scripted collaborators and a harness for fast, deterministic tests
//! without a live backend.
//!
//! # Components
//!
//! - [`MockTransport`] - replays [`ScriptedExchange`]s and records requests
//! - [`MockStore`] - records saves, with scripted failures and delays
//! - [`TestHarness`] - a [`StreamSession`](tutorstream_session::StreamSession) wired to both

pub mod harness;
pub mod mock_store;
pub mod mock_transport;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_store::MockStore;
pub use mock_transport::{
    MockTransport, ScriptedExchange, chunk_line, done_line, error_line, full_response_line,
    sse_line,
};
