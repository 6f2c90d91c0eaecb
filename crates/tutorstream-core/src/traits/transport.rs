// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat transport trait: opens one streaming exchange against the backend.

use async_trait::async_trait;

use crate::error::TutorError;
use crate::types::{ExchangeRequest, ExchangeResponse};

/// Opens a long-lived streaming request to the tutoring backend.
///
/// Implementations return once the response line and headers have arrived.
/// A non-2xx response or a missing body is a [`TutorError::Protocol`];
/// connection failures are [`TutorError::Transport`]. Dropping the returned
/// body stream aborts the underlying request.
#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    async fn open(&self, request: ExchangeRequest) -> Result<ExchangeResponse, TutorError>;
}
