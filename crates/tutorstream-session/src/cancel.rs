// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-exchange cancellation.
//!
//! Each exchange gets a fresh [`ExchangeToken`] wrapping a
//! [`CancellationToken`]. The token also carries a "settled" flag: whichever
//! terminal transition settles it first wins, and a cancel arriving after
//! settlement is a no-op.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle for one exchange's lifetime.
#[derive(Debug, Clone)]
pub struct ExchangeToken {
    id: u64,
    token: CancellationToken,
    settled: Arc<AtomicBool>,
}

impl ExchangeToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the exchange is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Claims the terminal transition. True only for the first caller.
    pub fn settle(&self) -> bool {
        !self.settled.swap(true, Ordering::AcqRel)
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }
}

/// Owns the token of the exchange currently in flight, if any.
#[derive(Debug, Default)]
pub struct CancellationController {
    current: Mutex<Option<ExchangeToken>>,
    next_id: AtomicU64,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ExchangeToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issues the token for a new exchange.
    pub fn start(&self) -> ExchangeToken {
        let token = ExchangeToken {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            token: CancellationToken::new(),
            settled: Arc::new(AtomicBool::new(false)),
        };
        *self.lock() = Some(token.clone());
        token
    }

    /// Cancels the exchange in flight. Idempotent.
    ///
    /// Returns false when nothing is in flight or the exchange already settled.
    pub fn cancel(&self) -> bool {
        let guard = self.lock();
        match guard.as_ref() {
            Some(token) if !token.is_settled() && !token.is_cancelled() => {
                debug!(exchange = token.id, "cancelling exchange");
                token.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// True while an unsettled exchange is registered.
    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.lock().as_ref().is_some_and(|t| !t.is_settled())
    }

    /// Unregisters `token` if it is still the current one.
    pub fn finish(&self, token: &ExchangeToken) {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|t| t.id == token.id) {
            *guard = None;
        }
    }
}
