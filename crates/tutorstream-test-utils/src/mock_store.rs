// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording conversation store.
//!
//! `MockStore` implements `ConversationStore`, keeps every save request, and
//! tracks how many saves were in flight at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tutorstream_core::{ConversationStore, SaveOutcome, SaveRequest, TutorError};

#[derive(Default)]
struct StoreState {
    saves: Mutex<Vec<SaveRequest>>,
    fail_remaining: AtomicUsize,
    panic_remaining: AtomicUsize,
    in_flight: AtomicUsize,
    max_concurrent: AtomicUsize,
}

/// A conversation store that records saves and answers from a script.
///
/// Clones share the recorded saves.
#[derive(Clone, Default)]
pub struct MockStore {
    conversation_id: Option<String>,
    delay: Option<Duration>,
    state: Arc<StoreState>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conversation id returned by every successful save.
    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Time each save takes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` saves with a storage error.
    pub fn fail_next(self, n: usize) -> Self {
        self.state.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Panic inside the next `n` saves.
    pub fn panic_next(self, n: usize) -> Self {
        self.state.panic_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Every save request received, in order.
    pub fn saves(&self) -> Vec<SaveRequest> {
        self.state
            .saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of saves whose snapshot contains `needle`.
    pub fn saves_containing(&self, needle: &str) -> usize {
        self.saves()
            .iter()
            .filter(|s| s.messages.contains(needle))
            .count()
    }

    /// Highest number of saves observed in flight at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.state.max_concurrent.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl ConversationStore for MockStore {
    fn name(&self) -> &str {
        "mock-store"
    }

    async fn save_conversation(&self, request: SaveRequest) -> Result<SaveOutcome, TutorError> {
        self.state
            .saves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_concurrent.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        if take_one(&self.state.panic_remaining) {
            panic!("mock store panicked on purpose");
        }
        if take_one(&self.state.fail_remaining) {
            return Err(TutorError::Storage {
                message: "mock store failure".into(),
                source: None,
            });
        }

        Ok(SaveOutcome {
            success: true,
            conversation_id: self.conversation_id.clone(),
            error: None,
        })
    }
}
