// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-limited, non-overlapping conversation saves.
//!
//! [`PersistenceDebouncer::schedule`] only records the snapshot in a
//! single-slot mailbox and wakes a dedicated worker task. The worker saves
//! one snapshot at a time; while a save is in flight a newer snapshot waits
//! in the slot, replacing any older one that was still waiting.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tutorstream_core::{ConversationStore, SaveRequest};

use crate::identity::SessionIdentity;

#[derive(Debug)]
struct Pending {
    snapshot: String,
    seq: u64,
}

#[derive(Debug, Default)]
struct DebounceState {
    /// Last snapshot accepted by `schedule`.
    last_fingerprint: Option<String>,
    /// Last snapshot handed to the store.
    last_dispatched: Option<String>,
    /// Sequence numbers of the two snapshots above.
    fingerprint_seq: u64,
    dispatched_seq: u64,
    pending: Option<Pending>,
    is_saving: bool,
    last_seq: u64,
    title: Option<String>,
}

struct Shared {
    store: Arc<dyn ConversationStore>,
    identity: Arc<SessionIdentity>,
    state: Mutex<DebounceState>,
    wake: Notify,
    /// Highest sequence number whose save has finished.
    completed: watch::Sender<u64>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_completed(&self, seq: u64) {
        self.completed.send_if_modified(|done| {
            if seq > *done {
                *done = seq;
                true
            } else {
                false
            }
        });
    }
}

/// Debounced upserts of the serialized message list.
///
/// Must be created inside a Tokio runtime; the worker task stops when the
/// debouncer is dropped.
pub struct PersistenceDebouncer {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl PersistenceDebouncer {
    pub fn new(store: Arc<dyn ConversationStore>, identity: Arc<SessionIdentity>) -> Self {
        let (completed, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            store,
            identity,
            state: Mutex::new(DebounceState::default()),
            wake: Notify::new(),
            completed,
        });
        let shutdown = CancellationToken::new();

        tokio::spawn(run_worker(Arc::clone(&shared), shutdown.clone()));
        debug!(store = shared.store.name(), "persistence worker started");

        Self { shared, shutdown }
    }

    /// Sets the conversation title sent with every save.
    pub fn set_title(&self, title: Option<String>) {
        self.shared.lock().title = title;
    }

    pub fn title(&self) -> Option<String> {
        self.shared.lock().title.clone()
    }

    /// True while a save is in flight.
    pub fn is_saving(&self) -> bool {
        self.shared.lock().is_saving
    }

    /// Queues `snapshot` for saving unless it equals the last accepted one.
    ///
    /// Returns the sequence number assigned to the snapshot, or `None` when it
    /// was a duplicate.
    pub fn schedule(&self, snapshot: String) -> Option<u64> {
        let seq = {
            let mut state = self.shared.lock();
            if state.last_fingerprint.as_deref() == Some(snapshot.as_str()) {
                return None;
            }
            state.last_seq += 1;
            let seq = state.last_seq;
            state.last_fingerprint = Some(snapshot.clone());
            state.fingerprint_seq = seq;
            if let Some(replaced) = state.pending.replace(Pending { snapshot, seq }) {
                debug!(replaced = replaced.seq, seq, "newer snapshot replaced a waiting one");
            }
            seq
        };
        self.shared.wake.notify_one();
        Some(seq)
    }

    /// Schedules `snapshot` and waits until it, or anything newer, has been saved.
    ///
    /// Save failures are logged by the worker and do not surface here.
    pub async fn flush_final(&self, snapshot: String) {
        let target = match self.schedule(snapshot) {
            Some(seq) => seq,
            // Duplicate: wait for the save that carries that fingerprint.
            None => self.shared.lock().fingerprint_seq,
        };
        if target == 0 {
            return;
        }

        let mut completed = self.shared.completed.subscribe();
        tokio::select! {
            _ = completed.wait_for(|done| *done >= target) => {}
            _ = self.shutdown.cancelled() => {}
        }
    }

    /// Forgets the fingerprint so the next snapshot is saved even if identical.
    pub fn invalidate_fingerprint(&self) {
        self.shared.lock().last_fingerprint = None;
    }

    /// Drops a waiting snapshot. A save already in flight is left to finish.
    ///
    /// The fingerprint falls back to the last dispatched snapshot, so the
    /// conversation state after a cancelled exchange is saved again.
    pub fn discard_pending(&self) {
        let discarded = {
            let mut state = self.shared.lock();
            let discarded = state.pending.take();
            state.last_fingerprint = state.last_dispatched.clone();
            state.fingerprint_seq = state.dispatched_seq;
            discarded
        };
        if let Some(pending) = discarded {
            debug!(seq = pending.seq, "discarded waiting snapshot");
        }
    }
}

impl Drop for PersistenceDebouncer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_worker(shared: Arc<Shared>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = shared.wake.notified() => {}
        }

        loop {
            let next = {
                let mut state = shared.lock();
                match state.pending.take() {
                    Some(pending) => {
                        state.is_saving = true;
                        state.last_dispatched = Some(pending.snapshot.clone());
                        state.dispatched_seq = pending.seq;
                        Some((pending, state.title.clone()))
                    }
                    None => None,
                }
            };
            let Some((pending, title)) = next else { break };

            let seq = pending.seq;
            save_snapshot(&shared, pending, title).await;

            shared.lock().is_saving = false;
            shared.mark_completed(seq);
        }
    }
    debug!("persistence worker stopped");
}

async fn save_snapshot(shared: &Shared, pending: Pending, title: Option<String>) {
    let (session_id, conversation_id, generation) = shared.identity.snapshot();
    let creating = conversation_id.is_none();
    let request = SaveRequest {
        messages: pending.snapshot,
        title,
        conversation_id,
        session_id,
    };

    debug!(seq = pending.seq, creating, "saving conversation");

    // Own task: a panicking store surfaces here as a JoinError.
    let store = Arc::clone(&shared.store);
    let handle = tokio::spawn(async move { store.save_conversation(request).await });

    match handle.await {
        Ok(Ok(outcome)) if outcome.success => {
            if let Some(id) = outcome.conversation_id.as_deref()
                && shared.identity.adopt_conversation_id(id, generation)
            {
                info!(conversation_id = %id, "conversation linked to persisted record");
            }
            debug!(seq = pending.seq, "conversation saved");
        }
        Ok(Ok(outcome)) => {
            warn!(
                seq = pending.seq,
                error = outcome.error.as_deref().unwrap_or("unspecified"),
                "conversation store rejected save"
            );
        }
        Ok(Err(e)) => {
            warn!(seq = pending.seq, error = %e, "failed to save conversation");
        }
        Err(e) => {
            error!(seq = pending.seq, error = %e, "save task aborted");
        }
    }
}
