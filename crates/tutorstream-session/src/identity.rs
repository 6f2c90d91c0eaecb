// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session id and persisted-conversation id, reconciled against the server.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;
use tutorstream_core::TutorError;

#[derive(Debug, Default)]
struct IdentityState {
    session_id: Option<String>,
    conversation_id: Option<String>,
    /// Bumped on every renegotiation.
    generation: u64,
}

/// What [`SessionIdentity::observe`] did with a server-reported id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Nothing reported, or the same id as before.
    Unchanged,
    /// First id for a session that had none.
    Adopted,
    /// The server moved the session; the conversation link was dropped.
    Renegotiated { previous: String },
}

impl Observation {
    pub fn is_renegotiated(&self) -> bool {
        matches!(self, Observation::Renegotiated { .. })
    }
}

/// Owner of the session id and the persisted-conversation id.
///
/// The server's view of the session id is authoritative: a different id in a
/// response header or `done` frame replaces the local one and unlinks the
/// persisted conversation so the next save creates a fresh record.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    state: Mutex<IdentityState>,
}

impl SessionIdentity {
    pub fn new(session_id: Option<String>) -> Self {
        Self {
            state: Mutex::new(IdentityState {
                session_id: session_id.filter(|id| !id.trim().is_empty()),
                ..IdentityState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IdentityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.lock().conversation_id.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Session id, conversation id and generation read under one lock.
    pub fn snapshot(&self) -> (Option<String>, Option<String>, u64) {
        let state = self.lock();
        (
            state.session_id.clone(),
            state.conversation_id.clone(),
            state.generation,
        )
    }

    /// The session id an exchange must be sent under.
    pub fn require_session(&self) -> Result<String, TutorError> {
        self.session_id().ok_or(TutorError::SessionNotInitialized)
    }

    /// Replaces the session id from the caller side, e.g. when switching threads.
    ///
    /// Treated like a renegotiation: the conversation link is dropped.
    pub fn reset(&self, session_id: Option<String>) {
        let mut state = self.lock();
        state.session_id = session_id.filter(|id| !id.trim().is_empty());
        state.conversation_id = None;
        state.generation += 1;
    }

    /// Reconciles a server-reported session id.
    pub fn observe(&self, reported: Option<&str>) -> Observation {
        let Some(reported) = reported.map(str::trim).filter(|id| !id.is_empty()) else {
            return Observation::Unchanged;
        };

        let mut state = self.lock();
        match state.session_id.as_deref() {
            Some(current) if current == reported => Observation::Unchanged,
            None => {
                state.session_id = Some(reported.to_string());
                info!(session_id = %reported, "session id adopted from server");
                Observation::Adopted
            }
            Some(current) => {
                let previous = current.to_string();
                state.session_id = Some(reported.to_string());
                state.conversation_id = None;
                state.generation += 1;
                info!(
                    previous = %previous,
                    session_id = %reported,
                    generation = state.generation,
                    "session renegotiated by server"
                );
                Observation::Renegotiated { previous }
            }
        }
    }

    /// Links the persisted conversation, unless one is already linked or the
    /// session was renegotiated since the save started at `generation`.
    pub fn adopt_conversation_id(&self, conversation_id: &str, generation: u64) -> bool {
        let mut state = self.lock();
        if state.generation != generation || state.conversation_id.is_some() {
            return false;
        }
        state.conversation_id = Some(conversation_id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_session_fails_precondition() {
        let identity = SessionIdentity::new(None);
        assert!(matches!(
            identity.require_session(),
            Err(TutorError::SessionNotInitialized)
        ));

        let identity = SessionIdentity::new(Some("  ".into()));
        assert!(identity.require_session().is_err());

        let identity = SessionIdentity::new(Some("s1".into()));
        assert_eq!(identity.require_session().unwrap(), "s1");
    }

    #[test]
    fn same_or_absent_report_is_unchanged() {
        let identity = SessionIdentity::new(Some("s1".into()));
        assert_eq!(identity.observe(None), Observation::Unchanged);
        assert_eq!(identity.observe(Some("")), Observation::Unchanged);
        assert_eq!(identity.observe(Some("s1")), Observation::Unchanged);
        assert_eq!(identity.generation(), 0);
    }

    #[test]
    fn renegotiation_drops_conversation_link() {
        let identity = SessionIdentity::new(Some("s1".into()));
        assert!(identity.adopt_conversation_id("c1", 0));
        assert_eq!(identity.conversation_id().as_deref(), Some("c1"));

        let observed = identity.observe(Some("s2"));
        assert_eq!(
            observed,
            Observation::Renegotiated {
                previous: "s1".into()
            }
        );
        assert_eq!(identity.session_id().as_deref(), Some("s2"));
        assert_eq!(identity.conversation_id(), None);
        assert_eq!(identity.generation(), 1);
    }

    #[test]
    fn conversation_id_is_adopted_once() {
        let identity = SessionIdentity::new(Some("s1".into()));
        assert!(identity.adopt_conversation_id("c1", 0));
        assert!(!identity.adopt_conversation_id("c2", 0));
        assert_eq!(identity.conversation_id().as_deref(), Some("c1"));
    }

    #[test]
    fn stale_generation_cannot_link_new_thread() {
        let identity = SessionIdentity::new(Some("s1".into()));
        let started_at = identity.generation();
        identity.observe(Some("s2"));
        assert!(!identity.adopt_conversation_id("c-old", started_at));
        assert_eq!(identity.conversation_id(), None);
    }

    #[test]
    fn reset_unlinks_and_bumps_generation() {
        let identity = SessionIdentity::new(Some("s1".into()));
        identity.adopt_conversation_id("c1", 0);
        identity.reset(Some("s9".into()));
        assert_eq!(identity.snapshot(), (Some("s9".into()), None, 1));
    }
}
