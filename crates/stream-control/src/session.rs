/// Session identity and lifecycle
use serde::{Deserialize, Serialize};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No remote resource exists.
    Uninitialized,
    /// Create request in flight.
    Creating,
    /// Remote pipeline is live and accepting parameter patches.
    Live,
    /// A dispatch against this session failed; it is about to be
    /// discarded, never retried in place.
    Degraded,
}

/// Remote handle for one live generative-video pipeline instance.
///
/// Fields are opaque to this crate: the output locator is passed
/// through to playback consumers, the ingest endpoint to media
/// publishers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Playback reference for the generated output.
    pub output_locator: String,
    /// WHIP ingest URL for the input feed.
    pub ingest_endpoint: String,
    pub status: SessionStatus,
}

/// Holder for the single current session. Exactly one session is live
/// at a time; setting a new one implicitly retires the previous id
/// (the remote resource is abandoned, not deleted). Replacement is
/// always whole-object — no transition mutates fields in place.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: Option<Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn set(&mut self, session: Session) {
        self.current = Some(session);
    }

    /// Full discard; the next dispatch must create a fresh session.
    pub fn clear(&mut self) {
        self.current = None;
    }
}
