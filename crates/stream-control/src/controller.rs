/// Session controller
///
/// Owns the session lifecycle: ensures a session exists before any
/// patch, serializes submissions through an authoritative busy guard,
/// and rotates (clear + recreate) the session on any dispatch failure.
/// Presentation layers observe state over a watch channel and never
/// drive transitions themselves.
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::augment::PromptAugmenter;
use crate::compose::{GenerationIntent, PromptComposer, RandomSource};
use crate::config::{Dimensions, StreamConfig};
use crate::dispatch::DispatchClient;
use crate::error::SubmitError;
use crate::params::MotionProfile;
use crate::session::{Session, SessionStatus, SessionStore};

/// Advisory state for observers. `passthrough` mirrors whether the
/// stream currently shows the raw input feed; it is UI state, not part
/// of the session entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    pub busy: bool,
    pub passthrough: bool,
    pub session: SessionStatus,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            busy: false,
            passthrough: true,
            session: SessionStatus::Uninitialized,
        }
    }
}

struct Inner {
    store: SessionStore,
    composer: PromptComposer,
}

/// Orchestrates composer, store, and dispatch client. The controller
/// is the only writer of the session store.
pub struct SessionController {
    dispatch: Arc<dyn DispatchClient>,
    augmenter: Option<Arc<dyn PromptAugmenter>>,
    pipeline_id: String,
    dimensions: Dimensions,
    // Also the busy guard: holding this lock is what "in flight" means.
    inner: Mutex<Inner>,
    state: watch::Sender<ControllerState>,
}

impl SessionController {
    pub fn new(config: &StreamConfig, dispatch: Arc<dyn DispatchClient>) -> Self {
        let (state, _) = watch::channel(ControllerState::default());
        Self {
            dispatch,
            augmenter: None,
            pipeline_id: config.pipeline_id.clone(),
            dimensions: config.dimensions,
            inner: Mutex::new(Inner {
                store: SessionStore::new(),
                composer: PromptComposer::new(config.model_id.clone(), config.dimensions),
            }),
            state,
        }
    }

    /// With a prompt augmentation strategy (local bank stays in the
    /// composer; this adds an upstream text source such as an LLM).
    pub fn with_augmenter(mut self, augmenter: Arc<dyn PromptAugmenter>) -> Self {
        self.augmenter = Some(augmenter);
        self
    }

    /// With a deterministic randomness source (tests).
    pub fn with_random_source(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.inner.get_mut().composer.set_random_source(rng);
        self
    }

    /// Watch controller state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    /// Current session handle, if one is live. Waits for any in-flight
    /// operation to finish rather than rejecting.
    pub async fn current_session(&self) -> Option<Session> {
        self.inner.lock().await.store.current().cloned()
    }

    /// Compose and push a parameter document, lazily creating the
    /// session first. Rejects with [`SubmitError::Busy`] while another
    /// operation is in flight.
    pub async fn submit(
        &self,
        intent: GenerationIntent,
        profile: MotionProfile,
    ) -> Result<(), SubmitError> {
        if intent.base_text.trim().is_empty() {
            return Err(SubmitError::EmptyPrompt);
        }

        let mut inner = self.inner.try_lock().map_err(|_| SubmitError::Busy)?;
        self.update(|s| s.busy = true);
        let result = self.submit_locked(&mut inner, intent, profile).await;
        self.update(|s| s.busy = false);
        result
    }

    async fn submit_locked(
        &self,
        inner: &mut Inner,
        mut intent: GenerationIntent,
        profile: MotionProfile,
    ) -> Result<(), SubmitError> {
        if let Some(augmenter) = &self.augmenter {
            match augmenter.augment(&intent.base_text).await {
                Ok(text) => intent.base_text = text,
                Err(err) => {
                    // Augmentation is best-effort; the raw text still
                    // composes into a valid document.
                    warn!(strategy = augmenter.name(), error = %err, "prompt augmentation failed");
                }
            }
        }

        let params = inner.composer.compose(&intent, profile);
        let session = self.ensure_session_locked(inner).await?;

        match self.dispatch.patch_parameters(&session, &params).await {
            Ok(()) => {
                info!(session_id = %session.id, profile = %profile, "parameters applied");
                self.update(|s| s.passthrough = false);
                Ok(())
            }
            Err(err) => {
                self.rotate_session(inner, &session).await;
                Err(SubmitError::Dispatch(err))
            }
        }
    }

    /// Clear parameters and return the stream to the raw input feed.
    pub async fn return_to_live(&self) -> Result<(), SubmitError> {
        let mut inner = self.inner.try_lock().map_err(|_| SubmitError::Busy)?;
        let session = inner
            .store
            .current()
            .cloned()
            .ok_or(SubmitError::NoActiveSession)?;

        self.update(|s| s.busy = true);
        let result = match self.dispatch.clear_parameters(&session).await {
            Ok(()) => {
                info!(session_id = %session.id, "returned to live");
                self.update(|s| s.passthrough = true);
                Ok(())
            }
            Err(err) => {
                self.rotate_session(&mut inner, &session).await;
                Err(SubmitError::Dispatch(err))
            }
        };
        self.update(|s| s.busy = false);
        result
    }

    /// Create the session now if none exists. Useful for callers that
    /// want the playback locator before the first submission.
    pub async fn ensure_session(&self) -> Result<Session, SubmitError> {
        let mut inner = self.inner.try_lock().map_err(|_| SubmitError::Busy)?;
        self.ensure_session_locked(&mut inner).await
    }

    async fn ensure_session_locked(&self, inner: &mut Inner) -> Result<Session, SubmitError> {
        if let Some(session) = inner.store.current() {
            return Ok(session.clone());
        }

        self.update(|s| s.session = SessionStatus::Creating);
        match self
            .dispatch
            .create_session(&self.pipeline_id, self.dimensions)
            .await
        {
            Ok(session) => {
                info!(session_id = %session.id, playback = %session.output_locator, "session created");
                inner.store.set(session.clone());
                self.update(|s| s.session = SessionStatus::Live);
                Ok(session)
            }
            Err(err) => {
                // Store stays empty; the caller retries explicitly.
                self.update(|s| s.session = SessionStatus::Uninitialized);
                Err(SubmitError::SessionCreate(err))
            }
        }
    }

    /// Abandon the failed session and make one recreation attempt.
    /// Recreation failure is not surfaced: the next operation lazily
    /// retries.
    async fn rotate_session(&self, inner: &mut Inner, failed: &Session) {
        warn!(session_id = %failed.id, "dispatch failed, rotating session");
        self.update(|s| s.session = SessionStatus::Degraded);
        inner.store.clear();

        match self
            .dispatch
            .create_session(&self.pipeline_id, self.dimensions)
            .await
        {
            Ok(session) => {
                info!(session_id = %session.id, "replacement session created");
                inner.store.set(session);
                self.update(|s| {
                    s.session = SessionStatus::Live;
                    s.passthrough = true;
                });
            }
            Err(err) => {
                warn!(error = %err, "session recreation failed");
                self.update(|s| s.session = SessionStatus::Uninitialized);
            }
        }
    }

    fn update(&self, f: impl FnOnce(&mut ControllerState)) {
        self.state.send_modify(f);
    }
}
