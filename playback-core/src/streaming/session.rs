// Playback resilience controller - playback session
//
// A session is the unit of ownership for one attached source: it holds the
// engine handle (manifest mode with engine), the state machine, the retry
// ledger and the `loaded` flag.

use std::fmt;

use common::{FailureReason, Generation, PlaybackMode, SessionState, SourceDescriptor};
use tracing::{debug, warn};

use super::collaborator::StreamingEngine;
use super::recovery::RetryLedger;

/// What the session has bound to the sink
pub enum Binding {
    /// Nothing attached yet, or already released
    Unbound,
    /// Streaming engine attached to the sink
    Engine(Box<dyn StreamingEngine>),
    /// URL set directly on the sink (native manifest or progressive)
    Direct,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Unbound => f.write_str("Unbound"),
            Binding::Engine(_) => f.write_str("Engine"),
            Binding::Direct => f.write_str("Direct"),
        }
    }
}

#[derive(Debug)]
pub struct PlaybackSession {
    generation: Generation,
    descriptor: SourceDescriptor,
    mode: PlaybackMode,
    state: SessionState,
    pub(crate) binding: Binding,
    pub(crate) retries: RetryLedger,
    loaded: bool,
    failure: Option<FailureReason>,
}

impl PlaybackSession {
    pub fn new(generation: Generation, descriptor: SourceDescriptor, mode: PlaybackMode) -> Self {
        Self {
            generation,
            descriptor,
            mode,
            state: SessionState::Idle,
            binding: Binding::Unbound,
            retries: RetryLedger::default(),
            loaded: false,
            failure: None,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn retries(&self) -> &RetryLedger {
        &self.retries
    }

    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    /// Move to `next` if the state table allows it.
    pub(crate) fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                generation = %self.generation,
                from = %self.state,
                to = %next,
                "rejected session state transition"
            );
            return false;
        }

        debug!(
            generation = %self.generation,
            from = %self.state,
            to = %next,
            "session state transition"
        );
        self.state = next;
        true
    }

    /// Set `loaded`; returns `true` only the first time.
    pub(crate) fn mark_loaded(&mut self) -> bool {
        !std::mem::replace(&mut self.loaded, true)
    }

    pub(crate) fn record_failure(&mut self, reason: FailureReason) {
        if self.transition(SessionState::Failed) {
            self.failure = Some(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> PlaybackSession {
        PlaybackSession::new(
            Generation::new(1),
            SourceDescriptor::new("https://cdn.example.com/a.mp4"),
            PlaybackMode::Progressive,
        )
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = session();

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.loaded());
        assert!(session.failure().is_none());
        assert!(matches!(session.binding(), Binding::Unbound));
    }

    #[test]
    fn test_invalid_transition_is_refused() {
        let mut session = session();

        assert!(!session.transition(SessionState::Ready));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.transition(SessionState::Attaching));
        assert_eq!(session.state(), SessionState::Attaching);
    }

    #[test]
    fn test_mark_loaded_once() {
        let mut session = session();

        assert!(session.mark_loaded());
        assert!(!session.mark_loaded());
        assert!(session.loaded());
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut session = session();
        session.transition(SessionState::Attaching);
        session.record_failure(FailureReason::UnknownFatal {
            detail: "boom".to_string(),
        });

        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.failure().is_some());
        assert!(!session.transition(SessionState::Destroyed));
    }
}
