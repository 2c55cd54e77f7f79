// Playback resilience controller - engine lifecycle manager
//
// Owns the single session slot of a surface (arena-of-one), the shared media
// sink and the generation counter. Opening is acquire-new-then-release-old:
// the new session is installed before the previous one is torn down, so the
// sink is never claimed by two sessions or by none.

use common::{
    AttachError, FailureReason, Generation, PlaybackMode, SessionState, SourceDescriptor,
    SurfaceEvent,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::classifier::SourceClassifier;
use super::collaborator::{EngineOptions, EventEmitter, MediaSink, StreamingEngineFactory};
use super::recovery::RecoveryAction;
use super::session::{Binding, PlaybackSession};

/// Readiness signal reported by a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Engine parsed the manifest
    ManifestParsed,
    /// Sink has metadata
    Metadata,
    /// Sink can play or has data
    MediaData,
}

pub struct EngineLifecycle<S: MediaSink> {
    factory: Box<dyn StreamingEngineFactory>,
    sink: S,
    classifier: SourceClassifier,
    engine_options: EngineOptions,
    events: mpsc::UnboundedSender<SurfaceEvent>,
    generation: Generation,
    session: Option<PlaybackSession>,
}

impl<S: MediaSink> EngineLifecycle<S> {
    pub fn new(
        factory: Box<dyn StreamingEngineFactory>,
        sink: S,
        classifier: SourceClassifier,
        engine_options: EngineOptions,
        events: mpsc::UnboundedSender<SurfaceEvent>,
    ) -> Self {
        Self {
            factory,
            sink,
            classifier,
            engine_options,
            events,
            generation: Generation::NONE,
            session: None,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut PlaybackSession> {
        self.session.as_mut()
    }

    pub fn state(&self) -> Option<SessionState> {
        self.session.as_ref().map(|session| session.state())
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub(crate) fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Whether an event stamped `generation` belongs to the active session.
    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation
            && self
                .session
                .as_ref()
                .is_some_and(|session| session.generation() == generation)
    }

    /// Install a session for `descriptor` and release the previous one.
    ///
    /// The sink is re-bound to the new generation; nothing is attached until
    /// `attach` runs.
    pub fn begin(&mut self, descriptor: SourceDescriptor) -> Generation {
        self.generation = self.generation.next();
        let mode = self.classifier.classify(&descriptor.url);
        let session = PlaybackSession::new(self.generation, descriptor, mode);

        if let Some(mut previous) = self.session.replace(session) {
            debug!(
                superseded = %previous.generation(),
                generation = %self.generation,
                "releasing superseded session"
            );
            Self::release(&mut previous, &mut self.sink);
            if !previous.state().is_terminal() {
                previous.transition(SessionState::Destroyed);
            }
        }

        self.sink
            .bind(EventEmitter::new(self.generation, self.events.clone()));
        self.generation
    }

    /// Attach the current session's source to the sink.
    pub fn attach(&mut self) -> Result<(), AttachError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if !session.transition(SessionState::Attaching) {
            return Ok(());
        }

        let url = session.descriptor().url.clone();
        let generation = session.generation();

        if session.mode() == PlaybackMode::Manifest && self.factory.is_supported() {
            let emitter = EventEmitter::new(generation, self.events.clone());
            let mut engine = self
                .factory
                .construct(&self.engine_options, emitter)
                .map_err(|e| AttachError::EngineConstruction(e.to_string()))?;

            let attached = engine
                .load_source(&url)
                .and_then(|_| engine.attach_to_sink(&mut self.sink));
            if let Err(e) = attached {
                engine.destroy();
                return Err(AttachError::EngineRejected(e.to_string()));
            }

            session.binding = Binding::Engine(engine);
            info!(%generation, %url, "streaming engine attached");
        } else {
            self.sink
                .set_source(&url)
                .map_err(|e| AttachError::SinkRejected(e.to_string()))?;

            session.binding = Binding::Direct;
            info!(
                %generation,
                %url,
                mode = %session.mode(),
                "source bound directly to sink"
            );
        }

        Ok(())
    }

    /// Advance an attaching session to `Ready` if `signal` is its readiness
    /// signal. Returns `true` when the session became ready.
    pub fn on_readiness(&mut self, signal: Readiness) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.state() != SessionState::Attaching {
            return false;
        }

        let intermediate = match (session.binding(), session.mode(), signal) {
            (Binding::Engine(_), _, Readiness::ManifestParsed) => SessionState::ManifestParsed,
            (Binding::Direct, PlaybackMode::Manifest, Readiness::Metadata | Readiness::MediaData) => {
                SessionState::NativeReady
            }
            (Binding::Direct, PlaybackMode::Progressive, Readiness::MediaData) => {
                SessionState::NativeReady
            }
            _ => return false,
        };

        session.transition(intermediate);
        session.mark_loaded();
        session.transition(SessionState::Ready);
        info!(
            generation = %session.generation(),
            mode = %session.mode(),
            "session ready"
        );
        true
    }

    /// Run a recovery action against the active session's binding.
    pub fn execute(&mut self, action: RecoveryAction) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match (&mut session.binding, action) {
            (Binding::Engine(engine), RecoveryAction::RestartLoad) => engine.start_load(),
            (Binding::Engine(engine), RecoveryAction::RecoverMedia) => engine.recover_media_error(),
            (Binding::Engine(engine), RecoveryAction::RecoverBuffer) => engine.recover_buffer(),
            (Binding::Direct, RecoveryAction::RestartLoad | RecoveryAction::RecoverMedia) => {
                self.sink.reload()
            }
            (Binding::Direct, RecoveryAction::RecoverBuffer) => {
                debug!(
                    generation = %session.generation(),
                    "no buffer recovery available for direct playback"
                );
            }
            (Binding::Unbound, _) => {
                warn!(
                    generation = %session.generation(),
                    %action,
                    "recovery requested for unbound session"
                );
            }
        }
    }

    /// Release the active session's resources and mark it failed.
    pub fn fail(&mut self, reason: FailureReason) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        Self::release(session, &mut self.sink);
        session.record_failure(reason);
    }

    /// Release the active session, if any. Idempotent.
    ///
    /// Returns the state the closed session ended in.
    pub fn close(&mut self) -> Option<SessionState> {
        let mut session = self.session.take()?;

        Self::release(&mut session, &mut self.sink);
        if !session.state().is_terminal() {
            session.transition(SessionState::Destroyed);
        }
        info!(
            generation = %session.generation(),
            state = %session.state(),
            "session closed"
        );
        Some(session.state())
    }

    fn release(session: &mut PlaybackSession, sink: &mut S) {
        match std::mem::replace(&mut session.binding, Binding::Unbound) {
            Binding::Engine(mut engine) => {
                engine.destroy();
                sink.clear_source();
            }
            Binding::Direct => sink.clear_source(),
            Binding::Unbound => {}
        }
    }
}
