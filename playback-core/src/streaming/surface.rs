// Playback resilience controller - playback surface
//
// The host-facing controller. It wires the classifier, the lifecycle manager,
// the recovery policy and the intent coordinator together, and is the only
// place where collaborator events are consumed. Every event passes the
// generation guard before anything else looks at it.

use common::{
    EngineEvent, ErrorClass, EventKind, FailureReason, Generation, PlayRejection, PlaybackError,
    RawError, SessionState, SinkEvent, SourceDescriptor, SurfaceEvent,
};
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ControllerConfig;
use crate::stats::SurfaceStats;

use super::classifier::SourceClassifier;
use super::collaborator::{EngineOptions, MediaSink, PlayFuture, StreamingEngineFactory};
use super::intent::IntentCoordinator;
use super::lifecycle::{EngineLifecycle, Readiness};
use super::recovery::{classify_error, Classification, Decision, RecoveryPolicy};

/// Snapshot published to observers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub generation: Generation,
    pub state: SessionState,
    pub loaded: bool,
    pub failed: bool,
    pub failure: Option<FailureReason>,
}

pub struct PlaybackSurface<S: MediaSink> {
    id: Uuid,
    lifecycle: EngineLifecycle<S>,
    policy: RecoveryPolicy,
    intent: IntentCoordinator,
    events: mpsc::UnboundedReceiver<SurfaceEvent>,
    pending_plays: FuturesUnordered<LocalBoxFuture<'static, SurfaceEvent>>,
    status: watch::Sender<PlaybackStatus>,
    stats: SurfaceStats,
}

impl<S: MediaSink> PlaybackSurface<S> {
    pub fn new(
        config: &ControllerConfig,
        factory: Box<dyn StreamingEngineFactory>,
        sink: S,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(PlaybackStatus::default());

        let lifecycle = EngineLifecycle::new(
            factory,
            sink,
            SourceClassifier::new(&config.classifier.manifest_extensions),
            EngineOptions::from(&config.engine),
            tx,
        );

        Self {
            id: Uuid::new_v4(),
            lifecycle,
            policy: RecoveryPolicy::new(&config.recovery),
            intent: IntentCoordinator::new(),
            events: rx,
            pending_plays: FuturesUnordered::new(),
            status,
            stats: SurfaceStats::default(),
        }
    }

    pub fn with_defaults(factory: Box<dyn StreamingEngineFactory>, sink: S) -> Self {
        Self::new(&ControllerConfig::default(), factory, sink)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Attach `descriptor`, superseding whatever was open.
    ///
    /// Attach failures are not returned; they show up as `failed` with an
    /// `AttachFailure` reason.
    pub fn open(&mut self, descriptor: SourceDescriptor) -> Generation {
        self.intent.reset(&descriptor);
        let url = descriptor.url.clone();

        let generation = self.lifecycle.begin(descriptor);
        self.stats.sessions_opened += 1;
        info!(surface = %self.id, %generation, %url, "opening source");

        let muted = self.intent.desired_muted();
        self.intent.set_muted(muted, self.lifecycle.sink_mut());

        if let Err(e) = self.lifecycle.attach() {
            self.escalate(FailureReason::from(e));
        }

        self.publish();
        generation
    }

    /// Release the active session. Safe to call at any time, any number of
    /// times. `loaded` and `failed` keep their last values until the next
    /// `open`.
    pub fn close(&mut self) {
        if let Some(state) = self.lifecycle.close() {
            info!(surface = %self.id, generation = %self.lifecycle.generation(), "surface closed");
            self.status.send_if_modified(|status| {
                let changed = status.state != state;
                status.state = state;
                changed
            });
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        let state = self.lifecycle.state();
        if let Some(play) = self
            .intent
            .set_playing(playing, state, self.lifecycle.sink_mut())
        {
            self.track_play(play);
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.lifecycle.session().is_some() {
            self.intent.set_muted(muted, self.lifecycle.sink_mut());
        }
    }

    pub fn loaded(&self) -> bool {
        self.status.borrow().loaded
    }

    pub fn failed(&self) -> bool {
        self.status.borrow().failed
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.subscribe()
    }

    pub fn stats(&self) -> &SurfaceStats {
        &self.stats
    }

    pub fn generation(&self) -> Generation {
        self.lifecycle.generation()
    }

    pub fn state(&self) -> Option<SessionState> {
        self.lifecycle.state()
    }

    pub fn sink(&self) -> &S {
        self.lifecycle.sink()
    }

    /// Process everything already queued or already settled. Returns the
    /// number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;

        loop {
            let before = processed;

            while let Ok(event) = self.events.try_recv() {
                self.dispatch(event);
                processed += 1;
            }
            while let Some(Some(event)) = self.pending_plays.next().now_or_never() {
                self.dispatch(event);
                processed += 1;
            }

            if processed == before {
                return processed;
            }
        }
    }

    /// Wait for the next collaborator event or play outcome and process it.
    ///
    /// With no open session and no pending play, only events already queued
    /// are handled; returns `false` once those run out. While a session is
    /// open this waits until the next event arrives.
    pub async fn next_event(&mut self) -> bool {
        if self.lifecycle.session().is_none() && self.pending_plays.is_empty() {
            return match self.events.try_recv() {
                Ok(event) => {
                    self.dispatch(event);
                    true
                }
                Err(_) => false,
            };
        }

        tokio::select! {
            Some(event) = self.events.recv() => {
                self.dispatch(event);
                true
            }
            Some(event) = self.pending_plays.next(), if !self.pending_plays.is_empty() => {
                self.dispatch(event);
                true
            }
            else => false,
        }
    }

    /// Handle one event. Events from superseded sessions are dropped here.
    pub fn dispatch(&mut self, event: SurfaceEvent) {
        if !self.lifecycle.is_current(event.generation) {
            self.stats.stale_events_dropped += 1;
            debug!(
                event_generation = %event.generation,
                generation = %self.lifecycle.generation(),
                "dropping stale event"
            );
            return;
        }
        if self.lifecycle.state().is_some_and(SessionState::is_terminal) {
            debug!(generation = %event.generation, "session is terminal, event ignored");
            return;
        }

        let progress = event.is_progress();
        match event.kind {
            EventKind::Engine(EngineEvent::ManifestParsed { levels }) => {
                debug!(generation = %event.generation, levels, "manifest parsed");
                self.on_readiness(Readiness::ManifestParsed);
            }
            EventKind::Engine(EngineEvent::FragmentLoaded) => {}
            EventKind::Engine(EngineEvent::Error(e)) => self.handle_error(RawError::Engine(e)),
            EventKind::Sink(SinkEvent::LoadedMetadata) => self.on_readiness(Readiness::Metadata),
            EventKind::Sink(SinkEvent::LoadedData | SinkEvent::CanPlay) => {
                self.on_readiness(Readiness::MediaData)
            }
            EventKind::Sink(SinkEvent::Playing) => {}
            EventKind::Sink(SinkEvent::Stalled) => self.handle_error(RawError::SinkStalled),
            EventKind::Sink(SinkEvent::Error(code)) => {
                self.handle_error(RawError::Sink { code })
            }
            EventKind::PlaySettled(result) => self.on_play_settled(result),
        }

        if progress {
            self.on_progress();
        }
        self.publish();
    }

    fn on_readiness(&mut self, signal: Readiness) {
        if self.lifecycle.on_readiness(signal) {
            self.apply_play_intent();
        }
    }

    fn on_progress(&mut self) {
        let Some(session) = self.lifecycle.session_mut() else {
            return;
        };

        for class in self.policy.progress_resets() {
            session.retries.reset(class);
        }

        if session.state() == SessionState::Recovering && session.transition(SessionState::Ready)
        {
            self.stats.successful_recoveries += 1;
            info!(generation = %session.generation(), "playback recovered");
            self.apply_play_intent();
        }
    }

    fn on_play_settled(&mut self, result: Result<(), PlayRejection>) {
        match result {
            Ok(()) => debug!(generation = %self.lifecycle.generation(), "play request settled"),
            Err(rejection) => {
                if self.intent.on_play_rejected(&rejection) {
                    self.stats.autoplay_blocked += 1;
                }
            }
        }
    }

    fn handle_error(&mut self, raw: RawError) {
        let Some(state) = self.lifecycle.state() else {
            return;
        };

        match classify_error(raw, state) {
            Classification::Error(e) => self.apply_policy(e),
            Classification::AttachRejected(e) => self.escalate(FailureReason::from(e)),
            Classification::Ignored(raw) => {
                self.stats.ignored_signals += 1;
                debug!(%raw, "signal handled by collaborator, ignoring");
            }
        }
    }

    fn apply_policy(&mut self, error: PlaybackError) {
        let Some(session) = self.lifecycle.session_mut() else {
            return;
        };

        match self.policy.decide(&error, session.retries()) {
            Decision::Recover { action, attempt } => {
                if attempt > 0 {
                    session.retries.record(error.class);
                }
                if error.fatal && session.state() == SessionState::Ready {
                    session.transition(SessionState::Recovering);
                }

                let generation = session.generation();
                if error.class == ErrorClass::Stall {
                    debug!(%generation, %action, "buffer stalled, nudging");
                } else {
                    warn!(
                        %generation,
                        class = %error.class,
                        %action,
                        attempt,
                        raw = %error.raw,
                        "recovering from playback error"
                    );
                }

                self.stats.record_recovery(error.class);
                self.lifecycle.execute(action);
            }
            Decision::Escalate(reason) => self.escalate(reason),
            Decision::Ignore => {
                self.stats.ignored_signals += 1;
                debug!(class = %error.class, "no recovery configured, ignoring");
            }
        }
    }

    fn escalate(&mut self, reason: FailureReason) {
        error!(
            surface = %self.id,
            generation = %self.lifecycle.generation(),
            %reason,
            "playback session failed"
        );
        self.lifecycle.fail(reason);
        self.stats.record_failure();
    }

    fn apply_play_intent(&mut self) {
        if let Some(play) = self.intent.on_ready(self.lifecycle.sink_mut()) {
            self.track_play(play);
        }
    }

    fn track_play(&mut self, play: PlayFuture) {
        let generation = self.lifecycle.generation();
        self.pending_plays
            .push(async move { SurfaceEvent::play_settled(generation, play.await) }.boxed_local());
    }

    fn publish(&self) {
        let Some(session) = self.lifecycle.session() else {
            return;
        };

        let next = PlaybackStatus {
            generation: session.generation(),
            state: session.state(),
            loaded: session.loaded(),
            failed: session.state() == SessionState::Failed,
            failure: session.failure().cloned(),
        };
        self.status.send_if_modified(|status| {
            if *status == next {
                return false;
            }
            *status = next;
            true
        });
    }
}
