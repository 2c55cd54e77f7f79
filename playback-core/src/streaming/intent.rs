// Playback resilience controller - playback intent coordinator
//
// Keeps what the host wants (playing, muted) separate from what the sink can
// currently do, and reconciles the two whenever a session becomes ready.

use common::{PlayRejection, SessionState, SourceDescriptor};
use tracing::{debug, info};

use super::collaborator::{MediaSink, PlayFuture};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentCoordinator {
    desired_playing: bool,
    desired_muted: bool,
}

impl IntentCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desired_playing(&self) -> bool {
        self.desired_playing
    }

    pub fn desired_muted(&self) -> bool {
        self.desired_muted
    }

    /// Seed intent from a freshly opened descriptor.
    pub fn reset(&mut self, descriptor: &SourceDescriptor) {
        self.desired_playing = descriptor.desired_playing;
        self.desired_muted = descriptor.desired_muted;
    }

    /// Record a play/pause intent and apply it if the session is ready.
    ///
    /// Returns the pending play request when one was issued. Terminal
    /// sessions get nothing.
    pub fn set_playing<S: MediaSink>(
        &mut self,
        playing: bool,
        state: Option<SessionState>,
        sink: &mut S,
    ) -> Option<PlayFuture> {
        if state.is_some_and(SessionState::is_terminal) {
            debug!(playing, "ignoring play intent for terminal session");
            return None;
        }

        self.desired_playing = playing;
        match state {
            Some(SessionState::Ready) if playing => Some(sink.play()),
            // the element keeps playing through recovery, so a pause cannot wait
            Some(SessionState::Ready | SessionState::Recovering) if !playing => {
                sink.pause();
                None
            }
            _ => {
                debug!(playing, "play intent queued until session is ready");
                None
            }
        }
    }

    /// Apply mute to the sink. No-op when the sink already matches.
    pub fn set_muted<S: MediaSink>(&mut self, muted: bool, sink: &mut S) {
        self.desired_muted = muted;
        if sink.is_muted() != muted {
            sink.set_muted(muted);
        }
    }

    /// Issue the queued play, if any, once the session reaches `Ready`.
    pub fn on_ready<S: MediaSink>(&mut self, sink: &mut S) -> Option<PlayFuture> {
        self.desired_playing.then(|| sink.play())
    }

    /// Handle a refused play request. Returns `true` when it counts as an
    /// autoplay block.
    ///
    /// A block clears the play intent so recovery does not retry it; only a
    /// new explicit `set_playing(true)` resumes playback.
    pub fn on_play_rejected(&mut self, rejection: &PlayRejection) -> bool {
        match rejection {
            PlayRejection::Interrupted => {
                debug!("play request interrupted");
                false
            }
            PlayRejection::NotAllowed | PlayRejection::Other(_) => {
                info!(%rejection, "play request blocked, staying paused");
                self.desired_playing = false;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSink, SinkCall};

    #[test]
    fn test_play_before_ready_is_queued() {
        let mut sink = RecordingSink::new();
        let mut intent = IntentCoordinator::new();

        assert!(intent
            .set_playing(true, Some(SessionState::Attaching), &mut sink)
            .is_none());
        assert!(intent.desired_playing());
        assert!(sink.calls().is_empty());

        assert!(intent.on_ready(&mut sink).is_some());
        assert_eq!(sink.calls(), vec![SinkCall::Play]);
    }

    #[test]
    fn test_pause_when_ready() {
        let mut sink = RecordingSink::new();
        let mut intent = IntentCoordinator::new();

        intent.set_playing(false, Some(SessionState::Ready), &mut sink);

        assert_eq!(sink.calls(), vec![SinkCall::Pause]);
        assert!(intent.on_ready(&mut sink).is_none());
    }

    #[test]
    fn test_pause_during_recovery_is_immediate() {
        let mut sink = RecordingSink::new();
        let mut intent = IntentCoordinator::new();

        intent.set_playing(false, Some(SessionState::Recovering), &mut sink);

        assert_eq!(sink.calls(), vec![SinkCall::Pause]);
        assert!(intent.on_ready(&mut sink).is_none());
    }

    #[test]
    fn test_terminal_session_ignores_intent() {
        let mut sink = RecordingSink::new();
        let mut intent = IntentCoordinator::new();

        assert!(intent
            .set_playing(true, Some(SessionState::Failed), &mut sink)
            .is_none());
        assert!(!intent.desired_playing());
        assert!(sink.calls().is_empty());
    }

    #[test]
    fn test_mute_is_idempotent() {
        let mut sink = RecordingSink::new();
        let mut intent = IntentCoordinator::new();

        intent.set_muted(true, &mut sink);
        intent.set_muted(true, &mut sink);
        intent.set_muted(false, &mut sink);

        assert_eq!(
            sink.calls(),
            vec![SinkCall::SetMuted(true), SinkCall::SetMuted(false)]
        );
    }

    #[test]
    fn test_blocked_play_clears_intent() {
        let mut intent = IntentCoordinator::new();
        intent.reset(&SourceDescriptor::new("a.mp4").playing(true));

        assert!(intent.on_play_rejected(&PlayRejection::NotAllowed));
        assert!(!intent.desired_playing());
    }

    #[test]
    fn test_interrupted_play_keeps_intent() {
        let mut intent = IntentCoordinator::new();
        intent.reset(&SourceDescriptor::new("a.mp4").playing(true));

        assert!(!intent.on_play_rejected(&PlayRejection::Interrupted));
        assert!(intent.desired_playing());
    }
}
