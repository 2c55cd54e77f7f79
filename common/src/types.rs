use serde::{Deserialize, Serialize};
use std::fmt;

/// 播放源描述
///
/// Immutable once a session has been created from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub url: String,
    pub desired_muted: bool,
    pub desired_playing: bool,
}

impl SourceDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            desired_muted: false,
            desired_playing: false,
        }
    }

    pub fn muted(mut self, muted: bool) -> Self {
        self.desired_muted = muted;
        self
    }

    pub fn playing(mut self, playing: bool) -> Self {
        self.desired_playing = playing;
        self
    }
}

/// 播放模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Segment manifest, adaptive streaming
    Manifest,
    /// Single file, direct playback
    Progressive,
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackMode::Manifest => write!(f, "manifest"),
            PlaybackMode::Progressive => write!(f, "progressive"),
        }
    }
}

/// Attach-attempt counter used to tag sessions and every event they produce.
///
/// `Generation::NONE` is the value of a surface that has never opened a
/// source; the first `open` yields generation 1.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub const NONE: Generation = Generation(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 会话状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Attaching,
    ManifestParsed,
    NativeReady,
    Ready,
    Recovering,
    Failed,
    Destroyed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Destroyed)
    }

    /// Whether the transition `self -> next` is part of the session state table.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (current, Destroyed) => !current.is_terminal(),
            (Idle, Attaching) => true,
            (Attaching, ManifestParsed | NativeReady | Failed) => true,
            (ManifestParsed | NativeReady, Ready | Failed) => true,
            (Ready, Recovering | Failed) => true,
            (Recovering, Ready | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Attaching => "attaching",
            SessionState::ManifestParsed => "manifest_parsed",
            SessionState::NativeReady => "native_ready",
            SessionState::Ready => "ready",
            SessionState::Recovering => "recovering",
            SessionState::Failed => "failed",
            SessionState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}
