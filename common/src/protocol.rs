// Playback resilience controller - collaborator event protocol
//
// Every signal coming back from the Streaming Engine, the Media Sink or a
// pending play request travels as a `SurfaceEvent` stamped with the
// generation of the session that produced it.

use crate::types::Generation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Streaming engine error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    Network,
    Media,
    KeySystem,
    Mux,
    Other,
}

/// Streaming engine error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorDetail {
    ManifestLoadError,
    ManifestLoadTimeout,
    ManifestParsingError,
    LevelLoadError,
    FragmentLoadError,
    FragmentLoadTimeout,
    BufferStalled,
    BufferAppendError,
    InternalException,
    Other(String),
}

impl EngineErrorDetail {
    pub fn is_buffer_stall(&self) -> bool {
        matches!(self, EngineErrorDetail::BufferStalled)
    }
}

/// Error payload of the engine `error` event: `{ type, fatal, detail }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub fatal: bool,
    pub detail: EngineErrorDetail,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, fatal: bool, detail: EngineErrorDetail) -> Self {
        Self {
            kind,
            fatal,
            detail,
        }
    }

    pub fn network(detail: EngineErrorDetail) -> Self {
        Self::new(EngineErrorKind::Network, true, detail)
    }

    pub fn media(detail: EngineErrorDetail) -> Self {
        Self::new(EngineErrorKind::Media, true, detail)
    }

    pub fn buffer_stalled() -> Self {
        Self::new(EngineErrorKind::Media, false, EngineErrorDetail::BufferStalled)
    }
}

/// Media element error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
}

/// Raw error signal before classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum RawError {
    Engine(EngineError),
    Sink { code: MediaErrorCode },
    SinkStalled,
}

impl fmt::Display for RawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawError::Engine(error) => write!(
                f,
                "engine {:?}/{:?} (fatal: {})",
                error.kind, error.detail, error.fatal
            ),
            RawError::Sink { code } => write!(f, "sink error {:?}", code),
            RawError::SinkStalled => write!(f, "sink stalled"),
        }
    }
}

/// Streaming engine events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineEvent {
    ManifestParsed { levels: usize },
    FragmentLoaded,
    Error(EngineError),
}

/// Media sink events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkEvent {
    LoadedMetadata,
    LoadedData,
    CanPlay,
    Playing,
    Stalled,
    Error(MediaErrorCode),
}

/// Why a play request was refused by the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum PlayRejection {
    #[error("play not allowed without user gesture")]
    NotAllowed,
    #[error("play interrupted by a newer load or pause")]
    Interrupted,
    #[error("play rejected: {0}")]
    Other(String),
}

/// Event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Engine(EngineEvent),
    Sink(SinkEvent),
    PlaySettled(Result<(), PlayRejection>),
}

/// Generation-stamped event delivered to a playback surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceEvent {
    pub generation: Generation,
    pub kind: EventKind,
}

impl SurfaceEvent {
    pub fn engine(generation: Generation, event: EngineEvent) -> Self {
        Self {
            generation,
            kind: EventKind::Engine(event),
        }
    }

    pub fn sink(generation: Generation, event: SinkEvent) -> Self {
        Self {
            generation,
            kind: EventKind::Sink(event),
        }
    }

    pub fn play_settled(generation: Generation, result: Result<(), PlayRejection>) -> Self {
        Self {
            generation,
            kind: EventKind::PlaySettled(result),
        }
    }

    /// Signals that the pipeline is making forward progress.
    pub fn is_progress(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Engine(EngineEvent::ManifestParsed { .. })
                | EventKind::Engine(EngineEvent::FragmentLoaded)
                | EventKind::Sink(SinkEvent::LoadedData)
                | EventKind::Sink(SinkEvent::CanPlay)
                | EventKind::Sink(SinkEvent::Playing)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_events() {
        let generation = Generation::new(3);

        assert!(SurfaceEvent::engine(generation, EngineEvent::FragmentLoaded).is_progress());
        assert!(SurfaceEvent::sink(generation, SinkEvent::CanPlay).is_progress());
        assert!(!SurfaceEvent::sink(generation, SinkEvent::Stalled).is_progress());
        assert!(!SurfaceEvent::engine(
            generation,
            EngineEvent::Error(EngineError::buffer_stalled())
        )
        .is_progress());
        assert!(!SurfaceEvent::play_settled(generation, Ok(())).is_progress());
    }

    #[test]
    fn test_engine_error_constructors() {
        let network = EngineError::network(EngineErrorDetail::FragmentLoadError);
        assert_eq!(network.kind, EngineErrorKind::Network);
        assert!(network.fatal);

        let stall = EngineError::buffer_stalled();
        assert!(!stall.fatal);
        assert!(stall.detail.is_buffer_stall());
    }

    #[test]
    fn test_raw_error_serialization() {
        let raw = RawError::Sink {
            code: MediaErrorCode::Decode,
        };
        let json = serde_json::to_string(&raw).unwrap();

        assert!(json.contains("\"origin\":\"sink\""));
        assert!(json.contains("decode"));
    }
}
