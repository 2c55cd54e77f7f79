use crate::protocol::RawError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Network,
    Media,
    Stall,
    Unknown,
}

impl ErrorClass {
    pub const ALL: [ErrorClass; 4] = [
        ErrorClass::Network,
        ErrorClass::Media,
        ErrorClass::Stall,
        ErrorClass::Unknown,
    ];

    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorClass::Stall)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Network => "network",
            ErrorClass::Media => "media",
            ErrorClass::Stall => "stall",
            ErrorClass::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classified playback error. Transient, never persisted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{class} error (fatal: {fatal}): {raw}")]
pub struct PlaybackError {
    pub class: ErrorClass,
    pub fatal: bool,
    pub raw: RawError,
}

impl PlaybackError {
    pub fn new(class: ErrorClass, raw: RawError) -> Self {
        Self {
            class,
            fatal: class.is_fatal(),
            raw,
        }
    }
}

/// Source rejected outright while attaching
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum AttachError {
    #[error("streaming engine construction failed: {0}")]
    EngineConstruction(String),

    #[error("streaming engine rejected source: {0}")]
    EngineRejected(String),

    #[error("media sink rejected source: {0}")]
    SinkRejected(String),
}

/// Why a session reached `Failed`
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("attach failed: {error}")]
    AttachFailure { error: AttachError },

    #[error("{class} recovery exhausted after {attempts} attempt(s)")]
    RetriesExhausted { class: ErrorClass, attempts: u32 },

    #[error("unrecoverable error: {detail}")]
    UnknownFatal { detail: String },
}

impl FailureReason {
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            FailureReason::AttachFailure { .. } => None,
            FailureReason::RetriesExhausted { class, .. } => Some(*class),
            FailureReason::UnknownFatal { .. } => Some(ErrorClass::Unknown),
        }
    }
}

impl From<AttachError> for FailureReason {
    fn from(error: AttachError) -> Self {
        FailureReason::AttachFailure { error }
    }
}
