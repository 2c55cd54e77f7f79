// Playback resilience controller - external collaborator interfaces
//
// The Streaming Engine (manifest parsing, segment fetching, bitrate
// selection) and the Media Sink (decode/render) are consumed through these
// traits. Both report back asynchronously through an `EventEmitter` stamped
// with the generation of the session that owns them.

use std::fmt;
use std::time::Duration;

use common::{EngineEvent, Generation, PlayRejection, SinkEvent, SurfaceEvent};
use futures::future::LocalBoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::EngineConfig;

/// Future returned by `MediaSink::play`
pub type PlayFuture = LocalBoxFuture<'static, Result<(), PlayRejection>>;

/// A collaborator refused an operation outright
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct Rejection(pub String);

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Generation-stamped event channel handed to collaborators
#[derive(Clone)]
pub struct EventEmitter {
    generation: Generation,
    tx: mpsc::UnboundedSender<SurfaceEvent>,
}

impl EventEmitter {
    pub(crate) fn new(generation: Generation, tx: mpsc::UnboundedSender<SurfaceEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns `false` once the owning surface is gone.
    pub fn engine(&self, event: EngineEvent) -> bool {
        self.tx
            .send(SurfaceEvent::engine(self.generation, event))
            .is_ok()
    }

    /// Returns `false` once the owning surface is gone.
    pub fn sink(&self, event: SinkEvent) -> bool {
        self.tx
            .send(SurfaceEvent::sink(self.generation, event))
            .is_ok()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Options passed to `StreamingEngineFactory::construct`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub low_latency: bool,
    pub max_buffer_length: Duration,
    pub debug: bool,
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            low_latency: config.low_latency,
            max_buffer_length: config.max_buffer_length,
            debug: config.debug,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Capability probe and constructor for the streaming engine
pub trait StreamingEngineFactory {
    /// Whether the host environment can run the engine at all.
    fn is_supported(&self) -> bool;

    /// Build an engine whose `manifest_parsed` / `error` events go to `events`.
    fn construct(
        &self,
        options: &EngineOptions,
        events: EventEmitter,
    ) -> Result<Box<dyn StreamingEngine>, Rejection>;
}

/// One streaming engine instance, owned by exactly one session
pub trait StreamingEngine {
    fn load_source(&mut self, url: &str) -> Result<(), Rejection>;

    fn attach_to_sink(&mut self, sink: &mut dyn MediaSink) -> Result<(), Rejection>;

    /// Restart manifest/segment loading after a network failure.
    fn start_load(&mut self);

    /// Re-initialize the decode pipeline without re-fetching the manifest.
    fn recover_media_error(&mut self);

    /// Lightweight attempt to refill a starved buffer.
    fn recover_buffer(&mut self);

    fn destroy(&mut self);
}

/// The rendering element shared by every session of a surface
pub trait MediaSink {
    /// Route `can_play` / `loaded_data` / `error` listeners to `events`.
    fn bind(&mut self, events: EventEmitter);

    fn set_source(&mut self, url: &str) -> Result<(), Rejection>;

    fn clear_source(&mut self);

    /// Re-fetch the current source from scratch.
    fn reload(&mut self);

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;

    fn play(&mut self) -> PlayFuture;

    fn pause(&mut self);
}
