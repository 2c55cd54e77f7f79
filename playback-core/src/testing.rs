// Recording collaborators for tests
//
// Both doubles share their state through `Rc<RefCell<..>>`, so a test keeps a
// handle after moving a clone into the surface.

use std::cell::RefCell;
use std::rc::Rc;

use common::{EngineEvent, Generation, PlayRejection, SinkEvent};
use futures::FutureExt;

use crate::streaming::{
    EngineOptions, EventEmitter, MediaSink, PlayFuture, Rejection, StreamingEngine,
    StreamingEngineFactory,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Bind(Generation),
    SetSource(String),
    ClearSource,
    Reload,
    SetMuted(bool),
    Play,
    Pause,
}

struct SinkState {
    calls: Vec<SinkCall>,
    muted: bool,
    emitter: Option<EventEmitter>,
    play_result: Result<(), PlayRejection>,
    reject_source: Option<String>,
}

#[derive(Clone)]
pub struct RecordingSink {
    state: Rc<RefCell<SinkState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SinkState {
                calls: Vec::new(),
                muted: false,
                emitter: None,
                play_result: Ok(()),
                reject_source: None,
            })),
        }
    }

    /// Sink whose `play()` always fails with `rejection`.
    pub fn blocking_play(rejection: PlayRejection) -> Self {
        let sink = Self::new();
        sink.state.borrow_mut().play_result = Err(rejection);
        sink
    }

    /// Sink whose `set_source` always fails.
    pub fn rejecting_source(reason: &str) -> Self {
        let sink = Self::new();
        sink.state.borrow_mut().reject_source = Some(reason.to_string());
        sink
    }

    pub fn set_play_result(&self, result: Result<(), PlayRejection>) {
        self.state.borrow_mut().play_result = result;
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn count(&self, call: &SinkCall) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    pub fn muted(&self) -> bool {
        self.state.borrow().muted
    }

    /// Emitter of the most recent binding.
    pub fn emitter(&self) -> Option<EventEmitter> {
        self.state.borrow().emitter.clone()
    }

    pub fn emit(&self, event: SinkEvent) -> bool {
        self.emitter().is_some_and(|emitter| emitter.sink(event))
    }
}

impl MediaSink for RecordingSink {
    fn bind(&mut self, events: EventEmitter) {
        let mut state = self.state.borrow_mut();
        state.calls.push(SinkCall::Bind(events.generation()));
        state.emitter = Some(events);
    }

    fn set_source(&mut self, url: &str) -> Result<(), Rejection> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = &state.reject_source {
            return Err(Rejection::new(reason.clone()));
        }
        state.calls.push(SinkCall::SetSource(url.to_string()));
        Ok(())
    }

    fn clear_source(&mut self) {
        self.state.borrow_mut().calls.push(SinkCall::ClearSource);
    }

    fn reload(&mut self) {
        self.state.borrow_mut().calls.push(SinkCall::Reload);
    }

    fn set_muted(&mut self, muted: bool) {
        let mut state = self.state.borrow_mut();
        state.calls.push(SinkCall::SetMuted(muted));
        state.muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.state.borrow().muted
    }

    fn play(&mut self) -> PlayFuture {
        let mut state = self.state.borrow_mut();
        state.calls.push(SinkCall::Play);
        futures::future::ready(state.play_result.clone()).boxed_local()
    }

    fn pause(&mut self) {
        self.state.borrow_mut().calls.push(SinkCall::Pause);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Construct,
    LoadSource(String),
    AttachToSink,
    StartLoad,
    RecoverMediaError,
    RecoverBuffer,
    Destroy,
}

#[derive(Default)]
struct FactoryState {
    unsupported: bool,
    construct_error: Option<String>,
    load_error: Option<String>,
    options: Vec<EngineOptions>,
    calls: Vec<(Generation, EngineCall)>,
    emitters: Vec<EventEmitter>,
}

#[derive(Clone, Default)]
pub struct RecordingEngineFactory {
    state: Rc<RefCell<FactoryState>>,
}

impl RecordingEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose capability probe fails, forcing native playback.
    pub fn unsupported() -> Self {
        let factory = Self::new();
        factory.state.borrow_mut().unsupported = true;
        factory
    }

    pub fn failing_construct(reason: &str) -> Self {
        let factory = Self::new();
        factory.state.borrow_mut().construct_error = Some(reason.to_string());
        factory
    }

    pub fn rejecting_source(reason: &str) -> Self {
        let factory = Self::new();
        factory.state.borrow_mut().load_error = Some(reason.to_string());
        factory
    }

    pub fn boxed(&self) -> Box<dyn StreamingEngineFactory> {
        Box::new(self.clone())
    }

    pub fn calls(&self) -> Vec<(Generation, EngineCall)> {
        self.state.borrow().calls.clone()
    }

    pub fn calls_for(&self, generation: Generation) -> Vec<EngineCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|(g, _)| *g == generation)
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn count(&self, generation: Generation, call: &EngineCall) -> usize {
        self.calls_for(generation)
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    pub fn options(&self) -> Vec<EngineOptions> {
        self.state.borrow().options.clone()
    }

    pub fn emitter(&self, generation: Generation) -> Option<EventEmitter> {
        self.state
            .borrow()
            .emitters
            .iter()
            .rev()
            .find(|emitter| emitter.generation() == generation)
            .cloned()
    }

    pub fn emit(&self, generation: Generation, event: EngineEvent) -> bool {
        self.emitter(generation)
            .is_some_and(|emitter| emitter.engine(event))
    }
}

impl StreamingEngineFactory for RecordingEngineFactory {
    fn is_supported(&self) -> bool {
        !self.state.borrow().unsupported
    }

    fn construct(
        &self,
        options: &EngineOptions,
        events: EventEmitter,
    ) -> Result<Box<dyn StreamingEngine>, Rejection> {
        let mut state = self.state.borrow_mut();
        let generation = events.generation();
        if let Some(reason) = &state.construct_error {
            return Err(Rejection::new(reason.clone()));
        }

        state.calls.push((generation, EngineCall::Construct));
        state.options.push(options.clone());
        state.emitters.push(events);

        Ok(Box::new(RecordingEngine {
            generation,
            state: Rc::clone(&self.state),
        }))
    }
}

struct RecordingEngine {
    generation: Generation,
    state: Rc<RefCell<FactoryState>>,
}

impl RecordingEngine {
    fn record(&self, call: EngineCall) {
        self.state.borrow_mut().calls.push((self.generation, call));
    }
}

impl StreamingEngine for RecordingEngine {
    fn load_source(&mut self, url: &str) -> Result<(), Rejection> {
        if let Some(reason) = self.state.borrow().load_error.clone() {
            return Err(Rejection::new(reason));
        }
        self.record(EngineCall::LoadSource(url.to_string()));
        Ok(())
    }

    fn attach_to_sink(&mut self, _sink: &mut dyn MediaSink) -> Result<(), Rejection> {
        self.record(EngineCall::AttachToSink);
        Ok(())
    }

    fn start_load(&mut self) {
        self.record(EngineCall::StartLoad);
    }

    fn recover_media_error(&mut self) {
        self.record(EngineCall::RecoverMediaError);
    }

    fn recover_buffer(&mut self) {
        self.record(EngineCall::RecoverBuffer);
    }

    fn destroy(&mut self) {
        self.record(EngineCall::Destroy);
    }
}
