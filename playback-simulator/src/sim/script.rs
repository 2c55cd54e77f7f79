use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use common::{EngineEvent, Generation, SinkEvent};
use tokio::time::Instant;

/// One scripted event, `at` relative to the moment the session was opened
#[derive(Debug, Clone)]
pub struct Cue<E> {
    pub at: Duration,
    pub event: E,
}

impl<E> Cue<E> {
    pub fn at_ms(ms: u64, event: E) -> Self {
        Self {
            at: Duration::from_millis(ms),
            event,
        }
    }
}

/// What the collaborators of one opened session will emit
#[derive(Debug, Clone, Default)]
pub struct SessionScript {
    pub engine: Vec<Cue<EngineEvent>>,
    pub sink: Vec<Cue<SinkEvent>>,
}

impl SessionScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(mut self, ms: u64, event: EngineEvent) -> Self {
        self.engine.push(Cue::at_ms(ms, event));
        self
    }

    pub fn sink(mut self, ms: u64, event: SinkEvent) -> Self {
        self.sink.push(Cue::at_ms(ms, event));
        self
    }
}

/// Scripts indexed by generation, shared by the simulated engine and sink
#[derive(Debug, Clone, Default)]
pub struct ScriptBook {
    sessions: Rc<Vec<SessionScript>>,
}

impl ScriptBook {
    pub fn new(sessions: Vec<SessionScript>) -> Self {
        Self {
            sessions: Rc::new(sessions),
        }
    }

    pub fn for_generation(&self, generation: Generation) -> Option<&SessionScript> {
        let index = generation.value().checked_sub(1)?;
        self.sessions.get(usize::try_from(index).ok()?)
    }
}

/// Ordered record of every collaborator call, for the report
#[derive(Debug, Clone)]
pub struct CallLog {
    started: Instant,
    calls: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn record(&self, who: &str, generation: Generation, what: impl AsRef<str>) {
        let elapsed = self.started.elapsed().as_millis();
        self.calls
            .borrow_mut()
            .push(format!("{elapsed:>5}ms {who} {generation} {}", what.as_ref()));
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Default for CallLog {
    fn default() -> Self {
        Self::new()
    }
}
