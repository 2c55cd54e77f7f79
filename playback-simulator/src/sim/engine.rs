// 模拟流引擎
//
// 构造时启动一个本地任务，按脚本把引擎事件发回给播放面。销毁不会取消已在
// 途中的事件，迟到的事件交给代数守卫过滤。

use common::{EngineEvent, Generation};
use playback_core::{
    EngineOptions, EventEmitter, MediaSink, Rejection, StreamingEngine, StreamingEngineFactory,
};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use super::script::{CallLog, Cue, ScriptBook};

pub struct SimEngineFactory {
    supported: bool,
    load_error: Option<String>,
    scripts: ScriptBook,
    log: CallLog,
}

impl SimEngineFactory {
    pub fn new(scripts: ScriptBook, log: CallLog) -> Self {
        Self {
            supported: true,
            load_error: None,
            scripts,
            log,
        }
    }

    /// Host without engine support, manifests fall back to the sink.
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn rejecting_source(mut self, reason: &str) -> Self {
        self.load_error = Some(reason.to_string());
        self
    }
}

impl StreamingEngineFactory for SimEngineFactory {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn construct(
        &self,
        options: &EngineOptions,
        events: EventEmitter,
    ) -> Result<Box<dyn StreamingEngine>, Rejection> {
        let generation = events.generation();
        self.log.record(
            "engine",
            generation,
            format!(
                "construct (low_latency: {}, max_buffer: {:?})",
                options.low_latency, options.max_buffer_length
            ),
        );

        let cues = self
            .scripts
            .for_generation(generation)
            .map(|script| script.engine.clone())
            .unwrap_or_default();
        spawn_cues(events, cues);

        Ok(Box::new(SimEngine {
            generation,
            load_error: self.load_error.clone(),
            log: self.log.clone(),
        }))
    }
}

fn spawn_cues(events: EventEmitter, cues: Vec<Cue<EngineEvent>>) {
    let started = Instant::now();
    tokio::task::spawn_local(async move {
        for cue in cues {
            sleep_until(started + cue.at).await;
            debug!(generation = %events.generation(), event = ?cue.event, "engine emits");
            if !events.engine(cue.event) {
                break;
            }
        }
    });
}

struct SimEngine {
    generation: Generation,
    load_error: Option<String>,
    log: CallLog,
}

impl StreamingEngine for SimEngine {
    fn load_source(&mut self, url: &str) -> Result<(), Rejection> {
        self.log
            .record("engine", self.generation, format!("load_source {url}"));
        match &self.load_error {
            Some(reason) => Err(Rejection::new(reason.clone())),
            None => Ok(()),
        }
    }

    fn attach_to_sink(&mut self, _sink: &mut dyn MediaSink) -> Result<(), Rejection> {
        self.log.record("engine", self.generation, "attach_to_sink");
        Ok(())
    }

    fn start_load(&mut self) {
        info!(generation = %self.generation, "🔄 Engine restarting load");
        self.log.record("engine", self.generation, "start_load");
    }

    fn recover_media_error(&mut self) {
        info!(generation = %self.generation, "🔄 Engine recovering media pipeline");
        self.log.record("engine", self.generation, "recover_media_error");
    }

    fn recover_buffer(&mut self) {
        self.log.record("engine", self.generation, "recover_buffer");
    }

    fn destroy(&mut self) {
        self.log.record("engine", self.generation, "destroy");
    }
}
