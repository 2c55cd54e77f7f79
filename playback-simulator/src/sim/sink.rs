// 模拟媒体输出
//
// 每次绑定新的会话代数时按脚本启动一组定时的输出事件；`play()` 在短暂延迟后
// 以配置的结果完成，用来模拟自动播放拦截。

use std::time::Duration;

use common::{Generation, PlayRejection};
use futures::FutureExt;
use playback_core::{EventEmitter, MediaSink, PlayFuture, Rejection};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::debug;

use super::script::{CallLog, ScriptBook};

const PLAY_SETTLE_DELAY: Duration = Duration::from_millis(5);

pub struct SimSink {
    scripts: ScriptBook,
    log: CallLog,
    generation: Generation,
    muted: bool,
    play_result: Result<(), PlayRejection>,
}

impl SimSink {
    pub fn new(scripts: ScriptBook, log: CallLog) -> Self {
        Self {
            scripts,
            log,
            generation: Generation::NONE,
            muted: false,
            play_result: Ok(()),
        }
    }

    pub fn blocking_play(mut self, rejection: PlayRejection) -> Self {
        self.play_result = Err(rejection);
        self
    }
}

impl MediaSink for SimSink {
    fn bind(&mut self, events: EventEmitter) {
        self.generation = events.generation();
        self.log.record("sink", self.generation, "bind");

        let cues = self
            .scripts
            .for_generation(self.generation)
            .map(|script| script.sink.clone())
            .unwrap_or_default();
        let started = Instant::now();
        tokio::task::spawn_local(async move {
            for cue in cues {
                sleep_until(started + cue.at).await;
                debug!(generation = %events.generation(), event = ?cue.event, "sink emits");
                if !events.sink(cue.event) {
                    break;
                }
            }
        });
    }

    fn set_source(&mut self, url: &str) -> Result<(), Rejection> {
        self.log
            .record("sink", self.generation, format!("set_source {url}"));
        Ok(())
    }

    fn clear_source(&mut self) {
        self.log.record("sink", self.generation, "clear_source");
    }

    fn reload(&mut self) {
        self.log.record("sink", self.generation, "reload");
    }

    fn set_muted(&mut self, muted: bool) {
        self.log
            .record("sink", self.generation, format!("set_muted {muted}"));
        self.muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn play(&mut self) -> PlayFuture {
        self.log.record("sink", self.generation, "play");
        let result = self.play_result.clone();
        sleep(PLAY_SETTLE_DELAY).map(move |_| result).boxed_local()
    }

    fn pause(&mut self) {
        self.log.record("sink", self.generation, "pause");
    }
}
