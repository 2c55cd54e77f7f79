// 故障场景
//
// 每个场景在全新的播放面上运行：按时间表执行宿主操作（open / set_playing /
// set_muted），由模拟协作者按脚本发出事件，等待事件平息后输出 JSON 报告。

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use common::{
    EngineError, EngineErrorDetail, EngineErrorKind, EngineEvent, FailureReason, Generation,
    PlayRejection, SessionState, SinkEvent, SourceDescriptor,
};
use playback_core::{ControllerConfig, MediaSink, PlaybackSurface, SurfaceStats};
use serde::Serialize;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{info, warn};

use crate::sim::{CallLog, ScriptBook, SessionScript, SimEngineFactory, SimSink};

const MANIFEST_URL: &str = "https://cdn.example.com/live/master.m3u8";
const ALT_MANIFEST_URL: &str = "https://cdn.example.com/live/backup.m3u8";
const PROGRESSIVE_URL: &str = "https://cdn.example.com/vod/clip.mp4";

/// Quiet period after which a scenario counts as settled
const SETTLE_QUIET: Duration = Duration::from_millis(200);
/// Hard stop for a single scenario
const SCENARIO_LIMIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Manifest,
    NativeManifest,
    Progressive,
    NetworkBlip,
    NetworkStorm,
    MediaFault,
    MediaExhausted,
    StallStorm,
    UnknownFatal,
    AttachRejected,
    AutoplayBlocked,
    Supersede,
}

impl Scenario {
    pub const ALL: [Scenario; 12] = [
        Scenario::Manifest,
        Scenario::NativeManifest,
        Scenario::Progressive,
        Scenario::NetworkBlip,
        Scenario::NetworkStorm,
        Scenario::MediaFault,
        Scenario::MediaExhausted,
        Scenario::StallStorm,
        Scenario::UnknownFatal,
        Scenario::AttachRejected,
        Scenario::AutoplayBlocked,
        Scenario::Supersede,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Manifest => "manifest",
            Scenario::NativeManifest => "native-manifest",
            Scenario::Progressive => "progressive",
            Scenario::NetworkBlip => "network-blip",
            Scenario::NetworkStorm => "network-storm",
            Scenario::MediaFault => "media-fault",
            Scenario::MediaExhausted => "media-exhausted",
            Scenario::StallStorm => "stall-storm",
            Scenario::UnknownFatal => "unknown-fatal",
            Scenario::AttachRejected => "attach-rejected",
            Scenario::AutoplayBlocked => "autoplay-blocked",
            Scenario::Supersede => "supersede",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Scenario::Manifest => "manifest source played through the streaming engine",
            Scenario::NativeManifest => "manifest source on a host without engine support",
            Scenario::Progressive => "single-file source bound directly to the sink",
            Scenario::NetworkBlip => "one segment fetch failure followed by progress",
            Scenario::NetworkStorm => "segment fetch fails again right after the restart",
            Scenario::MediaFault => "decode faults recovered in place",
            Scenario::MediaExhausted => "decode faults beyond the recovery bound",
            Scenario::StallStorm => "sustained buffer starvation",
            Scenario::UnknownFatal => "unclassified fatal engine error",
            Scenario::AttachRejected => "engine rejects the source while attaching",
            Scenario::AutoplayBlocked => "sink refuses unmuted autoplay",
            Scenario::Supersede => "second source opened while the first is still attaching",
        }
    }

    fn plan(self) -> Plan {
        let manifest = SourceDescriptor::new(MANIFEST_URL);
        let progressive = SourceDescriptor::new(PROGRESSIVE_URL);

        match self {
            Scenario::Manifest => Plan::open(
                manifest.playing(true).muted(true),
                SessionScript::new()
                    .engine(40, EngineEvent::ManifestParsed { levels: 4 })
                    .engine(80, EngineEvent::FragmentLoaded)
                    .sink(90, SinkEvent::CanPlay)
                    .engine(120, EngineEvent::FragmentLoaded)
                    .sink(130, SinkEvent::Playing),
                Expectation::ready(),
            )
            .then(150, HostAction::SetMuted(false)),
            Scenario::NativeManifest => Plan::open(
                manifest.playing(true).muted(true),
                SessionScript::new()
                    .sink(40, SinkEvent::LoadedMetadata)
                    .sink(60, SinkEvent::CanPlay)
                    .sink(90, SinkEvent::Playing),
                Expectation::ready(),
            )
            .without_engine()
            .then(120, HostAction::SetPlaying(false)),
            Scenario::Progressive => Plan::open(
                progressive,
                SessionScript::new()
                    .sink(20, SinkEvent::LoadedMetadata)
                    .sink(30, SinkEvent::LoadedData)
                    .sink(45, SinkEvent::CanPlay),
                Expectation::ready(),
            ),
            Scenario::NetworkBlip => Plan::open(
                manifest,
                SessionScript::new()
                    .engine(30, EngineEvent::ManifestParsed { levels: 3 })
                    .engine(70, network_error())
                    .engine(110, EngineEvent::FragmentLoaded),
                Expectation::ready(),
            ),
            Scenario::NetworkStorm => Plan::open(
                manifest,
                SessionScript::new()
                    .engine(30, EngineEvent::ManifestParsed { levels: 3 })
                    .engine(70, network_error())
                    .engine(80, network_error()),
                Expectation::failed(true),
            ),
            Scenario::MediaFault => Plan::open(
                manifest,
                SessionScript::new()
                    .engine(30, EngineEvent::ManifestParsed { levels: 3 })
                    .engine(60, media_error())
                    .engine(90, EngineEvent::FragmentLoaded)
                    .engine(120, media_error())
                    .engine(150, EngineEvent::FragmentLoaded),
                Expectation::ready(),
            ),
            Scenario::MediaExhausted => {
                let mut script =
                    SessionScript::new().engine(30, EngineEvent::ManifestParsed { levels: 3 });
                for i in 0..4 {
                    script = script
                        .engine(60 + 60 * i, media_error())
                        .engine(90 + 60 * i, EngineEvent::FragmentLoaded);
                }
                Plan::open(manifest, script, Expectation::failed(true))
            }
            Scenario::StallStorm => {
                let mut script =
                    SessionScript::new().engine(20, EngineEvent::ManifestParsed { levels: 2 });
                for i in 0..60 {
                    let at = 40 + 5 * i;
                    script = if i % 2 == 0 {
                        script.engine(at, EngineEvent::Error(EngineError::buffer_stalled()))
                    } else {
                        script.sink(at, SinkEvent::Stalled)
                    };
                    if i % 10 == 9 {
                        script = script.engine(at + 1, EngineEvent::FragmentLoaded);
                    }
                }
                Plan::open(manifest, script, Expectation::ready())
            }
            Scenario::UnknownFatal => Plan::open(
                manifest,
                SessionScript::new()
                    .engine(20, EngineEvent::ManifestParsed { levels: 2 })
                    .engine(
                        50,
                        EngineEvent::Error(EngineError::new(
                            EngineErrorKind::KeySystem,
                            true,
                            EngineErrorDetail::Other("license request denied".to_string()),
                        )),
                    ),
                Expectation::failed(true),
            ),
            Scenario::AttachRejected => Plan::open(
                manifest,
                SessionScript::new(),
                Expectation::failed(false),
            )
            .engine_rejects("manifest host unreachable"),
            Scenario::AutoplayBlocked => Plan::open(
                progressive.playing(true),
                SessionScript::new()
                    .sink(30, SinkEvent::LoadedData)
                    .sink(40, SinkEvent::CanPlay),
                Expectation::ready(),
            )
            .blocking_play(PlayRejection::NotAllowed),
            Scenario::Supersede => Plan {
                host: vec![
                    HostStep::at_ms(0, HostAction::Open(manifest.playing(true).muted(true))),
                    HostStep::at_ms(
                        40,
                        HostAction::Open(
                            SourceDescriptor::new(ALT_MANIFEST_URL)
                                .playing(true)
                                .muted(true),
                        ),
                    ),
                ],
                scripts: vec![
                    // first source answers late, after it was superseded
                    SessionScript::new()
                        .engine(120, EngineEvent::ManifestParsed { levels: 4 })
                        .engine(150, network_error())
                        .engine(160, network_error()),
                    SessionScript::new()
                        .engine(30, EngineEvent::ManifestParsed { levels: 2 })
                        .engine(60, EngineEvent::FragmentLoaded),
                ],
                ..Plan::default()
            },
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| format!("unknown scenario: {s}"))
    }
}

fn network_error() -> EngineEvent {
    EngineEvent::Error(EngineError::network(EngineErrorDetail::FragmentLoadError))
}

fn media_error() -> EngineEvent {
    EngineEvent::Error(EngineError::media(EngineErrorDetail::BufferAppendError))
}

#[derive(Debug, Clone)]
enum HostAction {
    Open(SourceDescriptor),
    SetPlaying(bool),
    SetMuted(bool),
}

#[derive(Debug, Clone)]
struct HostStep {
    at: Duration,
    action: HostAction,
}

impl HostStep {
    fn at_ms(ms: u64, action: HostAction) -> Self {
        Self {
            at: Duration::from_millis(ms),
            action,
        }
    }
}

struct Plan {
    host: Vec<HostStep>,
    scripts: Vec<SessionScript>,
    engine_supported: bool,
    engine_load_error: Option<&'static str>,
    play_rejection: Option<PlayRejection>,
    expect: Expectation,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            host: Vec::new(),
            scripts: Vec::new(),
            engine_supported: true,
            engine_load_error: None,
            play_rejection: None,
            expect: Expectation::ready(),
        }
    }
}

impl Plan {
    fn open(descriptor: SourceDescriptor, script: SessionScript, expect: Expectation) -> Self {
        Self {
            host: vec![HostStep::at_ms(0, HostAction::Open(descriptor))],
            scripts: vec![script],
            expect,
            ..Self::default()
        }
    }

    fn then(mut self, ms: u64, action: HostAction) -> Self {
        self.host.push(HostStep::at_ms(ms, action));
        self
    }

    fn without_engine(mut self) -> Self {
        self.engine_supported = false;
        self
    }

    fn engine_rejects(mut self, reason: &'static str) -> Self {
        self.engine_load_error = Some(reason);
        self
    }

    fn blocking_play(mut self, rejection: PlayRejection) -> Self {
        self.play_rejection = Some(rejection);
        self
    }
}

/// Outcome a scenario is expected to settle in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expectation {
    pub state: SessionState,
    pub loaded: bool,
    pub failed: bool,
}

impl Expectation {
    fn ready() -> Self {
        Self {
            state: SessionState::Ready,
            loaded: true,
            failed: false,
        }
    }

    fn failed(loaded: bool) -> Self {
        Self {
            state: SessionState::Failed,
            loaded,
            failed: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub description: String,
    pub generation: Generation,
    pub state: SessionState,
    pub loaded: bool,
    pub failed: bool,
    pub failure: Option<FailureReason>,
    pub expected: Expectation,
    pub passed: bool,
    pub elapsed_ms: u64,
    pub stats: SurfaceStats,
    pub calls: Vec<String>,
}

/// Run one scenario on a fresh surface. Must be called inside a `LocalSet`.
pub async fn run(scenario: Scenario, config: &ControllerConfig) -> ScenarioReport {
    let plan = scenario.plan();
    let scripts = ScriptBook::new(plan.scripts);
    let log = CallLog::new();

    let mut factory = SimEngineFactory::new(scripts.clone(), log.clone());
    if !plan.engine_supported {
        factory = factory.unsupported();
    }
    if let Some(reason) = plan.engine_load_error {
        factory = factory.rejecting_source(reason);
    }
    let mut sink = SimSink::new(scripts, log.clone());
    if let Some(rejection) = plan.play_rejection {
        sink = sink.blocking_play(rejection);
    }

    info!("▶️  Scenario {}: {}", scenario, scenario.description());
    let mut surface = PlaybackSurface::new(config, Box::new(factory), sink);
    let started = Instant::now();

    for step in plan.host {
        drive_until(&mut surface, started + step.at).await;
        apply(&mut surface, step.action);
    }
    settle(&mut surface, started + SCENARIO_LIMIT).await;

    let status = surface.status();
    let expected = plan.expect;
    let passed = status.state == expected.state
        && status.loaded == expected.loaded
        && status.failed == expected.failed;

    if passed {
        info!("✓ Scenario {} settled in {}", scenario, status.state);
    } else {
        warn!(
            "⚠️  Scenario {} settled in {} (loaded: {}, failed: {}), expected {:?}",
            scenario, status.state, status.loaded, status.failed, expected
        );
    }

    ScenarioReport {
        scenario: scenario.name().to_string(),
        description: scenario.description().to_string(),
        generation: status.generation,
        state: status.state,
        loaded: status.loaded,
        failed: status.failed,
        failure: status.failure,
        expected,
        passed,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        stats: surface.stats().clone(),
        calls: log.snapshot(),
    }
}

fn apply<S: MediaSink>(surface: &mut PlaybackSurface<S>, action: HostAction) {
    match action {
        HostAction::Open(descriptor) => {
            surface.open(descriptor);
        }
        HostAction::SetPlaying(playing) => surface.set_playing(playing),
        HostAction::SetMuted(muted) => surface.set_muted(muted),
    }
}

/// Process events until `deadline`.
async fn drive_until<S: MediaSink>(surface: &mut PlaybackSurface<S>, deadline: Instant) {
    loop {
        tokio::select! {
            more = surface.next_event() => {
                if !more {
                    sleep_until(deadline).await;
                    return;
                }
            }
            _ = sleep_until(deadline) => return,
        }
    }
}

/// Process events until none arrive for `SETTLE_QUIET`, or `limit` passes.
async fn settle<S: MediaSink>(surface: &mut PlaybackSurface<S>, limit: Instant) {
    while Instant::now() < limit {
        match timeout(SETTLE_QUIET, surface.next_event()).await {
            Ok(true) => continue,
            Ok(false) | Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>(), Ok(scenario));
        }
        assert!("bogus".parse::<Scenario>().is_err());
    }

    #[tokio::test]
    async fn test_all_scenarios_meet_expectations() {
        let config = ControllerConfig::default();
        let local = LocalSet::new();

        for scenario in Scenario::ALL {
            let report = local.run_until(run(scenario, &config)).await;
            assert!(report.passed, "{}: {:?}", scenario, report);
        }
    }

    #[tokio::test]
    async fn test_supersede_drops_late_events() {
        let local = LocalSet::new();
        let report = local
            .run_until(run(Scenario::Supersede, &ControllerConfig::default()))
            .await;

        assert_eq!(report.generation, Generation::new(2));
        assert!(report.stats.stale_events_dropped >= 3);
        assert_eq!(report.stats.sessions_opened, 2);
    }

    #[tokio::test]
    async fn test_autoplay_block_reported() {
        let local = LocalSet::new();
        let report = local
            .run_until(run(Scenario::AutoplayBlocked, &ControllerConfig::default()))
            .await;

        assert_eq!(report.stats.autoplay_blocked, 1);
        assert!(!report.failed);
        assert!(report.calls.iter().any(|call| call.ends_with("play")));
    }
}
