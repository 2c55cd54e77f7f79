// 播放韧性控制器 - Streaming模块
//
// 把播放元素（Media Sink）挂接到视频源，判断使用分片清单的自适应流还是
// 渐进式下载，并在不泄漏资源、不让过期会话事件污染当前会话的前提下，
// 对网络、解码、缓冲停滞和自动播放拒绝进行分类与恢复。
//
// # 核心组件
//
// - `SourceClassifier`: 播放源分类
// - `EngineLifecycle`: 引擎挂接/释放与会话代数管理
// - `RecoveryPolicy`: 错误分类与表驱动的恢复策略
// - `IntentCoordinator`: 播放/暂停/静音意图协调
// - `PlaybackSurface`: 面向宿主的控制器，暴露 `loaded` / `failed`

pub mod classifier;
pub mod collaborator;
pub mod intent;
pub mod lifecycle;
pub mod recovery;
pub mod session;
pub mod surface;

// 重新导出核心类型
pub use classifier::{classify, SourceClassifier, DEFAULT_MANIFEST_EXTENSIONS};
pub use collaborator::{
    EngineOptions, EventEmitter, MediaSink, PlayFuture, Rejection, StreamingEngine,
    StreamingEngineFactory,
};
pub use intent::IntentCoordinator;
pub use lifecycle::{EngineLifecycle, Readiness};
pub use recovery::{
    classify_error, Classification, Decision, PolicyRule, RecoveryAction, RecoveryPolicy,
    RetryBound, RetryLedger,
};
pub use session::{Binding, PlaybackSession};
pub use surface::{PlaybackStatus, PlaybackSurface};
