// 模拟协作者模块
//
// 按脚本定时发出事件的模拟流引擎和模拟媒体输出，用于在没有真实播放器的
// 环境下驱动 `PlaybackSurface` 走完各种故障场景。

pub mod engine;
pub mod script;
pub mod sink;

pub use engine::SimEngineFactory;
pub use script::{CallLog, ScriptBook, SessionScript};
pub use sink::SimSink;
