//! 四阶段决策管线
//!
//! 指挥官（意图）-> 战术选择器（技能+参数）-> 执行器（网关调用
//! 与账本记录）-> 观察者（裁决），由驱动器按周期循环编排。

pub mod commander;
pub mod driver;
pub mod events;
pub mod executor;
pub mod observer;
pub mod state;
pub mod tactical;

pub use commander::{Commander, Intent};
pub use driver::PipelineDriver;
pub use events::{EventSink, PipelineEvent};
pub use executor::Executor;
pub use observer::{Observer, Verdict};
pub use state::{GoalSpec, SessionReport, SessionState, Task, TerminationReason};
pub use tactical::TacticalSelector;
