//! 战术技能系统
//!
//! 技能将高层战术意图转化为网关调用序列。
//!
//! 技能分类：
//! - maneuver: 基础飞行机动（爬升、下降、转向、规避、截击）
//! - flight: 平台飞行控制（航路飞行、巡逻、返航、编队、战斗展开）
//! - sensor: 雷达操作（开机、关机、搜索）
//! - electronic_warfare: 电子战（干扰机开关）
//! - communication: 通信管理（电台开关）
//! - weapon: 武器使用（BVR 攻击、中止交战）

pub mod base;
pub mod communication;
pub mod electronic_warfare;
pub mod flight;
pub mod maneuver;
pub mod registry;
pub mod sensor;
pub mod weapon;

pub use base::{
    CallOp, CallOutcome, CallRecorder, OutcomeKind, ParamKind, ParamSpec, PlannedCall, Skill,
    SkillCategory, SkillResult,
};
pub use registry::SkillRegistry;
