//! Talon - 空战仿真决策执行 Agent
//!
//! 将高层任务指令翻译为仿真引擎的设备级控制指令序列。
//!
//! 模块划分：
//! - **agent**: 无头组件装配（Gateway / 技能注册表 / 检索器 / 管线驱动）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类（网关故障与管线故障）
//! - **gateway**: 远程控制网关（查询 / 控制 / 状态修改，超时 + 有界重试）
//! - **ledger**: 执行台账与会话回放文件
//! - **pipeline**: Commander -> Tactical -> Executor -> Observer 状态机
//! - **rag**: 战术知识检索（文档分类、分块、确定性打分）
//! - **skills**: 战术技能系统（机动 / 飞行 / 传感器 / 电子战 / 通信 / 武器）
//! - **observability**: tracing 初始化

pub mod agent;
pub mod config;
pub mod core;
pub mod gateway;
pub mod ledger;
pub mod observability;
pub mod pipeline;
pub mod rag;
pub mod skills;
