//! 错误分类
//!
//! 两层：GatewayError 描述与仿真引擎一次交互的失败；AgentError 描述管线层故障。
//! 传播策略：Transport/Timeout 在网关边界重试一次后以失败 SkillResult 上浮；
//! Rejected/NotFound/PreconditionFailed 立即上浮不重试（规划或状态不匹配，而非瞬时故障）；
//! 未知错误一律包装为 FatalPipeline 终止会话。

use thiserror::Error;

/// 网关调用失败分类
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// 网络连接层故障（可重试一次）
    #[error("Transport error: {0}")]
    Transport(String),

    /// 请求超出时限（可重试一次）
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 引擎逻辑拒绝（不重试）
    #[error("Rejected by engine: {0}")]
    Rejected(String),

    /// 单元或装备不存在（不重试）
    #[error("Not found: {0}")]
    NotFound(String),
}

impl GatewayError {
    /// 是否为瞬时故障：仅 Transport/Timeout 允许退避重试
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transport(_) | GatewayError::Timeout(_))
    }
}

/// 管线运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// 战术选择器找不到与意图匹配的技能，驱动层据此进入有界重规划
    #[error("No matching skill: {0}")]
    NoMatchingSkill(String),

    /// 技能前置条件检查未通过（未发出任何控制指令）
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// 技能参数缺失或类型不符
    #[error("Invalid skill params: {0}")]
    InvalidParams(String),

    /// 启动期技能重名（注册表快速失败）
    #[error("Skill name conflict: {0}")]
    SkillConflict(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 周期/重试预算耗尽或未知状态，会话终止
    #[error("Fatal pipeline error: {0}")]
    FatalPipeline(String),
}
