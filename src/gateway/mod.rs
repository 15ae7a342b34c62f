//! 远程控制网关
//!
//! 对仿真引擎的无状态客户端抽象：query（读取单元/装备参数）、control（下达命名指令）、
//! alter（直接修改状态量）、world_state（拉取全局快照）。
//! 网关自身不持有会话状态，可被多个 Agent 会话并发共享；
//! 所有调用是阻塞语义（带超时），瞬时故障在此边界内做一次有界退避重试。

pub mod client;
pub mod schemas;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::core::GatewayError;
pub use client::HttpGateway;
pub use schemas::{
    bearing_deg, clamp, distance_m, EquipmentInfo, Orientation, Position, UnitState, WorldSnapshot,
};

/// 被控实体引用：平台本体（飞行控制）或平台挂载的具名装备
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum EntityRef {
    Platform,
    Equipment(String),
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Platform => write!(f, "platform"),
            EntityRef::Equipment(name) => write!(f, "equipment:{name}"),
        }
    }
}

/// 远程控制网关契约
///
/// 实现必须无状态且 `Send + Sync`：同一实例可被多个会话并发调用，
/// 每次调用相互独立。
#[async_trait]
pub trait Gateway: Send + Sync {
    /// 拉取全局世界快照（决策周期的态势输入）
    async fn world_state(&self) -> Result<WorldSnapshot, GatewayError>;

    /// 查询实体状态：Platform -> 单元完整状态；Equipment -> 装备参数
    async fn query(&self, unit: &str, entity: &EntityRef) -> Result<Value, GatewayError>;

    /// 向实体下达命名指令（平台飞行指令或装备开关/参数指令）
    async fn control(
        &self,
        unit: &str,
        entity: &EntityRef,
        command: &str,
        params: &Value,
    ) -> Result<Value, GatewayError>;

    /// 直接修改单元状态量（位置 / 姿态 / 速度）
    async fn alter(&self, unit: &str, params: &Value) -> Result<Value, GatewayError>;
}

/// 重试策略：仅瞬时故障重试一次，指数退避（base ×2，封顶 max）
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// 第 n 次重试前的退避时长（n 从 1 起）
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// 单次重试上限：一次原始请求 + 至多一次重试
const MAX_ATTEMPTS: u32 = 2;

/// 带重试地执行一次网关操作，返回 (总尝试次数, 结果)
///
/// Rejected/NotFound 属于逻辑错误，立即返回；Transport/Timeout 退避后重试一次。
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op: &str,
    mut f: F,
) -> (u32, Result<T, GatewayError>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match f().await {
            Ok(v) => return (attempts, Ok(v)),
            Err(e) if e.is_transient() && attempts < MAX_ATTEMPTS => {
                let delay = policy.backoff(attempts);
                tracing::warn!(op, attempt = attempts, delay_ms = delay.as_millis() as u64,
                    error = %e, "[Gateway] 瞬时故障，退避重试");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return (attempts, Err(e)),
        }
    }
}
