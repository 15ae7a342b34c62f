//! Skill 基础定义
//!
//! 技能 = 可复用、可解释、可组合的战术动作：一次或多次网关调用 + 前置条件检查。
//! 执行策略：任一前置查询失败立即中止，保证零控制指令发出；
//! 前置通过后某步控制失败则放弃剩余步骤，结果中指明失败步骤。

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use crate::core::{AgentError, GatewayError};
use crate::gateway::{EntityRef, Gateway, UnitState, WorldSnapshot};

/// 技能类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Maneuver,
    Flight,
    Sensor,
    ElectronicWarfare,
    Communication,
    Weapon,
}

impl SkillCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillCategory::Maneuver => "maneuver",
            SkillCategory::Flight => "flight",
            SkillCategory::Sensor => "sensor",
            SkillCategory::ElectronicWarfare => "ew",
            SkillCategory::Communication => "comm",
            SkillCategory::Weapon => "weapon",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SkillCategory::Maneuver => "机动技能",
            SkillCategory::Flight => "飞行控制",
            SkillCategory::Sensor => "传感器",
            SkillCategory::ElectronicWarfare => "电子战",
            SkillCategory::Communication => "通信",
            SkillCategory::Weapon => "武器",
        }
    }
}

/// 参数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Str,
    Number,
    Integer,
}

/// 技能参数声明：名称、类型、是否必填、数值默认值
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default_num: Option<f64>,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self { name, kind, required: true, default_num: None }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self { name, kind, required: false, default_num: None }
    }

    pub const fn with_default(name: &'static str, kind: ParamKind, default: f64) -> Self {
        Self { name, kind, required: false, default_num: Some(default) }
    }
}

/// 网关操作种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOp {
    Query,
    Control,
    Alter,
    WorldState,
}

/// 一次计划中/已发出的网关调用
#[derive(Debug, Clone, Serialize)]
pub struct PlannedCall {
    pub op: CallOp,
    pub unit: String,
    pub entity: EntityRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub params: Value,
}

/// 单次网关调用的结果记录
#[derive(Debug, Clone, Serialize)]
pub struct CallOutcome {
    pub call: PlannedCall,
    pub success: bool,
    pub detail: String,
    pub latency_ms: u64,
}

/// 技能结果分类（Observer 据此判断可恢复性）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    /// 前置条件未通过，零控制指令发出
    PreconditionFailed,
    /// 前置通过后某步控制失败，剩余步骤已放弃
    ControlFailed,
    InvalidParams,
}

/// 技能执行结果（一经产生不可变）
#[derive(Debug, Clone, Serialize)]
pub struct SkillResult {
    pub success: bool,
    pub kind: OutcomeKind,
    pub message: String,
    pub data: Value,
    pub calls: Vec<CallOutcome>,
}

impl SkillResult {
    pub fn success(message: impl Into<String>, data: Value, rec: CallRecorder) -> Self {
        Self {
            success: true,
            kind: OutcomeKind::Success,
            message: message.into(),
            data,
            calls: rec.into_outcomes(),
        }
    }

    pub fn precondition_failed(message: impl Into<String>, rec: CallRecorder) -> Self {
        Self {
            success: false,
            kind: OutcomeKind::PreconditionFailed,
            message: message.into(),
            data: Value::Null,
            calls: rec.into_outcomes(),
        }
    }

    pub fn control_failed(message: impl Into<String>, rec: CallRecorder) -> Self {
        Self {
            success: false,
            kind: OutcomeKind::ControlFailed,
            message: message.into(),
            data: Value::Null,
            calls: rec.into_outcomes(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: OutcomeKind::InvalidParams,
            message: message.into(),
            data: Value::Null,
            calls: Vec::new(),
        }
    }

    /// 已发出的控制/修改类调用数（前置失败时应为 0）
    pub fn control_calls_issued(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c.call.op, CallOp::Control | CallOp::Alter))
            .count()
    }
}

/// 战术技能契约
///
/// 实现应保持无共享可变状态：同一技能实例可被多个会话并发执行。
#[async_trait]
pub trait Skill: Send + Sync {
    /// 全局唯一技能名（注册表键）
    fn name(&self) -> &'static str;

    /// 技能描述（战术选择器按关键词匹配此文本）
    fn description(&self) -> &'static str;

    fn category(&self) -> SkillCategory;

    fn params(&self) -> &'static [ParamSpec];

    /// 干跑视图：给定参数下将发出的标称调用序列（不访问网关）
    fn plan(&self, params: &Value) -> Vec<PlannedCall>;

    /// 执行：前置查询 -> 顺序控制调用 -> 汇总 SkillResult
    async fn execute(&self, gateway: &dyn Gateway, params: &Value) -> SkillResult;
}

impl std::fmt::Debug for dyn Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skill").field("name", &self.name()).finish()
    }
}

/// 调用记录器：技能执行期间逐条记录网关调用及延迟，组装进 SkillResult
#[derive(Default)]
pub struct CallRecorder {
    outcomes: Vec<CallOutcome>,
}

impl CallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_outcomes(self) -> Vec<CallOutcome> {
        self.outcomes
    }

    fn record(&mut self, call: PlannedCall, result: &Result<Value, GatewayError>, start: Instant) {
        let (success, detail) = match result {
            Ok(_) => (true, "ok".to_string()),
            Err(e) => (false, e.to_string()),
        };
        self.outcomes.push(CallOutcome {
            call,
            success,
            detail,
            latency_ms: start.elapsed().as_millis() as u64,
        });
    }

    /// 前置/状态查询
    pub async fn query(
        &mut self,
        gw: &dyn Gateway,
        unit: &str,
        entity: &EntityRef,
    ) -> Result<Value, GatewayError> {
        let start = Instant::now();
        let result = gw.query(unit, entity).await;
        let call = PlannedCall {
            op: CallOp::Query,
            unit: unit.to_string(),
            entity: entity.clone(),
            command: None,
            params: Value::Null,
        };
        self.record(call, &result, start);
        result
    }

    /// 控制指令
    pub async fn control(
        &mut self,
        gw: &dyn Gateway,
        unit: &str,
        entity: &EntityRef,
        command: &str,
        params: Value,
    ) -> Result<Value, GatewayError> {
        let start = Instant::now();
        let result = gw.control(unit, entity, command, &params).await;
        let call = PlannedCall {
            op: CallOp::Control,
            unit: unit.to_string(),
            entity: entity.clone(),
            command: Some(command.to_string()),
            params,
        };
        self.record(call, &result, start);
        result
    }

    /// 全局态势拉取（目标存活核验等前置使用，同样计入调用记录）
    pub async fn world_state(&mut self, gw: &dyn Gateway) -> Result<WorldSnapshot, GatewayError> {
        let start = Instant::now();
        let result = gw.world_state().await;
        let (success, detail) = match &result {
            Ok(_) => (true, "ok".to_string()),
            Err(e) => (false, e.to_string()),
        };
        self.outcomes.push(CallOutcome {
            call: PlannedCall {
                op: CallOp::WorldState,
                unit: String::new(),
                entity: EntityRef::Platform,
                command: None,
                params: Value::Null,
            },
            success,
            detail,
            latency_ms: start.elapsed().as_millis() as u64,
        });
        result
    }

    /// 状态量修改
    pub async fn alter(
        &mut self,
        gw: &dyn Gateway,
        unit: &str,
        params: Value,
    ) -> Result<Value, GatewayError> {
        let start = Instant::now();
        let result = gw.alter(unit, &params).await;
        let call = PlannedCall {
            op: CallOp::Alter,
            unit: unit.to_string(),
            entity: EntityRef::Platform,
            command: None,
            params,
        };
        self.record(call, &result, start);
        result
    }
}

// ── 参数取值辅助 ──────────────────────────────────────────

pub fn req_str(params: &Value, key: &str) -> Result<String, AgentError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AgentError::InvalidParams(format!("缺少字符串参数 {key}")))
}

pub fn opt_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(str::to_string)
}

pub fn req_num(params: &Value, key: &str) -> Result<f64, AgentError> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| AgentError::InvalidParams(format!("缺少数值参数 {key}")))
}

pub fn num_or(params: &Value, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}

pub fn int_or(params: &Value, key: &str, default: i64) -> i64 {
    params.get(key).and_then(Value::as_i64).unwrap_or(default)
}

/// 从 Platform 查询结果解析单元状态
pub fn unit_state_from(value: Value) -> Result<UnitState, AgentError> {
    serde_json::from_value(value).map_err(|e| AgentError::InvalidParams(format!("单元状态解析失败: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_helpers() {
        let p = json!({"unit_name": "红方01", "altitude": 5000.0});
        assert_eq!(req_str(&p, "unit_name").unwrap(), "红方01");
        assert!(req_str(&p, "target_name").is_err());
        assert_eq!(num_or(&p, "altitude", 1000.0), 5000.0);
        assert_eq!(num_or(&p, "speed", 200.0), 200.0);
        assert_eq!(int_or(&p, "launch_num", 1), 1);
    }

    struct StaticGateway;

    #[async_trait]
    impl Gateway for StaticGateway {
        async fn world_state(&self) -> Result<WorldSnapshot, GatewayError> {
            Ok(WorldSnapshot::default())
        }

        async fn query(&self, _unit: &str, _entity: &EntityRef) -> Result<Value, GatewayError> {
            Ok(Value::Null)
        }

        async fn control(
            &self,
            _unit: &str,
            _entity: &EntityRef,
            _command: &str,
            _params: &Value,
        ) -> Result<Value, GatewayError> {
            Ok(json!({"result": "success"}))
        }

        async fn alter(&self, _unit: &str, _params: &Value) -> Result<Value, GatewayError> {
            Ok(json!({"result": "success"}))
        }
    }

    #[tokio::test]
    async fn test_recorder_captures_world_state_round_trip() {
        let gw = StaticGateway;
        let mut rec = CallRecorder::new();
        rec.world_state(&gw).await.unwrap();
        rec.query(&gw, "红方01", &EntityRef::Platform).await.unwrap();
        let result = SkillResult::success("目标核验完成", Value::Null, rec);
        // 态势拉取与前置查询都要进调用记录，且都不算控制指令
        assert_eq!(result.calls.len(), 2);
        assert_eq!(result.calls[0].call.op, CallOp::WorldState);
        assert_eq!(result.calls[1].call.op, CallOp::Query);
        assert_eq!(result.control_calls_issued(), 0);
    }

    #[test]
    fn test_result_control_call_count() {
        let result = SkillResult::precondition_failed("弹药已耗尽", CallRecorder::new());
        assert_eq!(result.control_calls_issued(), 0);
        assert_eq!(result.kind, OutcomeKind::PreconditionFailed);
        assert!(!result.success);
    }
}
