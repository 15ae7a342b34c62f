//! 管线会话状态：任务、目标判据、终止原因与会话报告

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::WorldSnapshot;

/// 一次会话要完成的任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 自然语言指令，指挥官阶段据此推断意图
    pub directive: String,
    /// 受控单元名
    pub unit: String,
    /// 附加约束（纯文本，进入意图上下文）
    #[serde(default)]
    pub constraints: Vec<String>,
    /// 覆盖配置中的周期上限
    #[serde(default)]
    pub max_cycles: Option<u32>,
    #[serde(default)]
    pub goal: GoalSpec,
}

/// 目标达成判据，Observer 每周期对最新态势求值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GoalSpec {
    /// 无自动判据：跑满周期上限或由外部取消
    #[default]
    Manual,
    /// 单元进入多边形空域（顶点为 [纬度, 经度]）
    UnitInsideArea { unit: String, polygon: Vec<[f64; 2]> },
    /// 指定目标被摧毁（从态势中消失或 alive=false）
    TargetDestroyed { target: String },
    /// 单元到达指定高度（米，含容差）
    UnitAtAltitude {
        unit: String,
        altitude: f64,
        tolerance: f64,
    },
}

impl GoalSpec {
    pub fn achieved(&self, world: &WorldSnapshot) -> bool {
        match self {
            GoalSpec::Manual => false,
            GoalSpec::UnitInsideArea { unit, polygon } => world
                .find_unit(unit)
                .map(|u| point_in_polygon(u.position.latitude, u.position.longitude, polygon))
                .unwrap_or(false),
            GoalSpec::TargetDestroyed { target } => {
                world.find_unit(target).map(|u| !u.alive).unwrap_or(true)
            }
            GoalSpec::UnitAtAltitude {
                unit,
                altitude,
                tolerance,
            } => world
                .find_unit(unit)
                .map(|u| (u.position.altitude - altitude).abs() <= *tolerance)
                .unwrap_or(false),
        }
    }
}

/// 射线法点在多边形内判定（顶点 [纬度, 经度]）
fn point_in_polygon(lat: f64, lon: f64, polygon: &[[f64; 2]]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (yi, xi) = (polygon[i][0], polygon[i][1]);
        let (yj, xj) = (polygon[j][0], polygon[j][1]);
        if ((yi > lat) != (yj > lat))
            && (lon < (xj - xi) * (lat - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// 会话终止原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TerminationReason {
    GoalAchieved,
    MaxCyclesExceeded,
    FatalError { detail: String },
    UserCancelled,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::GoalAchieved => write!(f, "目标达成"),
            TerminationReason::MaxCyclesExceeded => write!(f, "周期上限耗尽"),
            TerminationReason::FatalError { detail } => write!(f, "致命错误: {detail}"),
            TerminationReason::UserCancelled => write!(f, "用户取消"),
        }
    }
}

/// 跨周期滚动的会话内部状态
#[derive(Debug)]
pub struct SessionState {
    pub session_id: Uuid,
    /// 当前周期号，每次进入循环顶部 +1（重规划周期同样计数）
    pub cycle: u32,
    /// 连续无匹配技能的重规划次数，选型成功即清零
    pub replans: u32,
    /// 连续同类失败计数（键：技能名|目标）
    pub failure_streak: u32,
    pub failure_key: Option<String>,
    /// 上一周期失败说明，回流给指挥官
    pub failure_note: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            cycle: 0,
            replans: 0,
            failure_streak: 0,
            failure_key: None,
            failure_note: None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// 会话结束后的汇总报告
#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub termination: TerminationReason,
    pub cycles_used: u32,
    pub ledger_entries: usize,
    /// 账本尾部若干条的摘要行，便于快速诊断
    pub tail_summary: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Position, UnitState};

    fn unit_at(name: &str, lat: f64, lon: f64, alt: f64, alive: bool) -> UnitState {
        UnitState {
            unit_id: 1,
            unit_name: name.to_string(),
            unit_type: "战斗机".to_string(),
            forceside: "红方".to_string(),
            position: Position {
                latitude: lat,
                longitude: lon,
                altitude: alt,
            },
            orientation: Default::default(),
            speed: 200.0,
            alive,
            active: true,
            equipment: Vec::new(),
        }
    }

    fn world(units: Vec<UnitState>) -> WorldSnapshot {
        WorldSnapshot {
            sim_time: 0.0,
            units,
        }
    }

    #[test]
    fn unit_inside_area_uses_ray_casting() {
        let square = vec![[30.0, 120.0], [30.0, 121.0], [31.0, 121.0], [31.0, 120.0]];
        let goal = GoalSpec::UnitInsideArea {
            unit: "红方-001".to_string(),
            polygon: square,
        };

        let inside = world(vec![unit_at("红方-001", 30.5, 120.5, 5000.0, true)]);
        assert!(goal.achieved(&inside));

        let outside = world(vec![unit_at("红方-001", 32.0, 120.5, 5000.0, true)]);
        assert!(!goal.achieved(&outside));

        // 单元不在态势中视为未达成
        assert!(!goal.achieved(&world(Vec::new())));
    }

    #[test]
    fn target_destroyed_when_absent_or_dead() {
        let goal = GoalSpec::TargetDestroyed {
            target: "蓝方-052".to_string(),
        };
        assert!(goal.achieved(&world(Vec::new())));
        assert!(goal.achieved(&world(vec![unit_at("蓝方-052", 30.0, 120.0, 6000.0, false)])));
        assert!(!goal.achieved(&world(vec![unit_at("蓝方-052", 30.0, 120.0, 6000.0, true)])));
    }

    #[test]
    fn altitude_goal_respects_tolerance() {
        let goal = GoalSpec::UnitAtAltitude {
            unit: "红方-001".to_string(),
            altitude: 8000.0,
            tolerance: 200.0,
        };
        assert!(goal.achieved(&world(vec![unit_at("红方-001", 30.0, 120.0, 7850.0, true)])));
        assert!(!goal.achieved(&world(vec![unit_at("红方-001", 30.0, 120.0, 7000.0, true)])));
    }

    #[test]
    fn manual_goal_never_auto_achieves() {
        assert!(!GoalSpec::Manual.achieved(&world(Vec::new())));
    }
}
