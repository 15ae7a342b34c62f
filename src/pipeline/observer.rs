//! 观察者阶段：执行结果 + 最新态势 -> 下一步裁决
//!
//! 目标判据优先于一切：只要最新态势满足目标即判达成。失败按
//! （技能名|目标）键记连败，连败达到预算即升级为致命错误，
//! 否则带着失败说明回流指挥官重试。

use serde_json::Value;
use tracing::{debug, warn};

use crate::gateway::WorldSnapshot;
use crate::ledger::LedgerEntry;

use super::state::{GoalSpec, SessionState};

/// 观察者裁决
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    GoalAchieved,
    /// 继续下一周期；失败时附失败说明回流指挥官
    Continue { note: Option<String> },
    /// 同类失败连败超预算，会话应以致命错误终止
    Escalate { reason: String },
}

impl Verdict {
    pub fn label(&self) -> String {
        match self {
            Verdict::GoalAchieved => "目标达成".to_string(),
            Verdict::Continue { note: None } => "继续".to_string(),
            Verdict::Continue { note: Some(n) } => format!("继续（{n}）"),
            Verdict::Escalate { reason } => format!("升级（{reason}）"),
        }
    }
}

pub struct Observer {
    failure_retry_budget: u32,
}

impl Observer {
    pub fn new(failure_retry_budget: u32) -> Self {
        Self {
            failure_retry_budget,
        }
    }

    pub fn assess(
        &self,
        goal: &GoalSpec,
        world: &WorldSnapshot,
        entry: &LedgerEntry,
        state: &mut SessionState,
    ) -> Verdict {
        if goal.achieved(world) {
            debug!(cycle = entry.cycle, "[Observer] 目标判据满足");
            return Verdict::GoalAchieved;
        }

        if entry.result.success {
            state.failure_streak = 0;
            state.failure_key = None;
            return Verdict::Continue { note: None };
        }

        // 失败键 = 技能名|目标，目标缺省取受控单元
        let target = entry
            .params
            .get("target_name")
            .or_else(|| entry.params.get("unit_name"))
            .and_then(Value::as_str)
            .unwrap_or("-");
        let key = format!("{}|{}", entry.skill, target);

        if state.failure_key.as_deref() == Some(&key) {
            state.failure_streak += 1;
        } else {
            state.failure_key = Some(key.clone());
            state.failure_streak = 1;
        }

        if state.failure_streak >= self.failure_retry_budget {
            warn!(
                cycle = entry.cycle,
                key = %key,
                streak = state.failure_streak,
                "[Observer] 连败达预算，升级"
            );
            return Verdict::Escalate {
                reason: format!(
                    "技能 {} 对 {} 连续失败 {} 次: {}",
                    entry.skill, target, state.failure_streak, entry.result.message
                ),
            };
        }

        debug!(
            cycle = entry.cycle,
            key = %key,
            streak = state.failure_streak,
            "[Observer] 失败记连败，回流重试"
        );
        Verdict::Continue {
            note: Some(entry.result.message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::{CallRecorder, SkillResult};
    use chrono::Utc;
    use serde_json::json;

    fn entry(cycle: u32, skill: &str, result: SkillResult, params: Value) -> LedgerEntry {
        LedgerEntry {
            timestamp: Utc::now(),
            cycle,
            skill: skill.to_string(),
            params,
            result,
            latency_ms: 1,
        }
    }

    fn failed(msg: &str) -> SkillResult {
        SkillResult::precondition_failed(msg, CallRecorder::new())
    }

    #[test]
    fn identical_failure_escalates_at_budget() {
        let observer = Observer::new(2);
        let mut state = SessionState::new();
        let world = WorldSnapshot::default();
        let params = json!({"unit_name": "红方-001", "target_name": "蓝方-052"});

        let first = observer.assess(
            &GoalSpec::Manual,
            &world,
            &entry(1, "bvr_attack", failed("武器无剩余弹药"), params.clone()),
            &mut state,
        );
        assert!(matches!(first, Verdict::Continue { note: Some(_) }));
        assert_eq!(state.failure_streak, 1);

        let second = observer.assess(
            &GoalSpec::Manual,
            &world,
            &entry(2, "bvr_attack", failed("武器无剩余弹药"), params),
            &mut state,
        );
        assert!(matches!(second, Verdict::Escalate { .. }));
    }

    #[test]
    fn different_failure_key_resets_streak() {
        let observer = Observer::new(2);
        let mut state = SessionState::new();
        let world = WorldSnapshot::default();

        observer.assess(
            &GoalSpec::Manual,
            &world,
            &entry(1, "bvr_attack", failed("x"), json!({"target_name": "蓝方-052"})),
            &mut state,
        );
        let v = observer.assess(
            &GoalSpec::Manual,
            &world,
            &entry(2, "bvr_attack", failed("x"), json!({"target_name": "蓝方-053"})),
            &mut state,
        );
        assert!(matches!(v, Verdict::Continue { .. }));
        assert_eq!(state.failure_streak, 1);
    }

    #[test]
    fn success_clears_streak() {
        let observer = Observer::new(2);
        let mut state = SessionState::new();
        let world = WorldSnapshot::default();
        let params = json!({"unit_name": "红方-001"});

        observer.assess(
            &GoalSpec::Manual,
            &world,
            &entry(1, "radar_power_on", failed("故障"), params.clone()),
            &mut state,
        );
        assert_eq!(state.failure_streak, 1);

        let ok = SkillResult::success("ok", Value::Null, CallRecorder::new());
        observer.assess(
            &GoalSpec::Manual,
            &world,
            &entry(2, "radar_power_on", ok, params),
            &mut state,
        );
        assert_eq!(state.failure_streak, 0);
        assert!(state.failure_key.is_none());
    }

    #[test]
    fn goal_achievement_wins_over_failure() {
        let observer = Observer::new(2);
        let mut state = SessionState::new();
        // 目标单元不在态势中 -> TargetDestroyed 视为达成
        let world = WorldSnapshot::default();
        let goal = GoalSpec::TargetDestroyed {
            target: "蓝方-052".to_string(),
        };

        let v = observer.assess(
            &goal,
            &world,
            &entry(1, "bvr_attack", failed("锁定失败"), json!({})),
            &mut state,
        );
        assert_eq!(v, Verdict::GoalAchieved);
    }
}
