//! 执行账本与复盘落盘
//!
//! 账本是只追加结构：每个执行阶段（Executor）通过恰好一条记录，
//! 记录一经写入不修改不删除。会话结束时整本账连同任务与终止原因
//! 落盘为复盘 JSON 文件。

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::core::AgentError;
use crate::pipeline::state::{Task, TerminationReason};
use crate::skills::SkillResult;

/// 一次技能执行的账本记录
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    /// 产生该记录的决策周期号（单调不减）
    pub cycle: u32,
    pub skill: String,
    pub params: Value,
    pub result: SkillResult,
    pub latency_ms: u64,
}

/// 只追加执行账本
#[derive(Debug, Default, Serialize)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// 末尾 n 条记录（Observer 诊断与会话报告用）
    pub fn tail(&self, n: usize) -> &[LedgerEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }
}

/// 会话复盘文件内容
#[derive(Debug, Serialize)]
pub struct ReplayDump<'a> {
    pub session_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub task: &'a Task,
    pub termination: &'a TerminationReason,
    pub cycles_used: u32,
    pub ledger: &'a Ledger,
}

impl<'a> ReplayDump<'a> {
    pub fn new(
        session_id: Uuid,
        task: &'a Task,
        termination: &'a TerminationReason,
        cycles_used: u32,
        ledger: &'a Ledger,
    ) -> Self {
        Self {
            session_id,
            recorded_at: Utc::now(),
            task,
            termination,
            cycles_used,
            ledger,
        }
    }

    /// 落盘到复盘目录，返回写入路径
    pub fn save(&self, dir: &Path) -> Result<PathBuf, AgentError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("replay_{}.json", self.session_id));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AgentError::FatalPipeline(format!("复盘序列化失败: {e}")))?;
        fs::write(&path, json)?;
        info!(path = %path.display(), entries = self.ledger.len(), "复盘已落盘");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::GoalSpec;
    use crate::skills::CallRecorder;

    fn entry(cycle: u32, skill: &str) -> LedgerEntry {
        LedgerEntry {
            timestamp: Utc::now(),
            cycle,
            skill: skill.to_string(),
            params: Value::Null,
            result: SkillResult::success("ok", Value::Null, CallRecorder::new()),
            latency_ms: 3,
        }
    }

    #[test]
    fn ledger_appends_in_order() {
        let mut ledger = Ledger::new();
        ledger.append(entry(1, "radar_power_on"));
        ledger.append(entry(2, "patrol_airspace"));
        ledger.append(entry(4, "bvr_attack"));

        assert_eq!(ledger.len(), 3);
        let cycles: Vec<u32> = ledger.entries().iter().map(|e| e.cycle).collect();
        assert_eq!(cycles, vec![1, 2, 4]);
    }

    #[test]
    fn tail_returns_last_entries() {
        let mut ledger = Ledger::new();
        for i in 1..=7 {
            ledger.append(entry(i, "fly_heading"));
        }
        let tail: Vec<u32> = ledger.tail(3).iter().map(|e| e.cycle).collect();
        assert_eq!(tail, vec![5, 6, 7]);

        // 不足 n 条时返回全部
        assert_eq!(ledger.tail(100).len(), 7);
    }

    #[test]
    fn replay_dump_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::new();
        ledger.append(entry(1, "patrol_airspace"));

        let task = Task {
            directive: "在1号空域巡逻".to_string(),
            unit: "红方-001".to_string(),
            constraints: Vec::new(),
            max_cycles: None,
            goal: GoalSpec::Manual,
        };
        let termination = TerminationReason::GoalAchieved;
        let dump = ReplayDump::new(Uuid::new_v4(), &task, &termination, 2, &ledger);
        let path = dump.save(dir.path()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["cycles_used"], 2);
        assert_eq!(parsed["ledger"]["entries"].as_array().unwrap().len(), 1);
    }
}
