//! 执行器阶段：执行选定技能并产出恰好一条账本记录

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::gateway::Gateway;
use crate::ledger::LedgerEntry;
use crate::skills::Skill;

pub struct Executor;

impl Executor {
    /// 执行一次技能调用。无论成功失败都返回一条完整记录，
    /// 调用方负责把它追加进账本。
    pub async fn run(
        skill: Arc<dyn Skill>,
        params: Value,
        gateway: &dyn Gateway,
        cycle: u32,
    ) -> LedgerEntry {
        let start = Instant::now();
        let result = skill.execute(gateway, &params).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        if result.success {
            info!(
                cycle,
                skill = skill.name(),
                latency_ms,
                calls = result.calls.len(),
                "[Executor] 技能执行成功: {}",
                result.message
            );
        } else {
            warn!(
                cycle,
                skill = skill.name(),
                latency_ms,
                kind = ?result.kind,
                "[Executor] 技能执行失败: {}",
                result.message
            );
        }

        LedgerEntry {
            timestamp: Utc::now(),
            cycle,
            skill: skill.name().to_string(),
            params,
            result,
            latency_ms,
        }
    }
}
