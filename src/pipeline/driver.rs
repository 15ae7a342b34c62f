//! 管线驱动器：指挥官 -> 战术选择 -> 执行 -> 观察 的周期循环
//!
//! 周期计数在循环顶部自增，重规划周期同样消耗周期额度但不产生
//! 账本记录。取消只在周期顶部检查，周期一旦进入便跑完收尾。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{AgentSection, ReplaySection};
use crate::core::AgentError;
use crate::gateway::{Gateway, GatewayError, WorldSnapshot};
use crate::ledger::{Ledger, ReplayDump};
use crate::rag::KnowledgeRetriever;
use crate::skills::SkillRegistry;

use super::commander::Commander;
use super::events::{EventSink, PipelineEvent};
use super::executor::Executor;
use super::observer::{Observer, Verdict};
use super::state::{SessionReport, SessionState, Task, TerminationReason};
use super::tactical::TacticalSelector;

/// 态势快照缓存：新鲜度窗口内复用，过期整体重拉。
/// 缓存只对只读路径有效：一旦发出控制/修改指令必须作废，
/// 否则观察者会拿到执行前的旧态势。
struct SnapshotCache {
    snapshot: Option<(WorldSnapshot, Instant)>,
    freshness: Duration,
}

impl SnapshotCache {
    fn new(freshness_ms: u64) -> Self {
        Self {
            snapshot: None,
            freshness: Duration::from_millis(freshness_ms),
        }
    }

    async fn fresh(&mut self, gateway: &dyn Gateway) -> Result<WorldSnapshot, GatewayError> {
        if let Some((snap, at)) = &self.snapshot {
            if at.elapsed() < self.freshness {
                return Ok(snap.clone());
            }
        }
        let snap = gateway.world_state().await?;
        self.snapshot = Some((snap.clone(), Instant::now()));
        Ok(snap)
    }

    fn invalidate(&mut self) {
        self.snapshot = None;
    }
}

pub struct PipelineDriver {
    gateway: Arc<dyn Gateway>,
    selector: TacticalSelector,
    observer: Observer,
    retriever: Arc<KnowledgeRetriever>,
    agent_cfg: AgentSection,
    replay_cfg: ReplaySection,
    events: EventSink,
    cancel: CancellationToken,
}

impl PipelineDriver {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        registry: Arc<SkillRegistry>,
        retriever: Arc<KnowledgeRetriever>,
        agent_cfg: AgentSection,
        replay_cfg: ReplaySection,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        let observer = Observer::new(agent_cfg.failure_retry_budget);
        Self {
            gateway,
            selector: TacticalSelector::new(registry),
            observer,
            retriever,
            agent_cfg,
            replay_cfg,
            events,
            cancel,
        }
    }

    /// 跑完一个会话：循环直到四种终止原因之一出现，落盘复盘
    /// 文件并返回会话报告。
    pub async fn run(&self, task: Task) -> Result<SessionReport, AgentError> {
        let mut state = SessionState::new();
        let mut ledger = Ledger::new();
        let mut cache = SnapshotCache::new(self.agent_cfg.snapshot_freshness_ms);
        let max_cycles = task.max_cycles.unwrap_or(self.agent_cfg.max_cycles);

        info!(
            session = %state.session_id,
            unit = %task.unit,
            max_cycles,
            "[Driver] 会话开始: {}",
            task.directive
        );
        self.events.emit(PipelineEvent::SessionStarted {
            session_id: state.session_id,
            directive: task.directive.clone(),
            unit: task.unit.clone(),
        });

        let termination = loop {
            // 取消只在此处检查
            if self.cancel.is_cancelled() {
                break TerminationReason::UserCancelled;
            }
            if state.cycle >= max_cycles {
                break TerminationReason::MaxCyclesExceeded;
            }
            state.cycle += 1;
            self.events.emit(PipelineEvent::CycleStarted { cycle: state.cycle });

            let world = match cache.fresh(self.gateway.as_ref()).await {
                Ok(w) => w,
                Err(e) => {
                    error!(cycle = state.cycle, error = %e, "[Driver] 态势拉取失败");
                    break TerminationReason::FatalError {
                        detail: format!("态势拉取失败: {e}"),
                    };
                }
            };
            // 周期顶部即满足目标则不再下发任何指令
            if task.goal.achieved(&world) {
                break TerminationReason::GoalAchieved;
            }

            let failure_note = state.failure_note.take();
            let intent = Commander::form_intent(
                &task,
                &world,
                ledger.tail(self.agent_cfg.ledger_tail),
                failure_note.as_deref(),
                &self.retriever,
            );
            self.events.emit(PipelineEvent::IntentFormed {
                cycle: state.cycle,
                category: intent.category.as_str().to_string(),
                summary: intent.summary.clone(),
            });

            let (skill, params) = match self.selector.select(&intent, &task) {
                Ok(pair) => pair,
                Err(AgentError::NoMatchingSkill(reason)) => {
                    state.replans += 1;
                    warn!(
                        cycle = state.cycle,
                        replans = state.replans,
                        "[Driver] 无匹配技能: {reason}"
                    );
                    self.events.emit(PipelineEvent::Replanned {
                        cycle: state.cycle,
                        replans: state.replans,
                        reason: reason.clone(),
                    });
                    if state.replans >= self.agent_cfg.replan_limit {
                        break TerminationReason::FatalError {
                            detail: format!(
                                "连续 {} 次无匹配技能: {reason}",
                                state.replans
                            ),
                        };
                    }
                    // 重规划：消耗周期，不写账本，失败说明回流指挥官
                    state.failure_note = Some(reason);
                    continue;
                }
                Err(e) => {
                    break TerminationReason::FatalError {
                        detail: e.to_string(),
                    }
                }
            };
            state.replans = 0;
            self.events.emit(PipelineEvent::SkillSelected {
                cycle: state.cycle,
                skill: skill.name().to_string(),
                params: params.clone(),
            });

            let entry =
                Executor::run(skill, params, self.gateway.as_ref(), state.cycle).await;
            self.events.emit(PipelineEvent::SkillExecuted {
                cycle: state.cycle,
                skill: entry.skill.clone(),
                success: entry.result.success,
                message: entry.result.message.clone(),
            });

            // 技能发出过控制/修改指令则缓存作废，裁决必须看到执行后的态势
            if entry.result.control_calls_issued() > 0 {
                cache.invalidate();
            }
            let world_after = match cache.fresh(self.gateway.as_ref()).await {
                Ok(w) => w,
                Err(e) => {
                    ledger.append(entry);
                    break TerminationReason::FatalError {
                        detail: format!("执行后态势拉取失败: {e}"),
                    };
                }
            };
            let verdict = self
                .observer
                .assess(&task.goal, &world_after, &entry, &mut state);
            self.events.emit(PipelineEvent::ObserverVerdict {
                cycle: state.cycle,
                verdict: verdict.label(),
            });
            ledger.append(entry);

            match verdict {
                Verdict::GoalAchieved => break TerminationReason::GoalAchieved,
                Verdict::Escalate { reason } => {
                    break TerminationReason::FatalError { detail: reason }
                }
                Verdict::Continue { note } => {
                    state.failure_note = note;
                }
            }
        };

        info!(
            session = %state.session_id,
            cycles = state.cycle,
            entries = ledger.len(),
            "[Driver] 会话结束: {termination}"
        );
        self.events.emit(PipelineEvent::SessionEnded {
            session_id: state.session_id,
            termination: termination.clone(),
            cycles_used: state.cycle,
        });

        let replay_path = match ReplayDump::new(
            state.session_id,
            &task,
            &termination,
            state.cycle,
            &ledger,
        )
        .save(&self.replay_cfg.dir)
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "[Driver] 复盘落盘失败");
                None
            }
        };

        let tail_summary = ledger
            .tail(self.agent_cfg.ledger_tail)
            .iter()
            .map(|e| {
                format!(
                    "周期{} {} {} - {}",
                    e.cycle,
                    e.skill,
                    if e.result.success { "成功" } else { "失败" },
                    e.result.message
                )
            })
            .collect();

        Ok(SessionReport {
            session_id: state.session_id,
            termination,
            cycles_used: state.cycle,
            ledger_entries: ledger.len(),
            tail_summary,
            replay_path,
        })
    }
}
