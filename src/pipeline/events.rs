//! 管线事件流
//!
//! 每个周期的关键节点都会向事件通道推送一条事件，供 CLI 实时
//! 展示或外部采集。通道接收端掉线不影响管线继续运行。

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::state::TerminationReason;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    SessionStarted {
        session_id: Uuid,
        directive: String,
        unit: String,
    },
    CycleStarted {
        cycle: u32,
    },
    IntentFormed {
        cycle: u32,
        category: String,
        summary: String,
    },
    SkillSelected {
        cycle: u32,
        skill: String,
        params: Value,
    },
    /// 选型无匹配技能，本周期转入重规划
    Replanned {
        cycle: u32,
        replans: u32,
        reason: String,
    },
    SkillExecuted {
        cycle: u32,
        skill: String,
        success: bool,
        message: String,
    },
    ObserverVerdict {
        cycle: u32,
        verdict: String,
    },
    SessionEnded {
        session_id: Uuid,
        termination: TerminationReason,
        cycles_used: u32,
    },
}

/// 事件发射端薄封装：未挂接收端时所有 emit 都是空操作
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    pub fn attached(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn detached() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            // 接收端已丢弃时静默忽略
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let ev = PipelineEvent::CycleStarted { cycle: 3 };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "cycle_started");
        assert_eq!(json["cycle"], 3);
    }

    #[tokio::test]
    async fn sink_delivers_when_attached() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::attached(tx);
        sink.emit(PipelineEvent::CycleStarted { cycle: 1 });
        assert!(matches!(
            rx.recv().await,
            Some(PipelineEvent::CycleStarted { cycle: 1 })
        ));

        // 未挂接收端不 panic
        EventSink::detached().emit(PipelineEvent::CycleStarted { cycle: 2 });
    }
}
