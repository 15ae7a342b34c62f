//! Agent 装配：按配置组装网关、技能库、知识检索与管线驱动器

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::gateway::{Gateway, HttpGateway, RetryPolicy};
use crate::pipeline::{EventSink, PipelineDriver, SessionReport, Task};
use crate::rag::KnowledgeRetriever;
use crate::skills::SkillRegistry;

pub struct Agent {
    driver: PipelineDriver,
    cancel: CancellationToken,
}

impl Agent {
    /// 用注入的网关装配（测试与仿真回放场景）
    pub fn new(
        gateway: Arc<dyn Gateway>,
        cfg: &AppConfig,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Result<Self, AgentError> {
        let registry = Arc::new(SkillRegistry::with_builtin_skills()?);
        let retriever = Arc::new(KnowledgeRetriever::load(&cfg.rag)?);
        info!(
            skills = registry.len(),
            knowledge_empty = retriever.is_empty(),
            "Agent 装配完成"
        );
        let driver = PipelineDriver::new(
            gateway,
            registry,
            retriever,
            cfg.agent.clone(),
            cfg.replay.clone(),
            events,
            cancel.clone(),
        );
        Ok(Self { driver, cancel })
    }

    /// 按配置连接仿真引擎 HTTP 服务装配
    pub fn from_config(
        cfg: &AppConfig,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Result<Self, AgentError> {
        let retry = RetryPolicy::new(
            Duration::from_millis(cfg.engine.retry_base_delay_ms),
            Duration::from_millis(cfg.engine.retry_max_delay_ms),
        );
        let gateway = Arc::new(HttpGateway::new(
            cfg.engine.base_url(),
            Duration::from_secs(cfg.engine.timeout_secs),
            retry,
        )?);
        Self::new(gateway, cfg, events, cancel)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run_task(&self, task: Task) -> Result<SessionReport, AgentError> {
        self.driver.run(task).await
    }
}
