//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TALON__*` 覆盖
//! （双下划线表示嵌套，如 `TALON__ENGINE__HOST=10.0.0.2`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSection,
    pub agent: AgentSection,
    pub rag: RagSection,
    pub replay: ReplaySection,
}

/// [engine] 段：仿真引擎连接与重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub host: String,
    pub port: u16,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
    /// 瞬时故障重试的退避基准（毫秒）
    pub retry_base_delay_ms: u64,
    /// 退避上限（毫秒）
    pub retry_max_delay_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            timeout_secs: 10,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 2000,
        }
    }
}

impl EngineSection {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// [agent] 段：周期与重试预算（可运行期调参的常量统一在此）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 周期预算：无论是否有进展都保证终止
    pub max_cycles: u32,
    /// 连续重规划上限，超出转 fatal-error
    pub replan_limit: u32,
    /// 同一 技能+目标 相同失败的重试预算，耗尽即升级为 fatal-error
    pub failure_retry_budget: u32,
    /// 快照新鲜度窗口（毫秒），超龄在 Commander 前强制刷新
    pub snapshot_freshness_ms: u64,
    /// 终止报告携带的台账尾部条数
    pub ledger_tail: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_cycles: 10,
            replan_limit: 3,
            failure_retry_budget: 2,
            snapshot_freshness_ms: 2000,
            ledger_tail: 5,
        }
    }
}

/// [rag] 段：知识库目录与检索参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagSection {
    pub knowledge_dir: PathBuf,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for RagSection {
    fn default() -> Self {
        Self {
            knowledge_dir: PathBuf::from("knowledge_base"),
            top_k: 3,
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

/// [replay] 段：会话回放文件输出目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplaySection {
    pub dir: PathBuf,
}

impl Default for ReplaySection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("replays"),
        }
    }
}

/// 从 config 目录加载配置，环境变量 TALON__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TALON__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{name}.toml");
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TALON")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_budgets() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_cycles, 10);
        assert_eq!(cfg.agent.replan_limit, 3);
        assert_eq!(cfg.agent.failure_retry_budget, 2);
        assert_eq!(cfg.rag.top_k, 3);
        assert_eq!(cfg.engine.base_url(), "http://localhost:8080");
    }
}
