//! 决策管线集成测试
//!
//! 用脚本化网关替身驱动完整会话，覆盖目标达成、前置失败连败
//! 升级、重规划耗尽、周期上限与用户取消五类终止路径。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use talon::agent::Agent;
use talon::config::AppConfig;
use talon::gateway::{EntityRef, Gateway, GatewayError};
use talon::pipeline::{EventSink, GoalSpec, Task, TerminationReason};

/// 脚本化网关替身
///
/// 受控单元"红方-001"挂雷达与武器；收到 patrol 控制指令后
/// 单元位置移入巡逻空域，借此驱动目标判据翻转。
struct MockGateway {
    /// 武器状态查询的应答脚本
    weapon_status: Value,
    /// 态势中是否存在敌机"蓝方-052"
    hostile_present: bool,
    patrol_done: AtomicBool,
    control_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl MockGateway {
    fn new() -> Self {
        Self {
            weapon_status: json!({"status": "available", "has_munition": true}),
            hostile_present: false,
            patrol_done: AtomicBool::new(false),
            control_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    fn with_weapon_status(mut self, status: Value) -> Self {
        self.weapon_status = status;
        self
    }

    fn with_hostile(mut self) -> Self {
        self.hostile_present = true;
        self
    }

    fn own_unit(&self) -> Value {
        // 巡逻前在空域外（纬度 29.0），巡逻指令生效后移入空域内
        let lat = if self.patrol_done.load(Ordering::SeqCst) {
            30.5
        } else {
            29.0
        };
        json!({
            "unit_id": 1,
            "unit_name": "红方-001",
            "unit_type": "战斗机",
            "forceside": "红方",
            "position": {"latitude": lat, "longitude": 120.5, "altitude": 5000.0},
            "orientation": {"pitch": 0.0, "heading": 90.0, "roll": 0.0},
            "speed": 200.0,
            "equipment": [
                {"entity_id": 11, "entity_name": "机载雷达", "type": "radar", "status": "OFF"},
                {"entity_id": 12, "entity_name": "中距弹挂架", "type": "weapon", "status": "ON"}
            ]
        })
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn world_state(&self) -> Result<talon::gateway::WorldSnapshot, GatewayError> {
        let mut units = vec![self.own_unit()];
        if self.hostile_present {
            units.push(json!({
                "unit_id": 2,
                "unit_name": "蓝方-052",
                "unit_type": "战斗机",
                "forceside": "蓝方",
                "position": {"latitude": 30.8, "longitude": 121.2, "altitude": 7000.0},
                "speed": 250.0
            }));
        }
        serde_json::from_value(json!({"sim_time": 100.0, "units": units}))
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn query(&self, _unit: &str, entity: &EntityRef) -> Result<Value, GatewayError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        match entity {
            EntityRef::Platform => Ok(self.own_unit()),
            EntityRef::Equipment(name) if name == "中距弹挂架" => Ok(self.weapon_status.clone()),
            EntityRef::Equipment(name) => Err(GatewayError::NotFound(format!("设备 {name}"))),
        }
    }

    async fn control(
        &self,
        _unit: &str,
        _entity: &EntityRef,
        command: &str,
        _params: &Value,
    ) -> Result<Value, GatewayError> {
        self.control_calls.fetch_add(1, Ordering::SeqCst);
        if command == "patrol" {
            self.patrol_done.store(true, Ordering::SeqCst);
        }
        Ok(json!({"result": "ok"}))
    }

    async fn alter(&self, _unit: &str, _params: &Value) -> Result<Value, GatewayError> {
        self.control_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"result": "ok"}))
    }
}

/// 测试配置：快照不缓存、知识库指向不存在目录、复盘落到临时目录
fn test_config(replay_dir: &std::path::Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.agent.snapshot_freshness_ms = 0;
    cfg.rag.knowledge_dir = std::path::PathBuf::from("/nonexistent");
    cfg.replay.dir = replay_dir.to_path_buf();
    cfg
}

fn agent_with(gateway: Arc<dyn Gateway>, cfg: &AppConfig, cancel: CancellationToken) -> Agent {
    Agent::new(gateway, cfg, EventSink::detached(), cancel).unwrap()
}

fn task(directive: &str, goal: GoalSpec) -> Task {
    Task {
        directive: directive.to_string(),
        unit: "红方-001".to_string(),
        constraints: Vec::new(),
        max_cycles: None,
        goal,
    }
}

#[tokio::test]
async fn patrol_session_reaches_goal() {
    let replay_dir = tempfile::tempdir().unwrap();
    let cfg = test_config(replay_dir.path());
    let gateway = Arc::new(MockGateway::new());
    let agent = agent_with(gateway.clone(), &cfg, CancellationToken::new());

    let square = vec![[30.0, 120.0], [30.0, 121.0], [31.0, 121.0], [31.0, 120.0]];
    let report = agent
        .run_task(task(
            "在1号空域巡逻，高度5000，速度200",
            GoalSpec::UnitInsideArea {
                unit: "红方-001".to_string(),
                polygon: square,
            },
        ))
        .await
        .unwrap();

    assert_eq!(report.termination, TerminationReason::GoalAchieved);
    assert_eq!(report.ledger_entries, 1);
    assert_eq!(gateway.control_calls.load(Ordering::SeqCst), 1);

    // 复盘文件已落盘且可解析
    let path = report.replay_path.expect("复盘文件应已写出");
    let dump: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(dump["termination"]["reason"], "goal_achieved");
    assert_eq!(dump["ledger"]["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn munition_precondition_failure_escalates_without_control_calls() {
    let replay_dir = tempfile::tempdir().unwrap();
    let cfg = test_config(replay_dir.path());
    let gateway = Arc::new(
        MockGateway::new()
            .with_hostile()
            .with_weapon_status(json!({"status": "available", "has_munition": false})),
    );
    let agent = agent_with(gateway.clone(), &cfg, CancellationToken::new());

    let report = agent
        .run_task(task("攻击蓝方-052", GoalSpec::Manual))
        .await
        .unwrap();

    // 同一 技能+目标 相同失败，预算 2 次耗尽后升级为致命错误
    match &report.termination {
        TerminationReason::FatalError { detail } => {
            assert!(detail.contains("bvr_attack"), "终止详情: {detail}");
        }
        other => panic!("应以致命错误终止，实际 {other:?}"),
    }
    assert_eq!(report.cycles_used, 2);
    assert_eq!(report.ledger_entries, 2);
    // 前置失败的硬约束：全程零控制指令
    assert_eq!(gateway.control_calls.load(Ordering::SeqCst), 0);
    assert!(gateway.query_calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn unbindable_target_exhausts_replans() {
    let replay_dir = tempfile::tempdir().unwrap();
    let cfg = test_config(replay_dir.path());
    // 态势中没有敌机：攻击意图绑不出 target_name
    let gateway = Arc::new(MockGateway::new());
    let agent = agent_with(gateway.clone(), &cfg, CancellationToken::new());

    let report = agent
        .run_task(task("攻击敌机", GoalSpec::Manual))
        .await
        .unwrap();

    match &report.termination {
        TerminationReason::FatalError { detail } => {
            assert!(detail.contains("无匹配技能"), "终止详情: {detail}");
        }
        other => panic!("应以致命错误终止，实际 {other:?}"),
    }
    // 重规划周期消耗周期额度但不写账本
    assert_eq!(report.cycles_used, 3);
    assert_eq!(report.ledger_entries, 0);
    assert_eq!(gateway.control_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn manual_goal_runs_to_cycle_budget() {
    let replay_dir = tempfile::tempdir().unwrap();
    let cfg = test_config(replay_dir.path());
    let gateway = Arc::new(MockGateway::new());
    let agent = agent_with(gateway.clone(), &cfg, CancellationToken::new());

    let mut t = task("在1号空域巡逻", GoalSpec::Manual);
    t.max_cycles = Some(4);
    let report = agent.run_task(t).await.unwrap();

    assert_eq!(report.termination, TerminationReason::MaxCyclesExceeded);
    assert_eq!(report.cycles_used, 4);
    // 每个执行周期恰好一条账本记录
    assert_eq!(report.ledger_entries, 4);
    assert_eq!(gateway.control_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn snapshot_requery_without_control_is_idempotent() {
    let gateway = MockGateway::new();
    let first = gateway.world_state().await.unwrap();
    let second = gateway.world_state().await.unwrap();
    assert_eq!(first, second);

    // 下发控制指令后快照允许变化
    gateway
        .control(
            "红方-001",
            &EntityRef::Platform,
            "patrol",
            &json!({"airspace_name": "1号空域"}),
        )
        .await
        .unwrap();
    let third = gateway.world_state().await.unwrap();
    assert_ne!(first, third);
}

#[tokio::test]
async fn snapshot_window_does_not_mask_post_control_world_changes() {
    let replay_dir = tempfile::tempdir().unwrap();
    // 拉大新鲜度窗口：窗口未过期时控制指令后仍必须重拉态势，
    // 否则观察者只能看到执行前的旧快照，目标永远判不成
    let mut cfg = test_config(replay_dir.path());
    cfg.agent.snapshot_freshness_ms = 60_000;
    let gateway = Arc::new(MockGateway::new());
    let agent = agent_with(gateway.clone(), &cfg, CancellationToken::new());

    let square = vec![[30.0, 120.0], [30.0, 121.0], [31.0, 121.0], [31.0, 120.0]];
    let report = agent
        .run_task(task(
            "在1号空域巡逻，高度5000，速度200",
            GoalSpec::UnitInsideArea {
                unit: "红方-001".to_string(),
                polygon: square,
            },
        ))
        .await
        .unwrap();

    assert_eq!(report.termination, TerminationReason::GoalAchieved);
    assert_eq!(report.cycles_used, 1);
    assert_eq!(report.ledger_entries, 1);
    // 巡逻指令只应下发一次，不存在冗余重发
    assert_eq!(gateway.control_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pre_cancelled_session_terminates_immediately() {
    let replay_dir = tempfile::tempdir().unwrap();
    let cfg = test_config(replay_dir.path());
    let gateway = Arc::new(MockGateway::new());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let agent = agent_with(gateway.clone(), &cfg, cancel);

    let report = agent
        .run_task(task("在1号空域巡逻", GoalSpec::Manual))
        .await
        .unwrap();

    assert_eq!(report.termination, TerminationReason::UserCancelled);
    assert_eq!(report.cycles_used, 0);
    assert_eq!(report.ledger_entries, 0);
    assert_eq!(gateway.control_calls.load(Ordering::SeqCst), 0);
}
