//! 指挥官阶段：指令 + 态势 -> 作战意图
//!
//! 按关键词表对指令分词计票推断技能类别，从态势中抽取目标接触，
//! 并按类别偏置拉取战术知识段落。同一输入永远产生同一意图。

use serde::Serialize;
use tracing::debug;

use crate::gateway::WorldSnapshot;
use crate::ledger::LedgerEntry;
use crate::rag::{tokenizer, DocCategory, KnowledgeRetriever, Passage};
use crate::skills::SkillCategory;

use super::state::Task;

/// 类别关键词表（中英混排）。靠前的类别在同票时优先。
const CATEGORY_KEYWORDS: &[(SkillCategory, &[&str])] = &[
    (
        SkillCategory::Weapon,
        &[
            "攻击", "打击", "发射", "击落", "消灭", "开火", "交战", "中止交战",
            "attack", "engage", "strike", "launch", "fire", "bvr",
        ],
    ),
    (
        SkillCategory::Maneuver,
        &[
            "规避", "拦截", "爬升", "俯冲", "机动", "转向", "占位", "置尾",
            "evade", "intercept", "climb", "descend", "maneuver", "turn",
        ],
    ),
    (
        SkillCategory::ElectronicWarfare,
        &[
            "干扰", "电子战", "压制", "电磁攻击",
            "jam", "jammer", "suppress", "ecm",
        ],
    ),
    (
        SkillCategory::Sensor,
        &[
            "雷达", "探测", "搜索", "扫描", "开机", "关机",
            "radar", "detect", "search", "scan",
        ],
    ),
    (
        SkillCategory::Communication,
        &[
            "电台", "通信", "联络", "静默",
            "radio", "comm", "silence",
        ],
    ),
    (
        SkillCategory::Flight,
        &[
            "巡逻", "空域", "返航", "编队", "飞往", "航向", "飞行", "展开", "着陆",
            "patrol", "airspace", "fly", "return", "formation", "heading", "spread",
        ],
    ),
];

/// 类别 -> 知识库检索偏置
fn doc_bias(category: SkillCategory) -> DocCategory {
    match category {
        SkillCategory::Sensor => DocCategory::RadarManual,
        SkillCategory::Weapon => DocCategory::WeaponManual,
        SkillCategory::ElectronicWarfare => DocCategory::EwManual,
        SkillCategory::Communication => DocCategory::CommManual,
        SkillCategory::Flight => DocCategory::FlightManual,
        SkillCategory::Maneuver => DocCategory::Tactics,
    }
}

/// 作战意图：战术选择器的输入
#[derive(Debug, Clone, Serialize)]
pub struct Intent {
    pub category: SkillCategory,
    /// 一句话意图摘要
    pub summary: String,
    /// 受控单元
    pub unit: String,
    /// 从态势中识别出的目标接触（若有）
    pub target_contact: Option<String>,
    /// 指令分词结果，选择器按此算关键词重合度
    pub keywords: Vec<String>,
    /// 类别判定依据
    pub justification: String,
    /// 检索到的战术知识段落
    pub passages: Vec<Passage>,
}

pub struct Commander;

impl Commander {
    /// 形成意图。recent 为执行台账末尾若干条，failure_note 为上一
    /// 周期失败说明；两者都拼入检索查询，使知识检索偏向已发生过的
    /// 执行结果与故障处置内容。
    pub fn form_intent(
        task: &Task,
        world: &WorldSnapshot,
        recent: &[LedgerEntry],
        failure_note: Option<&str>,
        retriever: &KnowledgeRetriever,
    ) -> Intent {
        let keywords = tokenizer::tokenize(&task.directive);
        let (category, justification) = infer_category(&task.directive, &keywords);
        let target_contact = find_target_contact(task, world);

        let mut query = task.directive.clone();
        for c in &task.constraints {
            query.push(' ');
            query.push_str(c);
        }
        // 受控单元的态势摘要并入查询，使检索贴近当前处境
        if let Some(own) = world.find_unit(&task.unit) {
            query.push(' ');
            query.push_str(&world.summary_line(own));
        }
        // 近期执行结果并入查询：失败史把检索推向故障处置段落
        for e in recent {
            query.push(' ');
            query.push_str(&e.skill.replace('_', " "));
            if e.result.success {
                query.push_str(" 成功");
            } else {
                query.push_str(" 失败 ");
                query.push_str(&e.result.message);
            }
        }
        if let Some(note) = failure_note {
            query.push(' ');
            query.push_str(note);
        }
        let passages =
            retriever.retrieve(&query, retriever.default_top_k(), Some(doc_bias(category)));

        let mut summary = format!("[{}] {}", category.label(), task.directive);
        if let Some(ref t) = target_contact {
            summary.push_str(&format!(" 目标:{t}"));
        }
        if let Some(note) = failure_note {
            summary.push_str(&format!(" 上轮失败:{note}"));
        }

        debug!(
            category = category.as_str(),
            target = target_contact.as_deref().unwrap_or("-"),
            passages = passages.len(),
            "[Commander] 意图形成"
        );

        Intent {
            category,
            summary,
            unit: task.unit.clone(),
            target_contact,
            keywords,
            justification,
            passages,
        }
    }
}

/// 关键词计票推断类别，零命中时默认飞行类
fn infer_category(directive: &str, tokens: &[String]) -> (SkillCategory, String) {
    let mut best: Option<(SkillCategory, usize, Vec<&str>)> = None;
    for (category, words) in CATEGORY_KEYWORDS {
        let hits: Vec<&str> = words
            .iter()
            .filter(|w| directive.contains(**w) || tokens.iter().any(|t| t == **w))
            .copied()
            .collect();
        // 同票保持表序优先
        if !hits.is_empty() && best.as_ref().map(|(_, n, _)| hits.len() > *n).unwrap_or(true) {
            best = Some((*category, hits.len(), hits));
        }
    }
    match best {
        Some((category, _, hits)) => (
            category,
            format!("命中关键词: {}", hits.join("/")),
        ),
        None => (
            SkillCategory::Flight,
            "无类别关键词命中，默认飞行控制".to_string(),
        ),
    }
}

/// 指令中点名的态势单元即目标接触（排除受控单元自身）
fn find_target_contact(task: &Task, world: &WorldSnapshot) -> Option<String> {
    world
        .units
        .iter()
        .filter(|u| u.unit_name != task.unit && task.directive.contains(&u.unit_name))
        .map(|u| u.unit_name.clone())
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagSection;
    use crate::gateway::{Position, UnitState};
    use crate::pipeline::state::GoalSpec;

    fn empty_retriever() -> KnowledgeRetriever {
        let cfg = RagSection {
            knowledge_dir: std::path::PathBuf::from("/nonexistent"),
            ..Default::default()
        };
        KnowledgeRetriever::load(&cfg).unwrap()
    }

    fn task(directive: &str) -> Task {
        Task {
            directive: directive.to_string(),
            unit: "红方-001".to_string(),
            constraints: Vec::new(),
            max_cycles: None,
            goal: GoalSpec::Manual,
        }
    }

    fn hostile(name: &str) -> UnitState {
        UnitState {
            unit_id: 9,
            unit_name: name.to_string(),
            unit_type: "战斗机".to_string(),
            forceside: "蓝方".to_string(),
            position: Position::default(),
            orientation: Default::default(),
            speed: 250.0,
            alive: true,
            active: true,
            equipment: Vec::new(),
        }
    }

    #[test]
    fn patrol_directive_maps_to_flight() {
        let (cat, _) = infer_category("在1号空域巡逻", &tokenizer::tokenize("在1号空域巡逻"));
        assert_eq!(cat, SkillCategory::Flight);
    }

    #[test]
    fn attack_outranks_flight_keywords() {
        // 同时含"攻击"与"航向"，武器类在表中靠前且命中不少于飞行类
        let text = "攻击蓝方目标";
        let (cat, _) = infer_category(text, &tokenizer::tokenize(text));
        assert_eq!(cat, SkillCategory::Weapon);
    }

    #[test]
    fn unknown_directive_defaults_to_flight() {
        let (cat, why) = infer_category("例行任务", &tokenizer::tokenize("例行任务"));
        assert_eq!(cat, SkillCategory::Flight);
        assert!(why.contains("默认"));
    }

    #[test]
    fn target_contact_extracted_from_world() {
        let world = WorldSnapshot {
            sim_time: 0.0,
            units: vec![hostile("蓝方-052")],
        };
        let intent = Commander::form_intent(
            &task("攻击蓝方-052"),
            &world,
            &[],
            None,
            &empty_retriever(),
        );
        assert_eq!(intent.category, SkillCategory::Weapon);
        assert_eq!(intent.target_contact.as_deref(), Some("蓝方-052"));
    }

    #[test]
    fn ledger_tail_shifts_retrieval() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("flight_patrol.md"),
            "patrol route planning enter airspace hold station altitude",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("flight_recovery.md"),
            "recovery procedure control rejection climb abort return base",
        )
        .unwrap();
        let retriever = KnowledgeRetriever::load(&RagSection {
            knowledge_dir: dir.path().to_path_buf(),
            top_k: 1,
            ..Default::default()
        })
        .unwrap();
        let world = WorldSnapshot::default();
        let t = task("patrol airspace alpha");

        // 无执行史时检索命中巡逻航路文档
        let fresh = Commander::form_intent(&t, &world, &[], None, &retriever);
        assert_eq!(fresh.passages[0].source_id, "flight_patrol.md");

        // 台账末尾的失败记录把检索推向故障处置文档
        let failed = LedgerEntry {
            timestamp: chrono::Utc::now(),
            cycle: 1,
            skill: "return_to_base".to_string(),
            params: serde_json::json!({}),
            result: crate::skills::SkillResult::control_failed(
                "control rejection abort climb recovery",
                crate::skills::CallRecorder::new(),
            ),
            latency_ms: 5,
        };
        let informed = Commander::form_intent(&t, &world, &[failed], None, &retriever);
        assert_eq!(informed.passages[0].source_id, "flight_recovery.md");
    }

    #[test]
    fn same_input_same_intent() {
        let world = WorldSnapshot::default();
        let retriever = empty_retriever();
        let a = Commander::form_intent(&task("在1号空域巡逻"), &world, &[], None, &retriever);
        let b = Commander::form_intent(&task("在1号空域巡逻"), &world, &[], None, &retriever);
        assert_eq!(a.category, b.category);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.keywords, b.keywords);
    }
}
