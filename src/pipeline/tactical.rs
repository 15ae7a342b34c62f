//! 战术选择器阶段：意图 -> (技能, 绑定参数)
//!
//! 先按意图类别圈定候选，再按意图关键词与技能名/描述的 Jaccard
//! 重合度打分，同分按技能名字典序取先，保证选型可复现。参数绑定
//! 失败（必填缺来源）按无匹配技能处理，交由驱动器重规划。

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::core::AgentError;
use crate::rag::tokenizer;
use crate::skills::{ParamKind, ParamSpec, Skill, SkillRegistry};

use super::commander::Intent;
use super::state::Task;

pub struct TacticalSelector {
    registry: Arc<SkillRegistry>,
}

impl TacticalSelector {
    pub fn new(registry: Arc<SkillRegistry>) -> Self {
        Self { registry }
    }

    /// 选型。类别内无候选、或绑定不出必填参数时返回
    /// NoMatchingSkill，交由驱动器重规划。
    pub fn select(
        &self,
        intent: &Intent,
        task: &Task,
    ) -> Result<(Arc<dyn Skill>, Value), AgentError> {
        let candidates = self.registry.by_category(intent.category)?;

        let intent_tokens: std::collections::HashSet<String> =
            intent.keywords.iter().cloned().collect();

        let mut best: Option<(f32, Arc<dyn Skill>)> = None;
        for skill in candidates {
            let text = format!("{} {}", skill.name().replace('_', " "), skill.description());
            let skill_tokens = tokenizer::tokenize_to_set(&text);
            let score = tokenizer::jaccard(&intent_tokens, &skill_tokens);
            debug!(skill = skill.name(), score, "[Tactical] 候选打分");
            // 严格大于：同分保留先出现者（注册表按名字典序迭代）
            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((score, skill));
            }
        }
        let (score, skill) = best.ok_or_else(|| {
            AgentError::NoMatchingSkill(format!("类别 {} 无可用技能", intent.category.as_str()))
        })?;

        let params = bind_params(skill.params(), intent, task).map_err(|missing| {
            AgentError::NoMatchingSkill(format!(
                "技能 {} 缺少必填参数 {missing}",
                skill.name()
            ))
        })?;

        debug!(
            skill = skill.name(),
            score,
            params = %params,
            "[Tactical] 选型完成"
        );
        Ok((skill, params))
    }
}

/// 按参数声明逐项绑定；返回 Err(参数名) 表示必填缺来源
fn bind_params(specs: &[ParamSpec], intent: &Intent, task: &Task) -> Result<Value, &'static str> {
    let mut params = json!({});
    for spec in specs {
        let value = bind_one(spec, intent, task);
        match value {
            Some(v) => {
                params[spec.name] = v;
            }
            None if spec.required => return Err(spec.name),
            None => {}
        }
    }
    Ok(params)
}

fn bind_one(spec: &ParamSpec, intent: &Intent, task: &Task) -> Option<Value> {
    let directive = task.directive.as_str();
    match spec.name {
        "unit_name" => Some(json!(task.unit)),
        "target_name" => intent.target_contact.as_ref().map(|t| json!(t)),
        "leader_name" => intent.target_contact.as_ref().map(|t| json!(t)),
        "airspace_name" => extract_airspace(directive).map(|a| json!(a)),
        "altitude" | "target_altitude" => extract_altitude(directive)
            .or(spec.default_num)
            .map(|v| json!(v)),
        "speed" | "target_speed" => extract_speed(directive)
            .or(spec.default_num)
            .map(|v| json!(v)),
        "heading" | "threat_bearing" => extract_heading(directive)
            .or(spec.default_num)
            .map(|v| json!(v)),
        _ => match spec.kind {
            ParamKind::Str => None,
            ParamKind::Number => spec.default_num.map(|v| json!(v)),
            ParamKind::Integer => spec.default_num.map(|v| json!(v as i64)),
        },
    }
}

/// 从指令中取空域名："在1号空域巡逻" -> "1号空域"，
/// "patrol airspace A" -> "A"
fn extract_airspace(directive: &str) -> Option<String> {
    if let Some(pos) = directive.find("空域") {
        let head = &directive[..pos];
        // 截取紧邻"空域"之前的字母数字（含"号"）
        let name: String = head
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '号' || *c == '-')
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if !name.is_empty() {
            return Some(format!("{name}空域"));
        }
        return Some("空域".to_string());
    }
    // 大小写不敏感查找必须在原串上做字节下标；to_lowercase 会改变
    // 某些字符的字节长度（如 İ），下标错位会切到字符中间
    let idx = find_ascii_ci(directive, "airspace")?;
    let rest = directive[idx + "airspace".len()..].trim_start();
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    (!name.is_empty()).then_some(name)
}

/// ASCII 大小写不敏感子串查找，返回原串字节下标。
/// needle 须为纯 ASCII，命中必然落在字符边界上。
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// "高度5000" / "5000m"（排除 m/s）-> 米
fn extract_altitude(directive: &str) -> Option<f64> {
    if let Some(v) = number_after(directive, "高度") {
        return Some(v);
    }
    number_with_suffix(directive, "m", &["m/s"])
}

/// "速度200" / "200m/s" -> m/s
fn extract_speed(directive: &str) -> Option<f64> {
    if let Some(v) = number_after(directive, "速度") {
        return Some(v);
    }
    number_with_suffix(directive, "m/s", &[])
}

/// "航向90" / "90°" -> 度
fn extract_heading(directive: &str) -> Option<f64> {
    if let Some(v) = number_after(directive, "航向") {
        return Some(v);
    }
    number_with_suffix(directive, "°", &[])
}

/// 取关键词后紧跟的数字
fn number_after(text: &str, keyword: &str) -> Option<f64> {
    let idx = text.find(keyword)?;
    let rest: String = text[idx + keyword.len()..]
        .chars()
        .skip_while(|c| *c == ' ' || *c == ':' || *c == '：')
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    rest.parse().ok()
}

/// 取后缀（如 "m" / "m/s"）之前的数字；excludes 列出不可误配的更长后缀
fn number_with_suffix(text: &str, suffix: &str, excludes: &[&str]) -> Option<f64> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(suffix) {
        let idx = search_from + rel;
        // 排除形如 "m" 误配 "m/s" 前半的情况
        let shadowed = excludes
            .iter()
            .any(|longer| text[idx..].starts_with(longer));
        if !shadowed {
            let digits: String = text[..idx]
                .chars()
                .rev()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            if let Ok(v) = digits.parse() {
                return Some(v);
            }
        }
        search_from = idx + suffix.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::commander::Commander;
    use crate::pipeline::state::GoalSpec;
    use crate::rag::KnowledgeRetriever;
    use crate::skills::SkillCategory;

    fn retriever() -> KnowledgeRetriever {
        let cfg = crate::config::RagSection {
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

    fn selector() -> TacticalSelector {
        TacticalSelector::new(Arc::new(SkillRegistry::with_builtin_skills().unwrap()))
    }

    fn intent_for(directive: &str) -> Intent {
        Commander::form_intent(
            &task(directive),
            &crate::gateway::WorldSnapshot::default(),
            &[],
            None,
            &retriever(),
        )
    }

    #[test]
    fn patrol_directive_selects_patrol_airspace() {
        let t = task("在1号空域巡逻，高度5000，速度200");
        let intent = intent_for(&t.directive);
        assert_eq!(intent.category, SkillCategory::Flight);

        let (skill, params) = selector().select(&intent, &t).unwrap();
        assert_eq!(skill.name(), "patrol_airspace");
        assert_eq!(params["unit_name"], "红方-001");
        assert_eq!(params["airspace_name"], "1号空域");
        assert_eq!(params["altitude"], 5000.0);
        assert_eq!(params["speed"], 200.0);
    }

    #[test]
    fn missing_required_param_is_no_matching_skill() {
        // 攻击意图但态势中无目标接触 -> target_name 绑不出
        let t = task("攻击敌机");
        let intent = intent_for(&t.directive);
        assert_eq!(intent.category, SkillCategory::Weapon);
        assert!(intent.target_contact.is_none());

        let err = selector().select(&intent, &t).unwrap_err();
        assert!(matches!(err, AgentError::NoMatchingSkill(_)));
        assert!(err.to_string().contains("target_name"));
    }

    #[test]
    fn selection_is_deterministic() {
        let t = task("在1号空域巡逻");
        let intent = intent_for(&t.directive);
        let sel = selector();
        let a = sel.select(&intent, &t).unwrap();
        let b = sel.select(&intent, &t).unwrap();
        assert_eq!(a.0.name(), b.0.name());
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn extracts_quantities_from_mixed_text() {
        assert_eq!(extract_altitude("爬升到高度8000"), Some(8000.0));
        assert_eq!(extract_altitude("patrol airspace A at 5000m, 200m/s"), Some(5000.0));
        assert_eq!(extract_speed("patrol airspace A at 5000m, 200m/s"), Some(200.0));
        assert_eq!(extract_speed("速度300飞行"), Some(300.0));
        assert_eq!(extract_heading("转向航向90"), Some(90.0));
        assert_eq!(extract_airspace("patrol airspace A at 5000m"), Some("A".to_string()));
        assert_eq!(extract_airspace("在1号空域巡逻"), Some("1号空域".to_string()));
        assert_eq!(extract_altitude("正常巡航"), None);
    }

    #[test]
    fn airspace_lookup_is_case_insensitive_and_utf8_safe() {
        assert_eq!(
            extract_airspace("Patrol AIRSPACE B now"),
            Some("B".to_string())
        );
        // 小写化会改变 İ 的字节长度，下标必须按原串计算
        assert_eq!(
            extract_airspace("İlk görev: patrol airspace C"),
            Some("C".to_string())
        );
        assert_eq!(extract_airspace("İntercept only"), None);
    }
}
