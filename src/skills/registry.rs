//! 技能注册表
//!
//! 按名称存储 Arc<dyn Skill>；启动期注册，重名快速失败。
//! 战术选择器通过 by_category 圈定候选，Executor 通过 get 取执行体。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::AgentError;

use super::base::{Skill, SkillCategory};

/// 技能注册表（BTreeMap 保证遍历顺序确定）
#[derive(Default)]
pub struct SkillRegistry {
    skills: BTreeMap<&'static str, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册技能；名称冲突返回 SkillConflict（启动期快速失败）
    pub fn register(&mut self, skill: impl Skill + 'static) -> Result<(), AgentError> {
        let name = skill.name();
        if self.skills.contains_key(name) {
            return Err(AgentError::SkillConflict(name.to_string()));
        }
        self.skills.insert(name, Arc::new(skill));
        Ok(())
    }

    /// 按名查找
    pub fn get(&self, name: &str) -> Result<Arc<dyn Skill>, AgentError> {
        self.skills
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::NoMatchingSkill(format!("未注册技能: {name}")))
    }

    /// 按类别查找；类别下无技能同样按未命中处理
    pub fn by_category(&self, category: SkillCategory) -> Result<Vec<Arc<dyn Skill>>, AgentError> {
        let found: Vec<Arc<dyn Skill>> = self
            .skills
            .values()
            .filter(|s| s.category() == category)
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(AgentError::NoMatchingSkill(format!(
                "类别 {} 下无已注册技能",
                category.as_str()
            )));
        }
        Ok(found)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// 注册全部内置技能
    pub fn with_builtin_skills() -> Result<Self, AgentError> {
        use super::{communication, electronic_warfare, flight, maneuver, sensor, weapon};

        let mut reg = Self::new();
        // 机动
        reg.register(maneuver::ClimbAndAccelerate)?;
        reg.register(maneuver::DescendAndDecelerate)?;
        reg.register(maneuver::TurnToHeading)?;
        reg.register(maneuver::EvadeMissile)?;
        reg.register(maneuver::InterceptTarget)?;
        // 平台飞行
        reg.register(flight::FlyToPosition)?;
        reg.register(flight::FlyHeading)?;
        reg.register(flight::PatrolAirspace)?;
        reg.register(flight::ReturnToBase)?;
        reg.register(flight::JoinFormation)?;
        reg.register(flight::CombatSpread)?;
        // 传感器
        reg.register(sensor::RadarPowerOn)?;
        reg.register(sensor::RadarPowerOff)?;
        reg.register(sensor::RadarSearch)?;
        // 电子战
        reg.register(electronic_warfare::ActivateJammer)?;
        reg.register(electronic_warfare::DeactivateJammer)?;
        // 通信
        reg.register(communication::RadioPowerOn)?;
        reg.register(communication::RadioPowerOff)?;
        // 武器
        reg.register(weapon::BvrAttack)?;
        reg.register(weapon::AbortEngagement)?;
        Ok(reg)
    }
}
