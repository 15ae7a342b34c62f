//! 电子战技能：干扰吊舱开关

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::gateway::{EntityRef, Gateway};

use super::base::{
    self, CallOp, CallRecorder, ParamKind, ParamSpec, PlannedCall, Skill, SkillCategory,
    SkillResult,
};

const JAMMER_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::optional("jammer_name", ParamKind::Str),
];

async fn locate_jammer(
    rec: &mut CallRecorder,
    gw: &dyn Gateway,
    unit: &str,
    params: &Value,
) -> Result<String, SkillResult> {
    let state = match rec.query(gw, unit, &EntityRef::Platform).await {
        Ok(v) => v,
        Err(e) => {
            return Err(SkillResult::precondition_failed(
                format!("无法获取单元状态: {e}"),
                std::mem::take(rec),
            ))
        }
    };
    let unit_state = match base::unit_state_from(state) {
        Ok(s) => s,
        Err(e) => {
            return Err(SkillResult::precondition_failed(
                e.to_string(),
                std::mem::take(rec),
            ))
        }
    };

    if let Some(name) = base::opt_str(params, "jammer_name") {
        match unit_state.equipment_by_name(&name) {
            Some(eq) => Ok(eq.entity_name.clone()),
            None => Err(SkillResult::precondition_failed(
                format!("{unit} 未挂载名为 {name} 的干扰设备"),
                std::mem::take(rec),
            )),
        }
    } else {
        match unit_state.equipment_of_kind("jammer").first() {
            Some(eq) => Ok(eq.entity_name.clone()),
            None => Err(SkillResult::precondition_failed(
                format!("{unit} 未挂载干扰吊舱"),
                std::mem::take(rec),
            )),
        }
    }
}

fn jammer_plan(unit: &str, power: bool) -> Vec<PlannedCall> {
    vec![
        PlannedCall {
            op: CallOp::Query,
            unit: unit.to_string(),
            entity: EntityRef::Platform,
            command: None,
            params: Value::Null,
        },
        PlannedCall {
            op: CallOp::Control,
            unit: unit.to_string(),
            entity: EntityRef::Equipment("jammer".to_string()),
            command: Some("switch".to_string()),
            params: json!({"power": power}),
        },
    ]
}

/// 开启电子干扰
pub struct ActivateJammer;

#[async_trait]
impl Skill for ActivateJammer {
    fn name(&self) -> &'static str {
        "activate_jammer"
    }

    fn description(&self) -> &'static str {
        "开启电子干扰吊舱压制敌方雷达"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::ElectronicWarfare
    }

    fn params(&self) -> &'static [ParamSpec] {
        &JAMMER_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        jammer_plan(&unit, true)
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let mut rec = CallRecorder::new();
        let jammer = match locate_jammer(&mut rec, gw, &unit, params).await {
            Ok(j) => j,
            Err(result) => return result,
        };
        let entity = EntityRef::Equipment(jammer.clone());
        match rec.control(gw, &unit, &entity, "switch", json!({"power": true})).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 干扰吊舱 {jammer} 已开启"),
                json!({"jammer": jammer, "power": true}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("干扰开启失败: {e}"), rec),
        }
    }
}

/// 关闭电子干扰
pub struct DeactivateJammer;

#[async_trait]
impl Skill for DeactivateJammer {
    fn name(&self) -> &'static str {
        "deactivate_jammer"
    }

    fn description(&self) -> &'static str {
        "关闭电子干扰吊舱恢复静默"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::ElectronicWarfare
    }

    fn params(&self) -> &'static [ParamSpec] {
        &JAMMER_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        jammer_plan(&unit, false)
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let mut rec = CallRecorder::new();
        let jammer = match locate_jammer(&mut rec, gw, &unit, params).await {
            Ok(j) => j,
            Err(result) => return result,
        };
        let entity = EntityRef::Equipment(jammer.clone());
        match rec.control(gw, &unit, &entity, "switch", json!({"power": false})).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 干扰吊舱 {jammer} 已关闭"),
                json!({"jammer": jammer, "power": false}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("干扰关闭失败: {e}"), rec),
        }
    }
}
