//! 通信技能：电台开关

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::gateway::{EntityRef, Gateway};

use super::base::{
    self, CallOp, CallRecorder, ParamKind, ParamSpec, PlannedCall, Skill, SkillCategory,
    SkillResult,
};

const RADIO_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::optional("radio_name", ParamKind::Str),
];

async fn locate_radio(
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

    if let Some(name) = base::opt_str(params, "radio_name") {
        match unit_state.equipment_by_name(&name) {
            Some(eq) => Ok(eq.entity_name.clone()),
            None => Err(SkillResult::precondition_failed(
                format!("{unit} 未挂载名为 {name} 的电台"),
                std::mem::take(rec),
            )),
        }
    } else {
        match unit_state.equipment_of_kind("radio").first() {
            Some(eq) => Ok(eq.entity_name.clone()),
            None => Err(SkillResult::precondition_failed(
                format!("{unit} 未挂载通信电台"),
                std::mem::take(rec),
            )),
        }
    }
}

fn radio_plan(unit: &str, power: bool) -> Vec<PlannedCall> {
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
            entity: EntityRef::Equipment("radio".to_string()),
            command: Some("switch".to_string()),
            params: json!({"power": power}),
        },
    ]
}

/// 电台开机
pub struct RadioPowerOn;

#[async_trait]
impl Skill for RadioPowerOn {
    fn name(&self) -> &'static str {
        "radio_power_on"
    }

    fn description(&self) -> &'static str {
        "通信电台开机，恢复与编队和指挥所的联络"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Communication
    }

    fn params(&self) -> &'static [ParamSpec] {
        &RADIO_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        radio_plan(&unit, true)
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let mut rec = CallRecorder::new();
        let radio = match locate_radio(&mut rec, gw, &unit, params).await {
            Ok(r) => r,
            Err(result) => return result,
        };
        let entity = EntityRef::Equipment(radio.clone());
        match rec.control(gw, &unit, &entity, "switch", json!({"power": true})).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 电台 {radio} 已开机"),
                json!({"radio": radio, "power": true}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("电台开机失败: {e}"), rec),
        }
    }
}

/// 电台关机
pub struct RadioPowerOff;

#[async_trait]
impl Skill for RadioPowerOff {
    fn name(&self) -> &'static str {
        "radio_power_off"
    }

    fn description(&self) -> &'static str {
        "通信电台关机，进入无线电静默"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Communication
    }

    fn params(&self) -> &'static [ParamSpec] {
        &RADIO_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        radio_plan(&unit, false)
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let mut rec = CallRecorder::new();
        let radio = match locate_radio(&mut rec, gw, &unit, params).await {
            Ok(r) => r,
            Err(result) => return result,
        };
        let entity = EntityRef::Equipment(radio.clone());
        match rec.control(gw, &unit, &entity, "switch", json!({"power": false})).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 电台 {radio} 已关机"),
                json!({"radio": radio, "power": false}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("电台关机失败: {e}"), rec),
        }
    }
}
