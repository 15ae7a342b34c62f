//! 传感器技能：雷达开关机与搜索
//!
//! 雷达类技能先查询单元挂载找到雷达设备，再对设备实体下发
//! switch / search 控制。找不到雷达属前置失败，不发控制指令。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::gateway::{EntityRef, Gateway};

use super::base::{
    self, CallOp, CallRecorder, ParamKind, ParamSpec, PlannedCall, Skill, SkillCategory,
    SkillResult,
};

const SENSOR_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::optional("radar_name", ParamKind::Str),
];

/// 查挂载并定位雷达设备（radar_name 未指定时取第一部）
async fn locate_radar(
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

    if let Some(name) = base::opt_str(params, "radar_name") {
        match unit_state.equipment_by_name(&name) {
            Some(eq) => Ok(eq.entity_name.clone()),
            None => Err(SkillResult::precondition_failed(
                format!("{unit} 未挂载名为 {name} 的雷达"),
                std::mem::take(rec),
            )),
        }
    } else {
        match unit_state.equipment_of_kind("radar").first() {
            Some(eq) => Ok(eq.entity_name.clone()),
            None => Err(SkillResult::precondition_failed(
                format!("{unit} 未挂载雷达设备"),
                std::mem::take(rec),
            )),
        }
    }
}

fn sensor_plan(unit: &str, command: &str, params: Value) -> Vec<PlannedCall> {
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
            entity: EntityRef::Equipment("radar".to_string()),
            command: Some(command.to_string()),
            params,
        },
    ]
}

/// 雷达开机
pub struct RadarPowerOn;

#[async_trait]
impl Skill for RadarPowerOn {
    fn name(&self) -> &'static str {
        "radar_power_on"
    }

    fn description(&self) -> &'static str {
        "雷达开机，开始探测空情"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Sensor
    }

    fn params(&self) -> &'static [ParamSpec] {
        &SENSOR_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        sensor_plan(&unit, "switch", json!({"power": true}))
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let mut rec = CallRecorder::new();
        let radar = match locate_radar(&mut rec, gw, &unit, params).await {
            Ok(r) => r,
            Err(result) => return result,
        };
        let entity = EntityRef::Equipment(radar.clone());
        match rec.control(gw, &unit, &entity, "switch", json!({"power": true})).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 雷达 {radar} 已开机"),
                json!({"radar": radar, "power": true}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("雷达开机失败: {e}"), rec),
        }
    }
}

/// 雷达关机
pub struct RadarPowerOff;

#[async_trait]
impl Skill for RadarPowerOff {
    fn name(&self) -> &'static str {
        "radar_power_off"
    }

    fn description(&self) -> &'static str {
        "雷达关机，保持电磁静默"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Sensor
    }

    fn params(&self) -> &'static [ParamSpec] {
        &SENSOR_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        sensor_plan(&unit, "switch", json!({"power": false}))
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let mut rec = CallRecorder::new();
        let radar = match locate_radar(&mut rec, gw, &unit, params).await {
            Ok(r) => r,
            Err(result) => return result,
        };
        let entity = EntityRef::Equipment(radar.clone());
        match rec.control(gw, &unit, &entity, "switch", json!({"power": false})).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 雷达 {radar} 已关机"),
                json!({"radar": radar, "power": false}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("雷达关机失败: {e}"), rec),
        }
    }
}

/// 雷达扇区搜索并回传探测结果
pub struct RadarSearch;

const SEARCH_PARAMS: [ParamSpec; 4] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::optional("radar_name", ParamKind::Str),
    ParamSpec::with_default("azimuth_center", ParamKind::Number, 0.0),
    ParamSpec::with_default("azimuth_width", ParamKind::Number, 120.0),
];

#[async_trait]
impl Skill for RadarSearch {
    fn name(&self) -> &'static str {
        "radar_search"
    }

    fn description(&self) -> &'static str {
        "雷达扇区搜索，查询当前探测到的目标"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Sensor
    }

    fn params(&self) -> &'static [ParamSpec] {
        &SEARCH_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        let mut calls = sensor_plan(&unit, "search", params.clone());
        calls.push(PlannedCall {
            op: CallOp::Query,
            unit,
            entity: EntityRef::Equipment("radar".to_string()),
            command: None,
            params: Value::Null,
        });
        calls
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let azimuth_center = base::num_or(params, "azimuth_center", 0.0) % 360.0;
        let azimuth_width = base::num_or(params, "azimuth_width", 120.0).clamp(10.0, 360.0);

        let mut rec = CallRecorder::new();
        let radar = match locate_radar(&mut rec, gw, &unit, params).await {
            Ok(r) => r,
            Err(result) => return result,
        };
        let entity = EntityRef::Equipment(radar.clone());

        let body = json!({"azimuth_center": azimuth_center, "azimuth_width": azimuth_width});
        if let Err(e) = rec.control(gw, &unit, &entity, "search", body).await {
            return SkillResult::control_failed(format!("雷达搜索指令失败: {e}"), rec);
        }

        // 下发搜索后读一次探测结果
        let detections = match rec.query(gw, &unit, &entity).await {
            Ok(v) => v,
            Err(e) => return SkillResult::control_failed(format!("读取探测结果失败: {e}"), rec),
        };
        let count = detections
            .get("detections")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);

        SkillResult::success(
            format!("{unit} 雷达 {radar} 扇区搜索完成，探测到 {count} 个目标"),
            json!({"radar": radar, "detections": detections.get("detections").cloned().unwrap_or(Value::Null)}),
            rec,
        )
    }
}
