//! 机动动作技能
//!
//! 爬升、俯冲、转向、导弹规避与目标拦截。机动类技能先查询当前
//! 平台状态作为前置，再通过状态量修改（alter）下发姿态/速度指令。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::gateway::{bearing_deg, clamp, distance_m, EntityRef, Gateway};

use super::base::{
    self, CallOp, CallRecorder, ParamKind, ParamSpec, PlannedCall, Skill, SkillCategory,
    SkillResult,
};

const SPEED_MIN: f64 = 100.0;
const SPEED_MAX: f64 = 800.0;
const ALT_MIN: f64 = 500.0;
const ALT_MAX: f64 = 15000.0;

fn query_then_alter(unit: &str, params: &Value) -> Vec<PlannedCall> {
    vec![
        PlannedCall {
            op: CallOp::Query,
            unit: unit.to_string(),
            entity: EntityRef::Platform,
            command: None,
            params: Value::Null,
        },
        PlannedCall {
            op: CallOp::Alter,
            unit: unit.to_string(),
            entity: EntityRef::Platform,
            command: None,
            params: params.clone(),
        },
    ]
}

/// 爬升加速抢占高度优势
pub struct ClimbAndAccelerate;

const CLIMB_PARAMS: [ParamSpec; 3] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::with_default("target_altitude", ParamKind::Number, 8000.0),
    ParamSpec::with_default("target_speed", ParamKind::Number, 300.0),
];

#[async_trait]
impl Skill for ClimbAndAccelerate {
    fn name(&self) -> &'static str {
        "climb_and_accelerate"
    }

    fn description(&self) -> &'static str {
        "爬升并加速，抢占高度与能量优势"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Maneuver
    }

    fn params(&self) -> &'static [ParamSpec] {
        &CLIMB_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        query_then_alter(&unit, params)
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let target_alt = clamp(base::num_or(params, "target_altitude", 8000.0), ALT_MIN, ALT_MAX);
        let target_speed = clamp(base::num_or(params, "target_speed", 300.0), SPEED_MIN, SPEED_MAX);

        let mut rec = CallRecorder::new();
        let state = match rec.query(gw, &unit, &EntityRef::Platform).await {
            Ok(v) => v,
            Err(e) => {
                return SkillResult::precondition_failed(format!("无法获取单元状态: {e}"), rec)
            }
        };
        let unit_state = match base::unit_state_from(state) {
            Ok(s) => s,
            Err(e) => return SkillResult::precondition_failed(e.to_string(), rec),
        };
        if unit_state.position.altitude >= target_alt {
            return SkillResult::precondition_failed(
                format!(
                    "当前高度 {:.0}m 已不低于目标高度 {:.0}m，无需爬升",
                    unit_state.position.altitude, target_alt
                ),
                rec,
            );
        }

        // 爬升段抬头 15 度
        let body = json!({
            "altitude": target_alt, "speed": target_speed, "pitch": 15.0,
        });
        match rec.alter(gw, &unit, body).await {
            Ok(_) => SkillResult::success(
                format!(
                    "{unit} 由 {:.0}m 爬升至 {target_alt:.0}m，加速至 {target_speed:.0}m/s",
                    unit_state.position.altitude
                ),
                json!({"target_altitude": target_alt, "target_speed": target_speed}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("爬升指令失败: {e}"), rec),
        }
    }
}

/// 俯冲减速降低被探测性
pub struct DescendAndDecelerate;

const DESCEND_PARAMS: [ParamSpec; 3] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::with_default("target_altitude", ParamKind::Number, 2000.0),
    ParamSpec::with_default("target_speed", ParamKind::Number, 180.0),
];

#[async_trait]
impl Skill for DescendAndDecelerate {
    fn name(&self) -> &'static str {
        "descend_and_decelerate"
    }

    fn description(&self) -> &'static str {
        "俯冲并减速，降低高度进入低空"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Maneuver
    }

    fn params(&self) -> &'static [ParamSpec] {
        &DESCEND_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        query_then_alter(&unit, params)
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let target_alt = clamp(base::num_or(params, "target_altitude", 2000.0), ALT_MIN, ALT_MAX);
        let target_speed = clamp(base::num_or(params, "target_speed", 180.0), SPEED_MIN, SPEED_MAX);

        let mut rec = CallRecorder::new();
        let state = match rec.query(gw, &unit, &EntityRef::Platform).await {
            Ok(v) => v,
            Err(e) => {
                return SkillResult::precondition_failed(format!("无法获取单元状态: {e}"), rec)
            }
        };
        let unit_state = match base::unit_state_from(state) {
            Ok(s) => s,
            Err(e) => return SkillResult::precondition_failed(e.to_string(), rec),
        };
        if unit_state.position.altitude <= target_alt {
            return SkillResult::precondition_failed(
                format!(
                    "当前高度 {:.0}m 已不高于目标高度 {:.0}m，无需俯冲",
                    unit_state.position.altitude, target_alt
                ),
                rec,
            );
        }

        let body = json!({
            "altitude": target_alt, "speed": target_speed, "pitch": -10.0,
        });
        match rec.alter(gw, &unit, body).await {
            Ok(_) => SkillResult::success(
                format!(
                    "{unit} 由 {:.0}m 俯冲至 {target_alt:.0}m，减速至 {target_speed:.0}m/s",
                    unit_state.position.altitude
                ),
                json!({"target_altitude": target_alt, "target_speed": target_speed}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("俯冲指令失败: {e}"), rec),
        }
    }
}

/// 转向指定航向
pub struct TurnToHeading;

const TURN_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::required("heading", ParamKind::Number),
];

#[async_trait]
impl Skill for TurnToHeading {
    fn name(&self) -> &'static str {
        "turn_to_heading"
    }

    fn description(&self) -> &'static str {
        "快速转向到指定航向角"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Maneuver
    }

    fn params(&self) -> &'static [ParamSpec] {
        &TURN_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        vec![PlannedCall {
            op: CallOp::Alter,
            unit,
            entity: EntityRef::Platform,
            command: None,
            params: params.clone(),
        }]
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let heading = match base::req_num(params, "heading") {
            Ok(h) => ((h % 360.0) + 360.0) % 360.0,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };

        let mut rec = CallRecorder::new();
        match rec.alter(gw, &unit, json!({"heading": heading})).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 转向航向 {heading:.0}°"),
                json!({"heading": heading}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("转向指令失败: {e}"), rec),
        }
    }
}

/// 导弹规避：大过载侧转 + 降高增速 + 开启干扰
pub struct EvadeMissile;

const EVADE_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::optional("threat_bearing", ParamKind::Number),
];

#[async_trait]
impl Skill for EvadeMissile {
    fn name(&self) -> &'static str {
        "evade_missile"
    }

    fn description(&self) -> &'static str {
        "规避来袭导弹：大过载机动并开启电子干扰"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Maneuver
    }

    fn params(&self) -> &'static [ParamSpec] {
        &EVADE_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        query_then_alter(&unit, params)
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };

        let mut rec = CallRecorder::new();
        let state = match rec.query(gw, &unit, &EntityRef::Platform).await {
            Ok(v) => v,
            Err(e) => {
                return SkillResult::precondition_failed(format!("无法获取单元状态: {e}"), rec)
            }
        };
        let unit_state = match base::unit_state_from(state) {
            Ok(s) => s,
            Err(e) => return SkillResult::precondition_failed(e.to_string(), rec),
        };

        // 已知威胁方位则置尾逃逸（威胁方位+150度），否则盲转 90 度
        let evade_heading = match params.get("threat_bearing").and_then(Value::as_f64) {
            Some(b) => (b + 150.0) % 360.0,
            None => (unit_state.orientation.heading + 90.0) % 360.0,
        };
        let evade_alt = (unit_state.position.altitude - 1000.0).max(ALT_MIN);
        let evade_speed = (unit_state.speed * 1.2).min(SPEED_MAX);

        let body = json!({
            "heading": evade_heading,
            "altitude": evade_alt,
            "speed": evade_speed,
            "pitch": -20.0,
            "roll": 60.0,
        });
        if let Err(e) = rec.alter(gw, &unit, body).await {
            return SkillResult::control_failed(format!("规避机动失败: {e}"), rec);
        }

        // 机动后顺手开干扰吊舱，失败不影响规避成功判定
        let mut jammers_on = 0usize;
        for jammer in unit_state.equipment_of_kind("jammer") {
            let entity = EntityRef::Equipment(jammer.entity_name.clone());
            if rec
                .control(gw, &unit, &entity, "switch", json!({"power": true}))
                .await
                .is_ok()
            {
                jammers_on += 1;
            }
        }

        SkillResult::success(
            format!(
                "{unit} 规避机动：航向 {evade_heading:.0}° 高度 {evade_alt:.0}m 速度 {evade_speed:.0}m/s，开启干扰 {jammers_on} 部"
            ),
            json!({"evade_heading": evade_heading, "jammers_on": jammers_on}),
            rec,
        )
    }
}

/// 拦截指定目标：按目标方位/距离解算拦截航向
pub struct InterceptTarget;

const INTERCEPT_PARAMS: [ParamSpec; 3] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::required("target_name", ParamKind::Str),
    ParamSpec::optional("speed", ParamKind::Number),
];

#[async_trait]
impl Skill for InterceptTarget {
    fn name(&self) -> &'static str {
        "intercept_target"
    }

    fn description(&self) -> &'static str {
        "拦截指定目标，解算拦截航向并开启雷达"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Maneuver
    }

    fn params(&self) -> &'static [ParamSpec] {
        &INTERCEPT_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        query_then_alter(&unit, params)
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let target = match base::req_str(params, "target_name") {
            Ok(t) => t,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };

        let mut rec = CallRecorder::new();
        let state = match rec.query(gw, &unit, &EntityRef::Platform).await {
            Ok(v) => v,
            Err(e) => {
                return SkillResult::precondition_failed(format!("无法获取单元状态: {e}"), rec)
            }
        };
        let own = match base::unit_state_from(state) {
            Ok(s) => s,
            Err(e) => return SkillResult::precondition_failed(e.to_string(), rec),
        };
        let world = match rec.world_state(gw).await {
            Ok(w) => w,
            Err(e) => {
                return SkillResult::precondition_failed(format!("无法获取战场态势: {e}"), rec)
            }
        };
        let Some(tgt) = world.find_unit(&target) else {
            return SkillResult::precondition_failed(format!("战场态势中未发现目标 {target}"), rec);
        };
        if !tgt.alive {
            return SkillResult::precondition_failed(format!("目标 {target} 已被摧毁"), rec);
        }

        let heading = bearing_deg(
            own.position.latitude,
            own.position.longitude,
            tgt.position.latitude,
            tgt.position.longitude,
        );
        let dist = distance_m(
            own.position.latitude,
            own.position.longitude,
            tgt.position.latitude,
            tgt.position.longitude,
        );
        let speed = clamp(base::num_or(params, "speed", own.speed.max(300.0)), SPEED_MIN, SPEED_MAX);
        // 拦截高度取双方中间偏上 500m
        let altitude = clamp(
            (own.position.altitude + tgt.position.altitude) / 2.0 + 500.0,
            ALT_MIN,
            ALT_MAX,
        );

        let body = json!({"heading": heading, "altitude": altitude, "speed": speed});
        if let Err(e) = rec.alter(gw, &unit, body).await {
            return SkillResult::control_failed(format!("拦截机动失败: {e}"), rec);
        }

        // 拦截航路上开雷达保持跟踪
        let mut radar_on = false;
        if let Some(radar) = own.equipment_of_kind("radar").first() {
            let entity = EntityRef::Equipment(radar.entity_name.clone());
            radar_on = rec
                .control(gw, &unit, &entity, "switch", json!({"power": true}))
                .await
                .is_ok();
        }

        SkillResult::success(
            format!(
                "{unit} 拦截 {target}：航向 {heading:.0}° 距离 {:.1}km 速度 {speed:.0}m/s",
                dist / 1000.0
            ),
            json!({"heading": heading, "distance_m": dist, "radar_on": radar_on}),
            rec,
        )
    }
}
