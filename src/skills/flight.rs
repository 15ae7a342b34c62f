//! 平台飞行控制技能
//!
//! 航路飞行、巡逻、返航、编队与战斗展开，走平台直接控制指令
//! （platform move_to_pos / move_to_dir / patrol / return_land / formation）。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::gateway::{clamp, EntityRef, Gateway};

use super::base::{
    self, CallOp, CallRecorder, ParamKind, ParamSpec, PlannedCall, Skill, SkillCategory,
    SkillResult,
};

fn platform_control(unit: &str, command: &str, params: Value) -> PlannedCall {
    PlannedCall {
        op: CallOp::Control,
        unit: unit.to_string(),
        entity: EntityRef::Platform,
        command: Some(command.to_string()),
        params,
    }
}

/// 飞往指定经纬高坐标点
pub struct FlyToPosition;

const FLY_TO_POSITION_PARAMS: [ParamSpec; 5] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::required("latitude", ParamKind::Number),
    ParamSpec::required("longitude", ParamKind::Number),
    ParamSpec::with_default("altitude", ParamKind::Number, 5000.0),
    ParamSpec::with_default("speed", ParamKind::Number, 200.0),
];

#[async_trait]
impl Skill for FlyToPosition {
    fn name(&self) -> &'static str {
        "fly_to_position"
    }

    fn description(&self) -> &'static str {
        "飞往指定经纬度坐标点（直接平台控制）"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Flight
    }

    fn params(&self) -> &'static [ParamSpec] {
        &FLY_TO_POSITION_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        vec![platform_control(&unit, "move_to_pos", params.clone())]
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let (lat, lon) = match (base::req_num(params, "latitude"), base::req_num(params, "longitude")) {
            (Ok(lat), Ok(lon)) => (lat, lon),
            _ => return SkillResult::invalid_params("缺少目标经纬度"),
        };
        let altitude = base::num_or(params, "altitude", 5000.0);
        let speed = base::num_or(params, "speed", 200.0);

        let body = json!({
            "latitude": lat, "longitude": lon,
            "altitude": altitude, "speed": speed, "turn_g": 3.0,
        });
        let mut rec = CallRecorder::new();
        match rec.control(gw, &unit, &EntityRef::Platform, "move_to_pos", body).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 飞往 ({lat:.4}, {lon:.4}) 高度{altitude:.0}m 速度{speed:.0}m/s"),
                json!({"latitude": lat, "longitude": lon, "altitude": altitude, "speed": speed}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("飞行控制失败: {e}"), rec),
        }
    }
}

/// 按指定航向飞行
pub struct FlyHeading;

const FLY_HEADING_PARAMS: [ParamSpec; 4] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::required("heading", ParamKind::Number),
    ParamSpec::with_default("altitude", ParamKind::Number, 5000.0),
    ParamSpec::with_default("speed", ParamKind::Number, 200.0),
];

#[async_trait]
impl Skill for FlyHeading {
    fn name(&self) -> &'static str {
        "fly_heading"
    }

    fn description(&self) -> &'static str {
        "按指定航向飞行（度，0=北）"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Flight
    }

    fn params(&self) -> &'static [ParamSpec] {
        &FLY_HEADING_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        vec![platform_control(&unit, "move_to_dir", params.clone())]
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let heading = match base::req_num(params, "heading") {
            Ok(h) => h % 360.0,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let altitude = base::num_or(params, "altitude", 5000.0);
        let speed = base::num_or(params, "speed", 200.0);

        let body = json!({"heading": heading, "altitude": altitude, "speed": speed, "turn_g": 3.0});
        let mut rec = CallRecorder::new();
        match rec.control(gw, &unit, &EntityRef::Platform, "move_to_dir", body).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 按航向 {heading:.0}° 飞行"),
                json!({"heading": heading, "altitude": altitude, "speed": speed}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("航向飞行失败: {e}"), rec),
        }
    }
}

/// 在指定空域巡逻
pub struct PatrolAirspace;

const PATROL_PARAMS: [ParamSpec; 4] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::required("airspace_name", ParamKind::Str),
    ParamSpec::with_default("altitude", ParamKind::Number, 5000.0),
    ParamSpec::with_default("speed", ParamKind::Number, 200.0),
];

#[async_trait]
impl Skill for PatrolAirspace {
    fn name(&self) -> &'static str {
        "patrol_airspace"
    }

    fn description(&self) -> &'static str {
        "在指定空域巡逻飞行"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Flight
    }

    fn params(&self) -> &'static [ParamSpec] {
        &PATROL_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        vec![platform_control(&unit, "patrol", params.clone())]
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let airspace = match base::req_str(params, "airspace_name") {
            Ok(a) => a,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let altitude = base::num_or(params, "altitude", 5000.0);
        let speed = base::num_or(params, "speed", 200.0);

        let body = json!({"airspace_name": airspace, "altitude": altitude, "speed": speed});
        let mut rec = CallRecorder::new();
        match rec.control(gw, &unit, &EntityRef::Platform, "patrol", body).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 在空域 {airspace} 巡逻，高度{altitude:.0}m 速度{speed:.0}m/s"),
                json!({"airspace_name": airspace, "altitude": altitude, "speed": speed}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("巡逻指令失败: {e}"), rec),
        }
    }
}

/// 返航着陆
pub struct ReturnToBase;

const RTB_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::optional("airport_name", ParamKind::Str),
];

#[async_trait]
impl Skill for ReturnToBase {
    fn name(&self) -> &'static str {
        "return_to_base"
    }

    fn description(&self) -> &'static str {
        "返航着陆到基地机场"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Flight
    }

    fn params(&self) -> &'static [ParamSpec] {
        &RTB_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        vec![platform_control(&unit, "return_land", params.clone())]
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let airport = base::opt_str(params, "airport_name");

        let mut body = json!({"land_type": "直接返航"});
        if let Some(ref a) = airport {
            body["airport_name"] = json!(a);
        }
        let mut rec = CallRecorder::new();
        match rec.control(gw, &unit, &EntityRef::Platform, "return_land", body).await {
            Ok(_) => {
                let suffix = airport.map(|a| format!("至 {a}")).unwrap_or_default();
                SkillResult::success(format!("{unit} 返航{suffix}"), Value::Null, rec)
            }
            Err(e) => SkillResult::control_failed(format!("返航指令失败: {e}"), rec),
        }
    }
}

/// 加入编队跟随长机
pub struct JoinFormation;

const FORMATION_PARAMS: [ParamSpec; 3] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::required("leader_name", ParamKind::Str),
    ParamSpec::optional("formation_name", ParamKind::Str),
];

#[async_trait]
impl Skill for JoinFormation {
    fn name(&self) -> &'static str {
        "join_formation"
    }

    fn description(&self) -> &'static str {
        "加入编队跟随长机飞行"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Flight
    }

    fn params(&self) -> &'static [ParamSpec] {
        &FORMATION_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        vec![platform_control(&unit, "formation", params.clone())]
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let leader = match base::req_str(params, "leader_name") {
            Ok(l) => l,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };

        let mut body = json!({"leader_name": leader});
        if let Some(f) = base::opt_str(params, "formation_name") {
            body["formation_name"] = json!(f);
        }
        let mut rec = CallRecorder::new();
        match rec.control(gw, &unit, &EntityRef::Platform, "formation", body).await {
            Ok(_) => SkillResult::success(format!("{unit} 加入 {leader} 的编队"), Value::Null, rec),
            Err(e) => SkillResult::control_failed(format!("编队指令失败: {e}"), rec),
        }
    }
}

/// 面对威胁方向横向战斗展开
pub struct CombatSpread;

const SPREAD_PARAMS: [ParamSpec; 4] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::required("threat_bearing", ParamKind::Number),
    ParamSpec::optional("altitude", ParamKind::Number),
    ParamSpec::optional("speed", ParamKind::Number),
];

#[async_trait]
impl Skill for CombatSpread {
    fn name(&self) -> &'static str {
        "combat_spread"
    }

    fn description(&self) -> &'static str {
        "面对威胁方向横向战斗展开"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Flight
    }

    fn params(&self) -> &'static [ParamSpec] {
        &SPREAD_PARAMS
    }

    fn plan(&self, params: &Value) -> Vec<PlannedCall> {
        let unit = base::opt_str(params, "unit_name").unwrap_or_default();
        vec![
            PlannedCall {
                op: CallOp::Query,
                unit: unit.clone(),
                entity: EntityRef::Platform,
                command: None,
                params: Value::Null,
            },
            platform_control(&unit, "move_to_dir", params.clone()),
        ]
    }

    async fn execute(&self, gw: &dyn Gateway, params: &Value) -> SkillResult {
        let unit = match base::req_str(params, "unit_name") {
            Ok(u) => u,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };
        let threat_bearing = match base::req_num(params, "threat_bearing") {
            Ok(b) => b % 360.0,
            Err(e) => return SkillResult::invalid_params(e.to_string()),
        };

        // 前置：读当前高度/速度作为未指定时的保持值
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

        let altitude = base::num_or(params, "altitude", unit_state.position.altitude);
        let speed = base::num_or(params, "speed", unit_state.speed);
        // 展开航向垂直于威胁方向
        let spread_heading = (threat_bearing + 90.0) % 360.0;
        let speed = clamp(speed, 100.0, 800.0);

        let body = json!({"heading": spread_heading, "altitude": altitude, "speed": speed, "turn_g": 4.0});
        match rec.control(gw, &unit, &EntityRef::Platform, "move_to_dir", body).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 面对威胁方位 {threat_bearing:.0}° 横向展开至 {spread_heading:.0}°"),
                json!({"spread_heading": spread_heading}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("战斗展开失败: {e}"), rec),
        }
    }
}
