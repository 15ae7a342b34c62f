//! 武器技能：超视距攻击与中止交战
//!
//! 攻击类技能前置链最长：单元状态 -> 武器挂载 -> 武器状态
//! （可用且有余弹）-> 目标在态势中存活，任一不满足即前置失败，
//! 不发出任何控制指令。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::gateway::{distance_m, EntityRef, Gateway};

use super::base::{
    self, CallOp, CallRecorder, ParamKind, ParamSpec, PlannedCall, Skill, SkillCategory,
    SkillResult,
};

fn weapon_available(status: &Value) -> Result<(), String> {
    let state = status
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    if state != "available" && state != "可用" {
        return Err(format!("武器状态为 {state}，不可用"));
    }
    let has_munition = status
        .get("has_munition")
        .and_then(Value::as_bool)
        .or_else(|| {
            status
                .get("munition_count")
                .and_then(Value::as_i64)
                .map(|n| n > 0)
        })
        .unwrap_or(false);
    if !has_munition {
        return Err("武器无剩余弹药".to_string());
    }
    Ok(())
}

/// 超视距导弹攻击
pub struct BvrAttack;

const BVR_PARAMS: [ParamSpec; 4] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::required("target_name", ParamKind::Str),
    ParamSpec::optional("weapon_name", ParamKind::Str),
    ParamSpec::with_default("munition_count", ParamKind::Integer, 1.0),
];

#[async_trait]
impl Skill for BvrAttack {
    fn name(&self) -> &'static str {
        "bvr_attack"
    }

    fn description(&self) -> &'static str {
        "超视距导弹攻击指定目标：开雷达、锁定、发射"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Weapon
    }

    fn params(&self) -> &'static [ParamSpec] {
        &BVR_PARAMS
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
            PlannedCall {
                op: CallOp::Query,
                unit: unit.clone(),
                entity: EntityRef::Equipment("weapon".to_string()),
                command: None,
                params: Value::Null,
            },
            PlannedCall {
                op: CallOp::Control,
                unit: unit.clone(),
                entity: EntityRef::Equipment("radar".to_string()),
                command: Some("switch".to_string()),
                params: json!({"power": true}),
            },
            PlannedCall {
                op: CallOp::Control,
                unit: unit.clone(),
                entity: EntityRef::Equipment("weapon".to_string()),
                command: Some("lock".to_string()),
                params: params.clone(),
            },
            PlannedCall {
                op: CallOp::Control,
                unit,
                entity: EntityRef::Equipment("weapon".to_string()),
                command: Some("launch".to_string()),
                params: params.clone(),
            },
        ]
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
        let munition_count = base::int_or(params, "munition_count", 1).max(1);

        // ── 前置检查链，全部通过前不发任何控制指令 ──
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

        let weapon = match base::opt_str(params, "weapon_name") {
            Some(name) => match own.equipment_by_name(&name) {
                Some(eq) => eq.entity_name.clone(),
                None => {
                    return SkillResult::precondition_failed(
                        format!("{unit} 未挂载名为 {name} 的武器"),
                        rec,
                    )
                }
            },
            None => match own.equipment_of_kind("weapon").first() {
                Some(eq) => eq.entity_name.clone(),
                None => {
                    return SkillResult::precondition_failed(format!("{unit} 未挂载武器"), rec)
                }
            },
        };

        let weapon_entity = EntityRef::Equipment(weapon.clone());
        let weapon_status = match rec.query(gw, &unit, &weapon_entity).await {
            Ok(v) => v,
            Err(e) => {
                return SkillResult::precondition_failed(format!("无法查询武器状态: {e}"), rec)
            }
        };
        if let Err(reason) = weapon_available(&weapon_status) {
            return SkillResult::precondition_failed(format!("{weapon}: {reason}"), rec);
        }

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
        let dist = distance_m(
            own.position.latitude,
            own.position.longitude,
            tgt.position.latitude,
            tgt.position.longitude,
        );

        // ── 攻击序列：开雷达 -> 锁定 -> 发射，首个失败即中止 ──
        if let Some(radar) = own.equipment_of_kind("radar").first() {
            let radar_entity = EntityRef::Equipment(radar.entity_name.clone());
            if let Err(e) = rec
                .control(gw, &unit, &radar_entity, "switch", json!({"power": true}))
                .await
            {
                return SkillResult::control_failed(format!("攻击前雷达开机失败: {e}"), rec);
            }
        }

        if let Err(e) = rec
            .control(gw, &unit, &weapon_entity, "lock", json!({"target_name": target}))
            .await
        {
            return SkillResult::control_failed(format!("锁定 {target} 失败: {e}"), rec);
        }

        let launch = json!({"target_name": target, "munition_count": munition_count});
        match rec.control(gw, &unit, &weapon_entity, "launch", launch).await {
            Ok(_) => SkillResult::success(
                format!(
                    "{unit} 以 {weapon} 对 {target} 发射 {munition_count} 枚导弹，距离 {:.1}km",
                    dist / 1000.0
                ),
                json!({"weapon": weapon, "target": target, "munition_count": munition_count, "distance_m": dist}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("发射失败: {e}"), rec),
        }
    }
}

/// 中止交战：停止攻击并解除锁定
pub struct AbortEngagement;

const ABORT_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("unit_name", ParamKind::Str),
    ParamSpec::optional("weapon_name", ParamKind::Str),
];

#[async_trait]
impl Skill for AbortEngagement {
    fn name(&self) -> &'static str {
        "abort_engagement"
    }

    fn description(&self) -> &'static str {
        "中止当前交战，解除武器锁定"
    }

    fn category(&self) -> SkillCategory {
        SkillCategory::Weapon
    }

    fn params(&self) -> &'static [ParamSpec] {
        &ABORT_PARAMS
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
            PlannedCall {
                op: CallOp::Control,
                unit,
                entity: EntityRef::Equipment("weapon".to_string()),
                command: Some("abort".to_string()),
                params: Value::Null,
            },
        ]
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
        let own = match base::unit_state_from(state) {
            Ok(s) => s,
            Err(e) => return SkillResult::precondition_failed(e.to_string(), rec),
        };

        let weapon = match base::opt_str(params, "weapon_name") {
            Some(name) => match own.equipment_by_name(&name) {
                Some(eq) => eq.entity_name.clone(),
                None => {
                    return SkillResult::precondition_failed(
                        format!("{unit} 未挂载名为 {name} 的武器"),
                        rec,
                    )
                }
            },
            None => match own.equipment_of_kind("weapon").first() {
                Some(eq) => eq.entity_name.clone(),
                None => {
                    return SkillResult::precondition_failed(format!("{unit} 未挂载武器"), rec)
                }
            },
        };

        let entity = EntityRef::Equipment(weapon.clone());
        match rec.control(gw, &unit, &entity, "abort", Value::Null).await {
            Ok(_) => SkillResult::success(
                format!("{unit} 已中止交战，{weapon} 解除锁定"),
                json!({"weapon": weapon}),
                rec,
            ),
            Err(e) => SkillResult::control_failed(format!("中止交战失败: {e}"), rec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weapon_available_requires_status_and_munition() {
        assert!(weapon_available(&json!({"status": "available", "has_munition": true})).is_ok());
        assert!(weapon_available(&json!({"status": "可用", "munition_count": 2})).is_ok());

        let no_ammo = weapon_available(&json!({"status": "available", "has_munition": false}));
        assert!(no_ammo.unwrap_err().contains("弹药"));

        let bad_status = weapon_available(&json!({"status": "damaged", "has_munition": true}));
        assert!(bad_status.unwrap_err().contains("不可用"));

        assert!(weapon_available(&json!({})).is_err());
    }
}
