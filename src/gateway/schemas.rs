//! 仿真引擎数据模型
//!
//! 映射 AiHttpService 的 JSON 结构；WorldSnapshot 为某一时刻的不可变快照，
//! 每个决策周期重新拉取，旧快照整体丢弃、从不原地修改。

use serde::{Deserialize, Serialize};

/// 地理位置（经纬高）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// 高度（米）
    pub altitude: f64,
}

/// 姿态角（度）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Orientation {
    pub pitch: f64,
    pub heading: f64,
    pub roll: f64,
}

/// 装备信息（雷达 / 干扰机 / 通信 / 武器系统等）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentInfo {
    pub entity_id: i64,
    pub entity_name: String,
    /// 装备类型: radar / jammer / radio / weapon
    #[serde(rename = "type")]
    pub kind: String,
    /// ON / OFF / FAULT
    #[serde(default)]
    pub status: String,
}

/// 单元完整状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    pub unit_id: i64,
    pub unit_name: String,
    #[serde(default)]
    pub unit_type: String,
    /// 所属方（red / blue）
    #[serde(default)]
    pub forceside: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub orientation: Orientation,
    /// 速度（m/s）
    #[serde(default)]
    pub speed: f64,
    #[serde(default = "default_true")]
    pub alive: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub equipment: Vec<EquipmentInfo>,
}

fn default_true() -> bool {
    true
}

impl UnitState {
    /// 按类型查找装备
    pub fn equipment_of_kind(&self, kind: &str) -> Vec<&EquipmentInfo> {
        self.equipment.iter().filter(|e| e.kind == kind).collect()
    }

    /// 按名称查找装备
    pub fn equipment_by_name(&self, name: &str) -> Option<&EquipmentInfo> {
        self.equipment.iter().find(|e| e.entity_name == name)
    }
}

/// 全局世界快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub sim_time: f64,
    #[serde(default)]
    pub units: Vec<UnitState>,
}

impl WorldSnapshot {
    pub fn find_unit(&self, name: &str) -> Option<&UnitState> {
        self.units.iter().find(|u| u.unit_name == name)
    }

    /// 查找敌对阵营单元（相对 forceside）
    pub fn hostile_units(&self, own_side: &str) -> Vec<&UnitState> {
        self.units
            .iter()
            .filter(|u| !u.forceside.is_empty() && u.forceside != own_side && u.alive)
            .collect()
    }

    /// 单行态势摘要，供 Commander 构造检索查询
    pub fn summary_line(&self, unit: &UnitState) -> String {
        let status = match (unit.alive, unit.active) {
            (true, true) => "存活/激活",
            (true, false) => "存活/未激活",
            _ => "已摧毁",
        };
        format!(
            "{} [{}] {} 位置:({:.4},{:.4},{:.0}m) 航向:{:.0}° 速度:{:.1}m/s 装备:{}件",
            unit.unit_name,
            unit.forceside,
            status,
            unit.position.latitude,
            unit.position.longitude,
            unit.position.altitude,
            unit.orientation.heading,
            unit.speed,
            unit.equipment.len()
        )
    }
}

/// 计算两点之间的方位角（度，0=北，顺时针）
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();
    let x = dlon.sin() * lat2r.cos();
    let y = lat1r.cos() * lat2r.sin() - lat1r.sin() * lat2r.cos() * dlon.cos();
    (x.atan2(y).to_degrees() + 360.0) % 360.0
}

/// Haversine 两点距离（米）
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const R: f64 = 6_371_000.0;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    R * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// 限幅
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}
