//! 设备状态源
//!
//! 维护各检查站设备的健康状态与故障/修复日志。
//! 引擎只读取健康状态；状态变更由设备管理方通过本模块提交。

use checkup_core::{CheckupError, Equipment, EquipmentHealth, EquipmentLog, Result, Station};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 设备状态源
#[derive(Debug, Default)]
pub struct EquipmentFeed {
    equipment: Arc<RwLock<HashMap<Uuid, Equipment>>>,
    logs: Arc<RwLock<Vec<EquipmentLog>>>,
}

fn health_rank(health: EquipmentHealth) -> u8 {
    match health {
        EquipmentHealth::Normal => 0,
        EquipmentHealth::Warning => 1,
        EquipmentHealth::Broken => 2,
    }
}

impl EquipmentFeed {
    /// 创建空的设备状态源
    pub fn new() -> Self {
        Self {
            equipment: Arc::new(RwLock::new(HashMap::new())),
            logs: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// 登记设备
    pub async fn add_equipment(
        &self,
        name: String,
        station_code: String,
        description: Option<String>,
    ) -> Equipment {
        let item = Equipment {
            id: Uuid::new_v4(),
            name,
            station_code,
            status: EquipmentHealth::Normal,
            description,
            is_active: true,
            updated_at: chrono::Utc::now(),
        };
        let mut equipment = self.equipment.write().await;
        equipment.insert(item.id, item.clone());
        tracing::info!("Registered equipment {} at station {}", item.id, item.station_code);
        item
    }

    /// 为尚无设备的检查站初始化默认设备，返回新建数量
    pub async fn init_for_stations(&self, stations: &[Station]) -> usize {
        let mut count = 0;
        for station in stations {
            if !self.station_equipment(&station.code).await.is_empty() {
                continue;
            }
            self.add_equipment(
                format!("{}主机", station.name),
                station.code.clone(),
                Some(format!("{}检查站设备", station.name)),
            )
            .await;
            count += 1;
        }
        count
    }

    /// 取得某检查站的所有启用设备
    pub async fn station_equipment(&self, station_code: &str) -> Vec<Equipment> {
        self.equipment
            .read()
            .await
            .values()
            .filter(|e| e.is_active && e.station_code == station_code)
            .cloned()
            .collect()
    }

    /// 取得某检查站的综合健康状态
    ///
    /// 多台设备时取最差状态；无设备登记时视为正常。
    pub async fn station_health(&self, station_code: &str) -> EquipmentHealth {
        self.equipment
            .read()
            .await
            .values()
            .filter(|e| e.is_active && e.station_code == station_code)
            .map(|e| e.status)
            .max_by_key(|h| health_rank(*h))
            .unwrap_or(EquipmentHealth::Normal)
    }

    /// 变更设备状态并记录日志
    pub async fn set_status(
        &self,
        equipment_id: Uuid,
        action: &str,
        new_status: EquipmentHealth,
        operator_id: Option<Uuid>,
        description: Option<String>,
    ) -> Result<EquipmentLog> {
        let mut equipment = self.equipment.write().await;
        let item = equipment
            .get_mut(&equipment_id)
            .ok_or_else(|| CheckupError::NotFound(format!("设备 {} 不存在", equipment_id)))?;

        let old_status = item.status;
        item.status = new_status;
        item.updated_at = chrono::Utc::now();

        let log = EquipmentLog {
            id: Uuid::new_v4(),
            equipment_id,
            action: action.to_string(),
            old_status,
            new_status,
            description,
            operator_id,
            created_at: chrono::Utc::now(),
        };

        // 持有设备写锁时追加日志，保证日志顺序与状态变更一致
        self.logs.write().await.push(log.clone());

        tracing::info!(
            "Equipment {} status changed {:?} -> {:?} ({})",
            equipment_id,
            old_status,
            new_status,
            action
        );
        Ok(log)
    }

    /// 回报设备故障
    pub async fn report_failure(
        &self,
        equipment_id: Uuid,
        operator_id: Option<Uuid>,
        description: Option<String>,
    ) -> Result<EquipmentLog> {
        self.set_status(
            equipment_id,
            "report_failure",
            EquipmentHealth::Broken,
            operator_id,
            description.or_else(|| Some("设备故障".to_string())),
        )
        .await
    }

    /// 回报设备修复
    pub async fn report_repair(
        &self,
        equipment_id: Uuid,
        operator_id: Option<Uuid>,
        description: Option<String>,
    ) -> Result<EquipmentLog> {
        self.set_status(
            equipment_id,
            "repair",
            EquipmentHealth::Normal,
            operator_id,
            description.or_else(|| Some("设备已修复".to_string())),
        )
        .await
    }

    /// 取得所有故障设备
    pub async fn broken_equipment(&self) -> Vec<Equipment> {
        self.equipment
            .read()
            .await
            .values()
            .filter(|e| e.is_active && e.status == EquipmentHealth::Broken)
            .cloned()
            .collect()
    }

    /// 取得设备日志（最新在前）
    pub async fn logs(&self, equipment_id: Option<Uuid>, limit: usize) -> Vec<EquipmentLog> {
        let logs = self.logs.read().await;
        logs.iter()
            .rev()
            .filter(|l| equipment_id.map_or(true, |id| l.equipment_id == id))
            .take(limit)
            .cloned()
            .collect()
    }
}

impl Clone for EquipmentFeed {
    fn clone(&self) -> Self {
        Self {
            equipment: Arc::clone(&self.equipment),
            logs: Arc::clone(&self.logs),
        }
    }
}
