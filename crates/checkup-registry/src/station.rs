//! 检查站目录
//!
//! 管理检查站的静态配置：代码、名称、容量、依赖关系与启用状态

use checkup_core::{CheckupError, Result, Station};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 检查站目录
#[derive(Debug, Default)]
pub struct StationRegistry {
    stations: Arc<RwLock<HashMap<String, Station>>>,
}

impl StationRegistry {
    /// 创建空目录
    pub fn new() -> Self {
        Self {
            stations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 创建并载入默认检查站
    pub async fn with_defaults() -> Self {
        let registry = Self::new();
        for station in default_stations() {
            registry.upsert(station).await;
        }
        registry
    }

    /// 新增或更新检查站
    pub async fn upsert(&self, station: Station) {
        let mut stations = self.stations.write().await;
        tracing::debug!("Registered station {} ({})", station.code, station.name);
        stations.insert(station.code.clone(), station);
    }

    /// 按代码取得检查站
    pub async fn get(&self, code: &str) -> Option<Station> {
        self.stations.read().await.get(code).cloned()
    }

    /// 按代码取得检查站，不存在时返回 NotFound
    pub async fn require(&self, code: &str) -> Result<Station> {
        self.get(code)
            .await
            .ok_or_else(|| CheckupError::NotFound(format!("检查站 {} 不存在", code)))
    }

    /// 取得所有启用的检查站，按代码排序保证输出稳定
    pub async fn active_stations(&self) -> Vec<Station> {
        let mut list: Vec<Station> = self
            .stations
            .read()
            .await
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.code.cmp(&b.code));
        list
    }

    /// 取得某站的前置依赖（站不存在时为空）
    pub async fn dependencies_of(&self, code: &str) -> Vec<String> {
        self.stations
            .read()
            .await
            .get(code)
            .map(|s| s.depends_on.clone())
            .unwrap_or_default()
    }

    /// 启用或停用检查站
    pub async fn set_active(&self, code: &str, is_active: bool) -> Result<()> {
        let mut stations = self.stations.write().await;
        match stations.get_mut(code) {
            Some(station) => {
                station.is_active = is_active;
                tracing::info!("Station {} active flag set to {}", code, is_active);
                Ok(())
            }
            None => Err(CheckupError::NotFound(format!("检查站 {} 不存在", code))),
        }
    }
}

impl Clone for StationRegistry {
    fn clone(&self) -> Self {
        Self {
            stations: Arc::clone(&self.stations),
        }
    }
}

/// 默认检查站配置
///
/// 依赖关系：内视镜需空腹应排在抽血后；CT/MRI 排在抽血与超声后；
/// 医师咨询安排在所有检查之后。
pub fn default_stations() -> Vec<Station> {
    let station = |code: &str,
                   name: &str,
                   duration: i32,
                   capacity: i32,
                   location: &str,
                   fasting: bool,
                   deps: &[&str]| Station {
        code: code.to_string(),
        name: name.to_string(),
        duration_minutes: duration,
        capacity,
        location: Some(location.to_string()),
        fasting_preferred: fasting,
        depends_on: deps.iter().map(|d| d.to_string()).collect(),
        is_active: true,
    };

    vec![
        station("REG", "报到柜台", 5, 10, "大厅", false, &[]),
        station("PHY", "一般体检", 15, 3, "体检室", false, &[]),
        station("BLOOD", "抽血站", 10, 4, "抽血室", false, &[]),
        station("XRAY", "X光室", 10, 2, "X光室", false, &[]),
        station("US", "超声波", 20, 2, "超声波室", true, &[]),
        station("CT", "计算机断层", 30, 1, "CT室", false, &["BLOOD", "US"]),
        station("MRI", "磁共振成像", 45, 1, "MRI室", false, &["BLOOD", "US"]),
        station("ENDO", "内视镜室", 30, 2, "内视镜室", true, &["BLOOD"]),
        station("CARDIO", "心电图室", 15, 2, "心电图室", false, &[]),
        station(
            "CONSULT",
            "医师咨询",
            15,
            3,
            "咨询室",
            false,
            &["PHY", "BLOOD", "XRAY", "US", "CT", "MRI", "ENDO", "CARDIO"],
        ),
    ]
}
