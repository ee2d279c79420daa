//! 引擎配置
//!
//! 占用阈值与推荐评分权重，支持配置文件与环境变量覆盖

use checkup_core::{CheckupError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// 引擎完整配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// 占用视图配置
    #[serde(default)]
    pub occupancy: OccupancyConfig,
    /// 推荐评分配置
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// 占用视图配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyConfig {
    /// 利用率告警阈值
    pub warn_utilization: f64,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            warn_utilization: 0.70,
        }
    }
}

/// 推荐评分配置
///
/// 每条评分规则贡献一个带符号增量，权重全部集中在这里便于调优。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// 基础分
    pub base_score: i32,
    /// 每位等候客户扣除的分数
    pub waiting_weight: i32,
    /// 无人等候的加分
    pub empty_queue_bonus: i32,
    /// 前置项目未完成的扣分（实际上将该站排除）
    pub dependency_penalty: i32,
    /// 设备故障的扣分（实际上将该站排除）
    pub equipment_broken_penalty: i32,
    /// 设备告警的扣分
    pub equipment_warning_penalty: i32,
    /// 空腹检查的时段分界（小时，24 小时制）
    pub fasting_cutoff_hour: u32,
    /// 分界前的空腹检查加分
    pub fasting_bonus: i32,
    /// 分界后的空腹检查扣分
    pub fasting_penalty: i32,
    /// 医师咨询站代码
    pub consult_code: String,
    /// 其他项目未完成时咨询站的扣分
    pub consult_last_penalty: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 100,
            waiting_weight: 10,
            empty_queue_bonus: 30,
            dependency_penalty: 1000,
            equipment_broken_penalty: 1000,
            equipment_warning_penalty: 50,
            fasting_cutoff_hour: 10,
            fasting_bonus: 10,
            fasting_penalty: 10,
            consult_code: "CONSULT".to_string(),
            consult_last_penalty: 40,
        }
    }
}

impl EngineConfig {
    /// 从配置文件与环境变量载入
    ///
    /// 文件不存在时使用默认值；环境变量前缀 CHECKUP，
    /// 例如 CHECKUP__SCORING__WAITING_WEIGHT=20。
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("CHECKUP").separator("__"))
            .build()
            .map_err(|e| CheckupError::Config(e.to_string()))?;

        let config: EngineConfig = settings
            .try_deserialize()
            .map_err(|e| CheckupError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置合法性
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.occupancy.warn_utilization) {
            return Err(CheckupError::Config(format!(
                "warn_utilization 必须在 0.0 与 1.0 之间: {}",
                self.occupancy.warn_utilization
            )));
        }
        if self.scoring.fasting_cutoff_hour >= 24 {
            return Err(CheckupError::Config(format!(
                "fasting_cutoff_hour 必须小于 24: {}",
                self.scoring.fasting_cutoff_hour
            )));
        }
        if self.scoring.waiting_weight < 0 {
            return Err(CheckupError::Config(
                "waiting_weight 不能为负数".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scoring.base_score, 100);
        assert!((config.occupancy.warn_utilization - 0.70).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = EngineConfig::default();
        config.occupancy.warn_utilization = 1.5;
        assert!(matches!(
            config.validate().unwrap_err(),
            CheckupError::Config(_)
        ));
    }

    #[test]
    fn test_invalid_cutoff_rejected() {
        let mut config = EngineConfig::default();
        config.scoring.fasting_cutoff_hour = 24;
        assert!(config.validate().is_err());
    }
}
