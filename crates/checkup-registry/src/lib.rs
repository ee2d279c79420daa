//! # Checkup Registry
//!
//! 体检设施的目录模块，提供：
//! - 检查站目录：代码、容量、依赖关系等静态配置
//! - 设备状态源：各检查站设备健康状态（引擎只读消费）
//! - 客户名册：院方客户档案的引用副本

pub mod equipment;
pub mod roster;
pub mod station;

// 重新导出主要类型
pub use equipment::EquipmentFeed;
pub use roster::PatientRoster;
pub use station::{default_stations, StationRegistry};
