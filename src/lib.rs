//! # Checkup
//!
//! 体检追踪与分配引擎的顶层门面 crate，重新导出各子模块的公开接口。

pub use checkup_core::{CheckupError, Result};
pub use checkup_engine::{
    AssignOutcome, CheckupEngine, EngineConfig, EventSink, Recommendation, TracingEventSink,
    REGISTRATION_STATION,
};
pub use checkup_registry::{default_stations, EquipmentFeed, PatientRoster, StationRegistry};
pub use checkup_tracking::{TrackingStore, WaitEstimate};
