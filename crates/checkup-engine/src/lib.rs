//! # Checkup Engine
//!
//! 体检追踪与分配引擎，提供完整的客户动线协调功能，包括：
//! - 追踪状态机：管理客户在各检查站间的状态转换
//! - 冲突检测：指派提交前的容量、设备与依赖关系校验
//! - 下一站推荐：基于占用情况的纯函数评分排序
//! - 陪检指派：工作人员与客户的一对一配对
//! - 引擎事件：转换提交后的通知触发点（投递机制在引擎之外）

pub mod config;
pub mod conflict;
pub mod engine;
pub mod escort;
pub mod events;
pub mod recommend;
pub mod state_machine;

// 重新导出主要类型
pub use config::{EngineConfig, OccupancyConfig, ScoringConfig};
pub use conflict::{ConflictContext, ConflictDetector};
pub use engine::{AssignOutcome, CheckupEngine, PatientStatusView, REGISTRATION_STATION};
pub use escort::EscortCoordinator;
pub use events::{EngineEvent, EventSink, TracingEventSink};
pub use recommend::{rank_recommendations, score_station, Recommendation, ScoreDelta, ScoreInput};
pub use state_machine::TrackingStateMachine;
