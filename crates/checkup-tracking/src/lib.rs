//! # Checkup Tracking
//!
//! 追踪存储模块，负责：
//! - 追踪存储：每个 (客户, 日期) 一条带版本号的实时记录，
//!   以及追加式的追踪历程日志（提交的唯一持久化锚点）
//! - 占用视图：按需从追踪记录重算的各站人数聚合
//! - 等候时间预估：仅依据历程日志的统计

pub mod occupancy;
pub mod store;
pub mod wait_time;

// 重新导出主要类型
pub use occupancy::compute_occupancy;
pub use store::{CapacityGuard, TrackingStore, TransitionCommit};
pub use wait_time::{average_duration_minutes, estimate_wait, QueuePosition, WaitEstimate};
