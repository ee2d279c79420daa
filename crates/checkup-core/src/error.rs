//! 错误定义模块

use crate::models::ConflictFinding;
use thiserror::Error;

/// 体检追踪系统统一错误类型
#[derive(Error, Debug)]
pub enum CheckupError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("无效状态转换: 从 {from} 执行 {action}")]
    InvalidTransition { from: String, action: String },

    #[error("检查站已满: {station} (容量 {capacity})")]
    CapacityExceeded { station: String, capacity: i32 },

    #[error("检测到 {} 项阻断性冲突", .findings.len())]
    ConflictBlocked { findings: Vec<ConflictFinding> },

    #[error("并发写入冲突: {0}")]
    ConcurrencyConflict(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// 体检追踪系统统一结果类型
pub type Result<T> = std::result::Result<T, CheckupError>;
