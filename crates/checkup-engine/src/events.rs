//! 引擎事件
//!
//! 状态转换提交后的通知触发点。引擎只负责发布事件，
//! 推送、LINE 通知等投递机制由外部订阅方实现。

use async_trait::async_trait;
use checkup_core::ConflictFinding;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 引擎事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// 客户到达检查站
    PatientArrived {
        patient_id: Uuid,
        exam_date: NaiveDate,
        station_code: String,
    },
    /// 开始检查
    ExamStarted {
        patient_id: Uuid,
        exam_date: NaiveDate,
        station_code: String,
    },
    /// 完成单项检查
    ExamCompleted {
        patient_id: Uuid,
        exam_date: NaiveDate,
        station_code: String,
    },
    /// 全部必检项目完成
    CheckupCompleted {
        patient_id: Uuid,
        exam_date: NaiveDate,
    },
    /// 已指派下一站
    NextStationAssigned {
        patient_id: Uuid,
        exam_date: NaiveDate,
        station_code: String,
        findings: Vec<ConflictFinding>,
    },
    /// 指派被冲突检测阻断（含设备故障等阻断级条目）
    AssignmentBlocked {
        patient_id: Uuid,
        exam_date: NaiveDate,
        station_code: String,
        findings: Vec<ConflictFinding>,
    },
    /// 已指派陪检人员
    EscortAssigned {
        patient_id: Uuid,
        exam_date: NaiveDate,
        escort_id: Uuid,
    },
}

/// 事件接收端
///
/// 实现方自行决定投递方式；发布失败不得影响引擎提交结果。
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &EngineEvent);
}

/// 默认事件接收端：写入结构化日志
#[derive(Debug, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: &EngineEvent) {
        match event {
            EngineEvent::AssignmentBlocked { .. } => {
                tracing::warn!(?event, "engine event");
            }
            _ => {
                tracing::info!(?event, "engine event");
            }
        }
    }
}
