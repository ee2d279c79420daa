//! 陪检指派协调
//!
//! 维护工作人员与客户的配对：每个 (客户, 日期) 最多一条有效指派，
//! 每位陪检人员同一天也只负责一位客户。换班交接属于正常重指派，
//! 不产生错误。

use checkup_core::{EscortAssignment, Result, TrackingKey};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 陪检指派协调器
///
/// 失效的指派记录保留在列表中作为交接审计依据。
#[derive(Debug, Default)]
pub struct EscortCoordinator {
    assignments: Arc<RwLock<Vec<EscortAssignment>>>,
}

impl EscortCoordinator {
    /// 创建新的协调器
    pub fn new() -> Self {
        Self {
            assignments: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// 指派陪检人员
    ///
    /// 在同一把写锁内完成：失效客户现有指派、失效该人员对其他客户的
    /// 指派、插入新指派。任何并发读取都不会看到零条或两条有效记录。
    /// 若请求的人员已是该客户的有效陪检则为幂等空操作。
    pub async fn assign(
        &self,
        patient_id: Uuid,
        exam_date: NaiveDate,
        escort_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<EscortAssignment> {
        let mut assignments = self.assignments.write().await;

        // 幂等：同一人员重复指派直接返回现有记录
        if let Some(existing) = assignments.iter().find(|a| {
            a.is_active
                && a.patient_id == patient_id
                && a.exam_date == exam_date
                && a.escort_id == escort_id
        }) {
            tracing::debug!(
                "Escort {} already active for patient {}, no-op",
                escort_id,
                patient_id
            );
            return Ok(existing.clone());
        }

        // 失效该客户现有指派，以及该人员对其他客户的指派（一对一）
        for assignment in assignments.iter_mut().filter(|a| {
            a.is_active
                && a.exam_date == exam_date
                && (a.patient_id == patient_id || a.escort_id == escort_id)
        }) {
            assignment.is_active = false;
        }

        let assignment = EscortAssignment {
            id: Uuid::new_v4(),
            patient_id,
            exam_date,
            escort_id,
            assigned_by,
            assigned_at: chrono::Utc::now(),
            is_active: true,
        };
        assignments.push(assignment.clone());

        tracing::info!(
            "Assigned escort {} to patient {} on {}",
            escort_id,
            patient_id,
            exam_date
        );
        Ok(assignment)
    }

    /// 取得客户当前的有效指派
    pub async fn active_for(&self, key: &TrackingKey) -> Option<EscortAssignment> {
        self.assignments
            .read()
            .await
            .iter()
            .find(|a| {
                a.is_active && a.patient_id == key.patient_id && a.exam_date == key.exam_date
            })
            .cloned()
    }

    /// 取得某陪检人员当天负责的客户指派
    pub async fn active_for_escort(
        &self,
        escort_id: Uuid,
        exam_date: NaiveDate,
    ) -> Option<EscortAssignment> {
        self.assignments
            .read()
            .await
            .iter()
            .find(|a| a.is_active && a.escort_id == escort_id && a.exam_date == exam_date)
            .cloned()
    }

    /// 取得指定日期的全部有效指派
    pub async fn active_for_date(&self, exam_date: NaiveDate) -> Vec<EscortAssignment> {
        self.assignments
            .read()
            .await
            .iter()
            .filter(|a| a.is_active && a.exam_date == exam_date)
            .cloned()
            .collect()
    }

    /// 某客户的有效指派条数（用于不变量校验）
    pub async fn active_count_for(&self, key: &TrackingKey) -> usize {
        self.assignments
            .read()
            .await
            .iter()
            .filter(|a| {
                a.is_active && a.patient_id == key.patient_id && a.exam_date == key.exam_date
            })
            .count()
    }
}

impl Clone for EscortCoordinator {
    fn clone(&self) -> Self {
        Self {
            assignments: Arc::clone(&self.assignments),
        }
    }
}
