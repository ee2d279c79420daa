//! 客户名册
//!
//! 客户档案由院方记录系统拥有，这里只保存引擎所需的引用副本，
//! 重点是套餐检查项目列表与体检日期。

use checkup_core::{CheckupError, Patient, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 客户名册
#[derive(Debug, Default)]
pub struct PatientRoster {
    patients: Arc<RwLock<HashMap<Uuid, Patient>>>,
}

impl PatientRoster {
    /// 创建空名册
    pub fn new() -> Self {
        Self {
            patients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 登记或更新客户引用副本
    pub async fn register(&self, patient: Patient) {
        let mut patients = self.patients.write().await;
        tracing::debug!("Registered patient {} ({})", patient.id, patient.chart_no);
        patients.insert(patient.id, patient);
    }

    /// 按 ID 取得客户
    pub async fn get(&self, patient_id: Uuid) -> Option<Patient> {
        self.patients.read().await.get(&patient_id).cloned()
    }

    /// 按 ID 取得客户，不存在时返回 NotFound
    pub async fn require(&self, patient_id: Uuid) -> Result<Patient> {
        self.get(patient_id)
            .await
            .ok_or_else(|| CheckupError::NotFound(format!("客户 {} 不存在", patient_id)))
    }

    /// 取得指定日期的所有有效客户，按病历号排序
    pub async fn patients_for_date(&self, exam_date: NaiveDate) -> Vec<Patient> {
        let mut list: Vec<Patient> = self
            .patients
            .read()
            .await
            .values()
            .filter(|p| p.is_active && p.exam_date == exam_date)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.chart_no.cmp(&b.chart_no));
        list
    }
}

impl Clone for PatientRoster {
    fn clone(&self) -> Self {
        Self {
            patients: Arc::clone(&self.patients),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_patient(chart_no: &str, exam_date: NaiveDate) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            chart_no: chart_no.to_string(),
            name: format!("客户{}", chart_no),
            exam_date,
            required_exams: vec!["REG".to_string(), "BLOOD".to_string()],
            vip_level: 0,
            notes: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_register_and_query_by_date() {
        let roster = PatientRoster::new();
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let other = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();

        roster.register(sample_patient("A002", date)).await;
        roster.register(sample_patient("A001", date)).await;
        roster.register(sample_patient("B001", other)).await;

        let todays = roster.patients_for_date(date).await;
        assert_eq!(todays.len(), 2);
        assert_eq!(todays[0].chart_no, "A001");
        assert_eq!(todays[1].chart_no, "A002");
    }

    #[tokio::test]
    async fn test_require_missing() {
        let roster = PatientRoster::new();
        let err = roster.require(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CheckupError::NotFound(_)));
    }
}
