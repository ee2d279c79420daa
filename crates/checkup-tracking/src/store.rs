//! 追踪存储
//!
//! 实时记录是一份按 (客户, 日期) 键控、带版本号的投影；
//! 追加式历程日志只记录提交成功的转换，是统计的唯一数据来源。
//! 所有写入都经过 `commit`：在同一把写锁内完成版本核对、
//! 容量复核、状态变更与历程追加，落败的写入者得到
//! `ConcurrencyConflict` 或 `CapacityExceeded` 而不会超卖。

use checkup_core::{
    CheckupError, HistoryEntry, Result, TrackingAction, TrackingKey, TrackingState, TrackingStatus,
};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 提交时的容量复核条件
#[derive(Debug, Clone)]
pub struct CapacityGuard {
    pub station_code: String,
    pub capacity: i32,
}

/// 一次待提交的状态转换
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    pub key: TrackingKey,
    /// 期望的当前版本；None 表示记录必须不存在（首次建档）
    pub expected_version: Option<u64>,
    pub station: Option<String>,
    pub status: TrackingStatus,
    pub next_station: Option<String>,
    pub action: TrackingAction,
    pub operator_id: Option<Uuid>,
    pub notes: Option<String>,
    /// Some 时在写锁内重新清点该站 in_exam 人数，满员则拒绝提交
    pub capacity_guard: Option<CapacityGuard>,
}

/// 追踪存储
#[derive(Debug, Default)]
pub struct TrackingStore {
    states: Arc<RwLock<HashMap<TrackingKey, TrackingState>>>,
    history: Arc<RwLock<Vec<HistoryEntry>>>,
}

impl TrackingStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// 取得实时追踪记录
    pub async fn get(&self, key: &TrackingKey) -> Option<TrackingState> {
        self.states.read().await.get(key).cloned()
    }

    /// 取得指定日期的全部实时记录
    pub async fn states_for_date(&self, exam_date: NaiveDate) -> Vec<TrackingState> {
        self.states
            .read()
            .await
            .values()
            .filter(|s| s.exam_date == exam_date)
            .cloned()
            .collect()
    }

    /// 提交一次状态转换
    ///
    /// 写锁内依次执行：版本核对 -> 容量复核 -> 写入新状态 -> 追加历程。
    /// 任何一步失败都不会留下历程记录。
    pub async fn commit(&self, commit: TransitionCommit) -> Result<TrackingState> {
        let mut states = self.states.write().await;

        // 1. 版本核对（乐观锁）
        let current = states.get(&commit.key);
        let new_version = match (commit.expected_version, current) {
            (None, None) => 1,
            (None, Some(_)) => {
                return Err(CheckupError::ConcurrencyConflict(format!(
                    "客户 {} 的追踪记录已存在",
                    commit.key.patient_id
                )))
            }
            (Some(_), None) => {
                return Err(CheckupError::NotFound(format!(
                    "客户 {} 在 {} 无追踪记录",
                    commit.key.patient_id, commit.key.exam_date
                )))
            }
            (Some(expected), Some(state)) => {
                if state.version != expected {
                    return Err(CheckupError::ConcurrencyConflict(format!(
                        "追踪记录已被其他操作修改 (期望版本 {}, 实际 {})",
                        expected, state.version
                    )));
                }
                state.version + 1
            }
        };

        // 2. 容量复核：以写锁内的最新人数为准，避免两个并发开始检查都通过预检
        if let Some(guard) = &commit.capacity_guard {
            let in_exam_count = states
                .values()
                .filter(|s| {
                    s.exam_date == commit.key.exam_date
                        && s.patient_id != commit.key.patient_id
                        && s.status == TrackingStatus::InExam
                        && s.station.as_deref() == Some(guard.station_code.as_str())
                })
                .count() as i32;
            if in_exam_count >= guard.capacity {
                return Err(CheckupError::CapacityExceeded {
                    station: guard.station_code.clone(),
                    capacity: guard.capacity,
                });
            }
        }

        // 3. 写入新状态
        let now = chrono::Utc::now();
        let new_state = TrackingState {
            patient_id: commit.key.patient_id,
            exam_date: commit.key.exam_date,
            station: commit.station.clone(),
            status: commit.status,
            next_station: commit.next_station.clone(),
            version: new_version,
            updated_by: commit.operator_id,
            updated_at: now,
        };
        states.insert(commit.key, new_state.clone());

        // 4. 追加历程（仍持有状态写锁，保证历程数 == 提交数）
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            patient_id: commit.key.patient_id,
            exam_date: commit.key.exam_date,
            station: commit.station,
            status: Some(commit.status),
            action: commit.action,
            operator_id: commit.operator_id,
            notes: commit.notes,
            timestamp: now,
        };
        self.history.write().await.push(entry);

        tracing::info!(
            "Committed {} for patient {} -> {:?} (version {})",
            commit.action.as_str(),
            commit.key.patient_id,
            new_state.status,
            new_version
        );
        Ok(new_state)
    }

    /// 取得某客户的追踪历程（最新在前）
    pub async fn history_for(&self, key: &TrackingKey) -> Vec<HistoryEntry> {
        let history = self.history.read().await;
        let mut entries: Vec<HistoryEntry> = history
            .iter()
            .filter(|h| h.patient_id == key.patient_id && h.exam_date == key.exam_date)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    /// 取得指定日期的全部历程（时间升序）
    pub async fn history_for_date(&self, exam_date: NaiveDate) -> Vec<HistoryEntry> {
        self.history
            .read()
            .await
            .iter()
            .filter(|h| h.exam_date == exam_date)
            .cloned()
            .collect()
    }

    /// 取得日期区间内的全部历程（含两端，用于统计回溯）
    pub async fn history_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<HistoryEntry> {
        self.history
            .read()
            .await
            .iter()
            .filter(|h| h.exam_date >= start && h.exam_date <= end)
            .cloned()
            .collect()
    }

    /// 某客户的历程条数
    pub async fn history_count(&self, key: &TrackingKey) -> usize {
        self.history
            .read()
            .await
            .iter()
            .filter(|h| h.patient_id == key.patient_id && h.exam_date == key.exam_date)
            .count()
    }

    /// 从历程推导某客户已完成的检查站集合
    pub async fn completed_stations(&self, key: &TrackingKey) -> HashSet<String> {
        self.history
            .read()
            .await
            .iter()
            .filter(|h| {
                h.patient_id == key.patient_id
                    && h.exam_date == key.exam_date
                    && h.action == TrackingAction::Complete
            })
            .filter_map(|h| h.station.clone())
            .collect()
    }
}

impl Clone for TrackingStore {
    fn clone(&self) -> Self {
        Self {
            states: Arc::clone(&self.states),
            history: Arc::clone(&self.history),
        }
    }
}
