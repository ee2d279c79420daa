//! 等候时间预估
//!
//! 统计只读取追加式历程日志，不依赖实时记录的内部结构。

use checkup_core::{HistoryEntry, Station, TrackingAction, TrackingState, TrackingStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单次检查时长的合理区间（分钟），超出视为异常数据
const MIN_DURATION_MINUTES: i64 = 1;
const MAX_DURATION_MINUTES: i64 = 120;

/// 检查站等候时间预估
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitEstimate {
    pub station_code: String,
    pub station_name: String,
    pub waiting_count: i32,
    pub in_exam_count: i32,
    pub avg_duration_minutes: i64,
    pub estimated_wait_minutes: i64,
    pub estimated_ready_at: DateTime<Utc>,
}

/// 客户在某站的排队位置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuePosition {
    pub position: i32,                 // 1 = 下一个
    pub people_ahead: i32,
    pub estimated_wait_minutes: i64,
    pub avg_duration_minutes: i64,
}

/// 根据历程计算某站的平均检查时长（分钟）
///
/// 将同一客户同一站的 start 与其后第一条 complete 配对，
/// 过滤异常值后取平均；无有效样本时返回 None。
pub fn average_duration_minutes(history: &[HistoryEntry], station_code: &str) -> Option<i64> {
    let mut durations: Vec<i64> = Vec::new();

    for start in history.iter().filter(|h| {
        h.action == TrackingAction::Start && h.station.as_deref() == Some(station_code)
    }) {
        let complete = history.iter().find(|h| {
            h.action == TrackingAction::Complete
                && h.patient_id == start.patient_id
                && h.exam_date == start.exam_date
                && h.station.as_deref() == Some(station_code)
                && h.timestamp > start.timestamp
        });

        if let Some(complete) = complete {
            let minutes = (complete.timestamp - start.timestamp).num_minutes();
            if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
                durations.push(minutes);
            }
        }
    }

    if durations.is_empty() {
        return None;
    }
    Some(durations.iter().sum::<i64>() / durations.len() as i64)
}

/// 预估某检查站的等候时间
///
/// 等候时间 = 等候人数 × 平均时长；有人检查中时再加半个时长。
pub fn estimate_wait(
    station: &Station,
    waiting_count: i32,
    in_exam_count: i32,
    avg_duration: Option<i64>,
    now: DateTime<Utc>,
) -> WaitEstimate {
    let avg = avg_duration.unwrap_or(i64::from(station.duration_minutes));

    let mut estimated_wait = i64::from(waiting_count) * avg;
    if in_exam_count > 0 {
        estimated_wait += avg / 2;
    }

    WaitEstimate {
        station_code: station.code.clone(),
        station_name: station.name.clone(),
        waiting_count,
        in_exam_count,
        avg_duration_minutes: avg,
        estimated_wait_minutes: estimated_wait,
        estimated_ready_at: now + chrono::Duration::minutes(estimated_wait),
    }
}

/// 计算客户在某站等候队列中的位置（按到达先后排序）
pub fn queue_position(
    states: &[TrackingState],
    patient_id: Uuid,
    station_code: &str,
    avg_duration: i64,
) -> Option<QueuePosition> {
    let mut waiting: Vec<&TrackingState> = states
        .iter()
        .filter(|s| {
            s.status == TrackingStatus::Waiting && s.station.as_deref() == Some(station_code)
        })
        .collect();
    waiting.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));

    let position = waiting.iter().position(|s| s.patient_id == patient_id)? as i32 + 1;
    let people_ahead = position - 1;

    let mut estimated_wait = i64::from(people_ahead) * avg_duration;
    let someone_in_exam = states.iter().any(|s| {
        s.status == TrackingStatus::InExam && s.station.as_deref() == Some(station_code)
    });
    if someone_in_exam {
        estimated_wait += avg_duration / 2;
    }

    Some(QueuePosition {
        position,
        people_ahead,
        estimated_wait_minutes: estimated_wait,
        avg_duration_minutes: avg_duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn entry(
        patient_id: Uuid,
        action: TrackingAction,
        station: &str,
        at: DateTime<Utc>,
    ) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::new_v4(),
            patient_id,
            exam_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            station: Some(station.to_string()),
            status: None,
            action,
            operator_id: None,
            notes: None,
            timestamp: at,
        }
    }

    fn blood_station() -> Station {
        Station {
            code: "BLOOD".to_string(),
            name: "抽血站".to_string(),
            duration_minutes: 10,
            capacity: 4,
            location: None,
            fasting_preferred: false,
            depends_on: Vec::new(),
            is_active: true,
        }
    }

    #[test]
    fn test_average_duration_pairs_start_and_complete() {
        let t0 = Utc::now();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let history = vec![
            entry(p1, TrackingAction::Start, "BLOOD", t0),
            entry(p1, TrackingAction::Complete, "BLOOD", t0 + Duration::minutes(8)),
            entry(p2, TrackingAction::Start, "BLOOD", t0 + Duration::minutes(1)),
            entry(p2, TrackingAction::Complete, "BLOOD", t0 + Duration::minutes(13)),
        ];

        assert_eq!(average_duration_minutes(&history, "BLOOD"), Some(10));
        assert_eq!(average_duration_minutes(&history, "XRAY"), None);
    }

    #[test]
    fn test_average_duration_filters_outliers() {
        let t0 = Utc::now();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let history = vec![
            // 超过两小时，异常样本
            entry(p1, TrackingAction::Start, "BLOOD", t0),
            entry(p1, TrackingAction::Complete, "BLOOD", t0 + Duration::minutes(300)),
            entry(p2, TrackingAction::Start, "BLOOD", t0),
            entry(p2, TrackingAction::Complete, "BLOOD", t0 + Duration::minutes(6)),
        ];

        assert_eq!(average_duration_minutes(&history, "BLOOD"), Some(6));
    }

    #[test]
    fn test_estimate_wait_uses_default_duration() {
        let now = Utc::now();
        let estimate = estimate_wait(&blood_station(), 3, 1, None, now);
        // 3 × 10 + 10 / 2
        assert_eq!(estimate.estimated_wait_minutes, 35);
        assert_eq!(estimate.avg_duration_minutes, 10);
        assert_eq!(
            estimate.estimated_ready_at,
            now + Duration::minutes(35)
        );
    }

    #[test]
    fn test_queue_position_ordering() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let t0 = Utc::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let make_state = |patient_id: Uuid, at: DateTime<Utc>| TrackingState {
            patient_id,
            exam_date: date,
            station: Some("BLOOD".to_string()),
            status: TrackingStatus::Waiting,
            next_station: None,
            version: 1,
            updated_by: None,
            updated_at: at,
        };

        let states = vec![
            make_state(second, t0 + Duration::minutes(5)),
            make_state(first, t0),
        ];

        let pos = queue_position(&states, second, "BLOOD", 10).unwrap();
        assert_eq!(pos.position, 2);
        assert_eq!(pos.people_ahead, 1);
        assert_eq!(pos.estimated_wait_minutes, 10);

        assert!(queue_position(&states, Uuid::new_v4(), "BLOOD", 10).is_none());
    }
}
