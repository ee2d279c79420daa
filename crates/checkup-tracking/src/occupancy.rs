//! 占用视图
//!
//! 从追踪记录按需重算各检查站的人数聚合。视图是缓存而非权威数据，
//! 容量约束的强制执行发生在状态机与冲突检测处。

use checkup_core::{
    OccupancyLevel, OccupancySnapshot, Station, StationOccupancy, TrackingState, TrackingStatus,
};
use chrono::NaiveDate;

/// 利用率告警阈值（利用率 >= 0.70 进入 Warning 档）
pub const WARN_UTILIZATION: f64 = 0.70;

/// 重算占用快照
///
/// waiting / in_exam 按当前位置统计；incoming 统计已指派前往
/// 该站（状态为检查中或移动中）但尚未到达的人数。
pub fn compute_occupancy(
    exam_date: NaiveDate,
    states: &[TrackingState],
    stations: &[Station],
    warn_threshold: f64,
) -> OccupancySnapshot {
    let mut result = Vec::with_capacity(stations.len());

    for station in stations.iter().filter(|s| s.is_active) {
        let code = station.code.as_str();
        let mut waiting = 0;
        let mut in_exam = 0;
        let mut incoming = 0;

        for state in states.iter().filter(|s| s.exam_date == exam_date) {
            let at_station = state.station.as_deref() == Some(code);
            match state.status {
                TrackingStatus::Waiting if at_station => waiting += 1,
                TrackingStatus::InExam if at_station => in_exam += 1,
                _ => {}
            }
            if state.next_station.as_deref() == Some(code)
                && matches!(
                    state.status,
                    TrackingStatus::InExam | TrackingStatus::Moving
                )
            {
                incoming += 1;
            }
        }

        let utilization = if station.capacity > 0 {
            f64::from(in_exam) / f64::from(station.capacity)
        } else {
            0.0
        };
        let level = if utilization >= 1.0 {
            OccupancyLevel::Full
        } else if utilization >= warn_threshold {
            OccupancyLevel::Warning
        } else {
            OccupancyLevel::Normal
        };

        result.push(StationOccupancy {
            station_code: station.code.clone(),
            station_name: station.name.clone(),
            capacity: station.capacity,
            waiting,
            in_exam,
            incoming,
            utilization,
            level,
        });
    }

    result.sort_by(|a, b| a.station_code.cmp(&b.station_code));

    OccupancySnapshot {
        exam_date,
        stations: result,
        generated_at: chrono::Utc::now(),
    }
}
