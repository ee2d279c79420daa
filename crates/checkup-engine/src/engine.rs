//! 追踪与分配引擎
//!
//! 协调状态机、占用视图、冲突检测、推荐与陪检指派的核心门面。
//! 所有变更操作接受已鉴权的 actor_id 仅作审计记录，引擎本身
//! 不做权限判断。

use crate::{
    config::EngineConfig,
    conflict::{unmet_dependencies, ConflictContext, ConflictDetector},
    escort::EscortCoordinator,
    events::{EngineEvent, EventSink},
    recommend::{rank_recommendations, score_station, Recommendation, ScoreInput},
    state_machine::TrackingStateMachine,
};
use checkup_core::{
    CheckupError, ConflictFinding, EscortAssignment, OccupancySnapshot, Patient, Result,
    TrackingAction, TrackingKey, TrackingState, TrackingStatus,
};
use checkup_registry::{EquipmentFeed, PatientRoster, StationRegistry};
use checkup_tracking::{
    average_duration_minutes, compute_occupancy, estimate_wait, CapacityGuard, QueuePosition,
    TrackingStore, TransitionCommit, WaitEstimate,
};
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// 报到柜台站代码：首次到达的默认入口
pub const REGISTRATION_STATION: &str = "REG";

/// 等候时间统计的历史回溯天数
const WAIT_STATS_DAYS_BACK: i64 = 7;

/// 指派下一站的结果：提交后的追踪记录与非阻断级检测条目
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AssignOutcome {
    pub tracking: TrackingState,
    pub findings: Vec<ConflictFinding>,
}

/// 客户状态总览
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PatientStatusView {
    pub patient: Patient,
    pub tracking: Option<TrackingState>,
    pub escort: Option<EscortAssignment>,
    pub completed_stations: Vec<String>,
}

/// 追踪与分配引擎
pub struct CheckupEngine {
    registry: StationRegistry,
    equipment: EquipmentFeed,
    roster: PatientRoster,
    store: TrackingStore,
    escort: EscortCoordinator,
    state_machine: TrackingStateMachine,
    detector: ConflictDetector,
    config: EngineConfig,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CheckupEngine {
    /// 创建空引擎（目录需自行载入）
    pub fn new(config: EngineConfig) -> Self {
        let detector = ConflictDetector::new(config.occupancy.warn_utilization);
        Self {
            registry: StationRegistry::new(),
            equipment: EquipmentFeed::new(),
            roster: PatientRoster::new(),
            store: TrackingStore::new(),
            escort: EscortCoordinator::new(),
            state_machine: TrackingStateMachine::new(),
            detector,
            config,
            sinks: Vec::new(),
        }
    }

    /// 创建引擎并载入默认检查站与设备
    pub async fn with_defaults(config: EngineConfig) -> Self {
        let engine = Self::new(config);
        for station in checkup_registry::default_stations() {
            engine.registry.upsert(station).await;
        }
        let stations = engine.registry.active_stations().await;
        engine.equipment.init_for_stations(&stations).await;
        engine
    }

    /// 注册事件接收端
    pub fn add_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    async fn publish(&self, event: &EngineEvent) {
        for sink in &self.sinks {
            sink.publish(event).await;
        }
    }

    /// 回报到达检查站
    ///
    /// 首次回报时建立追踪记录；到达已指派的下一站会消费该指派。
    pub async fn report_arrival(
        &self,
        patient_id: Uuid,
        exam_date: NaiveDate,
        station_code: &str,
        actor_id: Uuid,
    ) -> Result<TrackingState> {
        let station = self.registry.require(station_code).await?;
        let key = TrackingKey::new(patient_id, exam_date);

        let commit = match self.store.get(&key).await {
            None => TransitionCommit {
                key,
                expected_version: None,
                station: Some(station.code.clone()),
                status: TrackingStatus::Waiting,
                next_station: None,
                action: TrackingAction::Arrive,
                operator_id: Some(actor_id),
                notes: None,
                capacity_guard: None,
            },
            Some(state) => {
                let new_status = self
                    .state_machine
                    .transition(state.status, TrackingAction::Arrive)?;
                // 到达指派的目的站后清除指派，其他情况保留
                let next_station = match state.next_station.as_deref() {
                    Some(code) if code == station.code => None,
                    _ => state.next_station.clone(),
                };
                TransitionCommit {
                    key,
                    expected_version: Some(state.version),
                    station: Some(station.code.clone()),
                    status: new_status,
                    next_station,
                    action: TrackingAction::Arrive,
                    operator_id: Some(actor_id),
                    notes: None,
                    capacity_guard: None,
                }
            }
        };

        let state = self.store.commit(commit).await?;
        self.publish(&EngineEvent::PatientArrived {
            patient_id,
            exam_date,
            station_code: station.code.clone(),
        })
        .await;
        Ok(state)
    }

    /// 回报开始检查
    ///
    /// 占用预检之外，提交时还会在存储写锁内以最新人数复核容量，
    /// 并发竞争的落败方收到 CapacityExceeded。
    pub async fn report_start(
        &self,
        patient_id: Uuid,
        exam_date: NaiveDate,
        actor_id: Uuid,
    ) -> Result<TrackingState> {
        let key = TrackingKey::new(patient_id, exam_date);
        let state = self.store.get(&key).await.ok_or_else(|| {
            CheckupError::NotFound(format!("客户 {} 在 {} 无追踪记录", patient_id, exam_date))
        })?;

        let new_status = self
            .state_machine
            .transition(state.status, TrackingAction::Start)?;
        let station_code = state
            .station
            .clone()
            .ok_or_else(|| CheckupError::Validation("客户尚未报到任何检查站".to_string()))?;
        let station = self.registry.require(&station_code).await?;

        // 预检：快照可能滞后一次转换，最终以提交时复核为准
        let snapshot = self.occupancy_snapshot(exam_date).await;
        if let Some(occ) = snapshot.station(&station_code) {
            if occ.in_exam >= station.capacity {
                return Err(CheckupError::CapacityExceeded {
                    station: station_code,
                    capacity: station.capacity,
                });
            }
        }

        let state = self
            .store
            .commit(TransitionCommit {
                key,
                expected_version: Some(state.version),
                station: Some(station_code.clone()),
                status: new_status,
                next_station: state.next_station.clone(),
                action: TrackingAction::Start,
                operator_id: Some(actor_id),
                notes: None,
                capacity_guard: Some(CapacityGuard {
                    station_code: station_code.clone(),
                    capacity: station.capacity,
                }),
            })
            .await?;

        self.publish(&EngineEvent::ExamStarted {
            patient_id,
            exam_date,
            station_code,
        })
        .await;
        Ok(state)
    }

    /// 回报完成检查
    ///
    /// 套餐内仍有未完成项目时进入移动中，否则整体完成。
    pub async fn report_complete(
        &self,
        patient_id: Uuid,
        exam_date: NaiveDate,
        actor_id: Uuid,
        notes: Option<String>,
    ) -> Result<TrackingState> {
        let key = TrackingKey::new(patient_id, exam_date);
        let state = self.store.get(&key).await.ok_or_else(|| {
            CheckupError::NotFound(format!("客户 {} 在 {} 无追踪记录", patient_id, exam_date))
        })?;

        // 基础合法性：只能从检查中完成
        self.state_machine
            .transition(state.status, TrackingAction::Complete)?;
        let station_code = state
            .station
            .clone()
            .ok_or_else(|| CheckupError::Validation("客户尚未报到任何检查站".to_string()))?;

        let patient = self.roster.require(patient_id).await?;
        let mut completed = self.store.completed_stations(&key).await;
        completed.insert(station_code.clone());
        let has_remaining = patient
            .required_exams
            .iter()
            .any(|code| !completed.contains(code));
        let new_status = self.state_machine.complete_target(has_remaining);

        let next_station = if new_status == TrackingStatus::Completed {
            None
        } else {
            state.next_station.clone()
        };

        let state = self
            .store
            .commit(TransitionCommit {
                key,
                expected_version: Some(state.version),
                station: Some(station_code.clone()),
                status: new_status,
                next_station,
                action: TrackingAction::Complete,
                operator_id: Some(actor_id),
                notes,
                capacity_guard: None,
            })
            .await?;

        self.publish(&EngineEvent::ExamCompleted {
            patient_id,
            exam_date,
            station_code,
        })
        .await;
        if state.status == TrackingStatus::Completed {
            self.publish(&EngineEvent::CheckupCompleted {
                patient_id,
                exam_date,
            })
            .await;
        }
        Ok(state)
    }

    /// 指派下一站
    ///
    /// 先经冲突检测：阻断级条目使指派失败并返回完整检测结果；
    /// 仅有警告时照常提交并把警告一并返回。本操作只记录意图，
    /// 客户实际移动由下一次到达回报完成。
    pub async fn assign_next_station(
        &self,
        patient_id: Uuid,
        exam_date: NaiveDate,
        station_code: &str,
        actor_id: Uuid,
    ) -> Result<AssignOutcome> {
        let station = self.registry.require(station_code).await?;
        if !station.is_active {
            return Err(CheckupError::Validation(format!(
                "检查站 {} 已停用",
                station.code
            )));
        }
        let patient = self.roster.require(patient_id).await?;
        let key = TrackingKey::new(patient_id, exam_date);
        let current = self.store.get(&key).await;

        if let Some(state) = &current {
            if !self.state_machine.assign_allowed(state.status) {
                return Err(CheckupError::InvalidTransition {
                    from: format!("{:?}", state.status),
                    action: format!("{:?}", TrackingAction::Assign),
                });
            }
        }

        let completed = self.store.completed_stations(&key).await;
        let snapshot = self.occupancy_snapshot(exam_date).await;
        let equipment = self.equipment.station_health(&station.code).await;
        let findings = self.detector.detect(&ConflictContext {
            station: &station,
            occupancy: snapshot.station(&station.code),
            equipment,
            required_exams: &patient.required_exams,
            completed: &completed,
        });

        let findings = match self.detector.ensure_assignable(findings) {
            Ok(findings) => findings,
            Err(err) => {
                if let CheckupError::ConflictBlocked { findings } = &err {
                    self.publish(&EngineEvent::AssignmentBlocked {
                        patient_id,
                        exam_date,
                        station_code: station.code.clone(),
                        findings: findings.clone(),
                    })
                    .await;
                }
                return Err(err);
            }
        };

        let commit = match current {
            None => TransitionCommit {
                key,
                expected_version: None,
                station: None,
                status: TrackingStatus::Waiting,
                next_station: Some(station.code.clone()),
                action: TrackingAction::Assign,
                operator_id: Some(actor_id),
                notes: Some(format!("指派下一站: {}", station.code)),
                capacity_guard: None,
            },
            Some(state) => TransitionCommit {
                key,
                expected_version: Some(state.version),
                station: state.station.clone(),
                status: state.status,
                next_station: Some(station.code.clone()),
                action: TrackingAction::Assign,
                operator_id: Some(actor_id),
                notes: Some(format!("指派下一站: {}", station.code)),
                capacity_guard: None,
            },
        };

        let tracking = self.store.commit(commit).await?;
        self.publish(&EngineEvent::NextStationAssigned {
            patient_id,
            exam_date,
            station_code: station.code.clone(),
            findings: findings.clone(),
        })
        .await;

        Ok(AssignOutcome { tracking, findings })
    }

    /// 指派陪检人员
    pub async fn assign_escort(
        &self,
        patient_id: Uuid,
        exam_date: NaiveDate,
        escort_id: Uuid,
        assigned_by: Uuid,
    ) -> Result<EscortAssignment> {
        let assignment = self
            .escort
            .assign(patient_id, exam_date, escort_id, Some(assigned_by))
            .await?;
        self.publish(&EngineEvent::EscortAssigned {
            patient_id,
            exam_date,
            escort_id,
        })
        .await;
        Ok(assignment)
    }

    /// 取得占用快照
    pub async fn occupancy_snapshot(&self, exam_date: NaiveDate) -> OccupancySnapshot {
        let states = self.store.states_for_date(exam_date).await;
        let stations = self.registry.active_stations().await;
        compute_occupancy(
            exam_date,
            &states,
            &stations,
            self.config.occupancy.warn_utilization,
        )
    }

    /// 取得下一站推荐排序
    ///
    /// 纯查询：相同的占用、设备与时间输入产生相同的排序，
    /// 不提交任何变更。
    pub async fn recommendations(
        &self,
        patient_id: Uuid,
        exam_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>> {
        let patient = self.roster.require(patient_id).await?;
        let key = TrackingKey::new(patient_id, exam_date);
        let completed = self.store.completed_stations(&key).await;
        let current_station = self
            .store
            .get(&key)
            .await
            .and_then(|state| state.station);

        let remaining: Vec<String> = patient
            .required_exams
            .iter()
            .filter(|code| {
                !completed.contains(*code) && Some(code.as_str()) != current_station.as_deref()
            })
            .cloned()
            .collect();

        let snapshot = self.occupancy_snapshot(exam_date).await;
        let hour = now.hour();
        let mut recommendations = Vec::new();

        for code in &remaining {
            let station = match self.registry.get(code).await {
                Some(station) if station.is_active => station,
                _ => continue, // 目录外或已停用的项目不参与推荐
            };
            let equipment = self.equipment.station_health(code).await;
            let unmet = unmet_dependencies(&station, &patient.required_exams, &completed);
            let occupancy = snapshot.station(code);

            let input = ScoreInput {
                station: &station,
                occupancy,
                equipment,
                unmet_dependencies: unmet,
                remaining_other_count: remaining.len() - 1,
                hour,
            };
            let (score, deltas) = score_station(&input, &self.config.scoring);

            recommendations.push(Recommendation {
                station_code: station.code.clone(),
                station_name: station.name.clone(),
                score,
                reasons: deltas.into_iter().map(|d| d.reason).collect(),
                waiting_count: occupancy.map_or(0, |o| o.waiting),
                duration_minutes: station.duration_minutes,
            });
        }

        Ok(rank_recommendations(recommendations))
    }

    /// 取得排名最高的建议站
    pub async fn suggest_next(
        &self,
        patient_id: Uuid,
        exam_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<Recommendation>> {
        let ranked = self.recommendations(patient_id, exam_date, now).await?;
        Ok(ranked.into_iter().next())
    }

    /// 取得各检查站的等候时间预估
    pub async fn wait_estimates(
        &self,
        exam_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Vec<WaitEstimate> {
        let stations = self.registry.active_stations().await;
        let snapshot = self.occupancy_snapshot(exam_date).await;
        let history = self
            .store
            .history_between(exam_date - Duration::days(WAIT_STATS_DAYS_BACK), exam_date)
            .await;

        stations
            .iter()
            .map(|station| {
                let (waiting, in_exam) = snapshot
                    .station(&station.code)
                    .map_or((0, 0), |o| (o.waiting, o.in_exam));
                let avg = average_duration_minutes(&history, &station.code);
                estimate_wait(station, waiting, in_exam, avg, now)
            })
            .collect()
    }

    /// 取得客户在某站的排队位置
    pub async fn queue_position(
        &self,
        patient_id: Uuid,
        exam_date: NaiveDate,
        station_code: &str,
    ) -> Result<Option<QueuePosition>> {
        let station = self.registry.require(station_code).await?;
        let history = self
            .store
            .history_between(exam_date - Duration::days(WAIT_STATS_DAYS_BACK), exam_date)
            .await;
        let avg = average_duration_minutes(&history, station_code)
            .unwrap_or(i64::from(station.duration_minutes));
        let states = self.store.states_for_date(exam_date).await;
        Ok(checkup_tracking::wait_time::queue_position(
            &states,
            patient_id,
            station_code,
            avg,
        ))
    }

    /// 取得客户状态总览
    pub async fn patient_status(
        &self,
        patient_id: Uuid,
        exam_date: NaiveDate,
    ) -> Result<PatientStatusView> {
        let patient = self.roster.require(patient_id).await?;
        let key = TrackingKey::new(patient_id, exam_date);
        let tracking = self.store.get(&key).await;
        let escort = self.escort.active_for(&key).await;
        let mut completed_stations: Vec<String> =
            self.store.completed_stations(&key).await.into_iter().collect();
        completed_stations.sort();

        Ok(PatientStatusView {
            patient,
            tracking,
            escort,
            completed_stations,
        })
    }

    /// 获取检查站目录
    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }

    /// 获取设备状态源
    pub fn equipment_feed(&self) -> &EquipmentFeed {
        &self.equipment
    }

    /// 获取客户名册
    pub fn roster(&self) -> &PatientRoster {
        &self.roster
    }

    /// 获取追踪存储
    pub fn store(&self) -> &TrackingStore {
        &self.store
    }

    /// 获取陪检指派协调器
    pub fn escort_coordinator(&self) -> &EscortCoordinator {
        &self.escort
    }

    /// 获取引擎配置
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkup_core::{ConflictKind, ConflictSeverity};
    use chrono::TimeZone;

    fn exam_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    fn actor() -> Uuid {
        Uuid::new_v4()
    }

    fn patient(required: &[&str]) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            chart_no: "A001".to_string(),
            name: "测试客户".to_string(),
            exam_date: exam_date(),
            required_exams: required.iter().map(|c| c.to_string()).collect(),
            vip_level: 0,
            notes: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn engine_with_patient(required: &[&str]) -> (CheckupEngine, Uuid) {
        let engine = CheckupEngine::with_defaults(EngineConfig::default()).await;
        let p = patient(required);
        let id = p.id;
        engine.roster().register(p).await;
        (engine, id)
    }

    #[tokio::test]
    async fn test_first_arrival_creates_waiting_record() {
        let (engine, patient_id) = engine_with_patient(&["REG", "BLOOD"]).await;

        let state = engine
            .report_arrival(patient_id, exam_date(), REGISTRATION_STATION, actor())
            .await
            .unwrap();

        assert_eq!(state.status, TrackingStatus::Waiting);
        assert_eq!(state.station.as_deref(), Some("REG"));
        assert_eq!(state.version, 1);
    }

    #[tokio::test]
    async fn test_arrival_while_in_exam_rejected() {
        let (engine, patient_id) = engine_with_patient(&["REG", "BLOOD"]).await;
        let date = exam_date();

        engine
            .report_arrival(patient_id, date, "REG", actor())
            .await
            .unwrap();
        engine.report_start(patient_id, date, actor()).await.unwrap();

        // 检查中不得直接到达其他站
        let err = engine
            .report_arrival(patient_id, date, "BLOOD", actor())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckupError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_start_requires_waiting_and_arrival() {
        let (engine, patient_id) = engine_with_patient(&["REG"]).await;

        let err = engine
            .report_start(patient_id, exam_date(), actor())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckupError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_capacity_race_exactly_one_succeeds() {
        // CT 容量 1，两位客户并发开始检查，只允许一人成功
        let engine = Arc::new(CheckupEngine::with_defaults(EngineConfig::default()).await);
        let date = exam_date();

        let mut patient_ids = Vec::new();
        for _ in 0..2 {
            let p = patient(&["CT"]);
            patient_ids.push(p.id);
            engine.roster().register(p).await;
            engine
                .report_arrival(*patient_ids.last().unwrap(), date, "CT", actor())
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for patient_id in &patient_ids {
            let engine = Arc::clone(&engine);
            let patient_id = *patient_id;
            handles.push(tokio::spawn(async move {
                engine.report_start(patient_id, date, Uuid::new_v4()).await
            }));
        }

        let mut successes = 0;
        let mut capacity_errors = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(CheckupError::CapacityExceeded { station, .. }) => {
                    assert_eq!(station, "CT");
                    capacity_errors += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(capacity_errors, 1);
    }

    #[tokio::test]
    async fn test_capacity_stress_exactly_k_succeed() {
        // ENDO 容量 2，六个并发开始检查，恰好 2 人成功
        let engine = Arc::new(CheckupEngine::with_defaults(EngineConfig::default()).await);
        let date = exam_date();

        let mut patient_ids = Vec::new();
        for _ in 0..6 {
            let p = patient(&["ENDO"]);
            let id = p.id;
            patient_ids.push(id);
            engine.roster().register(p).await;
            engine.report_arrival(id, date, "ENDO", actor()).await.unwrap();
        }

        let mut handles = Vec::new();
        for patient_id in patient_ids {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.report_start(patient_id, date, Uuid::new_v4()).await
            }));
        }

        let mut successes = 0;
        let mut capacity_errors = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(CheckupError::CapacityExceeded { .. }) => capacity_errors += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 2);
        assert_eq!(capacity_errors, 4);

        let snapshot = engine.occupancy_snapshot(date).await;
        assert_eq!(snapshot.station("ENDO").unwrap().in_exam, 2);
    }

    #[tokio::test]
    async fn test_complete_moves_then_last_station_completes() {
        let (engine, patient_id) = engine_with_patient(&["REG", "BLOOD"]).await;
        let date = exam_date();

        engine.report_arrival(patient_id, date, "REG", actor()).await.unwrap();
        engine.report_start(patient_id, date, actor()).await.unwrap();
        let state = engine
            .report_complete(patient_id, date, actor(), None)
            .await
            .unwrap();
        // 还剩 BLOOD，进入移动中
        assert_eq!(state.status, TrackingStatus::Moving);

        engine.report_arrival(patient_id, date, "BLOOD", actor()).await.unwrap();
        engine.report_start(patient_id, date, actor()).await.unwrap();
        let state = engine
            .report_complete(patient_id, date, actor(), Some("顺利完成".to_string()))
            .await
            .unwrap();
        // 最后一项必检完成后直接进入已完成，而不是移动中
        assert_eq!(state.status, TrackingStatus::Completed);
        assert!(state.next_station.is_none());

        // 终态后任何转换都被拒绝
        let err = engine
            .report_arrival(patient_id, date, "REG", actor())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckupError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_assign_with_unmet_dependency_warns_but_succeeds() {
        let (engine, patient_id) = engine_with_patient(&["BLOOD", "ENDO"]).await;
        let date = exam_date();

        engine.report_arrival(patient_id, date, "BLOOD", actor()).await.unwrap();

        // BLOOD 尚未完成时指派 ENDO：成功但附带依赖警告
        let outcome = engine
            .assign_next_station(patient_id, date, "ENDO", actor())
            .await
            .unwrap();
        assert_eq!(outcome.tracking.next_station.as_deref(), Some("ENDO"));
        let dependency = outcome
            .findings
            .iter()
            .find(|f| f.kind == ConflictKind::Dependency)
            .unwrap();
        assert_eq!(dependency.severity, ConflictSeverity::Warn);

        // 完成 BLOOD 后重新指派：不再有依赖警告
        engine.report_start(patient_id, date, actor()).await.unwrap();
        engine
            .report_complete(patient_id, date, actor(), None)
            .await
            .unwrap();
        let outcome = engine
            .assign_next_station(patient_id, date, "ENDO", actor())
            .await
            .unwrap();
        assert!(outcome
            .findings
            .iter()
            .all(|f| f.kind != ConflictKind::Dependency));
    }

    #[tokio::test]
    async fn test_assign_broken_station_blocked() {
        let (engine, patient_id) = engine_with_patient(&["MRI"]).await;
        let date = exam_date();

        // 标记 MRI 设备故障
        let mri_equipment = engine.equipment_feed().station_equipment("MRI").await;
        engine
            .equipment_feed()
            .report_failure(mri_equipment[0].id, None, None)
            .await
            .unwrap();

        let err = engine
            .assign_next_station(patient_id, date, "MRI", actor())
            .await
            .unwrap_err();
        match err {
            CheckupError::ConflictBlocked { findings } => {
                assert!(findings
                    .iter()
                    .any(|f| f.kind == ConflictKind::Equipment && f.is_block()));
            }
            other => panic!("unexpected error: {other}"),
        }

        // 被阻断的指派不产生历程记录
        let key = TrackingKey::new(patient_id, date);
        assert_eq!(engine.store().history_count(&key).await, 0);
    }

    #[tokio::test]
    async fn test_assign_on_unregistered_creates_record() {
        let (engine, patient_id) = engine_with_patient(&["BLOOD"]).await;
        let date = exam_date();

        let outcome = engine
            .assign_next_station(patient_id, date, "BLOOD", actor())
            .await
            .unwrap();
        assert_eq!(outcome.tracking.status, TrackingStatus::Waiting);
        assert!(outcome.tracking.station.is_none());
        assert_eq!(outcome.tracking.next_station.as_deref(), Some("BLOOD"));

        // 到达指派站后消费指派
        let state = engine
            .report_arrival(patient_id, date, "BLOOD", actor())
            .await
            .unwrap();
        assert!(state.next_station.is_none());
    }

    #[tokio::test]
    async fn test_history_records_committed_transitions_only() {
        let (engine, patient_id) = engine_with_patient(&["REG"]).await;
        let date = exam_date();
        let key = TrackingKey::new(patient_id, date);

        engine.report_arrival(patient_id, date, "REG", actor()).await.unwrap();
        engine.report_start(patient_id, date, actor()).await.unwrap();
        assert_eq!(engine.store().history_count(&key).await, 2);

        // 失败的转换不追加历程
        let _ = engine
            .report_arrival(patient_id, date, "BLOOD", actor())
            .await
            .unwrap_err();
        assert_eq!(engine.store().history_count(&key).await, 2);

        engine
            .report_complete(patient_id, date, actor(), None)
            .await
            .unwrap();
        assert_eq!(engine.store().history_count(&key).await, 3);
    }

    #[tokio::test]
    async fn test_recommendations_deterministic() {
        let (engine, patient_id) = engine_with_patient(&["BLOOD", "XRAY", "CARDIO", "CONSULT"]).await;
        let date = exam_date();
        let now = morning();

        let first = engine.recommendations(patient_id, date, now).await.unwrap();
        let second = engine.recommendations(patient_id, date, now).await.unwrap();

        assert!(!first.is_empty());
        let codes: Vec<&str> = first.iter().map(|r| r.station_code.as_str()).collect();
        let codes_again: Vec<&str> = second.iter().map(|r| r.station_code.as_str()).collect();
        assert_eq!(codes, codes_again);

        // CONSULT 在其他项目未完成时不应排第一
        assert_ne!(codes[0], "CONSULT");
    }

    #[tokio::test]
    async fn test_recommendations_exclude_completed_and_current() {
        let (engine, patient_id) = engine_with_patient(&["REG", "BLOOD", "XRAY"]).await;
        let date = exam_date();

        engine.report_arrival(patient_id, date, "REG", actor()).await.unwrap();
        engine.report_start(patient_id, date, actor()).await.unwrap();
        engine
            .report_complete(patient_id, date, actor(), None)
            .await
            .unwrap();
        engine.report_arrival(patient_id, date, "BLOOD", actor()).await.unwrap();

        let ranked = engine
            .recommendations(patient_id, date, morning())
            .await
            .unwrap();
        let codes: Vec<&str> = ranked.iter().map(|r| r.station_code.as_str()).collect();
        // REG 已完成、BLOOD 是当前站，都不参与推荐
        assert_eq!(codes, vec!["XRAY"]);
    }

    #[tokio::test]
    async fn test_assign_escort_and_status_view() {
        let (engine, patient_id) = engine_with_patient(&["REG"]).await;
        let date = exam_date();
        let staff = Uuid::new_v4();

        engine.report_arrival(patient_id, date, "REG", actor()).await.unwrap();
        let assignment = engine
            .assign_escort(patient_id, date, staff, actor())
            .await
            .unwrap();
        assert!(assignment.is_active);

        let view = engine.patient_status(patient_id, date).await.unwrap();
        assert_eq!(view.escort.unwrap().escort_id, staff);
        assert_eq!(view.tracking.unwrap().station.as_deref(), Some("REG"));
        assert!(view.completed_stations.is_empty());
    }

    #[tokio::test]
    async fn test_wait_estimates_cover_active_stations() {
        let (engine, patient_id) = engine_with_patient(&["BLOOD"]).await;
        let date = exam_date();

        engine.report_arrival(patient_id, date, "BLOOD", actor()).await.unwrap();

        let estimates = engine.wait_estimates(date, morning()).await;
        assert_eq!(estimates.len(), 10);
        let blood = estimates
            .iter()
            .find(|e| e.station_code == "BLOOD")
            .unwrap();
        assert_eq!(blood.waiting_count, 1);
        // 无历史样本时退回默认时长
        assert_eq!(blood.avg_duration_minutes, 10);
    }

    #[tokio::test]
    async fn test_events_published_on_commit() {
        use crate::events::tests::RecordingSink;
        use tokio::sync::Mutex;

        let mut engine = CheckupEngine::with_defaults(EngineConfig::default()).await;
        let events = Arc::new(Mutex::new(Vec::new()));
        engine.add_event_sink(Arc::new(RecordingSink {
            events: Arc::clone(&events),
        }));

        let p = patient(&["REG"]);
        let patient_id = p.id;
        engine.roster().register(p).await;
        let date = exam_date();

        engine.report_arrival(patient_id, date, "REG", actor()).await.unwrap();
        engine.report_start(patient_id, date, actor()).await.unwrap();
        engine
            .report_complete(patient_id, date, actor(), None)
            .await
            .unwrap();

        let events = events.lock().await;
        // 到达、开始、完成单项、整体完成
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], EngineEvent::PatientArrived { .. }));
        assert!(matches!(events[3], EngineEvent::CheckupCompleted { .. }));
    }
}
