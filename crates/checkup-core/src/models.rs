//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 体检客户基本信息
///
/// 客户档案由院方记录系统拥有，引擎仅保存引用副本。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub chart_no: String,                // 病历号
    pub name: String,                    // 客户姓名
    pub exam_date: NaiveDate,            // 体检日期
    pub required_exams: Vec<String>,     // 套餐包含的检查项目代码
    pub vip_level: i32,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 检查站信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub code: String,                    // 检查站代码（唯一键）
    pub name: String,                    // 检查站名称
    pub duration_minutes: i32,           // 预期检查时长
    pub capacity: i32,                   // 同时容纳人数上限（>= 1）
    pub location: Option<String>,        // 物理位置说明
    pub fasting_preferred: bool,         // 适合空腹（上午优先）
    pub depends_on: Vec<String>,         // 建议先完成的前置检查站代码
    pub is_active: bool,
}

/// 追踪状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TrackingStatus {
    Waiting,   // 等候中
    InExam,    // 检查中
    Moving,    // 移动中
    Completed, // 已完成
}

impl TrackingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::Waiting => "waiting",
            TrackingStatus::InExam => "in_exam",
            TrackingStatus::Moving => "moving",
            TrackingStatus::Completed => "completed",
        }
    }
}

/// 追踪动作
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TrackingAction {
    Arrive,   // 到达
    Start,    // 开始检查
    Complete, // 完成检查
    Assign,   // 指派
}

impl TrackingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingAction::Arrive => "arrive",
            TrackingAction::Start => "start",
            TrackingAction::Complete => "complete",
            TrackingAction::Assign => "assign",
        }
    }
}

/// 追踪记录键：(客户, 体检日期) 是串行化的最小单位
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TrackingKey {
    pub patient_id: Uuid,
    pub exam_date: NaiveDate,
}

impl TrackingKey {
    pub fn new(patient_id: Uuid, exam_date: NaiveDate) -> Self {
        Self {
            patient_id,
            exam_date,
        }
    }
}

/// 客户实时追踪记录
///
/// 每个 (客户, 日期) 仅存在一条，只能通过状态机转换操作修改；
/// version 字段用于乐观锁检测并发写入。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingState {
    pub patient_id: Uuid,
    pub exam_date: NaiveDate,
    pub station: Option<String>,         // 当前位置（检查站代码），None = 尚未报到
    pub status: TrackingStatus,
    pub next_station: Option<String>,    // 已指派的下一站
    pub version: u64,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// 追踪历程记录
///
/// 不可变的追加式记录，是统计与等候时间预估的唯一数据来源。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub exam_date: NaiveDate,
    pub station: Option<String>,
    pub status: Option<TrackingStatus>,
    pub action: TrackingAction,
    pub operator_id: Option<Uuid>,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// 陪检指派记录
///
/// 每个 (客户, 日期) 最多一条 is_active 记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscortAssignment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub exam_date: NaiveDate,
    pub escort_id: Uuid,                 // 陪检人员（工作人员）ID
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub is_active: bool,
}

/// 设备健康状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EquipmentHealth {
    Normal,  // 正常
    Warning, // 告警
    Broken,  // 故障
}

/// 设备信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: Uuid,
    pub name: String,
    pub station_code: String,            // 所属检查站
    pub status: EquipmentHealth,
    pub description: Option<String>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// 设备状态变更日志（追加式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentLog {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub action: String,                  // report_failure / repair / set_status
    pub old_status: EquipmentHealth,
    pub new_status: EquipmentHealth,
    pub description: Option<String>,
    pub operator_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// 占用水平
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OccupancyLevel {
    Normal,  // 正常
    Warning, // 利用率 >= 0.70
    Full,    // 利用率 >= 1.0
}

/// 单个检查站的占用统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationOccupancy {
    pub station_code: String,
    pub station_name: String,
    pub capacity: i32,
    pub waiting: i32,                    // 在该站等候的人数
    pub in_exam: i32,                    // 正在检查的人数
    pub incoming: i32,                   // 已指派前往但尚未到达的人数
    pub utilization: f64,                // in_exam / capacity
    pub level: OccupancyLevel,
}

/// 占用快照：按需从追踪记录重算的只读聚合视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    pub exam_date: NaiveDate,
    pub stations: Vec<StationOccupancy>,
    pub generated_at: DateTime<Utc>,
}

impl OccupancySnapshot {
    /// 按代码查找某站的占用统计
    pub fn station(&self, code: &str) -> Option<&StationOccupancy> {
        self.stations.iter().find(|s| s.station_code == code)
    }
}

/// 冲突类别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConflictKind {
    Capacity,   // 容量
    Equipment,  // 设备
    Dependency, // 依赖关系
}

/// 冲突严重程度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConflictSeverity {
    Block, // 阻断，禁止提交
    Warn,  // 警告，允许提交
    Info,  // 提示
}

/// 冲突检测结果条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictFinding {
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    pub station_code: String,
    pub message: String,
}

impl ConflictFinding {
    pub fn is_block(&self) -> bool {
        self.severity == ConflictSeverity::Block
    }
}
