//! 下一站推荐
//!
//! 评分是一组相互独立的纯函数规则，各自贡献一个带符号增量，
//! 由聚合器求和后排序。规则可以单独测试、调整或重排，
//! 排序结果对相同输入完全确定（同分按站代码升序）。

use crate::config::ScoringConfig;
use checkup_core::{EquipmentHealth, Station, StationOccupancy};
use serde::{Deserialize, Serialize};

/// 单条评分规则的输入
#[derive(Debug)]
pub struct ScoreInput<'a> {
    pub station: &'a Station,
    /// 候选站的占用统计；None 视为空站
    pub occupancy: Option<&'a StationOccupancy>,
    pub equipment: EquipmentHealth,
    /// 套餐范围内尚未完成的前置项目
    pub unmet_dependencies: Vec<String>,
    /// 除该站外剩余的必检项目数
    pub remaining_other_count: usize,
    /// 当前小时（24 小时制）
    pub hour: u32,
}

/// 单条规则产生的分数增量
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub rule: &'static str,
    pub delta: i32,
    pub reason: String,
}

/// 推荐结果条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub station_code: String,
    pub station_name: String,
    pub score: i32,
    pub reasons: Vec<String>,
    pub waiting_count: i32,
    pub duration_minutes: i32,
}

type ScoreRule = fn(&ScoreInput<'_>, &ScoringConfig) -> Option<ScoreDelta>;

/// 评分规则管线，按固定顺序执行
fn scoring_rules() -> &'static [ScoreRule] {
    &[
        waiting_load_rule,
        dependency_rule,
        equipment_rule,
        fasting_time_rule,
        consult_last_rule,
    ]
}

/// 等候负载规则：每位等候客户扣分，无人等候加分
fn waiting_load_rule(input: &ScoreInput<'_>, config: &ScoringConfig) -> Option<ScoreDelta> {
    let waiting = input.occupancy.map_or(0, |o| o.waiting);
    if waiting == 0 {
        Some(ScoreDelta {
            rule: "waiting_load",
            delta: config.empty_queue_bonus,
            reason: "目前无人等候".to_string(),
        })
    } else {
        Some(ScoreDelta {
            rule: "waiting_load",
            delta: -(waiting * config.waiting_weight),
            reason: format!("等候人数 {} 人", waiting),
        })
    }
}

/// 依赖规则：前置项目未完成时大幅扣分，除非别无选择否则排除该站
fn dependency_rule(input: &ScoreInput<'_>, config: &ScoringConfig) -> Option<ScoreDelta> {
    if input.unmet_dependencies.is_empty() {
        return None;
    }
    Some(ScoreDelta {
        rule: "dependency",
        delta: -config.dependency_penalty,
        reason: format!("建议先完成 {}", input.unmet_dependencies.join(", ")),
    })
}

/// 设备规则：故障大幅扣分，告警中度扣分
fn equipment_rule(input: &ScoreInput<'_>, config: &ScoringConfig) -> Option<ScoreDelta> {
    match input.equipment {
        EquipmentHealth::Broken => Some(ScoreDelta {
            rule: "equipment",
            delta: -config.equipment_broken_penalty,
            reason: "设备故障中".to_string(),
        }),
        EquipmentHealth::Warning => Some(ScoreDelta {
            rule: "equipment",
            delta: -config.equipment_warning_penalty,
            reason: "设备状态告警".to_string(),
        }),
        EquipmentHealth::Normal => None,
    }
}

/// 空腹时段规则：适合空腹的检查在分界前加分、分界后扣分
fn fasting_time_rule(input: &ScoreInput<'_>, config: &ScoringConfig) -> Option<ScoreDelta> {
    if !input.station.fasting_preferred {
        return None;
    }
    if input.hour < config.fasting_cutoff_hour {
        Some(ScoreDelta {
            rule: "fasting_time",
            delta: config.fasting_bonus,
            reason: "适合空腹时段进行".to_string(),
        })
    } else {
        Some(ScoreDelta {
            rule: "fasting_time",
            delta: -config.fasting_penalty,
            reason: "已过空腹时段".to_string(),
        })
    }
}

/// 咨询收尾规则：还有其他项目未完成时降低医师咨询的优先级
fn consult_last_rule(input: &ScoreInput<'_>, config: &ScoringConfig) -> Option<ScoreDelta> {
    if input.station.code != config.consult_code || input.remaining_other_count == 0 {
        return None;
    }
    Some(ScoreDelta {
        rule: "consult_last",
        delta: -config.consult_last_penalty,
        reason: "建议其他检查完成后再咨询".to_string(),
    })
}

/// 对单个候选站执行全部规则并求和
pub fn score_station(input: &ScoreInput<'_>, config: &ScoringConfig) -> (i32, Vec<ScoreDelta>) {
    let deltas: Vec<ScoreDelta> = scoring_rules()
        .iter()
        .filter_map(|rule| rule(input, config))
        .collect();
    let score = config.base_score + deltas.iter().map(|d| d.delta).sum::<i32>();
    (score, deltas)
}

/// 按分数降序排序，同分按站代码升序保证输出可复现
pub fn rank_recommendations(mut recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    recommendations.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.station_code.cmp(&b.station_code))
    });
    recommendations
}
