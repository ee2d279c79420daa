//! 冲突检测
//!
//! 指派提交前的校验闸：按容量、设备、依赖关系的顺序产生检测结果。
//! 容量满员与设备故障会阻断提交；依赖关系未满足永远只是警告，
//! 因为实际流程中跳过前置检查是合法的例外。

use checkup_core::{
    CheckupError, ConflictFinding, ConflictKind, ConflictSeverity, EquipmentHealth, Result,
    Station, StationOccupancy,
};
use std::collections::HashSet;

/// 冲突检测的输入上下文
#[derive(Debug)]
pub struct ConflictContext<'a> {
    pub station: &'a Station,
    /// 候选站的占用统计；快照中无该站时视为空站
    pub occupancy: Option<&'a StationOccupancy>,
    pub equipment: EquipmentHealth,
    /// 客户套餐内的检查项目代码
    pub required_exams: &'a [String],
    /// 从历程推导的已完成检查站集合
    pub completed: &'a HashSet<String>,
}

/// 冲突检测器
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    warn_utilization: f64,
}

impl ConflictDetector {
    pub fn new(warn_utilization: f64) -> Self {
        Self { warn_utilization }
    }

    /// 执行检测，返回按检查顺序排列的结果列表
    pub fn detect(&self, ctx: &ConflictContext<'_>) -> Vec<ConflictFinding> {
        let mut findings = Vec::new();
        let code = ctx.station.code.as_str();

        // 1. 容量
        let in_exam = ctx.occupancy.map_or(0, |o| o.in_exam);
        if in_exam >= ctx.station.capacity {
            findings.push(ConflictFinding {
                kind: ConflictKind::Capacity,
                severity: ConflictSeverity::Block,
                station_code: code.to_string(),
                message: format!(
                    "{} 目前已满 ({}/{} 人)",
                    ctx.station.name, in_exam, ctx.station.capacity
                ),
            });
        } else if ctx.station.capacity > 0
            && f64::from(in_exam) / f64::from(ctx.station.capacity) >= self.warn_utilization
        {
            findings.push(ConflictFinding {
                kind: ConflictKind::Capacity,
                severity: ConflictSeverity::Warn,
                station_code: code.to_string(),
                message: format!(
                    "{} 接近满载 ({}/{} 人)",
                    ctx.station.name, in_exam, ctx.station.capacity
                ),
            });
        }

        // 2. 设备
        match ctx.equipment {
            EquipmentHealth::Broken => findings.push(ConflictFinding {
                kind: ConflictKind::Equipment,
                severity: ConflictSeverity::Block,
                station_code: code.to_string(),
                message: format!("{} 设备故障中", ctx.station.name),
            }),
            EquipmentHealth::Warning => findings.push(ConflictFinding {
                kind: ConflictKind::Equipment,
                severity: ConflictSeverity::Warn,
                station_code: code.to_string(),
                message: format!("{} 设备状态告警", ctx.station.name),
            }),
            EquipmentHealth::Normal => {}
        }

        // 3. 依赖关系（只针对套餐内的前置项目）
        let unmet = unmet_dependencies(ctx.station, ctx.required_exams, ctx.completed);
        if !unmet.is_empty() {
            findings.push(ConflictFinding {
                kind: ConflictKind::Dependency,
                severity: ConflictSeverity::Warn,
                station_code: code.to_string(),
                message: format!("建议先完成 {}", unmet.join(", ")),
            });
        }

        findings
    }

    /// 校验检测结果：存在阻断级条目时返回 ConflictBlocked，
    /// 否则原样返回（警告与提示由调用方展示）。
    pub fn ensure_assignable(&self, findings: Vec<ConflictFinding>) -> Result<Vec<ConflictFinding>> {
        if findings.iter().any(ConflictFinding::is_block) {
            return Err(CheckupError::ConflictBlocked { findings });
        }
        Ok(findings)
    }
}

/// 计算某站在客户套餐范围内尚未完成的前置项目
pub fn unmet_dependencies(
    station: &Station,
    required_exams: &[String],
    completed: &HashSet<String>,
) -> Vec<String> {
    station
        .depends_on
        .iter()
        .filter(|dep| required_exams.contains(dep) && !completed.contains(dep.as_str()))
        .cloned()
        .collect()
}
