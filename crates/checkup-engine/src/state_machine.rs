//! 追踪状态机
//!
//! 管理客户在体检动线中的状态转换；(状态, 动作) 对之外的任何组合
//! 都是无效转换。

use checkup_core::{CheckupError, Result, TrackingAction, TrackingStatus};
use std::collections::HashMap;

/// 追踪状态机
#[derive(Debug)]
pub struct TrackingStateMachine {
    transitions: HashMap<(TrackingStatus, TrackingAction), TrackingStatus>,
}

impl TrackingStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 定义状态转换规则
        // 等候中可换站报到；移动中到达下一站后回到等候
        transitions.insert(
            (TrackingStatus::Waiting, TrackingAction::Arrive),
            TrackingStatus::Waiting,
        );
        transitions.insert(
            (TrackingStatus::Moving, TrackingAction::Arrive),
            TrackingStatus::Waiting,
        );
        transitions.insert(
            (TrackingStatus::Waiting, TrackingAction::Start),
            TrackingStatus::InExam,
        );
        // 完成检查默认进入移动中；无剩余项目时由 complete_target 改为已完成
        transitions.insert(
            (TrackingStatus::InExam, TrackingAction::Complete),
            TrackingStatus::Moving,
        );

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: TrackingStatus, action: TrackingAction) -> bool {
        self.transitions.contains_key(&(from, action))
    }

    /// 执行状态转换
    pub fn transition(
        &self,
        from: TrackingStatus,
        action: TrackingAction,
    ) -> Result<TrackingStatus> {
        match self.transitions.get(&(from, action)) {
            Some(to) => Ok(*to),
            None => Err(CheckupError::InvalidTransition {
                from: format!("{:?}", from),
                action: format!("{:?}", action),
            }),
        }
    }

    /// 指派下一站是否允许：除已完成外的任何状态都可以
    pub fn assign_allowed(&self, from: TrackingStatus) -> bool {
        from != TrackingStatus::Completed
    }

    /// 完成检查后的目标状态：仍有剩余必检项目时移动，否则整体完成
    pub fn complete_target(&self, has_remaining: bool) -> TrackingStatus {
        if has_remaining {
            TrackingStatus::Moving
        } else {
            TrackingStatus::Completed
        }
    }

    /// 获取某状态下所有可执行的动作
    pub fn possible_actions(&self, current: TrackingStatus) -> Vec<TrackingAction> {
        let mut actions: Vec<TrackingAction> = self
            .transitions
            .keys()
            .filter(|(status, _)| *status == current)
            .map(|(_, action)| *action)
            .collect();
        if self.assign_allowed(current) {
            actions.push(TrackingAction::Assign);
        }
        actions
    }
}

impl Default for TrackingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
