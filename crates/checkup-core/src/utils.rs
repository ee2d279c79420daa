//! 通用工具函数

/// 解析逗号分隔的检查项目列表
///
/// 院方导入的套餐字段是逗号分隔文本，这里统一转换为代码列表。
pub fn parse_exam_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_uppercase())
        .collect()
}

/// 格式化等候时间显示
pub fn format_wait_time(minutes: i64) -> String {
    if minutes <= 0 {
        "即将开始".to_string()
    } else if minutes < 5 {
        "约 5 分钟内".to_string()
    } else if minutes < 60 {
        format!("约 {} 分钟", minutes)
    } else {
        let hours = minutes / 60;
        let mins = minutes % 60;
        if mins == 0 {
            format!("约 {} 小时", hours)
        } else {
            format!("约 {} 小时 {} 分钟", hours, mins)
        }
    }
}
