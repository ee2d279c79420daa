//! 追踪与分配引擎演示程序
//!
//! 展示引擎的核心功能，包括报到、状态转换、占用视图、下一站推荐、
//! 冲突检测与陪检指派

use checkup_core::utils::{format_wait_time, parse_exam_list};
use checkup_core::Patient;
use checkup_engine::{CheckupEngine, EngineConfig, TracingEventSink, REGISTRATION_STATION};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    // 载入配置（文件不存在时使用默认值），创建引擎并载入默认检查站与设备
    let config = EngineConfig::load("config/engine")?;
    let mut engine = CheckupEngine::with_defaults(config).await;
    engine.add_event_sink(Arc::new(TracingEventSink));

    println!("🏥 体检追踪与分配引擎演示\n");

    let exam_date = Utc::now().date_naive();
    let dispatcher = Uuid::new_v4();

    // 1. 登记今日客户
    let patients = create_sample_patients(exam_date);
    for patient in &patients {
        engine.roster().register(patient.clone()).await;
    }
    println!("✅ 登记了 {} 位客户", patients.len());

    // 2. 客户报到并指派陪检人员
    for patient in &patients {
        engine
            .report_arrival(patient.id, exam_date, REGISTRATION_STATION, dispatcher)
            .await?;
        engine
            .assign_escort(patient.id, exam_date, Uuid::new_v4(), dispatcher)
            .await?;
    }
    println!("✅ 全部客户已报到并配好陪检人员");

    // 3. 第一位客户走完报到流程
    let first = &patients[0];
    engine.report_start(first.id, exam_date, dispatcher).await?;
    engine
        .report_complete(first.id, exam_date, dispatcher, None)
        .await?;
    println!("✅ 客户 {} 完成报到手续", first.name);

    // 4. 查看下一站推荐
    let now = Utc::now();
    let ranked = engine.recommendations(first.id, exam_date, now).await?;
    println!("\n📋 客户 {} 的下一站推荐:", first.name);
    for recommendation in ranked.iter().take(3) {
        println!(
            "   {} ({}) 分数 {} — {}",
            recommendation.station_name,
            recommendation.station_code,
            recommendation.score,
            recommendation.reasons.join("；")
        );
    }

    // 5. 采纳建议并指派下一站
    if let Some(top) = ranked.first() {
        let outcome = engine
            .assign_next_station(first.id, exam_date, &top.station_code, dispatcher)
            .await?;
        println!(
            "\n✅ 已指派 {} 为下一站 ({} 项提示)",
            top.station_code,
            outcome.findings.len()
        );
        engine
            .report_arrival(first.id, exam_date, &top.station_code, dispatcher)
            .await?;
    }

    // 6. 演示容量竞争：CT 容量为 1
    let ct_patients: Vec<&Patient> = patients.iter().skip(1).take(2).collect();
    for patient in &ct_patients {
        engine.report_start(patient.id, exam_date, dispatcher).await?;
        engine
            .report_complete(patient.id, exam_date, dispatcher, None)
            .await?;
        engine
            .report_arrival(patient.id, exam_date, "CT", dispatcher)
            .await?;
    }
    let engine = Arc::new(engine);
    let mut handles = Vec::new();
    for patient in &ct_patients {
        let engine = Arc::clone(&engine);
        let patient_id = patient.id;
        handles.push(tokio::spawn(async move {
            engine.report_start(patient_id, exam_date, Uuid::new_v4()).await
        }));
    }
    let mut ct_started = 0;
    let mut ct_rejected = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => ct_started += 1,
            Err(_) => ct_rejected += 1,
        }
    }
    println!("\n⚔️  CT 容量竞争结果: {} 人开始检查, {} 人被拒绝", ct_started, ct_rejected);

    // 7. 显示占用快照
    let snapshot = engine.occupancy_snapshot(exam_date).await;
    println!("\n📊 检查站占用快照:");
    for station in &snapshot.stations {
        if station.waiting + station.in_exam + station.incoming == 0 {
            continue;
        }
        println!(
            "   {}: 等候 {} / 检查中 {} / 前来 {} ({:?})",
            station.station_name, station.waiting, station.in_exam, station.incoming, station.level
        );
    }

    // 8. 等候时间预估
    let estimates = engine.wait_estimates(exam_date, Utc::now()).await;
    println!("\n⏱  等候时间预估:");
    for estimate in estimates.iter().filter(|e| e.waiting_count > 0) {
        println!(
            "   {}: {} 人等候, {}",
            estimate.station_name,
            estimate.waiting_count,
            format_wait_time(estimate.estimated_wait_minutes)
        );
    }

    println!("\n🎉 演示完成");
    Ok(())
}

/// 创建示例客户（套餐字段模拟院方导入的逗号分隔文本）
fn create_sample_patients(exam_date: chrono::NaiveDate) -> Vec<Patient> {
    let package = |chart_no: &str, name: &str, exams: &str| Patient {
        id: Uuid::new_v4(),
        chart_no: chart_no.to_string(),
        name: name.to_string(),
        exam_date,
        required_exams: parse_exam_list(exams),
        vip_level: 0,
        notes: None,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    vec![
        package("A001", "王小明", "REG,PHY,BLOOD,US,CONSULT"),
        package("A002", "李美华", "REG,BLOOD,CT,CONSULT"),
        package("A003", "张建国", "REG,BLOOD,CT,CARDIO,CONSULT"),
    ]
}
