//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数

use anyhow::{Context, Result};
use std::fs;
use tracing::info;

use crate::orchestrator::aggregator::AggregateStats;
use crate::orchestrator::reconciler::ReconcileStats;

/// 初始化运行日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n题库生成日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法创建日志文件: {}", log_file_path))?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `generation_workers`: 生成阶段并发数
/// - `validation_workers`: 校验阶段并发数
/// - `validation_rounds`: 校验轮数
pub fn log_startup(generation_workers: usize, validation_workers: usize, validation_rounds: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 题库生成与交叉校验");
    info!(
        "📊 生成并发数: {} | 校验并发数: {}",
        generation_workers, validation_workers
    );
    info!("🔁 校验轮数: {}", validation_rounds);
    info!("{}", "=".repeat(60));
}

/// 记录阶段开始信息
pub fn log_phase_start(phase: &str, jobs: usize, workers: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始: {}", phase);
    info!("📄 任务数: {} | worker 数: {}", jobs, workers);
    info!("{}", "=".repeat(60));
}

/// 记录生成阶段统计
pub fn log_generation_complete(stats: &AggregateStats, unique: usize, duplicates: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 生成完成: 结果 {} | 失败 {} | 无题目 {}",
        stats.outcomes, stats.failed, stats.empty
    );
    info!(
        "📋 提取题目 {} | 去重后 {} | 覆盖 {}",
        stats.records, unique, duplicates
    );
    info!("{}", "─".repeat(60));
}

/// 记录一轮校验统计
pub fn log_round_complete(round: usize, answers: usize, total: usize, stats: &ReconcileStats) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 第 {} 轮校验完成", round);
    info!("📋 校验答案 {} | 映射题目 {}", answers, total);
    info!(
        "✅ 一致 {} | ❌ 不一致 {} | ⚠️ 缺失 {} | 待重校 {}",
        stats.matched,
        stats.disagreed,
        stats.missing,
        stats.mismatched()
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `total`: 题目总数
/// - `confirmed`: 校验一致的题目数
/// - `remaining`: 最后一轮校验范围内仍不一致的题目数
/// - `unconfirmed`: 全部题目中未确认的题目数（含从未校验的）
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(
    total: usize,
    confirmed: usize,
    remaining: usize,
    unconfirmed: usize,
    log_file_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 校验一致: {}/{}", confirmed, total);
    info!("❌ 最后一轮仍不一致: {} (仅统计最后一轮的校验范围)", remaining);
    info!("⚠️ 全部题目中未确认: {}", unconfirmed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
