//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数

use crate::config::Config;
use crate::orchestrator::RunStats;
use anyhow::{Context, Result};
use std::fs;
use tracing::info;

/// 初始化运行日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n零件比价日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 多来源零件比价");
    info!("🏪 配置来源: {} 个", config.sources.len());
    info!("📊 最大并发数: {}", config.concurrency());
    info!("⏱️ 请求超时: {} 秒", config.request_timeout().as_secs());
    if config.retry_failed {
        info!("🔁 重试模式: 以失败列表 {} 为输入", config.failed_file);
    }
    info!("{}", "=".repeat(60));
}

/// 记录零件加载信息
///
/// # 参数
/// - `total`: 输入中的零件总数
/// - `pending`: 本轮待处理数量
/// - `skipped`: 检查点中已存在而跳过的数量
pub fn log_parts_loaded(total: usize, pending: usize, skipped: usize) {
    info!("✓ 输入共 {} 个零件", total);
    info!("⏭️ 检查点中已处理，跳过 {} 个", skipped);
    info!("📋 本轮待处理 {} 个\n", pending);
}

/// 记录批次开始信息
pub fn log_batch_start(batch_num: usize, total_batches: usize, start: usize, end: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批零件: {}-{} / 共 {} 个", start, end, total);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_batch_complete(batch_num: usize, resolved: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 第 {} 批完成: 找到报价 {}/{}", batch_num, resolved, total);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(stats: &RunStats, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 找到报价: {}/{}", stats.resolved, stats.processed());
    info!("❌ 失败: {}", stats.failed);
    info!("⏭️ 跳过: {}", stats.skipped);
    if stats.cancelled {
        info!("⏹️ 运行被中断，剩余零件下次继续");
    }
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", config.results_file);
    info!("失败列表: {}", config.failed_file);
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
