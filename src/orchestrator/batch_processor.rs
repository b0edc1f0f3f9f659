//! 批量零件处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量零件的调度和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：写日志文件头、登录所有来源、构建 `RunContext`
//! 2. **加载输入**：读取零件列表（或失败列表），按检查点过滤；重试结束后整理失败列表
//! 3. **并发控制**：使用 Semaphore 限制同时处理的零件数量（默认 1，即严格顺序）
//! 4. **分批处理**：每批完成后再开始下一批
//! 5. **中断**：收到停止信号后不再开始新的零件
//! 6. **全局统计**：汇总所有零件的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个零件的细节，委托 `PartFlow`
//! - **资源所有者**：唯一持有 `RunContext` 的模块

use crate::config::Config;
use crate::infrastructure::{Connector, HttpConnector, Pacer, PauseKind, RandomPacer};
use crate::models::{load_part_numbers, PartNumber};
use crate::orchestrator::RunContext;
use crate::utils::logging::{
    init_log_file, log_batch_complete, log_batch_start, log_parts_loaded, log_startup,
    print_final_stats,
};
use crate::workflow::{PartCtx, PartFlow, PartOutcome};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    context: Arc<RunContext>,
    cancelled: Arc<AtomicBool>,
}

/// 运行统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// 输入中的零件数（去重后）
    pub total: usize,
    /// 检查点中已存在而跳过的数量
    pub skipped: usize,
    pub resolved: usize,
    pub failed: usize,
    /// 是否被中断
    pub cancelled: bool,
}

impl RunStats {
    /// 本轮实际处理的数量
    pub fn processed(&self) -> usize {
        self.resolved + self.failed
    }
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    /// 找到报价的零件
    resolved: Vec<PartNumber>,
    failed: usize,
}

impl App {
    /// 初始化应用（真实网络、随机等待）
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config);

        let pacer: Arc<dyn Pacer> = Arc::new(RandomPacer::from_config(&config));
        Self::initialize_with(config, &HttpConnector, pacer).await
    }

    /// 使用指定的连接器和节奏控制初始化
    pub async fn initialize_with(config: Config, connector: &dyn Connector, pacer: Arc<dyn Pacer>) -> Result<Self> {
        let context = RunContext::build(&config, connector, pacer).await?;

        if config.fresh_run {
            context.checkpoint().clear()?;
            context.results().clear().await?;
            info!("🧹 已清空上次的结果、检查点和失败列表");
        }

        Ok(Self {
            config,
            context: Arc::new(context),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// 停止标记：置位后不再开始新的零件
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunStats> {
        if self.context.active_sources().is_empty() {
            warn!("⚠️ 没有可用的来源（登录失败或配置错误），本轮所有零件都会记为失败");
        }

        let (parts, already_processed) = self.load_work().await?;

        let mut stats = RunStats {
            total: parts.len(),
            ..Default::default()
        };

        let mut pending: Vec<PartNumber> = parts
            .into_iter()
            .filter(|p| !already_processed.contains(p))
            .collect();
        stats.skipped = stats.total - pending.len();

        if let Some(limit) = self.config.part_limit {
            if pending.len() > limit {
                info!("🔢 本轮只处理前 {} 个零件（共 {} 个待处理）", limit, pending.len());
                pending.truncate(limit);
            }
        }

        log_parts_loaded(stats.total, pending.len(), stats.skipped);

        if pending.is_empty() {
            warn!("⚠️ 没有需要处理的零件，程序结束");
            print_final_stats(&stats, &self.config);
            return Ok(stats);
        }

        let resolved = self.process_all_parts(pending, &mut stats).await?;

        if self.config.retry_failed {
            let remaining = self.context.checkpoint().compact_failed(&resolved).await?;
            info!("🔁 失败列表整理完成，仍有 {} 个零件待重试", remaining.len());
        }

        print_final_stats(&stats, &self.config);
        Ok(stats)
    }

    /// 读取本轮输入和需要跳过的集合
    async fn load_work(&self) -> Result<(Vec<PartNumber>, HashSet<PartNumber>)> {
        let checkpoint = self.context.checkpoint();
        let mut processed = checkpoint.load()?;

        if !self.config.retry_failed {
            let parts = load_part_numbers(Path::new(&self.config.input_file)).await?;
            return Ok((parts, processed));
        }

        // 重试模式：失败列表作为输入并让这些零件通过检查点过滤。
        // 原列表在运行结束前不删改，只保留一份快照；结束后再去掉已找到报价的零件
        let failed = checkpoint.load_failed()?;
        let suffix = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        if let Some(archived) = checkpoint.archive_failed(&suffix)? {
            info!("🔁 失败列表快照已保存到 {}", archived.display());
        }
        for part in &failed {
            processed.remove(part);
        }
        info!("🔁 重试 {} 个失败零件", failed.len());
        Ok((failed, processed))
    }

    /// 处理所有零件，返回找到报价的零件
    async fn process_all_parts(
        &self,
        parts: Vec<PartNumber>,
        stats: &mut RunStats,
    ) -> Result<HashSet<PartNumber>> {
        let concurrency = self.config.concurrency();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let total = parts.len();
        let total_batches = (total + concurrency - 1) / concurrency;
        let mut resolved = HashSet::new();

        for (batch_idx, batch) in parts.chunks(concurrency).enumerate() {
            if self.is_cancelled() {
                break;
            }

            let batch_start = batch_idx * concurrency;
            let batch_num = batch_idx + 1;
            if concurrency > 1 {
                log_batch_start(batch_num, total_batches, batch_start + 1, batch_start + batch.len(), total);
            }

            let result = self
                .process_batch(batch, batch_start, total, semaphore.clone())
                .await?;

            let batch_resolved = result.resolved.len();
            stats.resolved += batch_resolved;
            stats.failed += result.failed;
            resolved.extend(result.resolved);

            if concurrency > 1 {
                log_batch_complete(batch_num, batch_resolved, batch_resolved + result.failed);
            }
        }

        if self.is_cancelled() {
            stats.cancelled = true;
            warn!("⏹️ 收到停止信号，已处理的零件均已记录检查点");
        }

        Ok(resolved)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch: &[PartNumber],
        batch_start: usize,
        total: usize,
        semaphore: Arc<Semaphore>,
    ) -> Result<BatchResult> {
        let mut handles = Vec::new();

        for (idx, part_number) in batch.iter().enumerate() {
            if self.is_cancelled() {
                break;
            }

            let permit = semaphore.clone().acquire_owned().await?;
            let ctx = PartCtx::new(part_number.clone(), batch_start + idx + 1, total);
            let flow = PartFlow::new(Arc::clone(&self.context));
            let pacer = self.context.pacer();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = flow.run(&ctx).await;
                if outcome.is_ok() {
                    pacer.pause(PauseKind::BetweenParts).await;
                }
                outcome
            });
            handles.push(handle);
        }

        // 等待本批所有任务完成
        let mut result = BatchResult::default();
        let mut fatal = None;

        for joined in futures::future::join_all(handles).await {
            match joined.context("零件处理任务异常退出")? {
                Ok(PartOutcome::Resolved(offer)) => result.resolved.push(offer.part_number),
                Ok(PartOutcome::Failed) => result.failed += 1,
                Err(e) => {
                    error!("❌ 致命错误: {}", e);
                    fatal.get_or_insert(e);
                }
            }
        }

        if let Some(e) = fatal {
            self.cancelled.store(true, Ordering::SeqCst);
            return Err(e.into());
        }

        Ok(result)
    }
}
