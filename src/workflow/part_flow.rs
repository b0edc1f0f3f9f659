//! 零件处理流程 - 流程层
//!
//! 核心职责：定义"一个零件"的完整处理流程
//!
//! 流程顺序：
//! 1. 按配置顺序逐个来源查询（拦截 / 请求失败 / 解析失败都只是未命中）
//! 2. 选出最低价
//! 3. 写结果或写失败列表，然后记检查点

use crate::error::{AppResult, ScrapeError};
use crate::infrastructure::PauseKind;
use crate::models::Offer;
use crate::orchestrator::RunContext;
use crate::services::resolve;
use crate::workflow::part_ctx::PartCtx;
use std::sync::Arc;
use tracing::{info, warn};

/// 零件处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum PartOutcome {
    /// 找到报价并已写入结果
    Resolved(Offer),
    /// 所有来源都没有可用报价，已写入失败列表
    Failed,
}

/// 零件处理流程
///
/// - 编排单个零件的查询、比价、持久化
/// - 不持有会话，只通过 `RunContext` 使用能力
pub struct PartFlow {
    context: Arc<RunContext>,
}

impl PartFlow {
    pub fn new(context: Arc<RunContext>) -> Self {
        Self { context }
    }

    /// 处理一个零件
    ///
    /// 只有检查点或结果写入失败会返回错误（致命）
    pub async fn run(&self, ctx: &PartCtx) -> AppResult<PartOutcome> {
        info!("{} 🔍 开始查询", ctx);

        let offers = self.collect_offers(ctx).await;

        match resolve(offers) {
            Some(best) => {
                info!(
                    "{} ✅ 最低价 {:.2} 来自 {} ({})",
                    ctx, best.price, best.source_id, best.supplier_name
                );
                self.context.results().write(&best).await?;
                self.context.checkpoint().mark_processed(&ctx.part_number).await?;
                Ok(PartOutcome::Resolved(best))
            }
            None => {
                warn!("{} ❌ 没有任何来源返回报价，写入失败列表", ctx);
                self.context.checkpoint().mark_failed(&ctx.part_number).await?;
                self.context.checkpoint().mark_processed(&ctx.part_number).await?;
                Ok(PartOutcome::Failed)
            }
        }
    }

    /// 逐个来源查询，收集成功的报价
    async fn collect_offers(&self, ctx: &PartCtx) -> Vec<Offer> {
        let engine = self.context.engine();
        let pacer = self.context.pacer();
        let mut offers = Vec::new();

        for source in self.context.active_sources() {
            // 持有会话锁直到等待结束：同一来源两次请求之间至少隔一次等待
            let session = source.session.lock().await;

            match engine
                .query(&ctx.part_number, &source.config, &session, source.extractor)
                .await
            {
                Ok(offer) => {
                    info!(
                        "{} ✓ {}: {:.2} ({})",
                        ctx, source.config.source_id, offer.price, offer.part_name
                    );
                    offers.push(offer);
                }
                Err(err @ ScrapeError::Blocked { .. }) => {
                    warn!("{} 🚨 {}", ctx, err);
                }
                Err(err) => {
                    warn!("{} ⚠️ {}", ctx, err);
                }
            }

            pacer.pause(PauseKind::BetweenSources).await;
        }

        offers
    }
}
