//! 请求节奏控制
//!
//! 默认策略是在固定区间内随机等待；部署中如果已有真正的限流器，可以换成 `NoPacer`。

use crate::config::{Config, PacingRange};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// 等待发生的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseKind {
    /// 同一零件的两次来源查询之间
    BetweenSources,
    /// 两个零件之间
    BetweenParts,
}

/// 节奏控制能力
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, kind: PauseKind);
}

/// 区间随机等待
#[derive(Debug, Clone, Copy)]
pub struct RandomPacer {
    between_sources: PacingRange,
    between_parts: PacingRange,
}

impl RandomPacer {
    pub fn new(between_sources: PacingRange, between_parts: PacingRange) -> Self {
        Self {
            between_sources,
            between_parts,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.source_delay, config.part_delay)
    }

    fn range(&self, kind: PauseKind) -> PacingRange {
        match kind {
            PauseKind::BetweenSources => self.between_sources,
            PauseKind::BetweenParts => self.between_parts,
        }
    }
}

/// 在区间内取一个等待时长
///
/// 负数按 0 处理；`max <= min` 时固定等待 `min`
pub fn sample_delay(range: PacingRange) -> Duration {
    let min = finite_or_zero(range.min_secs);
    let max = finite_or_zero(range.max_secs);
    let secs = if max <= min {
        min
    } else {
        rand::thread_rng().gen_range(min..max)
    };
    Duration::from_secs_f64(secs)
}

fn finite_or_zero(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 {
        secs
    } else {
        0.0
    }
}

#[async_trait]
impl Pacer for RandomPacer {
    async fn pause(&self, kind: PauseKind) {
        let delay = sample_delay(self.range(kind));
        if delay.is_zero() {
            return;
        }
        debug!("⏳ 等待 {:.1} 秒 ({:?})", delay.as_secs_f64(), kind);
        sleep(delay).await;
    }
}

/// 不等待
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacer;

#[async_trait]
impl Pacer for NoPacer {
    async fn pause(&self, _kind: PauseKind) {}
}
