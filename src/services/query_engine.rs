//! 来源查询 - 业务能力层
//!
//! 只负责"在一个来源上查一个零件"能力：拼地址、选代理和浏览器标识、
//! 发请求、识别拦截页面、交给解析器。不关心流程顺序，也不做重试。

use crate::config::Config;
use crate::error::ScrapeError;
use crate::infrastructure::{HeaderPool, ProxyPool, RequestOptions};
use crate::models::{Offer, PartNumber, SourceConfig};
use crate::services::extractor::{Extract, ExtractContext, SiteExtractor};
use crate::services::session_manager::Session;
use crate::utils::logging::truncate_text;
use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use scraper::Html;
use std::time::Duration;
use tracing::debug;

/// 拦截页面识别
///
/// 不区分大小写地在原始响应文本中查找任一标记
#[derive(Debug, Clone)]
pub struct BlockDetector {
    pattern: Option<Regex>,
}

impl BlockDetector {
    pub fn new(markers: &[String]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = markers
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = RegexBuilder::new(&alternatives.join("|"))
            .case_insensitive(true)
            .build()?;
        Ok(Self { pattern: Some(pattern) })
    }

    /// 返回命中的标记文本
    pub fn detect<'a>(&self, body: &'a str) -> Option<&'a str> {
        self.pattern.as_ref()?.find(body).map(|m| m.as_str())
    }
}

/// 来源查询引擎
#[derive(Debug, Clone)]
pub struct QueryEngine {
    headers: HeaderPool,
    proxies: ProxyPool,
    detector: BlockDetector,
    timeout: Duration,
}

impl QueryEngine {
    pub fn new(headers: HeaderPool, proxies: ProxyPool, detector: BlockDetector, timeout: Duration) -> Self {
        Self {
            headers,
            proxies,
            detector,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let headers = HeaderPool::new(config.user_agents.clone());
        let proxies = ProxyPool::load(&config.proxies, config.proxy_file.as_deref())?;
        let detector = BlockDetector::new(&config.block_markers).context("拦截标记无法编译为正则")?;
        Ok(Self::new(headers, proxies, detector, config.request_timeout()))
    }

    pub fn headers(&self) -> &HeaderPool {
        &self.headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 在一个来源上查询一个零件
    ///
    /// # 参数
    /// - `part_number`: 零件号（调用方保证已清洗）
    /// - `source`: 来源配置
    /// - `session`: 该来源已登录的会话
    /// - `extractor`: 该来源的解析器
    ///
    /// # 返回
    /// 成功返回报价；`Blocked` / `Query` / `Extraction` 都是非致命的未命中
    pub async fn query(
        &self,
        part_number: &PartNumber,
        source: &SourceConfig,
        session: &Session,
        extractor: SiteExtractor,
    ) -> Result<Offer, ScrapeError> {
        let url = source.search_url(part_number);
        let options = RequestOptions {
            user_agent: self.headers.pick(),
            proxy: self.proxies.pick(),
            timeout: self.timeout,
        };

        debug!(
            "[{}] GET {} (代理: {})",
            source.source_id,
            url,
            options.proxy.unwrap_or("直连")
        );

        let response = session
            .transport()
            .get(&url, &options)
            .await
            .map_err(|e| ScrapeError::query(&source.source_id, e.to_string()))?;

        // 先查拦截标记：验证码页面常常带着 403/429
        if let Some(marker) = self.detector.detect(&response.body) {
            return Err(ScrapeError::Blocked {
                source_id: source.source_id.clone(),
                marker: marker.to_lowercase(),
            });
        }

        if !response.is_success() {
            debug!(
                "[{}] 非成功响应内容: {}",
                source.source_id,
                truncate_text(&response.body, 200)
            );
            return Err(ScrapeError::query(
                &source.source_id,
                format!("HTTP {} ({})", response.status, url),
            ));
        }

        let ctx = ExtractContext {
            source_id: &source.source_id,
            part_number,
            source_url: &response.final_url,
        };
        extract_offer(extractor, &response.body, &ctx).map_err(|cause| ScrapeError::Extraction {
            source_id: source.source_id.clone(),
            cause,
        })
    }
}

fn extract_offer(
    extractor: SiteExtractor,
    body: &str,
    ctx: &ExtractContext<'_>,
) -> Result<Offer, crate::error::ExtractionError> {
    let document = Html::parse_document(body);
    extractor.extract(&document, ctx)
}
