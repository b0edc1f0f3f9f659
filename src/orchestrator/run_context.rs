//! 运行上下文
//!
//! 启动时构建一次，之后以引用（`Arc`）传给各个流程。
//! 凭据和解析器注册表只在构建时使用，运行期间只保留已登录的来源。

use crate::config::Config;
use crate::error::ScrapeError;
use crate::infrastructure::{Connector, Pacer};
use crate::models::{CredentialStore, SourceConfig};
use crate::services::{
    CheckpointStore, ExtractorRegistry, LoginPolicy, QueryEngine, ResultWriter, SessionManager,
    SharedSession, SiteExtractor,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

/// 可以查询的来源：配置合法、有解析器、已登录
pub struct ActiveSource {
    pub config: SourceConfig,
    pub extractor: SiteExtractor,
    pub session: SharedSession,
}

pub struct RunContext {
    sessions: SessionManager,
    engine: QueryEngine,
    pacer: Arc<dyn Pacer>,
    checkpoint: CheckpointStore,
    results: ResultWriter,
    active: Vec<ActiveSource>,
    config_errors: Vec<ScrapeError>,
}

impl RunContext {
    /// 校验来源、登录、组装查询所需的全部能力
    pub async fn build(config: &Config, connector: &dyn Connector, pacer: Arc<dyn Pacer>) -> Result<Self> {
        let (credentials, mut config_errors) = CredentialStore::new(config.sources.clone());
        let registry = ExtractorRegistry::default();
        let engine = QueryEngine::from_config(config)?;

        // 没有解析器的来源只报告一次，不登录也不查询
        let mut usable = Vec::new();
        for source in credentials.sources() {
            if registry.lookup(&source.source_id).is_some() {
                usable.push(source.clone());
            } else {
                let err = ScrapeError::configuration(&source.source_id, "没有注册对应的解析器");
                error!("❌ {}，本次运行跳过该来源", err);
                config_errors.push(err);
            }
        }

        info!("🔐 正在登录 {} 个来源...", usable.len());
        let policy = LoginPolicy {
            marker: &config.login_marker,
            timeout: engine.timeout(),
        };
        let sessions = SessionManager::authenticate(&usable, connector, engine.headers(), policy).await;

        let active: Vec<ActiveSource> = usable
            .into_iter()
            .filter_map(|source| {
                let extractor = registry.lookup(&source.source_id)?;
                let session = sessions.session(&source.source_id)?;
                Some(ActiveSource {
                    config: source,
                    extractor,
                    session,
                })
            })
            .collect();

        info!(
            "✓ 可用来源 {}/{}: {}",
            active.len(),
            config.sources.len(),
            active
                .iter()
                .map(|s| s.config.source_id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            sessions,
            engine,
            pacer,
            checkpoint: CheckpointStore::new(&config.processed_file, &config.failed_file),
            results: ResultWriter::new(&config.results_file),
            active,
            config_errors,
        })
    }

    /// 按配置顺序排列的可用来源
    pub fn active_sources(&self) -> &[ActiveSource] {
        &self.active
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub fn pacer(&self) -> Arc<dyn Pacer> {
        Arc::clone(&self.pacer)
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn results(&self) -> &ResultWriter {
        &self.results
    }

    /// 启动时发现的配置错误
    pub fn config_errors(&self) -> &[ScrapeError] {
        &self.config_errors
    }
}
