//! 会话管理 - 业务能力层
//!
//! 只负责"登录并持有会话"能力。每个来源一个会话，运行期间不跨来源共享。

use crate::error::ScrapeError;
use crate::infrastructure::{Connector, HeaderPool, RequestOptions, Transport};
use crate::models::SourceConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

/// 已登录的会话
///
/// 传输实例内部保留 Cookie 与默认请求头
pub struct Session {
    source_id: String,
    transport: Box<dyn Transport>,
}

impl Session {
    pub fn new(source_id: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            source_id: source_id.into(),
            transport,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

/// 同一会话同一时间最多一个请求
pub type SharedSession = Arc<Mutex<Session>>;

/// 登录参数
#[derive(Debug, Clone, Copy)]
pub struct LoginPolicy<'a> {
    /// 登录成功页面中必须包含的标记（不区分大小写）
    pub marker: &'a str,
    pub timeout: Duration,
}

/// 会话管理
///
/// 职责：
/// - 逐个来源登录
/// - 登录失败的来源记录一次 `AuthFailure`，之后直接跳过
/// - 运行期间持有所有会话
#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<String, SharedSession>,
    failures: Vec<ScrapeError>,
}

impl SessionManager {
    /// 登录全部来源
    pub async fn authenticate(
        sources: &[SourceConfig],
        connector: &dyn Connector,
        headers: &HeaderPool,
        policy: LoginPolicy<'_>,
    ) -> Self {
        let mut manager = Self::default();

        for source in sources {
            match login(source, connector, headers, policy).await {
                Ok(session) => {
                    info!("✅ 已登录 {}", source.source_id);
                    manager
                        .sessions
                        .insert(source.source_id.clone(), Arc::new(Mutex::new(session)));
                }
                Err(err) => {
                    error!("❌ {}，本次运行跳过该来源", err);
                    manager.failures.push(err);
                }
            }
        }

        manager
    }

    /// 获取某个来源的会话，未登录返回 `None`
    pub fn session(&self, source_id: &str) -> Option<SharedSession> {
        self.sessions.get(source_id).cloned()
    }

    pub fn is_authenticated(&self, source_id: &str) -> bool {
        self.sessions.contains_key(source_id)
    }

    /// 登录失败列表
    pub fn failures(&self) -> &[ScrapeError] {
        &self.failures
    }

    pub fn authenticated_count(&self) -> usize {
        self.sessions.len()
    }
}

/// 登录单个来源
///
/// 只有状态码成功且页面包含登录标记才算成功
pub async fn login(
    source: &SourceConfig,
    connector: &dyn Connector,
    headers: &HeaderPool,
    policy: LoginPolicy<'_>,
) -> Result<Session, ScrapeError> {
    let auth_failure = |reason: String| ScrapeError::AuthFailure {
        source_id: source.source_id.clone(),
        reason,
    };

    let transport = connector
        .connect(source)
        .map_err(|e| auth_failure(e.to_string()))?;

    let options = RequestOptions {
        user_agent: headers.pick(),
        proxy: None,
        timeout: policy.timeout,
    };

    let response = transport
        .post_form(&source.login_url, &source.login_form(), &options)
        .await
        .map_err(|e| auth_failure(e.to_string()))?;

    if !response.is_success() {
        return Err(auth_failure(format!("HTTP {}", response.status)));
    }

    if !contains_ignore_case(&response.body, policy.marker) {
        return Err(auth_failure(format!("页面中没有登录标记 '{}'", policy.marker)));
    }

    Ok(Session::new(source.source_id.clone(), transport))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
