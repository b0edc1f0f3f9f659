//! 来源配置与凭据存储

use crate::error::ScrapeError;
use crate::models::PartNumber;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;
use url::Url;

/// 模板中的零件号占位符
pub const PART_PLACEHOLDER: &str = "{}";

/// 登录凭据
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// 日志里不打印密码
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// 单个供应商来源的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source_id: String,
    pub login_url: String,
    /// 搜索地址模板，`{}` 会被替换成零件号
    pub search_url_template: String,
    #[serde(default)]
    pub credentials: Credentials,
}

impl SourceConfig {
    /// 构建搜索地址
    ///
    /// 零件号原样代入，不做额外转义
    pub fn search_url(&self, part_number: &PartNumber) -> String {
        self.search_url_template
            .replace(PART_PLACEHOLDER, part_number.as_str())
    }

    /// 登录表单
    pub fn login_form(&self) -> [(&'static str, &str); 2] {
        [
            ("email", self.credentials.email.as_str()),
            ("password", self.credentials.password.as_str()),
        ]
    }

    /// 环境变量后缀，例如 `website_a` -> `WEBSITE_A`
    pub fn env_key(&self) -> String {
        self.source_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.source_id.trim().is_empty() {
            return Err(ScrapeError::configuration("<unnamed>", "来源 ID 为空"));
        }
        Url::parse(&self.login_url).map_err(|e| {
            ScrapeError::configuration(&self.source_id, format!("登录地址无效 '{}': {}", self.login_url, e))
        })?;
        if !self.search_url_template.contains(PART_PLACEHOLDER) {
            return Err(ScrapeError::configuration(
                &self.source_id,
                format!("搜索模板缺少占位符 {}: {}", PART_PLACEHOLDER, self.search_url_template),
            ));
        }
        let probe = self.search_url_template.replace(PART_PLACEHOLDER, "probe");
        Url::parse(&probe).map_err(|e| {
            ScrapeError::configuration(&self.source_id, format!("搜索模板无效 '{}': {}", self.search_url_template, e))
        })?;
        Ok(())
    }
}

/// 凭据存储
///
/// 运行期间只读。构造时校验每个来源，不合格的来源报告一次配置错误后丢弃。
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    sources: Vec<SourceConfig>,
}

impl CredentialStore {
    pub fn new(sources: Vec<SourceConfig>) -> (Self, Vec<ScrapeError>) {
        let mut valid = Vec::with_capacity(sources.len());
        let mut rejected = Vec::new();

        for source in sources {
            if valid.iter().any(|s: &SourceConfig| s.source_id == source.source_id) {
                let err = ScrapeError::configuration(&source.source_id, "来源 ID 重复");
                error!("❌ {}", err);
                rejected.push(err);
                continue;
            }
            match source.validate() {
                Ok(()) => valid.push(source),
                Err(err) => {
                    error!("❌ {}", err);
                    rejected.push(err);
                }
            }
        }

        (Self { sources: valid }, rejected)
    }

    /// 按配置顺序返回全部来源
    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn get(&self, source_id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.source_id == source_id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
