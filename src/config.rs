use crate::models::{Credentials, SourceConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// 默认配置文件路径（可通过 `PNPILOT_CONFIG` 覆盖）
pub const DEFAULT_CONFIG_FILE: &str = "pnpilot.toml";

/// 默认浏览器标识池
pub const DEFAULT_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/90.0.4430.212 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/88.0.4324.96 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148",
];

/// 随机等待区间（秒）
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct PacingRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl PacingRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// 不等待
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 供应商来源，查询顺序即此顺序
    pub sources: Vec<SourceConfig>,
    /// 代理池（为空时直连）
    pub proxies: Vec<String>,
    /// 代理列表文件，每行一个
    pub proxy_file: Option<String>,
    /// 浏览器标识池
    pub user_agents: Vec<String>,
    /// 两次来源查询之间的等待
    pub source_delay: PacingRange,
    /// 两个零件之间的等待
    pub part_delay: PacingRange,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 登录成功页面中必须出现的标记（不区分大小写）
    pub login_marker: String,
    /// 验证码 / 封禁页面标记（不区分大小写）
    pub block_markers: Vec<String>,
    /// 同时处理的零件数量，1 即严格顺序执行
    pub max_concurrent_parts: usize,
    /// 本次最多处理的零件数量
    pub part_limit: Option<usize>,
    /// 启动前清空结果、检查点和失败列表
    pub fresh_run: bool,
    /// 以失败列表作为输入重新处理
    pub retry_failed: bool,
    // --- 文件路径 ---
    pub input_file: String,
    pub results_file: String,
    pub processed_file: String,
    pub failed_file: String,
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            proxies: Vec::new(),
            proxy_file: Some("proxies.txt".to_string()),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            source_delay: PacingRange::new(1.5, 3.5),
            part_delay: PacingRange::new(2.0, 4.0),
            request_timeout_secs: 10,
            login_marker: "logout".to_string(),
            block_markers: vec!["captcha".to_string(), "are you human".to_string()],
            max_concurrent_parts: 1,
            part_limit: None,
            fresh_run: false,
            retry_failed: false,
            input_file: "input_parts.csv".to_string(),
            results_file: "pnpilot_results.csv".to_string(),
            processed_file: "processed.txt".to_string(),
            failed_file: "failed.txt".to_string(),
            output_log_file: "pnpilot_log.txt".to_string(),
        }
    }
}

fn default_sources() -> Vec<SourceConfig> {
    [
        ("website_a", "https://example.com/login", "https://example.com/search?q={}"),
        ("website_b", "https://example2.com/login", "https://example2.com/products?query={}"),
        ("website_c", "https://example3.com/login", "https://example3.com/find?keyword={}"),
    ]
    .into_iter()
    .map(|(id, login, search)| SourceConfig {
        source_id: id.to_string(),
        login_url: login.to_string(),
        search_url_template: search.to_string(),
        credentials: Credentials::default(),
    })
    .collect()
}

impl Config {
    /// 从 TOML 文件加载配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// 读取配置文件（存在时），再用环境变量覆盖
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("PNPILOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = if Path::new(&path).exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.fill_credentials_from_env();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("INPUT_FILE") {
            self.input_file = v;
        }
        if let Ok(v) = std::env::var("RESULTS_FILE") {
            self.results_file = v;
        }
        if let Ok(v) = std::env::var("PROCESSED_FILE") {
            self.processed_file = v;
        }
        if let Ok(v) = std::env::var("FAILED_FILE") {
            self.failed_file = v;
        }
        if let Ok(v) = std::env::var("PROXY_FILE") {
            self.proxy_file = Some(v);
        }
        self.max_concurrent_parts = env_parse("MAX_CONCURRENT_PARTS").unwrap_or(self.max_concurrent_parts);
        self.request_timeout_secs = env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(self.request_timeout_secs);
        self.part_limit = env_parse("PART_LIMIT").or(self.part_limit);
        self.fresh_run = env_flag("FRESH_RUN").unwrap_or(self.fresh_run);
        self.retry_failed = env_flag("RETRY_FAILED").unwrap_or(self.retry_failed);
    }

    /// 配置文件中留空的账号密码从 `EMAIL_<ID>` / `PASSWORD_<ID>` 读取
    pub fn fill_credentials_from_env(&mut self) {
        for source in &mut self.sources {
            let key = source.env_key();
            if source.credentials.email.is_empty() {
                if let Ok(v) = std::env::var(format!("EMAIL_{}", key)) {
                    source.credentials.email = v;
                }
            }
            if source.credentials.password.is_empty() {
                if let Ok(v) = std::env::var(format!("PASSWORD_{}", key)) {
                    source.credentials.password = v;
                }
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// 并发数至少为 1
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_parts.max(1)
    }
}

/// 读取并解析环境变量；无法解析时给出警告并忽略
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("⚠️ 环境变量 {}={:?} 无法解析，已忽略", name, raw);
            None
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    let flag = parse_flag(&raw);
    if flag.is_none() {
        warn!("⚠️ 环境变量 {}={:?} 不是开关值（1/0、true/false、yes/no、on/off），已忽略", name, raw);
    }
    flag
}

/// 解析开关值，不区分大小写
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
