use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use std::path::Path;
use tracing::info;

/// 代理池
///
/// 为空时所有请求直连
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    proxies: Vec<String>,
}

impl ProxyPool {
    pub fn new(proxies: impl IntoIterator<Item = String>) -> Self {
        let proxies = proxies
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { proxies }
    }

    /// 合并配置中的代理和代理文件（每行一个，文件不存在视为没有）
    pub fn load(configured: &[String], proxy_file: Option<&str>) -> Result<Self> {
        let mut proxies = configured.to_vec();

        if let Some(path) = proxy_file {
            let path = Path::new(path);
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("无法读取代理文件: {}", path.display()))?;
                proxies.extend(content.lines().map(str::to_string));
            }
        }

        let pool = Self::new(proxies);
        if pool.is_empty() {
            info!("🌐 未配置代理，使用直连");
        } else {
            info!("🌐 已加载 {} 个代理", pool.len());
        }
        Ok(pool)
    }

    /// 随机取一个代理，池为空时返回 `None`
    pub fn pick(&self) -> Option<&str> {
        self.proxies
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}
