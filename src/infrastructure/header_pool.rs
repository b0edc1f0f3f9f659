use crate::config::DEFAULT_USER_AGENTS;
use rand::seq::SliceRandom;
use tracing::warn;

/// 浏览器标识池
///
/// 每次请求均匀随机取一个，只用于流量整形，不是安全机制
#[derive(Debug, Clone)]
pub struct HeaderPool {
    user_agents: Vec<String>,
}

impl HeaderPool {
    /// 池中至少需要的条目数
    pub const MIN_SIZE: usize = 3;

    /// 去掉空条目；不足 `MIN_SIZE` 时使用内置列表
    pub fn new(user_agents: Vec<String>) -> Self {
        let user_agents: Vec<String> = user_agents
            .into_iter()
            .map(|ua| ua.trim().to_string())
            .filter(|ua| !ua.is_empty())
            .collect();

        if user_agents.len() < Self::MIN_SIZE {
            warn!(
                "⚠️ 浏览器标识池只有 {} 条（至少需要 {} 条），改用内置列表",
                user_agents.len(),
                Self::MIN_SIZE
            );
            return Self::default();
        }

        Self { user_agents }
    }

    /// 随机取一个浏览器标识
    pub fn pick(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENTS[0])
    }

    pub fn len(&self) -> usize {
        self.user_agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.user_agents.is_empty()
    }

    pub fn contains(&self, user_agent: &str) -> bool {
        self.user_agents.iter().any(|ua| ua == user_agent)
    }
}

impl Default for HeaderPool {
    fn default() -> Self {
        Self {
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
