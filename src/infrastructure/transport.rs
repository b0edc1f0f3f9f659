//! HTTP 传输 - 基础设施层
//!
//! 持有连接与 Cookie，只暴露"发请求"的能力，不认识零件和报价

use crate::error::TransportError;
use crate::models::SourceConfig;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// 一次请求的附加参数
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions<'a> {
    /// 本次请求使用的浏览器标识
    pub user_agent: &'a str,
    /// 代理地址，`None` 为直连
    pub proxy: Option<&'a str>,
    pub timeout: Duration,
}

/// 已读取完毕的响应
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// 跟随重定向后的最终地址
    pub final_url: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 传输能力
///
/// 同一个实例在整个运行期间保留 Cookie 等登录状态
#[async_trait]
pub trait Transport: Send + Sync {
    /// 提交表单（登录）
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        options: &RequestOptions<'_>,
    ) -> Result<HttpResponse, TransportError>;

    /// GET 请求（搜索）
    async fn get(&self, url: &str, options: &RequestOptions<'_>) -> Result<HttpResponse, TransportError>;
}

/// 为每个来源创建独立的传输实例
pub trait Connector: Send + Sync {
    fn connect(&self, source: &SourceConfig) -> Result<Box<dyn Transport>, TransportError>;
}

/// 基于 reqwest 的连接器
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    fn connect(&self, source: &SourceConfig) -> Result<Box<dyn Transport>, TransportError> {
        debug!("为来源 {} 创建 HTTP 客户端", source.source_id);
        Ok(Box::new(ReqwestTransport::new()?))
    }
}

/// reqwest 实现
///
/// 直连和各代理各用一个 `Client`，共享同一个 Cookie 容器，
/// 这样换代理不会丢失登录状态。
pub struct ReqwestTransport {
    jar: Arc<Jar>,
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());
        let direct = build_client(&jar, None)?;
        Ok(Self {
            jar,
            direct,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client, TransportError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut clients = self.proxied.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }
        let client = build_client(&self.jar, Some(proxy))?;
        clients.insert(proxy.to_string(), client.clone());
        Ok(client)
    }

    async fn read_response(url: &str, response: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| map_reqwest_error(url, e))?;
        Ok(HttpResponse {
            status,
            final_url,
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        options: &RequestOptions<'_>,
    ) -> Result<HttpResponse, TransportError> {
        let client = self.client_for(options.proxy)?;
        let response = client
            .post(url)
            .header(USER_AGENT, options.user_agent)
            .timeout(options.timeout)
            .form(form)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;
        Self::read_response(url, response).await
    }

    async fn get(&self, url: &str, options: &RequestOptions<'_>) -> Result<HttpResponse, TransportError> {
        let client = self.client_for(options.proxy)?;
        let response = client
            .get(url)
            .header(USER_AGENT, options.user_agent)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;
        Self::read_response(url, response).await
    }
}

fn build_client(jar: &Arc<Jar>, proxy: Option<&str>) -> Result<Client, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );

    let mut builder = Client::builder()
        .default_headers(headers)
        .cookie_provider(Arc::clone(jar));

    if let Some(proxy) = proxy {
        let proxy_cfg = Proxy::all(proxy).map_err(|e| TransportError::InvalidProxy {
            proxy: proxy.to_string(),
            message: e.to_string(),
        })?;
        builder = builder.proxy(proxy_cfg);
    }

    builder.build().map_err(|e| TransportError::ClientBuild {
        message: e.to_string(),
    })
}

fn map_reqwest_error(url: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { url: url.to_string() }
    } else {
        TransportError::Connection {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// 测试用的固定响应传输
#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    /// 按地址前缀返回预设响应，并记录所有请求地址
    #[derive(Default)]
    pub struct ScriptedTransport {
        pub login: Option<HttpResponse>,
        pub pages: Vec<(String, Result<HttpResponse, String>)>,
        pub requests: Mutex<Vec<String>>,
        pub user_agents: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub fn page(status: u16, url: &str, body: &str) -> HttpResponse {
            HttpResponse {
                status,
                final_url: url.to_string(),
                body: body.to_string(),
            }
        }

        pub fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_form(
            &self,
            url: &str,
            _form: &[(&str, &str)],
            options: &RequestOptions<'_>,
        ) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.user_agents.lock().unwrap().push(options.user_agent.to_string());
            self.login.clone().ok_or_else(|| TransportError::Connection {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
        }

        async fn get(&self, url: &str, options: &RequestOptions<'_>) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.user_agents.lock().unwrap().push(options.user_agent.to_string());
            for (prefix, outcome) in &self.pages {
                if url.starts_with(prefix.as_str()) {
                    return outcome.clone().map_err(|message| TransportError::Connection {
                        url: url.to_string(),
                        message,
                    });
                }
            }
            Err(TransportError::Timeout { url: url.to_string() })
        }
    }

    #[test]
    fn test_response_success_range() {
        assert!(ScriptedTransport::page(200, "u", "").is_success());
        assert!(ScriptedTransport::page(204, "u", "").is_success());
        assert!(!ScriptedTransport::page(302, "u", "").is_success());
        assert!(!ScriptedTransport::page(503, "u", "").is_success());
    }
}
