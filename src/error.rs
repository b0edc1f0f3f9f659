//! 错误类型
//!
//! 分两类：
//! - `ScrapeError`：单个来源（或单个零件 × 来源）的失败，全部非致命，只记日志
//! - `FatalError`：输入无法读取、检查点/结果无法写入，必须终止运行

use thiserror::Error;

/// 传输层错误（超时、连接失败、代理配置无效等）
#[derive(Debug, Error)]
pub enum TransportError {
    /// 请求超时
    #[error("请求超时: {url}")]
    Timeout { url: String },
    /// 连接或读取响应失败
    #[error("连接失败 ({url}): {message}")]
    Connection { url: String, message: String },
    /// 代理地址无法使用
    #[error("代理地址无效 ({proxy}): {message}")]
    InvalidProxy { proxy: String, message: String },
    /// 无法构建 HTTP 客户端
    #[error("无法创建 HTTP 客户端: {message}")]
    ClientBuild { message: String },
}

/// 页面结构不符合预期时的解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// 必需字段缺失或为空
    #[error("缺少字段 `{field}` (选择器: {selector})")]
    MissingField {
        field: &'static str,
        selector: &'static str,
    },
    /// 价格文本无法解析为非负小数
    #[error("价格无法解析: '{raw}'")]
    InvalidPrice { raw: String },
    /// 选择器本身无效
    #[error("选择器无效: {selector}")]
    InvalidSelector { selector: &'static str },
}

/// 单个来源的抓取错误
///
/// 除 `Configuration` 与 `AuthFailure` 会让来源在整个运行期间停用外，
/// 其余都只是 (零件, 来源) 维度的一次未命中。
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// 登录失败，该来源在本次运行中不再使用
    #[error("登录失败 ({source_id}): {reason}")]
    AuthFailure { source_id: String, reason: String },
    /// 命中验证码 / 人机校验页面
    #[error("触发反爬校验 ({source_id}): 命中标记 '{marker}'")]
    Blocked { source_id: String, marker: String },
    /// 网络 / 传输失败或非成功状态码
    #[error("请求失败 ({source_id}): {reason}")]
    Query { source_id: String, reason: String },
    /// 页面解析失败
    #[error("解析失败 ({source_id}): {cause}")]
    Extraction {
        source_id: String,
        #[source]
        cause: ExtractionError,
    },
    /// 来源配置错误（未注册的解析器、URL 模板不合法等）
    #[error("配置错误 ({source_id}): {reason}")]
    Configuration { source_id: String, reason: String },
}

impl ScrapeError {
    /// 出错的来源
    pub fn source_id(&self) -> &str {
        match self {
            ScrapeError::AuthFailure { source_id, .. }
            | ScrapeError::Blocked { source_id, .. }
            | ScrapeError::Query { source_id, .. }
            | ScrapeError::Extraction { source_id, .. }
            | ScrapeError::Configuration { source_id, .. } => source_id,
        }
    }

    pub fn query(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ScrapeError::Query {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ScrapeError::Configuration {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }
}

/// 致命错误：出现后必须停止运行
#[derive(Debug, Error)]
pub enum FatalError {
    /// 零件列表无法读取
    #[error("无法读取零件列表 ({path}): {source}")]
    InputUnreadable {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 检查点日志无法读取
    #[error("无法读取检查点日志 ({path}): {source}")]
    CheckpointUnreadable {
        path: String,
        source: std::io::Error,
    },
    /// 检查点日志无法写入
    #[error("无法写入检查点日志 ({path}): {source}")]
    CheckpointUnwritable {
        path: String,
        source: std::io::Error,
    },
    /// 结果文件无法写入
    #[error("无法写入结果文件 ({path}): {source}")]
    ResultsUnwritable { path: String, source: csv::Error },
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, FatalError>;
