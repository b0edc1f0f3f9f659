//! # PNpilot
//!
//! 多供应商零件比价：登录各个供应商网站，按零件号查询报价，保留最低价
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（HTTP 连接、Cookie），只暴露能力
//! - `Transport` - 发请求的能力；`Pacer` - 请求节奏；`HeaderPool` / `ProxyPool`
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个零件或单个来源
//! - `SessionManager` - 登录能力
//! - `QueryEngine` - 在一个来源上查一个零件
//! - `SiteExtractor` - 各来源的页面解析
//! - `resolve` - 比价
//! - `CheckpointStore` / `ResultWriter` - 持久化
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个零件"的完整处理流程
//! - `PartCtx` - 上下文封装（零件号 + 序号）
//! - `PartFlow` - 流程编排（逐来源查询 → 比价 → 写结果 → 检查点）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/run_context` - 启动时构建的运行上下文
//! - `orchestrator/batch_processor` - 批量零件处理器，管理资源和并发
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppResult, ExtractionError, FatalError, ScrapeError, TransportError};
pub use models::{Offer, PartNumber, SourceConfig};
pub use orchestrator::{App, RunContext, RunStats};
pub use workflow::{PartCtx, PartFlow, PartOutcome};
