//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `run_context` - 运行上下文
//! - 启动时构建一次：凭据、会话、解析器注册表、查询引擎、检查点、结果写入
//! - 以 `Arc` 传给每个零件的流程
//!
//! ### `batch_processor` - 批量零件处理器
//! - 管理应用生命周期（初始化、运行）
//! - 加载零件列表、按检查点过滤
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<PartNumber>)
//!     ↓
//! workflow::PartFlow (处理单个零件)
//!     ↓
//! services (能力层：session / query / extract / resolve / checkpoint)
//!     ↓
//! infrastructure (基础设施：Transport / Pacer / 代理 / 请求头)
//! ```

pub mod batch_processor;
pub mod run_context;

// 重新导出主要类型
pub use batch_processor::{App, RunStats};
pub use run_context::{ActiveSource, RunContext};
