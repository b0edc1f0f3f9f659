//! 基础设施层
//!
//! 持有稀缺资源（HTTP 连接、Cookie、代理），只暴露能力

pub mod header_pool;
pub mod pacer;
pub mod proxy_pool;
pub mod transport;

pub use header_pool::HeaderPool;
pub use pacer::{NoPacer, Pacer, PauseKind, RandomPacer};
pub use proxy_pool::ProxyPool;
pub use transport::{Connector, HttpConnector, HttpResponse, ReqwestTransport, RequestOptions, Transport};
