pub mod checkpoint_store;
pub mod extractor;
pub mod query_engine;
pub mod resolver;
pub mod result_writer;
pub mod session_manager;

pub use checkpoint_store::{AppendLog, CheckpointStore};
pub use extractor::{Extract, ExtractContext, ExtractorRegistry, SiteExtractor};
pub use query_engine::{BlockDetector, QueryEngine};
pub use resolver::resolve;
pub use result_writer::ResultWriter;
pub use session_manager::{LoginPolicy, Session, SessionManager, SharedSession};
