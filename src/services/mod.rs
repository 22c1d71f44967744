pub mod document_processor;
pub mod query_service;
pub mod rag_manager;

pub use document_processor::{DirectoryOptions, DocumentOptions, DocumentProcessor};
pub use query_service::QueryService;
pub use rag_manager::{InstanceOptions, RagManager};
