//! # RAG Anything MCP Server
//!
//! Multimodal Retrieval-Augmented Generation over local document
//! directories, served to AI assistants via the Model Context Protocol (MCP).
//!
//! ## Architecture
//!
//! - **[`config`]**: Settings from JSON file and environment, with validation
//! - **[`extract`]**: Text, table, image and equation extraction plus chunking
//! - **[`embedder`]**: Text embeddings (OpenAI-compatible API or local hashing)
//! - **[`llm`]**: Answer generation (OpenAI-compatible chat or extractive)
//! - **[`store`]**: SQLite + sqlite-vec vector store, one per working directory
//! - **[`services`]**: Document processing, querying, per-directory instances
//! - **[`mcp`]**: MCP server with 6 tool handlers (stdio transport via rmcp)
//! - **[`telemetry`]**: Logging setup and in-process metrics

pub mod config;
pub mod embedder;
pub mod error;
pub mod extract;
pub mod llm;
pub mod mcp;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod utils;

pub use error::{RagError, Result};
