//! MCP surface: tool handlers and the stdio server.

pub mod server;
pub mod tools;

pub use server::McpServer;
