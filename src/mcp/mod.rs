//! Model Context Protocol server
//!
//! JSON-RPC handling shared by the stdio and HTTP transports, the tool
//! catalogue and the text rendering of backend results.

pub mod format;
pub mod handler;
pub mod stdio;
pub mod tools;

pub use handler::{McpHandler, SERVER_INSTRUCTIONS, SUPPORTED_PROTOCOL_VERSIONS};
pub use stdio::{run_stdio_server, StdioSession};
