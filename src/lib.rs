//! Documentation MCP gateway library
//!
//! Exposes library search and documentation retrieval from a hosted
//! documentation backend as MCP tools, over stdio or streamable HTTP.

// Public modules
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod middleware;
pub mod schemas;
pub mod server;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::ApiError;
pub use server::App;
