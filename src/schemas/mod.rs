//! Schema module
//!
//! Wire types: JSON-RPC envelopes for MCP and the documentation backend's
//! response bodies.

pub mod docs;
pub mod jsonrpc;
