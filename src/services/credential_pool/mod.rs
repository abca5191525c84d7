//! Credential Pool Module
//!
//! Rotation over a list of backend API keys. Keys that hit a rate limit are
//! marked failed and skipped until either the cooldown elapses or every key
//! has failed, at which point the pool starts over from the first key.
//!
//! # Example
//! ```
//! use docs_mcp_gateway::services::credential_pool::CredentialPool;
//!
//! let pool = CredentialPool::from_source("key-a, key-b,,key-c");
//! assert_eq!(pool.total_count(), 3);
//!
//! let first = pool.next().unwrap();
//! pool.mark_failed(&first);
//! assert_eq!(pool.next().unwrap().expose(), "key-b");
//! ```

mod credential;
mod pool;

pub use credential::Credential;
pub use pool::{CredentialPool, PoolConfig, PoolStats, DEFAULT_COOLDOWN};
