//! Credential Pool Implementation
//!
//! Round-robin selection over an ordered list of credentials with a
//! failed set that is cleared lazily once the cooldown has elapsed.

use super::credential::Credential;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Failed credentials become eligible again after this long
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60 * 60);

// ============================================================================
// Pool Configuration
// ============================================================================

/// Configuration for credential pool behavior
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// How long failed credentials stay excluded from selection
    pub cooldown: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl PoolConfig {
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

// ============================================================================
// Pool State
// ============================================================================

#[derive(Debug)]
struct PoolState {
    /// Index of the next credential to inspect, always `< len` when non-empty
    cursor: usize,
    /// Credentials that hit a rate limit since the last reset
    failed: HashSet<Credential>,
    /// When the failed set was last cleared
    last_reset: Instant,
}

// ============================================================================
// Credential Pool
// ============================================================================

/// A rotating pool of backend credentials
///
/// All selection and marking happens under one mutex, so concurrent callers
/// never observe a torn cursor or failed set. The lock is never held across
/// an `.await`.
#[derive(Debug)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl CredentialPool {
    /// Create a pool from already-parsed credentials
    pub fn new(credentials: Vec<Credential>, config: PoolConfig) -> Self {
        if credentials.is_empty() {
            tracing::warn!("No API keys provided. Running without authentication.");
        } else {
            tracing::info!(key_count = credentials.len(), "Loaded API key(s) for rotation");
        }

        Self {
            credentials,
            config,
            state: Mutex::new(PoolState {
                cursor: 0,
                failed: HashSet::new(),
                last_reset: Instant::now(),
            }),
        }
    }

    /// Build a pool from a comma-separated list of keys
    ///
    /// Entries are trimmed and blank entries are discarded. An empty or
    /// blank source yields an empty pool.
    pub fn from_source(source: &str) -> Self {
        Self::from_keys(source.split(','))
    }

    /// Build a pool from individual keys, trimming and discarding blanks
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let credentials = keys.into_iter().filter_map(Credential::parse).collect();
        Self::new(credentials, PoolConfig::default())
    }

    /// A pool with no credentials
    pub fn empty() -> Self {
        Self::new(Vec::new(), PoolConfig::default())
    }

    /// Replace the pool configuration
    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Select the next usable credential
    ///
    /// Returns `None` only when the pool is empty. When every credential has
    /// failed, the failed set is cleared and the first credential is returned.
    pub fn next(&self) -> Option<Credential> {
        let mut state = self.lock_state();
        self.reset_if_cooled_down(&mut state);

        let len = self.credentials.len();
        if len == 0 {
            return None;
        }

        for _ in 0..len {
            let candidate = &self.credentials[state.cursor];
            state.cursor = (state.cursor + 1) % len;
            if !state.failed.contains(candidate) {
                return Some(candidate.clone());
            }
        }

        tracing::warn!(
            key_count = len,
            "All API keys have failed. Resetting failed keys and retrying from the first key."
        );
        state.failed.clear();
        Some(self.credentials[0].clone())
    }

    /// Exclude a credential from selection until the next reset
    ///
    /// Credentials that are not in the pool are ignored, and marking an
    /// already-failed credential changes nothing.
    pub fn mark_failed(&self, credential: &Credential) {
        if !self.credentials.contains(credential) {
            return;
        }

        let mut state = self.lock_state();
        if state.failed.insert(credential.clone()) {
            tracing::warn!(
                credential = %credential,
                failed = state.failed.len(),
                total = self.credentials.len(),
                "API key marked as failed"
            );
        }
    }

    /// Whether a credential is currently in the failed set
    pub fn is_failed(&self, credential: &Credential) -> bool {
        self.lock_state().failed.contains(credential)
    }

    /// Number of credentials in the pool
    pub fn total_count(&self) -> usize {
        self.credentials.len()
    }

    /// Number of credentials currently marked failed
    pub fn failed_count(&self) -> usize {
        self.lock_state().failed.len()
    }

    /// Whether the pool holds at least one credential
    pub fn has_any(&self) -> bool {
        !self.credentials.is_empty()
    }

    /// Snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        let failed = self.failed_count();
        PoolStats {
            total: self.credentials.len(),
            failed,
            available: self.credentials.len().saturating_sub(failed),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_if_cooled_down(&self, state: &mut PoolState) {
        if !state.failed.is_empty() && state.last_reset.elapsed() > self.config.cooldown {
            tracing::info!(
                cleared = state.failed.len(),
                "Resetting failed API keys after cooldown"
            );
            state.failed.clear();
            state.last_reset = Instant::now();
        }
    }
}

impl Default for CredentialPool {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Pool Statistics
// ============================================================================

/// Statistics about a credential pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    /// Total number of credentials
    pub total: usize,
    /// Number of credentials currently marked failed
    pub failed: usize,
    /// Number of credentials eligible for selection
    pub available: usize,
}

// ============================================================================
// Tests
// ============================================================================
