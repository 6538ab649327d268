//! Per-provider credential state.
//!
//! Adapters that authenticate with expiring tokens keep one of these per
//! provider instance instead of ambient mutable state. Refresh uses the
//! double-check discipline: validity is checked under the shared read
//! lock, and only a caller that still finds the token invalid under the
//! write lock actually refreshes — concurrent callers never stampede the
//! auth endpoint, and all of them observe the refreshed value.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use diagnostics::log_debug;
use tokio::sync::RwLock;

use crate::error::Result;

/// An issued credential and the instant it stops being usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Token {
            value: value.into(),
            expires_at,
        }
    }
}

/// Lock-guarded token holder with a refresh margin: a token within
/// `refresh_margin` of expiry is already treated as invalid, so callers
/// never hand out a credential about to die mid-request.
#[derive(Debug)]
pub struct TokenCache {
    state: RwLock<Option<Token>>,
    refresh_margin: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        TokenCache::new(Duration::from_secs(300))
    }
}

impl TokenCache {
    pub fn new(refresh_margin: Duration) -> Self {
        TokenCache {
            state: RwLock::new(None),
            refresh_margin,
        }
    }

    fn is_usable(&self, token: &Token) -> bool {
        let margin = chrono::Duration::from_std(self.refresh_margin)
            .unwrap_or_else(|_| chrono::Duration::zero());
        token.expires_at - margin > Utc::now()
    }

    /// Returns the current token value, refreshing through `refresh` only
    /// if no usable token is held once the write lock confirms it.
    pub async fn current_or_refresh<F, Fut>(&self, refresh: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Token>>,
    {
        {
            let guard = self.state.read().await;
            if let Some(token) = guard.as_ref() {
                if self.is_usable(token) {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut guard = self.state.write().await;
        // Re-check: another caller may have refreshed while we waited.
        if let Some(token) = guard.as_ref() {
            if self.is_usable(token) {
                return Ok(token.value.clone());
            }
        }
        log_debug!("refreshing expired credential");
        let fresh = refresh().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    /// Drops the held token so the next caller refreshes.
    pub async fn invalidate(&self) {
        *self.state.write().await = None;
    }
}
