//! Per-credential quota tracking and credential selection.
//!
//! The quota table is refreshed wholesale from the provider's snapshot
//! endpoint before every selection, so the numbers are provider-authoritative
//! at the moment of use: extra network calls are traded for never
//! overshooting a quota. Selection itself ([`RateLimiter::pick`]) is pure
//! over the table, which keeps the policy unit-testable; the collector owns
//! the surrounding refresh / drain / wait loop.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::{ApiError, ApiResult, SearchApi};
use crate::auth::Credential;
use crate::collector::config::RESET_SLACK_SECS;
use crate::shutdown::ShutdownCoordinator;

/// Quota snapshot for one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    /// Calls left in the current window.
    pub remaining: u32,
    /// Epoch seconds at which the window refills.
    pub reset_at: i64,
}

/// Outcome of one credential selection over the quota table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A credential has quota left; use it now.
    Ready {
        /// Index of the selected credential.
        index: usize,
    },
    /// Every credential is exhausted. The caller must drain pending work,
    /// then sleep until `until` before refreshing and retrying.
    MustWait {
        /// Index of the credential whose window refills first.
        index: usize,
        /// Epoch seconds to sleep until (reset time plus slack).
        until: i64,
    },
}

/// Tracks remaining quota and reset time for every configured credential.
pub struct RateLimiter {
    api: Arc<dyn SearchApi>,
    credentials: Vec<Credential>,
    states: Vec<RateLimitState>,
}

impl RateLimiter {
    /// Create a limiter over a non-empty credential list.
    ///
    /// The quota table starts all-zero; callers must [`refresh`] before the
    /// first [`pick`]. Returns `None` for an empty list, which the caller
    /// treats as a fatal startup fault.
    ///
    /// [`refresh`]: RateLimiter::refresh
    /// [`pick`]: RateLimiter::pick
    pub fn new(api: Arc<dyn SearchApi>, credentials: Vec<Credential>) -> Option<Self> {
        if credentials.is_empty() {
            return None;
        }
        let states = vec![
            RateLimitState {
                remaining: 0,
                reset_at: 0,
            };
            credentials.len()
        ];
        Some(Self {
            api,
            credentials,
            states,
        })
    }

    /// Number of configured credentials.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false; construction rejects empty credential lists.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// The credential at `index`.
    pub fn credential(&self, index: usize) -> &Credential {
        &self.credentials[index]
    }

    /// Known remaining quota for the credential at `index`.
    pub fn remaining(&self, index: usize) -> u32 {
        self.states[index].remaining
    }

    /// Refresh the whole quota table from the provider.
    ///
    /// The provider only exposes a per-credential snapshot endpoint, so the
    /// table is replaced wholesale. A provider error is fatal: quota state
    /// is unknowable without it.
    pub async fn refresh(&mut self) -> ApiResult<()> {
        for (index, credential) in self.credentials.iter().enumerate() {
            let state = self.api.rate_limit_status(credential).await?;
            debug!(
                credential = %credential.label,
                remaining = state.remaining,
                reset_at = state.reset_at,
                "refreshed quota"
            );
            self.states[index] = state;
        }
        Ok(())
    }

    /// Fold quota hints from a page response back into the table.
    pub fn record(&mut self, index: usize, remaining: u32, reset_at: i64) {
        self.states[index] = RateLimitState { remaining, reset_at };
    }

    /// Select the next credential from the current table.
    ///
    /// If any credential has quota left, the one with the **maximum**
    /// remaining wins, ties broken by lowest index. Otherwise the credential
    /// with the **minimum** reset time is nominated and the caller must wait
    /// until just after that reset.
    pub fn pick(&self) -> Selection {
        let mut best: Option<usize> = None;
        for (index, state) in self.states.iter().enumerate() {
            if state.remaining == 0 {
                continue;
            }
            // Strict comparison keeps the lowest index on ties.
            match best {
                Some(b) if state.remaining <= self.states[b].remaining => {}
                _ => best = Some(index),
            }
        }
        if let Some(index) = best {
            return Selection::Ready { index };
        }

        let mut index = 0;
        for (i, state) in self.states.iter().enumerate().skip(1) {
            if state.reset_at < self.states[index].reset_at {
                index = i;
            }
        }
        Selection::MustWait {
            index,
            until: self.states[index].reset_at + RESET_SLACK_SECS,
        }
    }

    /// Sleep until `until` (epoch seconds, clamped to now), observing
    /// shutdown.
    pub async fn wait_for_reset(
        &self,
        until: i64,
        shutdown: &ShutdownCoordinator,
    ) -> ApiResult<()> {
        let now = chrono::Utc::now().timestamp();
        let wait_secs = (until - now).max(0) as u64;
        if wait_secs == 0 {
            return Ok(());
        }
        info!(
            wait_secs,
            "all credentials exhausted, sleeping until earliest reset"
        );
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(wait_secs)) => Ok(()),
            _ = shutdown.wait_for_shutdown() => Err(ApiError::Cancelled),
        }
    }
}
