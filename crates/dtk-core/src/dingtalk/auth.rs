//! Access token cache.
//!
//! DingTalk access tokens live for two hours. The cache keeps the current
//! token and hands it out until shortly before it expires; the first caller
//! after that refreshes it while holding the lock, so callers queued behind
//! it see the new token instead of refreshing again.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::dingtalk::models::AccessToken;
use crate::error::ApiError;

/// Default margin subtracted from the advertised lifetime.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Single-slot, lock-guarded access token cache.
#[derive(Debug)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
    margin: Duration,
}

impl TokenCache {
    /// Create an empty cache with the default refresh margin.
    #[must_use]
    pub fn new() -> Self {
        Self::with_margin(DEFAULT_REFRESH_MARGIN)
    }

    /// Create an empty cache that treats tokens as stale `margin` early.
    #[must_use]
    pub const fn with_margin(margin: Duration) -> Self {
        Self {
            slot: Mutex::const_new(None),
            margin,
        }
    }

    /// Return the cached token, or run `refresh` and cache its result.
    ///
    /// The lock is held across `refresh`, so at most one refresh runs at a
    /// time for this cache.
    ///
    /// # Errors
    ///
    /// Returns the error from `refresh`, or [`ApiError::MissingToken`] when it
    /// yields an empty token. The cache is left unchanged on error.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<String, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken, ApiError>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref()
            && cached.is_fresh(Instant::now())
        {
            return Ok(cached.value.clone());
        }

        let fetched = refresh().await?;
        if fetched.access_token.is_empty() {
            return Err(ApiError::MissingToken);
        }

        let lifetime = u64::try_from(fetched.expire_in).unwrap_or(0);
        let usable = Duration::from_secs(lifetime).saturating_sub(self.margin);
        log::info!("access token refreshed, valid for {}s", usable.as_secs());

        let value = fetched.access_token;
        *slot = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + usable,
        });
        Ok(value)
    }

    /// Returns `true` if a cached token would be served without a refresh.
    pub async fn is_valid(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|cached| cached.is_fresh(Instant::now()))
    }

    /// Drop the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}
