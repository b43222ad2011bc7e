/// Session/Rate-Limit Cache
///
/// Ephemeral key-value storage for refresh tokens and login rate-limit
/// counters. Everything stored here is TTL-bound; entries expire on
/// their own and there is no garbage collection to run.

mod memory;
mod redis_cache;

pub use memory::InMemorySessionCache;
pub use redis_cache::RedisSessionCache;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Increment the counter for `bucket` and return the new count. The
    /// first increment starts a fixed window of `window`; the counter
    /// resets when the window expires.
    async fn record_attempt(&self, bucket: &str, window: Duration) -> Result<u64, AppError>;

    /// Store a refresh token hash for `user_id`, expiring after `ttl`.
    async fn store_refresh_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), AppError>;

    /// Look up and delete a refresh token in one logical step. Returns
    /// the owning user ID, or `None` if the token is unknown, expired,
    /// or already consumed. Concurrent consumes of the same token
    /// resolve to exactly one winner.
    async fn consume_refresh_token(&self, token_hash: &str) -> Result<Option<Uuid>, AppError>;

    /// Drop every outstanding refresh token for a user (password change).
    async fn revoke_user_tokens(&self, user_id: Uuid) -> Result<(), AppError>;
}

/// Throttling decision derived from `record_attempt`: once the count
/// within the current window exceeds `threshold`, the caller gets
/// `RateLimited` until the window resets.
pub async fn check_rate_limit(
    cache: &dyn SessionCache,
    bucket: &str,
    threshold: u64,
    window: Duration,
) -> Result<(), AppError> {
    let count = cache.record_attempt(bucket, window).await?;
    if count > threshold {
        tracing::warn!(bucket = bucket, count = count, "rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(())
}
