/// Redis session cache
///
/// TTLs are handled by Redis itself (`SET ... EX`, `EXPIRE`); the
/// single-use guarantee for refresh tokens comes from `GETDEL`, which
/// is atomic on the server. Every operation runs under a configurable
/// timeout so a dead cache surfaces as `Internal` instead of hanging
/// the request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::cache::SessionCache;
use crate::error::AppError;

pub struct RedisSessionCache {
    manager: ConnectionManager,
    timeout: Duration,
}

fn rate_limit_key(bucket: &str) -> String {
    format!("ratelimit:{}", bucket)
}

fn token_key(token_hash: &str) -> String {
    format!("refresh:{}", token_hash)
}

// Index of a user's live token hashes, for revoke-all on password change.
fn user_tokens_key(user_id: Uuid) -> String {
    format!("user_tokens:{}", user_id)
}

impl RedisSessionCache {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::Internal(format!("invalid cache url: {}", e)))?;
        let manager = client.get_connection_manager().await?;

        Ok(Self { manager, timeout })
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = redis::RedisResult<T>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => Err(AppError::Internal(format!(
                "cache operation timed out: {}",
                operation
            ))),
        }
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn record_attempt(&self, bucket: &str, window: Duration) -> Result<u64, AppError> {
        let mut conn = self.manager.clone();
        let key = rate_limit_key(bucket);
        let window_secs = window.as_secs() as i64;

        self.with_timeout("record_attempt", async move {
            // INCR and EXPIRE run as one transaction so the key can never
            // be left without a TTL; NX keeps the window fixed rather
            // than sliding on every attempt.
            let (count, _): (u64, i64) = redis::pipe()
                .atomic()
                .incr(&key, 1u64)
                .cmd("EXPIRE")
                .arg(&key)
                .arg(window_secs)
                .arg("NX")
                .query_async(&mut conn)
                .await?;
            Ok(count)
        })
        .await
    }

    async fn store_refresh_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let token_key = token_key(token_hash);
        let user_key = user_tokens_key(user_id);
        let token_hash = token_hash.to_string();
        let ttl_secs = ttl.as_secs();

        self.with_timeout("store_refresh_token", async move {
            redis::pipe()
                .atomic()
                .set_ex(&token_key, user_id.to_string(), ttl_secs)
                .sadd(&user_key, &token_hash)
                .expire(&user_key, ttl_secs as i64)
                .query_async::<()>(&mut conn)
                .await
        })
        .await
    }

    async fn consume_refresh_token(&self, token_hash: &str) -> Result<Option<Uuid>, AppError> {
        let mut conn = self.manager.clone();
        let key = token_key(token_hash);
        let token_hash = token_hash.to_string();

        let value: Option<String> = self
            .with_timeout("consume_refresh_token", async move {
                let value: Option<String> = conn.get_del(&key).await?;
                if let Some(ref user_id) = value {
                    // Drop the hash from the per-user index as well
                    let _: () = conn
                        .srem(format!("user_tokens:{}", user_id), &token_hash)
                        .await?;
                }
                Ok(value)
            })
            .await?;

        match value {
            None => Ok(None),
            Some(raw) => Uuid::parse_str(&raw)
                .map(Some)
                .map_err(|_| AppError::Internal("corrupt refresh token entry".to_string())),
        }
    }

    async fn revoke_user_tokens(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let user_key = user_tokens_key(user_id);

        self.with_timeout("revoke_user_tokens", async move {
            let hashes: Vec<String> = conn.smembers(&user_key).await?;
            if !hashes.is_empty() {
                let keys: Vec<String> = hashes.iter().map(|h| token_key(h)).collect();
                let _: () = conn.del(keys).await?;
            }
            let _: () = conn.del(&user_key).await?;
            Ok(())
        })
        .await
    }
}
