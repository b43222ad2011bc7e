/// In-memory session cache
///
/// Test double for the Redis cache with the same observable semantics:
/// fixed-window counters, TTL-bound refresh tokens, and atomic
/// consume (the mutex makes lookup-and-delete a single step).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use crate::cache::SessionCache;
use crate::error::AppError;

struct Counter {
    count: u64,
    window_ends: Instant,
}

struct TokenEntry {
    user_id: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    counters: HashMap<String, Counter>,
    tokens: HashMap<String, TokenEntry>,
    user_tokens: HashMap<Uuid, HashSet<String>>,
}

#[derive(Default)]
pub struct InMemorySessionCache {
    inner: Mutex<Inner>,
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn record_attempt(&self, bucket: &str, window: Duration) -> Result<u64, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        let counter = inner
            .counters
            .entry(bucket.to_string())
            .or_insert_with(|| Counter {
                count: 0,
                window_ends: now + window,
            });

        if now >= counter.window_ends {
            counter.count = 0;
            counter.window_ends = now + window;
        }
        counter.count += 1;
        Ok(counter.count)
    }

    async fn store_refresh_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.tokens.insert(
            token_hash.to_string(),
            TokenEntry {
                user_id,
                expires_at: Instant::now() + ttl,
            },
        );
        inner
            .user_tokens
            .entry(user_id)
            .or_default()
            .insert(token_hash.to_string());
        Ok(())
    }

    async fn consume_refresh_token(&self, token_hash: &str) -> Result<Option<Uuid>, AppError> {
        let mut inner = self.inner.lock().unwrap();

        let entry = match inner.tokens.remove(token_hash) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if let Some(set) = inner.user_tokens.get_mut(&entry.user_id) {
            set.remove(token_hash);
        }

        if Instant::now() >= entry.expires_at {
            return Ok(None);
        }
        Ok(Some(entry.user_id))
    }

    async fn revoke_user_tokens(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(hashes) = inner.user_tokens.remove(&user_id) {
            for hash in hashes {
                inner.tokens.remove(&hash);
            }
        }
        Ok(())
    }
}
