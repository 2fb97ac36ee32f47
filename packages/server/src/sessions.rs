use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::extractors::auth::AuthUser;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("session cache unavailable: {0}")]
    Unavailable(String),
}

/// Token → principal cache consulted before the user directory.
///
/// Callers treat every error as a miss on read and ignore errors on write.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, token: &str) -> Result<Option<AuthUser>, CacheError>;

    async fn put(&self, token: &str, user: AuthUser, ttl: Duration) -> Result<(), CacheError>;

    /// Drop every cached session belonging to `email`. Returns how many were removed.
    async fn evict_email(&self, email: &str) -> Result<usize, CacheError>;

    /// Drop entries whose TTL has passed. Returns how many were removed.
    async fn purge_expired(&self) -> usize;
}

struct Entry {
    user: AuthUser,
    expires_at: Instant,
}

/// Process-wide in-memory cache.
#[derive(Default)]
pub struct MemorySessionCache {
    entries: DashMap<String, Entry>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn get(&self, token: &str) -> Result<Option<AuthUser>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(token) {
            if entry.expires_at > now {
                return Ok(Some(entry.user.clone()));
            }
        } else {
            return Ok(None);
        }
        self.entries.remove_if(token, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn put(&self, token: &str, user: AuthUser, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Ok(());
        }
        self.entries.insert(
            token.to_owned(),
            Entry {
                user,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn evict_email(&self, email: &str) -> Result<usize, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.user.email != email);
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}
