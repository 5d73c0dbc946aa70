//! Small key-value store used by the indexer for its cursor and per-tx
//! idempotency keys. Redis in production, a map in tests.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

pub fn init_redis_pool(redis_url: &str) -> Result<deadpool_redis::Pool> {
    let cfg = deadpool_redis::Config::from_url(redis_url);
    let pool = cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .context("failed to create redis pool")?;
    Ok(pool)
}

pub struct RedisKv {
    pool: deadpool_redis::Pool,
}

impl RedisKv {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.get().await.context("redis connection failed")?;
        let value: Option<String> = conn.get(key).await.context("redis GET failed")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.pool.get().await.context("redis connection failed")?;
        conn.set::<_, _, ()>(key, value)
            .await
            .context("redis SET failed")?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.pool.get().await.context("redis connection failed")?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .context("redis SETEX failed")?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.pool.get().await.context("redis connection failed")?;
        let exists: bool = conn.exists(key).await.context("redis EXISTS failed")?;
        Ok(exists)
    }
}

/// In-memory store for tests. TTLs are accepted and ignored; test runs are
/// far shorter than any TTL the indexer uses.
#[derive(Default)]
pub struct MemoryKv {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.data.lock().expect("kv lock poisoned").remove(key)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.lock().expect("kv lock poisoned").get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.data
            .lock()
            .expect("kv lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<()> {
        self.set(key, value).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .data
            .lock()
            .expect("kv lock poisoned")
            .contains_key(key))
    }
}
