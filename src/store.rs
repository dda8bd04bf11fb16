use anyhow::Result;
use async_trait::async_trait;

/// Minimal key-value surface the relay needs from its cross-process cache:
/// plain get/set plus one hash per entity family. Backed by Redis in
/// production; tests plug in an in-memory double.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    /// Connect at startup. This is the one place a cache-store failure is
    /// allowed to propagate; after boot every read degrades to "unknown".
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let (): () = conn.set(key, value).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        Ok(conn.hget(key, field).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let (): () = conn.hset(key, field, value).await?;
        Ok(())
    }
}
