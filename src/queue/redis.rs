//! Redis-backed queue: `LPUSH` + `RPOP`, so the head of the queue lives at
//! the Redis list tail.

use redis::aio::ConnectionManager;
use tracing::debug;

use super::Queuer;
use crate::error::{Error, Result};

/// Redis connection settings.
#[derive(Debug, Clone)]
pub struct RedisOptions {
    /// `host:port` of the Redis server.
    pub host: String,
    /// Credential, when the server requires AUTH.
    pub password: Option<String>,
    /// Database index.
    pub db: i64,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            host: "localhost:6379".to_string(),
            password: None,
            db: 0,
        }
    }
}

impl RedisOptions {
    fn url(&self) -> String {
        let auth = self
            .password
            .as_deref()
            .map(|p| format!(":{p}@"))
            .unwrap_or_default();

        format!("redis://{}{}/{}", auth, self.host, self.db)
    }
}

/// [`Queuer`] backed by Redis lists.
///
/// Every operation is an awaited round-trip, so a completed `push` is
/// visible to the next `pop` regardless of which process issues it.
pub struct RedisQueue {
    conn: ConnectionManager,
}

impl RedisQueue {
    /// Connect and verify the server answers.
    pub async fn connect(options: &RedisOptions) -> Result<Self> {
        let client = redis::Client::open(options.url())?;
        let mut conn = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(host = %options.host, %pong, "redis queue connected");

        Ok(Self { conn })
    }
}

impl Queuer for RedisQueue {
    async fn push(&self, queue: &str, item: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("LPUSH")
            .arg(queue)
            .arg(item)
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<String> {
        let mut conn = self.conn.clone();
        let item: Option<String> = redis::cmd("RPOP").arg(queue).query_async(&mut conn).await?;

        item.ok_or(Error::QueueEmpty)
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let len: i64 = redis::cmd("LLEN").arg(queue).query_async(&mut conn).await?;

        Ok(len as usize)
    }
}
