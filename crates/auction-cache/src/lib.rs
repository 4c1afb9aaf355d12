pub mod errors;
pub mod lock;
pub mod subscriber;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use errors::CacheError;
pub use lock::DistributedLock;
pub use subscriber::Subscriber;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl CacheConfig {
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{password}@{}:{}", self.host, self.port),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

/// Wraps two connections to the same Redis instance: one for commands
/// (get/set/counters/sets/lock), one reserved for publishing, so a slow
/// subscriber never head-of-line-blocks a publish. The subscriber side is
/// kept separate again (`Subscriber`) since it is driven by its own read
/// loop.
#[derive(Clone)]
pub struct CacheClient {
    client: redis::Client,
    commands: ConnectionManager,
    publisher: ConnectionManager,
}

impl CacheClient {
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.url())?;
        let commands = ConnectionManager::new(client.clone()).await?;
        let publisher = ConnectionManager::new(client.clone()).await?;

        Ok(Self {
            client,
            commands,
            publisher,
        })
    }

    pub fn raw_client(&self) -> &redis::Client {
        &self.client
    }

    pub(crate) async fn command_connection(&self) -> Result<ConnectionManager, CacheError> {
        Ok(self.commands.clone())
    }

    pub async fn health_check(&self) -> bool {
        let mut conn = self.commands.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await.is_ok()
    }

    pub fn lock(&self, key: impl Into<String>, holder: impl Into<String>) -> DistributedLock<'_> {
        DistributedLock::new(self, key, holder)
    }

    pub async fn new_subscriber(&self) -> Result<Subscriber, CacheError> {
        Subscriber::connect(&self.client).await
    }

    pub async fn publish(&self, channel: &str, payload: &str) -> Result<(), CacheError> {
        let mut conn = self.publisher.clone();
        let _: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.commands.clone();
        conn.set_ex(key, value, ttl_seconds).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.commands.clone();
        Ok(conn.get(key).await?)
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.commands.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    /// `SET key value NX EX ttl`. Returns true if the key was absent and is
    /// now set.
    pub async fn set_if_absent(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool, CacheError> {
        let mut conn = self.commands.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(set.is_some())
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.commands.clone();
        Ok(conn.exists(key).await?)
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.commands.clone();
        let _: i64 = conn.sadd(key, member).await?;
        Ok(())
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.commands.clone();
        let _: i64 = conn.srem(key, member).await?;
        Ok(())
    }

    pub async fn scard(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.commands.clone();
        Ok(conn.scard(key).await?)
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.commands.clone();
        Ok(conn.smembers(key).await?)
    }

    pub async fn expire(&self, key: &str, ttl_seconds: i64) -> Result<(), CacheError> {
        let mut conn = self.commands.clone();
        let _: bool = conn.expire(key, ttl_seconds).await?;
        Ok(())
    }

    pub async fn incr(&self, key: &str, by: i64) -> Result<i64, CacheError> {
        let mut conn = self.commands.clone();
        Ok(conn.incr(key, by).await?)
    }

    pub async fn decr(&self, key: &str, by: i64) -> Result<i64, CacheError> {
        let mut conn = self.commands.clone();
        Ok(conn.decr(key, by).await?)
    }

    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) -> Result<(), CacheError> {
        let payload = serde_json::to_string(value)?;
        self.set_with_ttl(key, &payload, ttl_seconds).await
    }

    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_omits_credentials_when_no_password_is_set() {
        let config = CacheConfig { host: "localhost".into(), port: 6379, password: None };
        assert_eq!(config.url(), "redis://localhost:6379");
    }

    #[test]
    fn url_carries_the_password_when_set() {
        let config = CacheConfig { host: "localhost".into(), port: 6379, password: Some("hunter2".into()) };
        assert_eq!(config.url(), "redis://:hunter2@localhost:6379");
    }
}
