use redis::Script;

use crate::errors::CacheError;
use crate::CacheClient;

/// A TTL-bounded mutex keyed in Redis. The value encodes the holder so
/// release is safe even if a slow worker wakes up after its TTL expired
/// and some other worker has since taken the lock.
pub struct DistributedLock<'a> {
    client: &'a CacheClient,
    key: String,
    holder: String,
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

impl<'a> DistributedLock<'a> {
    pub fn new(client: &'a CacheClient, key: impl Into<String>, holder: impl Into<String>) -> Self {
        Self {
            client,
            key: key.into(),
            holder: holder.into(),
        }
    }

    /// `SET key holder NX PX ttl_ms`. Returns `true` if this call acquired
    /// the lock.
    pub async fn try_acquire(&self, ttl_ms: u64) -> Result<bool, CacheError> {
        let mut conn = self.client.command_connection().await?;
        let acquired: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&self.holder)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(acquired.is_some())
    }

    /// Releases the lock only if it is still held by `self.holder`;
    /// ownership is enforced by value comparison at release time.
    pub async fn release(&self) -> Result<(), CacheError> {
        let mut conn = self.client.command_connection().await?;
        let script = Script::new(RELEASE_SCRIPT);
        let _: i64 = script
            .key(&self.key)
            .arg(&self.holder)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }
}
