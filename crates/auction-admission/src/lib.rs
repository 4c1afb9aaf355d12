use auction_cache::errors::CacheError;
use auction_cache::CacheClient;
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub max_per_address: u32,
    pub max_per_identity: u32,
    pub tracking_window_seconds: u64,
    pub block_duration_seconds: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_per_address: 5,
            max_per_identity: 3,
            tracking_window_seconds: 60,
            block_duration_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tracking {
    address: String,
    identity: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdmissionStats {
    pub address_count: i64,
    pub address_blocked: bool,
    pub identity_count: i64,
    pub identity_blocked: bool,
}

/// Rate-limits new connections by address and, once authenticated, by
/// identity. State lives in the Cache, so every Gateway instance shares the
/// same view without talking to each other directly.
pub struct AdmissionController {
    cache: CacheClient,
    config: AdmissionConfig,
}

impl AdmissionController {
    pub fn new(cache: CacheClient, config: AdmissionConfig) -> Self {
        Self { cache, config }
    }

    fn address_block_key(address: &str) -> String {
        format!("admission:block:addr:{address}")
    }

    fn identity_block_key(identity: &str) -> String {
        format!("admission:block:identity:{identity}")
    }

    fn address_set_key(address: &str) -> String {
        format!("admission:conns:addr:{address}")
    }

    fn identity_set_key(identity: &str) -> String {
        format!("admission:conns:identity:{identity}")
    }

    fn socket_key(socket_id: &str) -> String {
        format!("admission:socket:{socket_id}")
    }

    /// Checked before a connection is accepted, and again once authentication
    /// resolves an identity for it. A cache outage never blocks a connection:
    /// any cache error fails open and is logged.
    pub async fn check(&self, address: &str, identity: Option<&str>) -> AdmissionDecision {
        match self.check_inner(address, identity).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!("admission check failed open due to cache error: {err}");
                AdmissionDecision::Allow
            }
        }
    }

    async fn check_inner(&self, address: &str, identity: Option<&str>) -> Result<AdmissionDecision, CacheError> {
        if self.cache.exists(&Self::address_block_key(address)).await? {
            return Ok(AdmissionDecision::Deny);
        }
        if let Some(identity) = identity {
            if self.cache.exists(&Self::identity_block_key(identity)).await? {
                return Ok(AdmissionDecision::Deny);
            }
        }
        Ok(AdmissionDecision::Allow)
    }

    /// Records a connection attempt and blocks the address/identity once it
    /// crosses its rate limit among currently live sockets.
    pub async fn track(&self, address: &str, socket_id: &str, identity: Option<&str>) {
        if let Err(err) = self.track_inner(address, socket_id, identity).await {
            warn!("admission tracking failed open due to cache error: {err}");
        }
    }

    async fn track_inner(&self, address: &str, socket_id: &str, identity: Option<&str>) -> Result<(), CacheError> {
        let tracking = Tracking {
            address: address.to_string(),
            identity: identity.map(str::to_string),
        };
        self.cache
            .set_json(&Self::socket_key(socket_id), &tracking, self.config.tracking_window_seconds.max(60))
            .await?;

        self.cache.sadd(&Self::address_set_key(address), socket_id).await?;
        let address_count = self.cache.scard(&Self::address_set_key(address)).await?;
        if address_count > self.config.max_per_address as i64 {
            self.cache
                .set_with_ttl(&Self::address_block_key(address), "1", self.config.block_duration_seconds)
                .await?;
        }

        if let Some(identity) = identity {
            self.cache.sadd(&Self::identity_set_key(identity), socket_id).await?;
            let identity_count = self.cache.scard(&Self::identity_set_key(identity)).await?;
            if identity_count > self.config.max_per_identity as i64 {
                self.cache
                    .set_with_ttl(&Self::identity_block_key(identity), "1", self.config.block_duration_seconds)
                    .await?;
            }
        }

        Ok(())
    }

    /// Removes the socket from whichever address/identity sets `track`
    /// added it to, so a closed connection stops counting toward the limit.
    pub async fn untrack(&self, socket_id: &str) {
        if let Err(err) = self.untrack_inner(socket_id).await {
            warn!("failed to clear admission tracking for socket {socket_id}: {err}");
        }
    }

    async fn untrack_inner(&self, socket_id: &str) -> Result<(), CacheError> {
        if let Some(tracking) = self.cache.get_json::<Tracking>(&Self::socket_key(socket_id)).await? {
            self.cache.srem(&Self::address_set_key(&tracking.address), socket_id).await?;
            if let Some(identity) = &tracking.identity {
                self.cache.srem(&Self::identity_set_key(identity), socket_id).await?;
            }
        }
        self.cache.delete(&Self::socket_key(socket_id)).await?;
        Ok(())
    }

    pub async fn stats(&self, address: &str, identity: Option<&str>) -> AdmissionStats {
        let address_count = self.cache.scard(&Self::address_set_key(address)).await.unwrap_or(0);
        let address_blocked = self
            .cache
            .exists(&Self::address_block_key(address))
            .await
            .unwrap_or(false);

        let (identity_count, identity_blocked) = match identity {
            Some(identity) => {
                let count = self.cache.scard(&Self::identity_set_key(identity)).await.unwrap_or(0);
                let blocked = self
                    .cache
                    .exists(&Self::identity_block_key(identity))
                    .await
                    .unwrap_or(false);
                (count, blocked)
            }
            None => (0, false),
        };

        AdmissionStats {
            address_count,
            address_blocked,
            identity_count,
            identity_blocked,
        }
    }

    pub async fn unblock_address(&self, address: &str) -> Result<(), CacheError> {
        self.cache.delete(&Self::address_block_key(address)).await
    }

    pub async fn unblock_identity(&self, identity: &str) -> Result<(), CacheError> {
        self.cache.delete(&Self::identity_block_key(identity)).await
    }
}
