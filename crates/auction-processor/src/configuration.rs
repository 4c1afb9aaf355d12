use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusExporterConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfigSection {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BiddingConfig {
    pub minimum_increment: i64,
    pub lock_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleTickerConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    prometheus_exporter: PrometheusExporterConfig,
    cache: CacheConfigSection,
    queue: QueueConfig,
    store: StoreConfig,
    bidding: BiddingConfig,
    lifecycle_ticker: LifecycleTickerConfig,
}

impl Configuration {
    pub fn new(filename: &str) -> Result<Self> {
        Ok(Config::builder()
            .add_source(config::File::with_name(filename))
            .add_source(
                Environment::with_prefix("BP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Configuration>()?)
    }

    pub fn prometheus_exporter_bind_address(&self) -> String {
        self.prometheus_exporter.bind_address.clone()
    }

    pub fn cache(&self) -> &CacheConfigSection {
        &self.cache
    }

    pub fn queue(&self) -> &QueueConfig {
        &self.queue
    }

    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    pub fn bidding(&self) -> &BiddingConfig {
        &self.bidding
    }

    pub fn lifecycle_ticker(&self) -> &LifecycleTickerConfig {
        &self.lifecycle_ticker
    }
}
