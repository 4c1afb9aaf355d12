use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_address: String,
    /// The admin routes (`/admin/unblock`, `/admin/stats`) are served from
    /// this address instead, which deployments bind to a loopback or
    /// internal-only interface.
    pub admin_bind_address: String,
}

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
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionConfigSection {
    pub max_per_address: u32,
    pub max_per_identity: u32,
    pub tracking_window_seconds: u64,
    pub block_duration_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Configuration {
    http: HttpConfig,
    prometheus_exporter: PrometheusExporterConfig,
    cache: CacheConfigSection,
    queue: QueueConfig,
    auth: AuthConfig,
    admission: AdmissionConfigSection,
    store: StoreConfig,
}

impl Configuration {
    pub fn new(filename: &str) -> Result<Self> {
        Ok(Config::builder()
            .add_source(config::File::with_name(filename))
            .add_source(
                Environment::with_prefix("GW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Configuration>()?)
    }

    pub fn http(&self) -> &HttpConfig {
        &self.http
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

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    pub fn admission(&self) -> &AdmissionConfigSection {
        &self.admission
    }

    pub fn store(&self) -> &StoreConfig {
        &self.store
    }
}
