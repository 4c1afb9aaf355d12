mod configuration;
mod consumer;
mod pipeline;
mod register;
mod ticker;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use auction_cache::{CacheClient, CacheConfig};
use auction_queue::QueueClient;
use auction_store::StorePool;
use clap::Parser;
use configuration::Configuration;
use env_logger::Env;
use log::info;
use register::Register;
use tokio::signal;
use tokio::signal::unix::{signal, SignalKind};

use crate::pipeline::Pipeline;
use crate::ticker::LifecycleTicker;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Config file
    #[clap(short, long)]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("starting auction-processor");

    let register = Register::new(Configuration::new(&Args::parse().config)?);

    let store = StorePool::connect(&register.config.store().database_url)?;
    store.run_pending_migrations()?;
    let store = Arc::new(store);

    let cache_section = register.config.cache();
    let cache = CacheClient::connect(&CacheConfig {
        host: cache_section.host.clone(),
        port: cache_section.port,
        password: cache_section.password.clone(),
    })
    .await?;

    let queue = QueueClient::connect_or_degrade(&register.config.queue().url).await;

    let bidding = register.config.bidding();
    let pipeline = Arc::new(Pipeline {
        store: store.clone(),
        cache: cache.clone(),
        queue: queue.clone(),
        minimum_increment: bidding.minimum_increment,
        lock_ttl_ms: bidding.lock_ttl_seconds * 1000,
    });

    tokio::spawn(consumer::run(queue, pipeline));

    let ticker = LifecycleTicker {
        store,
        cache,
        interval: Duration::from_secs(register.config.lifecycle_ticker().interval_seconds),
    };
    tokio::spawn(ticker.run());

    let metrics_bind_address = register.config.prometheus_exporter_bind_address();
    tokio::spawn(async move {
        if let Err(err) = auction_metrics::serve(&metrics_bind_address).await {
            log::error!("metrics exporter stopped: {err}");
        }
    });

    wait_termination().await;

    info!("shutting down auction-processor");
    Ok(())
}

async fn wait_termination() {
    let mut term = signal(SignalKind::terminate()).unwrap();
    let mut inter = signal(SignalKind::interrupt()).unwrap();

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("ctrl-c pressed");
        },
        _ = term.recv() => {
            info!("terminate signal received");
        },
        _ = inter.recv() => {
            info!("interrupt signal received");
        },
    }
}
