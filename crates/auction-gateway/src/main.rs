mod app;
mod auth;
mod configuration;
mod errors;
mod http;
mod register;
mod session;
mod subscriber;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use auction_admission::{AdmissionConfig, AdmissionController};
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

use crate::app::AppState;
use crate::session::Sessions;

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

    info!("starting auction-gateway");

    let register = Register::new(Configuration::new(&Args::parse().config)?);

    let store = Arc::new(StorePool::connect(&register.config.store().database_url)?);

    let cache_section = register.config.cache();
    let cache = CacheClient::connect(&CacheConfig {
        host: cache_section.host.clone(),
        port: cache_section.port,
        password: cache_section.password.clone(),
    })
    .await?;

    let queue = QueueClient::connect_or_degrade(&register.config.queue().url).await;

    let admission_section = register.config.admission();
    let admission = Arc::new(AdmissionController::new(
        cache.clone(),
        AdmissionConfig {
            max_per_address: admission_section.max_per_address,
            max_per_identity: admission_section.max_per_identity,
            tracking_window_seconds: admission_section.tracking_window_seconds,
            block_duration_seconds: admission_section.block_duration_seconds,
        },
    ));

    let sessions = Arc::new(Sessions::default());

    tokio::spawn(subscriber::run(cache.clone(), sessions.clone()));

    let metrics_bind_address = register.config.prometheus_exporter_bind_address();
    tokio::spawn(async move {
        if let Err(err) = auction_metrics::serve(&metrics_bind_address).await {
            log::error!("metrics exporter stopped: {err}");
        }
    });

    let state = AppState {
        cache,
        queue,
        store,
        admission,
        sessions,
        jwt_secret: Arc::new(register.config.auth().jwt_secret.clone()),
    };

    let admin_addr: SocketAddr = register.config.http().admin_bind_address.parse()?;
    let admin_router = app::build_admin_router(state.clone());
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(admin_addr).await {
            Ok(listener) => listener,
            Err(err) => {
                log::error!("failed to bind admin listener on {admin_addr}: {err}");
                return;
            }
        };
        info!("gateway admin surface listening on {admin_addr}");
        if let Err(err) = axum::serve(listener, admin_router.into_make_service()).await {
            log::error!("admin server stopped: {err}");
        }
    });

    let addr: SocketAddr = register.config.http().bind_address.parse()?;
    let router = app::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("gateway listening on {addr}");
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(wait_termination())
        .await?;

    info!("shutting down auction-gateway");
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
