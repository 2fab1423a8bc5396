// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use did_gateway::api::router;
use did_gateway::config::Config;
use did_gateway::directory::{CredentialDirectory, HttpDirectory, StaticDirectory};
use did_gateway::state::AppState;
use did_gateway::store::{MemoryStore, RedisStore, SessionStore};

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("configuration error: {e}");
        std::process::exit(1);
    });

    let store: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisStore::connect(url)
                .await
                .expect("session store connection failed"),
        ),
        None => {
            tracing::warn!("REDIS_URL not set, using the in-memory session store");
            Arc::new(MemoryStore::new())
        }
    };

    let directory: Arc<dyn CredentialDirectory> = match &config.directory_url {
        Some(url) => Arc::new(HttpDirectory::new(url.clone())),
        None => {
            tracing::warn!("DIRECTORY_URL not set, credential lookups will return no data");
            Arc::new(StaticDirectory::new())
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("failed to parse bind address");

    let state = AppState::new(config, store, directory);
    let app = router(state);

    tracing::info!(%addr, "did-gateway listening (docs at /docs)");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
