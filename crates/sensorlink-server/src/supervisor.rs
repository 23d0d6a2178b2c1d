//! Process supervisor
//!
//! Builds the store, hub and link manager once, serves both listeners, and
//! on SIGINT/SIGTERM stops everything, closing the serial link before
//! returning.

use anyhow::{Context, Result};
use axum::Router;
use sensorlink_core::datalog::{record_from, ReadingLog};
use sensorlink_core::prelude::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::routes::{self, AppState};

/// Run until a termination signal arrives.
pub async fn run(config: Config) -> Result<()> {
    let store = ReadingStore::new();
    let hub = SubscriberHub::new(store.clone());
    let log = ReadingLog::new(config.history_size);
    let shutdown = CancellationToken::new();

    let mut locator = DeviceLocator::new();
    if let Some(device) = &config.device {
        info!(device = %device, "auto-detection disabled, using configured device");
        locator = locator.pin(device.clone());
    }
    let link_config = LinkConfig {
        baud_rate: config.baud_rate,
        ..LinkConfig::default()
    };
    let manager = LinkManager::new(
        SerialBackend,
        locator,
        link_config,
        Ingestor::new(hub.clone()),
    );

    let state = AppState {
        query: QueryService::new(store, log.clone()),
        hub: hub.clone(),
        link: manager.status(),
        shutdown: shutdown.clone(),
    };

    let http_addr = SocketAddr::new(config.bind, config.http_port);
    let http_listener = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {http_addr}"))?;
    let ws_addr = SocketAddr::new(config.bind, config.ws_port);
    let ws_listener = TcpListener::bind(ws_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {ws_addr}"))?;
    info!("HTTP server listening on http://{http_addr}");
    info!("WebSocket server listening on ws://{ws_addr}");

    let recorder = tokio::spawn(record_from(log, hub.register(), shutdown.clone()));
    let link = tokio::spawn(manager.run(shutdown.clone()));
    let http = tokio::spawn(serve(
        http_listener,
        routes::http_router(state.clone()),
        shutdown.clone(),
    ));
    let ws = tokio::spawn(serve(ws_listener, routes::ws_router(state), shutdown.clone()));

    shutdown_signal().await;
    shutdown.cancel();

    // Serial link closes first
    if let Err(e) = link.await {
        error!("link manager task failed: {e}");
    }

    let (http, ws, recorder) = tokio::join!(http, ws, recorder);
    for (name, result) in [("HTTP", http), ("WebSocket", ws)] {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{name} server stopped with error: {e}"),
            Err(e) => error!("{name} server task failed: {e}"),
        }
    }
    if let Err(e) = recorder {
        error!("reading recorder task failed: {e}");
    }

    info!("Shutdown complete.");
    Ok(())
}

/// Serve `router` on `listener` until `shutdown` fires.
pub async fn serve(listener: TcpListener, router: Router, shutdown: CancellationToken) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Resolve on Ctrl-C or (on unix) SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => info!("SIGTERM received, initiating shutdown."),
    }
}
