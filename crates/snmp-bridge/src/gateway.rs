// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway orchestration.
//!
//! Binds every socket up front, then runs the request proxy, trap relay,
//! heartbeat and HTTP sink as independent tasks sharing one read-only table.

use crate::config::{ConfigError, GatewayConfig};
use crate::heartbeat::Heartbeat;
use crate::http_sink;
use crate::proxy::RequestProxy;
use crate::stats::{GatewayStats, GatewayStatsSnapshot};
use crate::table::TranslationTable;
use crate::trap::TrapRelay;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Gateway startup errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to bind {component} on {addr}: {source}")]
    Bind {
        component: &'static str,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

fn bind_error(component: &'static str, addr: SocketAddr) -> impl FnOnce(io::Error) -> GatewayError {
    move |source| GatewayError::Bind {
        component,
        addr,
        source,
    }
}

/// Configured, not yet started gateway.
#[derive(Debug)]
pub struct Gateway {
    config: Arc<GatewayConfig>,
    table: Arc<TranslationTable>,
    stats: Arc<GatewayStats>,
}

impl Gateway {
    /// Validate the configuration and build the translation table.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let table = config.translation_table()?;

        Ok(Self {
            config: Arc::new(config),
            table: Arc::new(table),
            stats: Arc::new(GatewayStats::new()),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn table(&self) -> &TranslationTable {
        &self.table
    }

    /// Bind all sockets and spawn the component tasks.
    pub async fn start(self) -> Result<GatewayHandle, GatewayError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let proxy_settings = self.config.proxy_settings();
        let proxy_listen = proxy_settings.listen;
        let proxy = RequestProxy::bind(proxy_settings, self.table.clone(), self.stats.clone())
            .await
            .map_err(bind_error("request proxy", proxy_listen))?;

        let trap_settings = self.config.trap_settings();
        let trap_listen = trap_settings.listen;
        let trap = TrapRelay::bind(trap_settings, self.table.clone(), self.stats.clone())
            .await
            .map_err(bind_error("trap relay", trap_listen))?;

        let heartbeat = match self.config.heartbeat_settings() {
            Some(settings) => {
                let destination = settings.destination;
                Some(
                    Heartbeat::bind(settings, self.stats.clone())
                        .await
                        .map_err(bind_error("heartbeat", destination))?,
                )
            }
            None => {
                info!("Heartbeat disabled (no heartbeat_ip)");
                None
            }
        };

        let http = if self.config.http_enabled {
            let addr = self.config.http_bind;
            Some(
                TcpListener::bind(addr)
                    .await
                    .map_err(bind_error("HTTP sink", addr))?,
            )
        } else {
            None
        };

        let request_addr = proxy
            .local_addr()
            .map_err(bind_error("request proxy", proxy_listen))?;
        let trap_addr = trap
            .local_addr()
            .map_err(bind_error("trap relay", trap_listen))?;
        let http_addr = match &http {
            Some(listener) => Some(
                listener
                    .local_addr()
                    .map_err(bind_error("HTTP sink", self.config.http_bind))?,
            ),
            None => None,
        };

        let mut tasks = Vec::with_capacity(4);
        tasks.push(("request proxy", tokio::spawn(proxy.run(shutdown_rx.clone()))));
        tasks.push(("trap relay", tokio::spawn(trap.run(shutdown_rx.clone()))));

        if let Some(heartbeat) = heartbeat {
            tasks.push(("heartbeat", tokio::spawn(heartbeat.run(shutdown_rx.clone()))));
        }

        if let Some(listener) = http {
            let stats = self.stats.clone();
            let shutdown = shutdown_rx.clone();
            tasks.push((
                "HTTP sink",
                tokio::spawn(async move {
                    if let Err(e) = http_sink::serve(listener, stats, shutdown).await {
                        error!("HTTP sink failed: {}", e);
                    }
                }),
            ));
        }

        info!(
            "Gateway started with {} translation rules",
            self.table.len()
        );

        Ok(GatewayHandle {
            shutdown: shutdown_tx,
            tasks,
            stats: self.stats,
            request_addr,
            trap_addr,
            http_addr,
        })
    }
}

/// Handle to a running gateway.
#[derive(Debug)]
pub struct GatewayHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    stats: Arc<GatewayStats>,
    request_addr: SocketAddr,
    trap_addr: SocketAddr,
    http_addr: Option<SocketAddr>,
}

impl GatewayHandle {
    /// Bound request listener address.
    pub fn request_addr(&self) -> SocketAddr {
        self.request_addr
    }

    /// Bound trap listener address.
    pub fn trap_addr(&self) -> SocketAddr {
        self.trap_addr
    }

    /// Bound HTTP address, if the sink is enabled.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow()
    }

    /// Shared counters, for periodic reporting.
    pub fn stats(&self) -> Arc<GatewayStats> {
        self.stats.clone()
    }

    pub fn snapshot(&self) -> GatewayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Signal every task to stop and wait for them to finish.
    pub async fn shutdown(self) -> GatewayStatsSnapshot {
        // Receivers are held by the tasks, so this only fails if all have exited.
        let _ = self.shutdown.send(true);

        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                warn!("{} task ended abnormally: {}", name, e);
            }
        }

        info!("Gateway stopped");
        self.stats.snapshot()
    }
}
