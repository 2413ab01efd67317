//! Server network layer: WebSocket accept loop plus the background tasks that
//! keep the authoritative world running.

use crate::config::ServerConfig;
use crate::connection;
use crate::hub::{Hub, HubHandle};
use log::{debug, error, info, warn};
use shared::{encode, Event, World};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Main server: owns the listener, the authoritative world and the hub.
pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    world: Arc<World>,
    hub: Hub,
    hub_handle: HubHandle,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let address = config.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        let world = Arc::new(World::authoritative(config.world));
        let (hub, hub_handle) = Hub::new();

        Ok(Server {
            listener,
            config: Arc::new(config),
            world,
            hub,
            hub_handle,
        })
    }

    /// Bound address, useful when the configured port was 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn world(&self) -> Arc<World> {
        Arc::clone(&self.world)
    }

    pub fn hub(&self) -> HubHandle {
        self.hub_handle.clone()
    }

    /// Accepts connections forever. Only returns if the process is shutting down.
    pub async fn run(self) -> Result<(), ServerError> {
        tokio::spawn(self.hub.run());

        {
            let world = Arc::clone(&self.world);
            tokio::spawn(async move { world.evolve().await });
        }

        if !self.config.sync_interval.is_zero() {
            tokio::spawn(broadcast_snapshots(
                Arc::clone(&self.world),
                self.hub_handle.clone(),
                Arc::clone(&self.config),
            ));
        }

        info!(
            "Accepting WebSocket connections on path {}",
            self.config.ws_path
        );

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            debug!("TCP connection from {}", addr);
            tokio::spawn(handle_connection(
                stream,
                addr,
                Arc::clone(&self.world),
                self.hub_handle.clone(),
                Arc::clone(&self.config),
            ));
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    world: Arc<World>,
    hub: HubHandle,
    config: Arc<ServerConfig>,
) {
    let ws_path = config.ws_path.clone();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == ws_path {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let socket = match tokio_tungstenite::accept_hdr_async(stream, check_path).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    if let Err(e) = connection::serve(socket, addr, world, hub, config).await {
        error!("Connection from {} ended with error: {}", addr, e);
    }
}

/// Periodically sends every peer the authoritative positions so replicas
/// that drifted (missed ticks, late joins) snap back.
async fn broadcast_snapshots(world: Arc<World>, hub: HubHandle, config: Arc<ServerConfig>) {
    let mut ticker = interval(config.sync_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let state = world.read().await;
        if state.is_empty() {
            continue;
        }

        match encode(&Event::Sync {
            units: state.units(),
        }) {
            Ok(message) => hub.broadcast(message, None),
            Err(e) => error!("Failed to encode snapshot: {}", e),
        }
    }
}
