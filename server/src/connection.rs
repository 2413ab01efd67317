//! One connected player: join handshake plus the inbound and outbound pumps.
//!
//! The WebSocket is split in two. The outbound pump is the only writer: it
//! drains the connection's bounded queue and sends keepalive pings. The
//! inbound pump reads frames, applies accepted events to the world and
//! rebroadcasts them. Whichever side stops first, teardown runs once, on
//! the inbound side: the player's `Exit` is applied and broadcast, the peer
//! is unregistered, and the outbound pump is awaited.

use crate::config::ServerConfig;
use crate::hub::{HubHandle, Peer};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode, encode, CodecError, Event, PlayerId, World, WorldError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::{interval, timeout};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;

type WsStream = WebSocketStream<TcpStream>;
type WsSink = SplitSink<WsStream, Message>;
type WsReceiver = SplitStream<WsStream>;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("could not join player: {0}")]
    Join(#[from] WorldError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
    #[error("no traffic from peer for {0:?}")]
    IdleTimeout(Duration),
    #[error("outbound queue rejected the init snapshot")]
    QueueRejected,
}

/// Runs a freshly upgraded socket until the player leaves.
pub async fn serve(
    socket: WsStream,
    addr: SocketAddr,
    world: Arc<World>,
    hub: HubHandle,
    config: Arc<ServerConfig>,
) -> Result<(), ConnectionError> {
    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
    let player_id = match join(&world, &hub, outbound_tx).await {
        Ok(player_id) => player_id,
        Err(e) => {
            refuse(socket, &e).await;
            return Err(e);
        }
    };
    info!("Player {} connected from {}", player_id, addr);

    let (sink, stream) = socket.split();
    let writer_done = Arc::new(Notify::new());

    let writer = {
        let config = Arc::clone(&config);
        let writer_done = Arc::clone(&writer_done);
        tokio::spawn(async move {
            let result = write_pump(sink, outbound_rx, &config).await;
            writer_done.notify_one();
            result
        })
    };

    let read_result = read_pump(stream, player_id, &world, &hub, &config, &writer_done).await;

    leave(player_id, &world, &hub).await;

    let write_result = match writer.await {
        Ok(result) => result,
        Err(e) => {
            error!("Outbound pump for player {} panicked: {}", player_id, e);
            Ok(())
        }
    };

    info!("Player {} disconnected", player_id);
    read_result.and(write_result)
}

/// Spawns the player's unit and announces it.
///
/// Runs under the world write lock so that the snapshot and the hub
/// registration sit at one point in the world's mutation order: every
/// event applied earlier is in the snapshot, and every later event is
/// queued behind the `Init`.
async fn join(
    world: &World,
    hub: &HubHandle,
    outbound: mpsc::Sender<Bytes>,
) -> Result<PlayerId, ConnectionError> {
    let mut state = world.write().await;
    let unit = state.add_player()?;
    let player_id = unit.id;

    let messages = encode(&Event::Init {
        player_id,
        units: state.units(),
    })
    .and_then(|init| encode(&Event::Connect { unit }).map(|connect| (init, connect)));

    let (init, connect) = match messages {
        Ok(messages) => messages,
        Err(e) => {
            state.remove_player(player_id);
            return Err(e.into());
        }
    };

    if outbound.try_send(init).is_err() {
        state.remove_player(player_id);
        return Err(ConnectionError::QueueRejected);
    }

    hub.register(Peer::new(player_id, outbound));
    hub.broadcast(connect, Some(player_id));
    Ok(player_id)
}

/// Closes a socket whose player could not be admitted.
async fn refuse(mut socket: WsStream, reason: &ConnectionError) {
    warn!("Refusing connection: {}", reason);
    let frame = CloseFrame {
        code: CloseCode::Again,
        reason: Utf8Bytes::from_static("join failed"),
    };
    if let Err(e) = socket.close(Some(frame)).await {
        debug!("Close frame not delivered: {}", e);
    }
}

/// Removes the player's unit and tells everyone else.
async fn leave(player_id: PlayerId, world: &World, hub: &HubHandle) {
    let exit = Event::Exit { player_id };
    {
        let mut state = world.write().await;
        state.apply(&exit);
        match encode(&exit) {
            Ok(message) => hub.broadcast(message, Some(player_id)),
            Err(e) => error!("Failed to announce exit of player {}: {}", player_id, e),
        }
    }
    hub.unregister(player_id);
}

/// Events a client may send on its own behalf.
fn accepts_from(event: &Event, player_id: PlayerId) -> bool {
    match event {
        Event::Move { player_id: id, .. } | Event::Idle { player_id: id } => *id == player_id,
        Event::Connect { .. } | Event::Init { .. } | Event::Exit { .. } | Event::Sync { .. } => {
            false
        }
    }
}

enum Inbound {
    Continue,
    Leave,
}

async fn read_pump(
    mut stream: WsReceiver,
    player_id: PlayerId,
    world: &World,
    hub: &HubHandle,
    config: &ServerConfig,
    writer_done: &Notify,
) -> Result<(), ConnectionError> {
    loop {
        let next = tokio::select! {
            _ = writer_done.notified() => {
                debug!("Outbound pump for player {} stopped", player_id);
                return Ok(());
            }
            next = timeout(config.idle_timeout, stream.next()) => next,
        };

        let message = match next {
            Err(_) => return Err(ConnectionError::IdleTimeout(config.idle_timeout)),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Binary(data) => {
                if let Inbound::Leave = handle_frame(data, player_id, world, hub).await {
                    return Ok(());
                }
            }
            Message::Close(_) => return Ok(()),
            // Keepalive traffic; receiving it already reset the idle deadline.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Text(_) | Message::Frame(_) => {
                warn!("Ignoring non-binary message from player {}", player_id);
            }
        }
    }
}

async fn handle_frame(data: Bytes, player_id: PlayerId, world: &World, hub: &HubHandle) -> Inbound {
    let event = match decode(&data) {
        Ok(event) => event,
        Err(e) => {
            warn!("Dropping malformed frame from player {}: {}", player_id, e);
            return Inbound::Continue;
        }
    };

    if let Event::Exit { player_id: id } = event {
        if id == player_id {
            return Inbound::Leave;
        }
    }

    if !accepts_from(&event, player_id) {
        warn!(
            "Dropping {} event from player {} about {:?}",
            event.kind(),
            player_id,
            event.player_id()
        );
        return Inbound::Continue;
    }

    let mut state = world.write().await;
    if state.apply(&event) {
        // The sender is included: replicas only move on the authoritative echo.
        hub.broadcast(data, None);
    }
    Inbound::Continue
}

async fn write_pump(
    mut sink: WsSink,
    mut outbound: mpsc::Receiver<Bytes>,
    config: &ServerConfig,
) -> Result<(), ConnectionError> {
    let mut keepalive = interval(config.ping_period);
    keepalive.tick().await;

    let result = loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(data) => {
                    if let Err(e) = send(&mut sink, Message::Binary(data), config.write_timeout).await {
                        break Err(e);
                    }
                }
                None => break Ok(()),
            },
            _ = keepalive.tick() => {
                if let Err(e) = send(&mut sink, Message::Ping(Bytes::new()), config.write_timeout).await {
                    break Err(e);
                }
            }
        }
    };

    if let Err(e) = send(&mut sink, Message::Close(None), config.write_timeout).await {
        debug!("Close frame not delivered: {}", e);
    }
    result
}

async fn send(sink: &mut WsSink, message: Message, deadline: Duration) -> Result<(), ConnectionError> {
    match timeout(deadline, sink.send(message)).await {
        Ok(result) => result.map_err(ConnectionError::from),
        Err(_) => Err(ConnectionError::WriteTimeout(deadline)),
    }
}
