//! Replica client: mirrors the server's world over a WebSocket.

use crate::input::{Command, HELP};
use crate::view;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode, encode, CodecError, Event, World, WorldConfig};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
}

pub struct Client {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    world: Arc<World>,
    view_interval: Duration,
}

impl Client {
    pub async fn connect(url: &str, view_interval: Duration) -> Result<Self, ClientError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
        info!("Connected to {}", url);

        Ok(Client {
            socket,
            world: Arc::new(World::replica(WorldConfig::default())),
            view_interval,
        })
    }

    pub fn world(&self) -> Arc<World> {
        Arc::clone(&self.world)
    }

    /// Runs until the server closes the connection or the user quits.
    pub async fn run(self) -> Result<(), ClientError> {
        let (mut sink, mut stream) = self.socket.split();
        let world = self.world;

        let clock = {
            let world = Arc::clone(&world);
            tokio::spawn(async move { world.evolve().await })
        };

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        let mut view_timer = interval(self.view_interval.max(Duration::from_millis(1)));
        view_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        println!("{}", HELP);

        let result = loop {
            tokio::select! {
                message = stream.next() => match message {
                    Some(Ok(Message::Binary(data))) => match decode(&data) {
                        Ok(event) => apply(&world, &event).await,
                        Err(e) => warn!("Dropping malformed frame from server: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Server closed the connection");
                        break Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(e.into()),
                },
                line = lines.next_line(), if stdin_open => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            debug!("Input closed");
                            stdin_open = false;
                            continue;
                        }
                        Err(e) => break Err(e.into()),
                    };

                    let Some(command) = Command::parse(&line) else {
                        println!("{}", HELP);
                        continue;
                    };

                    let Some(player_id) = world.self_id().await else {
                        warn!("Not joined yet, ignoring {:?}", command);
                        continue;
                    };

                    if let Err(e) = send(&mut sink, &command.to_event(player_id)).await {
                        break Err(e);
                    }
                    if command == Command::Quit {
                        if let Err(e) = sink.send(Message::Close(None)).await {
                            debug!("Close frame not delivered: {}", e);
                        }
                        break Ok(());
                    }
                }
                _ = view_timer.tick() => {
                    let state = world.read().await;
                    print!("{}", view::render(&view::frame(&state.units(), state.self_id())));
                }
            }
        };

        clock.abort();
        if let Err(e) = &result {
            error!("Connection lost: {}", e);
        }
        result
    }
}

async fn apply(world: &World, event: &Event) {
    if let Event::Init { player_id, units } = event {
        info!("Joined as player {} with {} units on the map", player_id, units.len());
    }
    if !world.handle_event(event).await {
        debug!("Ignored {} event", event.kind());
    }
}

async fn send<S>(sink: &mut S, event: &Event) -> Result<(), ClientError>
where
    S: futures_util::Sink<Message, Error = tungstenite::Error> + Unpin,
{
    sink.send(Message::Binary(encode(event)?)).await?;
    Ok(())
}
