//! Connection hub: owns the set of live peers and fans messages out to them.
//!
//! The set lives inside a single task ([`Hub::run`]) and is only reached
//! through a [`HubHandle`], so no lock guards it. Commands travel on one
//! ordered channel: the loop sees registrations and broadcasts in exactly
//! the order callers issued them.
//!
//! Broadcasting never waits on a peer. Each peer has a bounded outbound
//! queue; a peer whose queue is full (or already closed) is evicted on the
//! spot, which drops the hub's sender and lets that connection's outbound
//! pump observe a closed queue and shut down.

use bytes::Bytes;
use log::{debug, info, warn};
use shared::PlayerId;
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// A registered connection as seen by the hub.
#[derive(Debug)]
pub struct Peer {
    pub player_id: PlayerId,
    outbound: mpsc::Sender<Bytes>,
}

impl Peer {
    pub fn new(player_id: PlayerId, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            player_id,
            outbound,
        }
    }
}

#[derive(Debug)]
enum HubCommand {
    Register(Peer),
    Unregister(PlayerId),
    Broadcast {
        message: Bytes,
        exclude: Option<PlayerId>,
    },
    Count(oneshot::Sender<usize>),
}

/// Cheap, cloneable access to a running hub. All calls return immediately.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Adds a peer. Registering an id that is already present is ignored.
    pub fn register(&self, peer: Peer) {
        self.send(HubCommand::Register(peer));
    }

    /// Removes a peer; unknown ids are ignored.
    pub fn unregister(&self, player_id: PlayerId) {
        self.send(HubCommand::Unregister(player_id));
    }

    /// Queues `message` for every peer registered when the hub reaches this
    /// command, except `exclude`.
    pub fn broadcast(&self, message: Bytes, exclude: Option<PlayerId>) {
        self.send(HubCommand::Broadcast { message, exclude });
    }

    /// Number of registered peers, or 0 once the hub has stopped.
    pub async fn len(&self) -> usize {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Count(reply_tx));
        reply_rx.await.unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn send(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            debug!("Hub stopped; dropping command");
        }
    }
}

pub struct Hub {
    commands: mpsc::UnboundedReceiver<HubCommand>,
    peers: HashMap<PlayerId, Peer>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            commands: rx,
            peers: HashMap::new(),
        };
        (hub, HubHandle { commands: tx })
    }

    /// Serves commands until every handle has been dropped. Consumes the hub,
    /// so it can only be started once.
    pub async fn run(mut self) {
        info!("Hub started");

        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Register(peer) => self.register(peer),
                HubCommand::Unregister(player_id) => self.unregister(player_id),
                HubCommand::Broadcast { message, exclude } => self.broadcast(message, exclude),
                HubCommand::Count(reply) => {
                    let _ = reply.send(self.peers.len());
                }
            }
        }

        info!("Hub stopped with {} peers", self.peers.len());
    }

    fn register(&mut self, peer: Peer) {
        if self.peers.contains_key(&peer.player_id) {
            warn!("Player {} is already registered", peer.player_id);
            return;
        }

        debug!("Registered player {}", peer.player_id);
        self.peers.insert(peer.player_id, peer);
    }

    fn unregister(&mut self, player_id: PlayerId) {
        if self.peers.remove(&player_id).is_some() {
            debug!("Unregistered player {}", player_id);
        }
    }

    fn broadcast(&mut self, message: Bytes, exclude: Option<PlayerId>) {
        let mut evicted = Vec::new();

        for (player_id, peer) in &self.peers {
            if Some(*player_id) == exclude {
                continue;
            }

            match peer.outbound.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Outbound queue full for player {}, disconnecting", player_id);
                    evicted.push(*player_id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Outbound queue closed for player {}", player_id);
                    evicted.push(*player_id);
                }
            }
        }

        for player_id in evicted {
            self.peers.remove(&player_id);
        }
    }
}
