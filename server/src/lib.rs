//! # Dungeon Hub Server
//!
//! Authoritative server for the shared dungeon scene. Players connect over a
//! WebSocket, receive a snapshot of every unit on the map, and from then on
//! exchange small binary events that keep every replica in step with the
//! server's world.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server owns the canonical [`shared::World`]. A fixed-rate clock steps
//! moving units and advances animation frames; the same clock runs in each
//! client so replicas move smoothly between events.
//!
//! ### Connection Lifecycle
//! Each WebSocket gets a freshly spawned unit and an `Init` snapshot. Others
//! are told through `Connect`. When the socket closes (cleanly, on error, or
//! after going silent) the unit is removed and an `Exit` is broadcast.
//!
//! ### Event Fan-out
//! Movement events from a client are validated, applied to the world and
//! broadcast to every player, the sender included: a replica moves its own
//! unit only once the server has accepted the move.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Listen address, WebSocket path, per-connection queue size and the
//! keepalive timings.
//!
//! ### Hub Module (`hub`)
//! A single task owning the set of connected peers. Broadcasts never block:
//! a peer whose outbound queue is full is disconnected instead of stalling
//! everyone else.
//!
//! ### Connection Module (`connection`)
//! Join and leave handling plus the two pumps that move frames between a
//! socket and the world.
//!
//! ### Network Module (`network`)
//! The accept loop, the handshake path check and the background tasks (hub,
//! simulation clock, periodic position snapshots).
//!
//! ## Ordering
//!
//! Every world mutation that produces a broadcast queues that broadcast while
//! still holding the world's write lock, and the hub processes commands from
//! one channel in order. Each peer therefore sees events in the order the
//! world applied them, and a joining player's `Init` snapshot is followed by
//! exactly the events applied after it.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!
//!     // Runs until the process is stopped
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod hub;
pub mod network;
