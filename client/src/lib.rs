//! # Dungeon Hub Client
//!
//! Headless replica client. It connects to the server's WebSocket endpoint,
//! keeps a replica [`shared::World`] in step with the server and prints the
//! scene as text.
//!
//! ## Replication Model
//!
//! The server is authoritative. The client never moves its own unit
//! locally: a command is sent as a `Move` or `Idle` event and takes effect
//! when the server echoes it back. Between events the replica runs the same
//! fixed-rate clock as the server, so moving units keep walking at the same
//! speed on both sides. Periodic `Sync` snapshots correct any drift.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Maps typed commands (`w/a/s/d`, `up/down/left/right`, `stop`, `quit`) to
//! the events a player may send.
//!
//! ### View Module (`view`)
//! Orders units for drawing (painter's order by y, then id) and renders one
//! line per unit with its sprite key and animation frame.
//!
//! ### Network Module (`network`)
//! The WebSocket connection, the replica world and the main select loop.

pub mod input;
pub mod network;
pub mod view;
