//! Replicated events and their wire codec.
//!
//! One WebSocket binary message carries exactly one bincode-encoded
//! [`Event`]. Decoding is size-limited and rejects trailing bytes so that
//! arbitrary input from a peer yields an error instead of a panic or an
//! oversized allocation.

use crate::unit::{Direction, PlayerId, Unit};
use bincode::Options;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest event `decode` accepts, snapshots included. Matches the
/// WebSocket layer's default frame cap.
pub const MAX_EVENT_BYTES: u64 = 16 << 20;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Event {
    Move {
        player_id: PlayerId,
        direction: Direction,
    },
    Idle {
        player_id: PlayerId,
    },
    Connect {
        unit: Unit,
    },
    Init {
        player_id: PlayerId,
        units: Vec<Unit>,
    },
    Exit {
        player_id: PlayerId,
    },
    /// Periodic authoritative positions, used by replicas to correct drift.
    Sync {
        units: Vec<Unit>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Move { .. } => "move",
            Event::Idle { .. } => "idle",
            Event::Connect { .. } => "connect",
            Event::Init { .. } => "init",
            Event::Exit { .. } => "exit",
            Event::Sync { .. } => "sync",
        }
    }

    /// The player this event is about, if it concerns a single player.
    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            Event::Move { player_id, .. }
            | Event::Idle { player_id }
            | Event::Init { player_id, .. }
            | Event::Exit { player_id } => Some(*player_id),
            Event::Connect { unit } => Some(unit.id),
            Event::Sync { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode {kind} event: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: bincode::Error,
    },
    #[error("failed to decode event: {0}")]
    Decode(#[source] bincode::Error),
}

fn options() -> impl Options {
    bincode::DefaultOptions::new().reject_trailing_bytes()
}

/// Encoding has no size limit; a snapshot grows with the number of players.
pub fn encode(event: &Event) -> Result<Bytes, CodecError> {
    options()
        .serialize(event)
        .map(Bytes::from)
        .map_err(|source| CodecError::Encode {
            kind: event.kind(),
            source,
        })
}

pub fn decode(data: &[u8]) -> Result<Event, CodecError> {
    options()
        .with_limit(MAX_EVENT_BYTES)
        .deserialize(data)
        .map_err(CodecError::Decode)
}
