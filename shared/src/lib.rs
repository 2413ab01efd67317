//! Types shared by the server and the replica client: the unit model, the
//! replicated event codec and the world state machine.

pub mod event;
pub mod unit;
pub mod world;

pub use event::{decode, encode, CodecError, Event, MAX_EVENT_BYTES};
pub use unit::{Action, Direction, Facing, PlayerId, Skin, Unit, FRAME_COUNT};
pub use world::{Mode, World, WorldConfig, WorldError, WorldState};

pub const TICK_RATE: u32 = 60;
pub const UNIT_STEP: f64 = 1.0;
/// Simulation ticks per animation frame.
pub const FRAME_TICKS: u64 = 5;
pub const SPAWN_X: f64 = 160.0;
pub const SPAWN_Y: f64 = 120.0;
