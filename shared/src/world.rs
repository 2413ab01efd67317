//! The world state machine.
//!
//! [`WorldState`] is the plain, synchronous map of units plus the rules for
//! applying events and simulation ticks. [`World`] wraps it in a single
//! async `RwLock` and is shared between the tasks that mutate it: player
//! allocation, inbound event handling and the simulation clock. Every
//! mutation holds the write lock for its whole read-modify-write.
//!
//! The same type runs in two modes. The authoritative world (the server)
//! allocates player ids. A replica (a client) only mirrors what the
//! authoritative side sends it; its clock integrates the replicated actions
//! between updates.

use crate::event::Event;
use crate::unit::{Action, PlayerId, Unit};
use crate::{FRAME_TICKS, SPAWN_X, SPAWN_Y, TICK_RATE, UNIT_STEP};
use log::{debug, info, warn};
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Authoritative,
    Replica,
}

#[derive(Debug, Clone, Copy)]
pub struct WorldConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Distance a moving unit covers per tick.
    pub step: f64,
    /// Ticks between animation frames; 0 freezes animation.
    pub frame_ticks: u64,
    pub spawn_x: f64,
    pub spawn_y: f64,
    /// Maximum random offset applied to each spawn coordinate.
    pub spawn_jitter: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            step: UNIT_STEP,
            frame_ticks: FRAME_TICKS,
            spawn_x: SPAWN_X,
            spawn_y: SPAWN_Y,
            spawn_jitter: 16.0,
        }
    }
}

impl WorldConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("only the authoritative world can allocate players")]
    NotAuthoritative,
    #[error("player {0} already exists")]
    DuplicateId(PlayerId),
}

#[derive(Debug, Clone)]
pub struct WorldState {
    mode: Mode,
    config: WorldConfig,
    units: HashMap<PlayerId, Unit>,
    self_id: Option<PlayerId>,
    next_id: PlayerId,
    ticks: u64,
}

impl WorldState {
    pub fn new(mode: Mode, config: WorldConfig) -> Self {
        Self {
            mode,
            config,
            units: HashMap::new(),
            self_id: None,
            next_id: 1,
            ticks: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The local player's id; only ever set on a replica by `Init`.
    pub fn self_id(&self) -> Option<PlayerId> {
        self.self_id
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit(&self, id: PlayerId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Snapshot of every unit, ordered by id.
    pub fn units(&self) -> Vec<Unit> {
        let mut units: Vec<Unit> = self.units.values().cloned().collect();
        units.sort_by_key(|unit| unit.id);
        units
    }

    /// Allocates a fresh player id and spawns its unit.
    pub fn add_player(&mut self) -> Result<Unit, WorldError> {
        if self.mode != Mode::Authoritative {
            return Err(WorldError::NotAuthoritative);
        }

        let id = self.next_id;
        if self.units.contains_key(&id) {
            debug_assert!(false, "player id {} allocated twice", id);
            return Err(WorldError::DuplicateId(id));
        }
        self.next_id += 1;

        let (x, y) = self.spawn_point();
        let unit = Unit::new(id, x, y);

        info!("Added player {} at ({:.1}, {:.1})", id, x, y);
        self.units.insert(id, unit.clone());
        Ok(unit)
    }

    /// Drops a unit without going through an `Exit` event. Used to roll back
    /// a join that failed before anyone else heard about it.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Unit> {
        self.units.remove(&id)
    }

    fn spawn_point(&self) -> (f64, f64) {
        let jitter = self.config.spawn_jitter;
        if jitter <= 0.0 {
            return (self.config.spawn_x, self.config.spawn_y);
        }

        let mut rng = rand::thread_rng();
        (
            self.config.spawn_x + rng.gen_range(-jitter..=jitter),
            self.config.spawn_y + rng.gen_range(-jitter..=jitter),
        )
    }

    /// Applies one replicated event. Returns whether the event was accepted;
    /// re-applying an accepted event leaves the state unchanged.
    pub fn apply(&mut self, event: &Event) -> bool {
        match event {
            Event::Move {
                player_id,
                direction,
            } => self.update_unit(*player_id, event, |unit| {
                unit.set_action(Action::moving(*direction))
            }),

            Event::Idle { player_id } => {
                self.update_unit(*player_id, event, |unit| unit.set_action(Action::Idle))
            }

            Event::Connect { unit } => match self.mode {
                Mode::Replica => {
                    debug!("Player {} is now visible", unit.id);
                    self.units.insert(unit.id, unit.clone());
                    true
                }
                // The server already holds the unit; the event only announces it.
                Mode::Authoritative => self.units.contains_key(&unit.id),
            },

            Event::Init { player_id, units } => {
                if self.mode != Mode::Replica {
                    warn!("Ignoring init for player {} on authoritative world", player_id);
                    return false;
                }

                self.units = units.iter().map(|unit| (unit.id, unit.clone())).collect();
                self.self_id = Some(*player_id);
                info!(
                    "Joined as player {} with {} units in view",
                    player_id,
                    self.units.len()
                );
                true
            }

            Event::Exit { player_id } => {
                if self.units.remove(player_id).is_some() {
                    info!("Removed player {}", player_id);
                } else {
                    debug!("Player {} already removed", player_id);
                }
                true
            }

            Event::Sync { units } => {
                if self.mode != Mode::Replica {
                    warn!("Ignoring sync on authoritative world");
                    return false;
                }

                for unit in units {
                    self.units.insert(unit.id, unit.clone());
                }
                true
            }
        }
    }

    fn update_unit(&mut self, id: PlayerId, event: &Event, update: impl FnOnce(&mut Unit)) -> bool {
        match self.units.get_mut(&id) {
            Some(unit) => {
                update(unit);
                true
            }
            None => {
                warn!("Dropping {} event for unknown player {}", event.kind(), id);
                false
            }
        }
    }

    /// Advances the simulation by one fixed step.
    pub fn tick(&mut self) {
        self.ticks += 1;

        let step = self.config.step;
        let animate = self.config.frame_ticks > 0 && self.ticks % self.config.frame_ticks == 0;

        for unit in self.units.values_mut() {
            unit.advance(step);
            if animate {
                unit.next_frame();
            }
        }
    }
}

/// Shared handle around [`WorldState`].
#[derive(Debug)]
pub struct World {
    mode: Mode,
    tick_interval: Duration,
    state: RwLock<WorldState>,
}

impl World {
    pub fn new(mode: Mode, config: WorldConfig) -> Self {
        Self {
            mode,
            tick_interval: config.tick_interval(),
            state: RwLock::new(WorldState::new(mode, config)),
        }
    }

    pub fn authoritative(config: WorldConfig) -> Self {
        Self::new(Mode::Authoritative, config)
    }

    pub fn replica(config: WorldConfig) -> Self {
        Self::new(Mode::Replica, config)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, WorldState> {
        self.state.read().await
    }

    /// Exclusive access, for callers that must pair a mutation with another
    /// action (such as queueing a broadcast) under the same lock.
    pub async fn write(&self) -> RwLockWriteGuard<'_, WorldState> {
        self.state.write().await
    }

    pub async fn add_player(&self) -> Result<Unit, WorldError> {
        self.state.write().await.add_player()
    }

    pub async fn handle_event(&self, event: &Event) -> bool {
        self.state.write().await.apply(event)
    }

    pub async fn units(&self) -> Vec<Unit> {
        self.state.read().await.units()
    }

    pub async fn unit(&self, id: PlayerId) -> Option<Unit> {
        self.state.read().await.unit(id).cloned()
    }

    pub async fn self_id(&self) -> Option<PlayerId> {
        self.state.read().await.self_id()
    }

    /// Runs the simulation clock forever at the configured tick rate.
    pub async fn evolve(&self) {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        ticker.tick().await;

        debug!("Simulation clock running every {:?}", self.tick_interval);
        loop {
            ticker.tick().await;
            self.state.write().await.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Direction, Facing, Skin};
    use assert_approx_eq::assert_approx_eq;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn fixed_config() -> WorldConfig {
        WorldConfig {
            spawn_jitter: 0.0,
            ..WorldConfig::default()
        }
    }

    fn authoritative() -> WorldState {
        WorldState::new(Mode::Authoritative, fixed_config())
    }

    fn replica() -> WorldState {
        WorldState::new(Mode::Replica, fixed_config())
    }

    fn unit_at(id: PlayerId, x: f64, y: f64) -> Unit {
        Unit::new(id, x, y)
    }

    #[test]
    fn test_add_player_ids_are_distinct() {
        let mut world = authoritative();
        let mut seen = HashSet::new();

        for expected_len in 1..=50 {
            let unit = world.add_player().unwrap();
            assert!(seen.insert(unit.id), "id {} handed out twice", unit.id);
            assert_eq!(world.len(), expected_len);
            assert!(world.unit(unit.id).is_some());
        }
    }

    #[test]
    fn test_add_player_defaults() {
        let mut world = authoritative();
        let unit = world.add_player().unwrap();

        assert_eq!(unit.id, 1);
        assert_eq!(unit.x, SPAWN_X);
        assert_eq!(unit.y, SPAWN_Y);
        assert_eq!(unit.action, Action::Idle);
        assert_eq!(unit.facing, Facing::Right);
        assert_eq!(unit.skin, Skin::for_player(1));
    }

    #[test]
    fn test_add_player_ids_not_reused_after_exit() {
        let mut world = authoritative();
        let first = world.add_player().unwrap();
        world.apply(&Event::Exit {
            player_id: first.id,
        });

        let second = world.add_player().unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_spawn_jitter_stays_in_range() {
        let mut world = WorldState::new(Mode::Authoritative, WorldConfig::default());
        for _ in 0..20 {
            let unit = world.add_player().unwrap();
            assert!((unit.x - SPAWN_X).abs() <= 16.0);
            assert!((unit.y - SPAWN_Y).abs() <= 16.0);
        }
    }

    #[test]
    fn test_replica_cannot_add_player() {
        let mut world = replica();
        assert_eq!(world.add_player(), Err(WorldError::NotAuthoritative));
        assert!(world.is_empty());
    }

    #[test]
    fn test_move_sets_action_and_facing() {
        let mut world = authoritative();
        let id = world.add_player().unwrap().id;

        assert!(world.apply(&Event::Move {
            player_id: id,
            direction: Direction::Left,
        }));

        let unit = world.unit(id).unwrap();
        assert_eq!(unit.action, Action::MoveLeft);
        assert_eq!(unit.facing, Facing::Left);
    }

    #[test]
    fn test_move_for_unknown_player_is_ignored() {
        let mut world = authoritative();
        world.add_player().unwrap();
        let before = world.units();

        assert!(!world.apply(&Event::Move {
            player_id: 99,
            direction: Direction::Up,
        }));
        assert_eq!(world.units(), before);
    }

    #[test]
    fn test_idle_stops_movement() {
        let mut world = authoritative();
        let id = world.add_player().unwrap().id;

        world.apply(&Event::Move {
            player_id: id,
            direction: Direction::Right,
        });
        world.tick();
        world.apply(&Event::Idle { player_id: id });

        let x = world.unit(id).unwrap().x;
        world.tick();
        world.tick();

        let unit = world.unit(id).unwrap();
        assert_eq!(unit.action, Action::Idle);
        assert_eq!(unit.facing, Facing::Right);
        assert_eq!(unit.x, x);
    }

    #[test]
    fn test_repeated_move_is_idempotent() {
        let mut world = authoritative();
        let id = world.add_player().unwrap().id;
        let event = Event::Move {
            player_id: id,
            direction: Direction::Down,
        };

        world.apply(&event);
        for _ in 0..FRAME_TICKS {
            world.tick();
        }
        let after_first = world.unit(id).cloned().unwrap();

        world.apply(&event);
        assert_eq!(world.unit(id), Some(&after_first));
    }

    #[test]
    fn test_exit_is_idempotent() {
        let mut world = authoritative();
        let id = world.add_player().unwrap().id;
        let other = world.add_player().unwrap().id;

        assert!(world.apply(&Event::Exit { player_id: id }));
        assert!(world.unit(id).is_none());
        assert_eq!(world.len(), 1);

        assert!(world.apply(&Event::Exit { player_id: id }));
        assert_eq!(world.len(), 1);
        assert!(world.unit(other).is_some());
    }

    #[test]
    fn test_init_replaces_replica_state() {
        let mut world = replica();
        world.apply(&Event::Connect {
            unit: unit_at(40, 1.0, 1.0),
        });

        let snapshot = vec![unit_at(1, 10.0, 20.0), unit_at(2, 30.0, 40.0)];
        assert!(world.apply(&Event::Init {
            player_id: 2,
            units: snapshot.clone(),
        }));

        assert_eq!(world.units(), snapshot);
        assert_eq!(world.self_id(), Some(2));
    }

    #[test]
    fn test_init_ignored_on_authoritative() {
        let mut world = authoritative();
        world.add_player().unwrap();

        assert!(!world.apply(&Event::Init {
            player_id: 5,
            units: vec![],
        }));
        assert_eq!(world.len(), 1);
        assert_eq!(world.self_id(), None);
    }

    #[test]
    fn test_connect_on_replica_inserts_unit() {
        let mut world = replica();
        let unit = unit_at(3, 5.0, 6.0);

        assert!(world.apply(&Event::Connect { unit: unit.clone() }));
        assert_eq!(world.unit(3), Some(&unit));

        // Applying it again overwrites rather than duplicates.
        assert!(world.apply(&Event::Connect { unit }));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_connect_on_authoritative_is_informational() {
        let mut world = authoritative();
        let unit = world.add_player().unwrap();

        assert!(world.apply(&Event::Connect { unit: unit.clone() }));
        assert!(!world.apply(&Event::Connect {
            unit: unit_at(77, 0.0, 0.0),
        }));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_sync_upserts_on_replica() {
        let mut world = replica();
        world.apply(&Event::Init {
            player_id: 1,
            units: vec![unit_at(1, 0.0, 0.0), unit_at(2, 0.0, 0.0)],
        });

        assert!(world.apply(&Event::Sync {
            units: vec![unit_at(1, 50.0, 60.0)],
        }));

        assert_eq!(world.unit(1).unwrap().x, 50.0);
        assert_eq!(world.unit(2).unwrap().x, 0.0);
        assert_eq!(world.len(), 2);
    }

    #[test]
    fn test_sync_ignored_on_authoritative() {
        let mut world = authoritative();
        assert!(!world.apply(&Event::Sync {
            units: vec![unit_at(1, 0.0, 0.0)],
        }));
        assert!(world.is_empty());
    }

    #[test]
    fn test_tick_moves_right_by_step() {
        let mut world = authoritative();
        let id = world.add_player().unwrap().id;
        let start = world.unit(id).cloned().unwrap();

        world.apply(&Event::Move {
            player_id: id,
            direction: Direction::Right,
        });

        let ticks = 37;
        for _ in 0..ticks {
            world.tick();
        }

        let unit = world.unit(id).unwrap();
        assert_approx_eq!(unit.x, start.x + ticks as f64 * UNIT_STEP);
        assert_eq!(unit.y, start.y);
    }

    #[test]
    fn test_tick_on_empty_world() {
        let mut world = authoritative();
        world.tick();
        world.tick();
        assert_eq!(world.ticks(), 2);
        assert!(world.is_empty());
    }

    #[test]
    fn test_animation_cadence() {
        let mut world = authoritative();
        let id = world.add_player().unwrap().id;

        for _ in 0..FRAME_TICKS - 1 {
            world.tick();
        }
        assert_eq!(world.unit(id).unwrap().frame, 0);

        world.tick();
        assert_eq!(world.unit(id).unwrap().frame, 1);
    }

    #[test]
    fn test_units_snapshot_is_sorted() {
        let mut world = replica();
        for id in [5, 1, 3] {
            world.apply(&Event::Connect {
                unit: unit_at(id, 0.0, 0.0),
            });
        }

        let ids: Vec<PlayerId> = world.units().iter().map(|unit| unit.id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn test_world_handle_roundtrip() {
        let world = World::authoritative(fixed_config());

        tokio_test::block_on(async {
            let unit = world.add_player().await.unwrap();
            assert!(
                world
                    .handle_event(&Event::Move {
                        player_id: unit.id,
                        direction: Direction::Up,
                    })
                    .await
            );
            assert_eq!(world.unit(unit.id).await.unwrap().action, Action::MoveUp);
            assert_eq!(world.units().await.len(), 1);
            assert_eq!(world.self_id().await, None);
        });
    }

    #[tokio::test]
    async fn test_evolve_advances_moving_units() {
        let world = Arc::new(World::authoritative(fixed_config()));
        let unit = world.add_player().await.unwrap();
        world
            .handle_event(&Event::Move {
                player_id: unit.id,
                direction: Direction::Down,
            })
            .await;

        let clock = {
            let world = Arc::clone(&world);
            tokio::spawn(async move { world.evolve().await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        clock.abort();

        let moved = world.unit(unit.id).await.unwrap();
        assert!(moved.y > unit.y);
        assert_eq!(moved.x, unit.x);
        assert!(world.read().await.ticks() > 0);
    }
}
