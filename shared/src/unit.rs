use serde::{Deserialize, Serialize};

pub type PlayerId = u32;

/// Every character sheet in the asset pack has four frames per animation.
pub const FRAME_COUNT: u32 = 4;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit vector in screen coordinates (up is -y).
    pub fn vector(self) -> (f64, f64) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Idle,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
}

impl Action {
    pub fn moving(direction: Direction) -> Self {
        match direction {
            Direction::Up => Action::MoveUp,
            Direction::Down => Action::MoveDown,
            Direction::Left => Action::MoveLeft,
            Direction::Right => Action::MoveRight,
        }
    }

    /// Direction of travel, `None` while idle.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Action::Idle => None,
            Action::MoveUp => Some(Direction::Up),
            Action::MoveDown => Some(Direction::Down),
            Action::MoveLeft => Some(Direction::Left),
            Action::MoveRight => Some(Direction::Right),
        }
    }

    pub fn is_moving(self) -> bool {
        self.direction().is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    Left,
    Right,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Skin {
    BigDemon,
    BigZombie,
    ElfF,
}

impl Skin {
    const ALL: [Skin; 3] = [Skin::BigDemon, Skin::BigZombie, Skin::ElfF];

    /// Skins are handed out round-robin so neighbouring players look different.
    pub fn for_player(id: PlayerId) -> Self {
        Self::ALL[id as usize % Self::ALL.len()]
    }

    pub fn asset_prefix(self) -> &'static str {
        match self {
            Skin::BigDemon => "big_demon",
            Skin::BigZombie => "big_zombie",
            Skin::ElfF => "elf_f",
        }
    }

    pub fn frame_count(self) -> u32 {
        FRAME_COUNT
    }
}

/// A player's avatar as replicated between server and clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Unit {
    pub id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub skin: Skin,
    pub action: Action,
    pub facing: Facing,
    pub frame: u32,
}

impl Unit {
    pub fn new(id: PlayerId, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            skin: Skin::for_player(id),
            action: Action::Idle,
            facing: Facing::Right,
            frame: 0,
        }
    }

    /// Switches to `action`, restarting the animation only on an actual change
    /// so that re-applying the same event is harmless.
    pub fn set_action(&mut self, action: Action) {
        if self.action != action {
            self.action = action;
            self.frame = 0;
        }
        match action {
            Action::MoveLeft => self.facing = Facing::Left,
            Action::MoveRight => self.facing = Facing::Right,
            _ => {}
        }
    }

    /// Integrates one simulation step along the current action.
    pub fn advance(&mut self, step: f64) {
        if let Some(direction) = self.action.direction() {
            let (dx, dy) = direction.vector();
            self.x += dx * step;
            self.y += dy * step;
        }
    }

    pub fn next_frame(&mut self) {
        self.frame = (self.frame + 1) % self.skin.frame_count();
    }

    /// Sprite sheet key for the renderer, e.g. `elf_f_run`.
    pub fn sprite_key(&self) -> String {
        let state = if self.action.is_moving() { "run" } else { "idle" };
        format!("{}_{}", self.skin.asset_prefix(), state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_unit_creation() {
        let unit = Unit::new(1, 100.0, 200.0);
        assert_eq!(unit.id, 1);
        assert_eq!(unit.x, 100.0);
        assert_eq!(unit.y, 200.0);
        assert_eq!(unit.action, Action::Idle);
        assert_eq!(unit.facing, Facing::Right);
        assert_eq!(unit.frame, 0);
    }

    #[test]
    fn test_skin_round_robin() {
        assert_eq!(Skin::for_player(0), Skin::BigDemon);
        assert_eq!(Skin::for_player(1), Skin::BigZombie);
        assert_eq!(Skin::for_player(2), Skin::ElfF);
        assert_eq!(Skin::for_player(3), Skin::BigDemon);
    }

    #[test]
    fn test_set_action_updates_facing() {
        let mut unit = Unit::new(1, 0.0, 0.0);
        unit.set_action(Action::MoveLeft);
        assert_eq!(unit.facing, Facing::Left);

        // Vertical movement and idling keep the last horizontal facing.
        unit.set_action(Action::MoveUp);
        assert_eq!(unit.facing, Facing::Left);
        unit.set_action(Action::Idle);
        assert_eq!(unit.facing, Facing::Left);

        unit.set_action(Action::MoveRight);
        assert_eq!(unit.facing, Facing::Right);
    }

    #[test]
    fn test_frame_resets_only_on_change() {
        let mut unit = Unit::new(1, 0.0, 0.0);
        unit.set_action(Action::MoveDown);
        unit.next_frame();
        unit.next_frame();
        assert_eq!(unit.frame, 2);

        unit.set_action(Action::MoveDown);
        assert_eq!(unit.frame, 2);

        unit.set_action(Action::Idle);
        assert_eq!(unit.frame, 0);
    }

    #[test]
    fn test_frame_wraps() {
        let mut unit = Unit::new(1, 0.0, 0.0);
        for _ in 0..FRAME_COUNT {
            unit.next_frame();
        }
        assert_eq!(unit.frame, 0);
    }

    #[test]
    fn test_advance_follows_direction() {
        let mut unit = Unit::new(1, 10.0, 10.0);
        unit.advance(2.0);
        assert_approx_eq!(unit.x, 10.0);

        unit.set_action(Action::MoveUp);
        unit.advance(2.0);
        assert_approx_eq!(unit.y, 8.0);
        assert_approx_eq!(unit.x, 10.0);

        unit.set_action(Action::MoveLeft);
        unit.advance(2.5);
        assert_approx_eq!(unit.x, 7.5);
    }

    #[test]
    fn test_sprite_key() {
        let mut unit = Unit::new(2, 0.0, 0.0);
        assert_eq!(unit.sprite_key(), "elf_f_idle");
        unit.set_action(Action::MoveRight);
        assert_eq!(unit.sprite_key(), "elf_f_run");
    }
}
