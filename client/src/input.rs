//! Text command input, mapped to the movement events a player may send.

use shared::{Direction, Event, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Stop,
    Quit,
}

impl Command {
    /// Parses one input line. Supports both WASD and arrow-style words.
    pub fn parse(line: &str) -> Option<Self> {
        let command = match line.trim().to_ascii_lowercase().as_str() {
            "w" | "up" => Command::Move(Direction::Up),
            "s" | "down" => Command::Move(Direction::Down),
            "a" | "left" => Command::Move(Direction::Left),
            "d" | "right" => Command::Move(Direction::Right),
            "stop" | "idle" | "x" => Command::Stop,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return None,
        };
        Some(command)
    }

    /// The event to send for this command on behalf of `player_id`.
    pub fn to_event(self, player_id: PlayerId) -> Event {
        match self {
            Command::Move(direction) => Event::Move {
                player_id,
                direction,
            },
            Command::Stop => Event::Idle { player_id },
            Command::Quit => Event::Exit { player_id },
        }
    }
}

pub const HELP: &str = "Commands: w/a/s/d or up/down/left/right to move, stop to idle, quit to leave";
