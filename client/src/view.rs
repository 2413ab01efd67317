//! Text rendering of a replica's units.

use shared::{PlayerId, Unit};
use std::cmp::Ordering;
use std::fmt::Write;

/// One unit as it would be drawn this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub key: String,
    pub frame: u32,
    pub flipped: bool,
    pub is_self: bool,
}

/// Units in painter's order: further up the screen first, ties broken by id
/// so the order is stable between frames.
pub fn frame(units: &[Unit], self_id: Option<PlayerId>) -> Vec<Sprite> {
    let mut sprites: Vec<Sprite> = units
        .iter()
        .map(|unit| Sprite {
            id: unit.id,
            x: unit.x,
            y: unit.y,
            key: unit.sprite_key(),
            frame: unit.frame,
            flipped: unit.facing == shared::Facing::Left,
            is_self: Some(unit.id) == self_id,
        })
        .collect();

    sprites.sort_by(|a, b| match a.y.total_cmp(&b.y) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
    sprites
}

pub fn render(sprites: &[Sprite]) -> String {
    let mut out = String::new();
    for sprite in sprites {
        let marker = if sprite.is_self { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{}{:>3} ({:>7.1}, {:>7.1}) {}_anim_f{}{}",
            marker,
            sprite.id,
            sprite.x,
            sprite.y,
            sprite.key,
            sprite.frame,
            if sprite.flipped { " <" } else { "" }
        );
    }
    out
}
