//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer handle for anything stored in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Game tick counter (simulation time unit)
pub type Tick = u64;

/// Species of a body, and the donor tag carried by removed organs and limbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Species {
    Human,
    Reptilian,
    Moth,
    Vox,
    Slime,
}

impl Species {
    /// Slimes have no fixed anatomy to anchor organs or limbs into
    pub fn accepts_implants(&self) -> bool {
        !matches!(self, Species::Slime)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Human => "human",
            Species::Reptilian => "reptilian",
            Species::Moth => "moth",
            Species::Vox => "vox",
            Species::Slime => "slime",
        }
    }
}

/// 2D position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_ordering() {
        assert!(EntityId(1) < EntityId(2));
        assert_eq!(EntityId(3).to_string(), "#3");
    }

    #[test]
    fn test_slime_rejects_implants() {
        assert!(!Species::Slime.accepts_implants());
        assert!(Species::Human.accepts_implants());
        assert!(Species::Vox.accepts_implants());
    }

    #[test]
    fn test_vec2_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 0.0001);
    }
}
