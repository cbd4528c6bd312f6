//! Holdable items and the hands that hold them

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::types::EntityId;
use crate::surgery::tools::ToolQuality;

/// Anything a user can pick up: tools, organs, severed limbs, modules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    /// Prototype identity, used by the capability allow-list
    pub prototype: String,
    pub qualities: BTreeSet<ToolQuality>,
    pub blunt_damage: f32,
    pub sharp: bool,
    /// Surface temperature in kelvin above ambient
    pub heat: f32,
}

impl Item {
    pub fn new(name: impl Into<String>, prototype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prototype: prototype.into(),
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: &str) -> Self {
        self.qualities.insert(ToolQuality::new(quality));
        self
    }

    pub fn with_blunt(mut self, damage: f32) -> Self {
        self.blunt_damage = damage;
        self
    }

    pub fn with_sharp(mut self) -> Self {
        self.sharp = true;
        self
    }

    pub fn with_heat(mut self, heat: f32) -> Self {
        self.heat = heat;
        self
    }
}

/// Hand slots of a user; `active` indexes the hand in use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hands {
    pub slots: Vec<Option<EntityId>>,
    pub active: usize,
}

impl Hands {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
            active: 0,
        }
    }

    pub fn held(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub fn active_item(&self) -> Option<EntityId> {
        self.slots.get(self.active).copied().flatten()
    }

    pub fn holds(&self, item: EntityId) -> bool {
        self.held().any(|held| held == item)
    }

    /// Put an item in the active hand if free, else the first free hand
    pub fn put(&mut self, item: EntityId) -> bool {
        if let Some(slot @ None) = self.slots.get_mut(self.active) {
            *slot = Some(item);
            return true;
        }
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(item);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, item: EntityId) -> bool {
        match self.slots.iter_mut().find(|slot| **slot == Some(item)) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hands_put_prefers_active() {
        let mut hands = Hands::new(2);
        hands.active = 1;
        assert!(hands.put(EntityId(10)));
        assert_eq!(hands.slots[1], Some(EntityId(10)));
        assert!(hands.put(EntityId(11)));
        assert_eq!(hands.slots[0], Some(EntityId(11)));
        assert!(!hands.put(EntityId(12)));
    }

    #[test]
    fn test_hands_remove() {
        let mut hands = Hands::new(2);
        hands.put(EntityId(5));
        assert!(hands.holds(EntityId(5)));
        assert!(hands.remove(EntityId(5)));
        assert!(!hands.remove(EntityId(5)));
        assert_eq!(hands.active_item(), None);
    }
}
