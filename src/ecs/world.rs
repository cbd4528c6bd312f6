//! ECS World - component stores for bodies, parts, items and derived state

use ahash::AHashMap;

use crate::body::item::{Hands, Item};
use crate::body::organ::{Bloodstream, Implant, Organ};
use crate::body::part::{Body, BodyPart};
use crate::core::types::{EntityId, Tick, Vec2};
use crate::cyberlimb::module::LimbModule;
use crate::cyberlimb::stats::CyberLimbStats;
use crate::ecs::events::WorldEvent;
use crate::integrity::bio_rejection::BioRejection;
use crate::integrity::penalty::IntegritySurgery;
use crate::integrity::usage::IntegrityUsage;
use crate::surgery::layer::BodyPartLayerState;

/// The game world containing all entities
///
/// Each store is keyed by entity id. Ordering-sensitive relations (part
/// children, organ containers, hand slots) are kept in vectors on the
/// owning component so iteration over them is deterministic.
#[derive(Default)]
pub struct World {
    pub current_tick: Tick,
    next_id: u32,

    pub bodies: AHashMap<EntityId, Body>,
    pub parts: AHashMap<EntityId, BodyPart>,
    pub organs: AHashMap<EntityId, Organ>,
    pub implants: AHashMap<EntityId, Implant>,
    pub items: AHashMap<EntityId, Item>,
    pub limb_modules: AHashMap<EntityId, LimbModule>,
    pub hands: AHashMap<EntityId, Hands>,
    pub positions: AHashMap<EntityId, Vec2>,
    pub bloodstreams: AHashMap<EntityId, Bloodstream>,

    pub layer_states: AHashMap<EntityId, BodyPartLayerState>,
    pub integrity: AHashMap<EntityId, IntegritySurgery>,
    pub integrity_usage: AHashMap<EntityId, IntegrityUsage>,
    pub bio_rejection: AHashMap<EntityId, BioRejection>,
    pub cyberlimb_stats: AHashMap<EntityId, CyberLimbStats>,

    /// Loose items lying around, in drop order
    pub floor: Vec<EntityId>,

    events: Vec<WorldEvent>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh entity id
    pub fn spawn(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    pub fn exists(&self, entity: EntityId) -> bool {
        entity.0 != 0 && entity.0 <= self.next_id
    }

    /// Remove every component of an entity
    pub fn despawn(&mut self, entity: EntityId) {
        self.bodies.remove(&entity);
        self.parts.remove(&entity);
        self.organs.remove(&entity);
        self.implants.remove(&entity);
        self.items.remove(&entity);
        self.limb_modules.remove(&entity);
        self.hands.remove(&entity);
        self.positions.remove(&entity);
        self.bloodstreams.remove(&entity);
        self.layer_states.remove(&entity);
        self.integrity.remove(&entity);
        self.integrity_usage.remove(&entity);
        self.bio_rejection.remove(&entity);
        self.cyberlimb_stats.remove(&entity);
        self.floor.retain(|e| *e != entity);
        for hands in self.hands.values_mut() {
            hands.remove(entity);
        }
    }

    pub fn emit(&mut self, event: WorldEvent) {
        self.events.push(event);
    }

    pub fn pending_events(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn tick(&mut self) {
        self.current_tick += 1;
    }

    pub fn position(&self, entity: EntityId) -> Vec2 {
        self.positions.get(&entity).copied().unwrap_or_default()
    }
}
