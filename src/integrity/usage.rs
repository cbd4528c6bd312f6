//! Integrity usage and capacity
//!
//! Usage is what a body spends hosting foreign material: organs and limbs
//! grown on another species, and anything mechanical. Capacity is the base
//! budget minus the current penalty total, so dirty or botched surgery
//! shrinks how much foreign material a body tolerates.

use serde::{Deserialize, Serialize};

use crate::body::graph::{parts_of, subtree};
use crate::core::config::SurgeryConfig;
use crate::core::types::{EntityId, Species};
use crate::ecs::world::World;
use crate::integrity::penalty::total_penalty;
use crate::surgery::reject::RejectReason;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityUsage {
    pub usage: u32,
}

fn charged(donor: Option<Species>, recipient: Species, cost: u32) -> u32 {
    if donor == Some(recipient) {
        0
    } else {
        cost
    }
}

/// Cost a part and everything on it (organs, implants) charges a recipient
fn part_cost(world: &World, part: EntityId, recipient: Species) -> u32 {
    let Some(p) = world.parts.get(&part) else {
        return 0;
    };
    let own = charged(p.donor, recipient, p.integrity_cost);
    let organs: u32 = p
        .organs
        .iter()
        .filter_map(|o| world.organs.get(o))
        .map(|o| charged(o.donor, recipient, o.integrity_cost))
        .sum();
    let implants: u32 = p
        .implants
        .iter()
        .filter_map(|i| world.implants.get(i))
        .map(|i| i.integrity_cost)
        .sum();
    own + organs + implants
}

/// Usage computed from the current body graph
pub fn compute_usage(world: &World, body: EntityId) -> u32 {
    let Some(species) = world.bodies.get(&body).map(|b| b.species) else {
        return 0;
    };
    parts_of(world, body)
        .into_iter()
        .map(|part| part_cost(world, part, species))
        .sum()
}

/// Recompute and cache usage in the body's component
pub fn refresh_usage(world: &mut World, body: EntityId) -> u32 {
    let usage = compute_usage(world, body);
    world.integrity_usage.insert(body, IntegrityUsage { usage });
    usage
}

/// Usage the body would gain by hosting `item` (organ, implant or limb subtree)
pub fn insertion_cost(world: &World, body: EntityId, item: EntityId) -> u32 {
    let Some(species) = world.bodies.get(&body).map(|b| b.species) else {
        return 0;
    };
    if let Some(organ) = world.organs.get(&item) {
        return charged(organ.donor, species, organ.integrity_cost);
    }
    if let Some(implant) = world.implants.get(&item) {
        return implant.integrity_cost;
    }
    if world.parts.contains_key(&item) {
        return subtree(world, item)
            .into_iter()
            .map(|part| part_cost(world, part, species))
            .sum();
    }
    0
}

/// Capacity left after penalties
pub fn capacity(config: &SurgeryConfig, total_penalty: u32) -> u32 {
    config.base_integrity_capacity.saturating_sub(total_penalty)
}

pub fn body_capacity(world: &World, config: &SurgeryConfig, body: EntityId) -> u32 {
    capacity(config, total_penalty(world, body))
}

/// Usage beyond capacity; the bio-rejection ramp target
pub fn excess(world: &World, config: &SurgeryConfig, body: EntityId) -> u32 {
    compute_usage(world, body).saturating_sub(body_capacity(world, config, body))
}

/// Reject an insertion that would push usage past capacity
pub fn check_capacity(
    world: &World,
    config: &SurgeryConfig,
    body: EntityId,
    extra: u32,
) -> Result<(), RejectReason> {
    if extra == 0 {
        return Ok(());
    }
    let usage = compute_usage(world, body);
    let cap = body_capacity(world, config, body);
    if usage + extra > cap {
        tracing::debug!(
            "Insertion on {} rejected: usage {} + {} > capacity {}",
            body,
            usage,
            extra,
            cap
        );
        return Err(RejectReason::IntegrityOverCapacity);
    }
    Ok(())
}
