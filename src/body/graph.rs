//! Body graph service: spawning, walking, attaching and detaching parts,
//! moving organs and implants between containers and hands.
//!
//! Functions here check structural validity only (slot free, right host
//! type). Surgical rules such as layer state, tools and integrity capacity
//! are enforced by the step engine before it calls into this module.

use crate::body::item::{Hands, Item};
use crate::body::organ::{Bloodstream, Implant, Organ};
use crate::body::part::{Body, BodyPart, PartType, Symmetry};
use crate::core::types::{EntityId, Species, Vec2};
use crate::cyberlimb::module::{panel_attached, panel_detached, CyberLimb};
use crate::ecs::events::WorldEvent;
use crate::ecs::world::World;
use crate::surgery::reject::RejectReason;

/// Spawn a complete humanoid: torso, head, arms with hands, legs with feet,
/// native organs, two hands, a bloodstream and a position.
pub fn spawn_humanoid(world: &mut World, species: Species, name: &str) -> EntityId {
    let body = world.spawn();
    let torso = spawn_native_part(world, species, PartType::Torso, Symmetry::None);
    world.bodies.insert(
        body,
        Body {
            name: name.to_string(),
            species,
            root: torso,
        },
    );
    if let Some(part) = world.parts.get_mut(&torso) {
        part.body = Some(body);
    }

    let head = spawn_native_part(world, species, PartType::Head, Symmetry::None);
    link(world, torso, head);
    for symmetry in [Symmetry::Left, Symmetry::Right] {
        let arm = spawn_native_part(world, species, PartType::Arm, symmetry);
        link(world, torso, arm);
        let hand = spawn_native_part(world, species, PartType::Hand, symmetry);
        link(world, arm, hand);
        let leg = spawn_native_part(world, species, PartType::Leg, symmetry);
        link(world, torso, leg);
        let foot = spawn_native_part(world, species, PartType::Foot, symmetry);
        link(world, leg, foot);
    }

    for (kind, host) in [("heart", torso), ("lungs", torso), ("brain", head)] {
        let host_type = world.parts[&host].part_type;
        let organ = spawn_organ(world, kind, host_type, Some(species), 1);
        if let Some(part) = world.parts.get_mut(&host) {
            part.organs.push(organ);
        }
    }

    world.hands.insert(body, Hands::new(2));
    world.positions.insert(body, Vec2::default());
    world.bloodstreams.insert(body, Bloodstream::new());

    tracing::debug!("Spawned {:?} body {} ({})", species, body, name);
    body
}

fn spawn_native_part(
    world: &mut World,
    species: Species,
    part_type: PartType,
    symmetry: Symmetry,
) -> EntityId {
    let id = world.spawn();
    let mut part = BodyPart::new(part_name(part_type, symmetry), part_type, symmetry);
    part.donor = Some(species);
    let prototype = format!("{}-{:?}", species.as_str(), part_type).to_lowercase();
    world.items.insert(id, Item::new(part.name.clone(), prototype));
    world.parts.insert(id, part);
    id
}

fn part_name(part_type: PartType, symmetry: Symmetry) -> String {
    match symmetry {
        Symmetry::None => format!("{:?}", part_type).to_lowercase(),
        Symmetry::Left => format!("left {:?}", part_type).to_lowercase(),
        Symmetry::Right => format!("right {:?}", part_type).to_lowercase(),
    }
}

/// Link a child under a parent without events (used while building bodies)
fn link(world: &mut World, parent: EntityId, child: EntityId) {
    let body = world.parts.get(&parent).and_then(|p| p.body);
    if let Some(p) = world.parts.get_mut(&parent) {
        p.children.push(child);
    }
    if let Some(c) = world.parts.get_mut(&child) {
        c.parent = Some(parent);
        c.body = body;
    }
}

/// Spawn a severed biological limb grown on `donor`
pub fn spawn_limb(
    world: &mut World,
    donor: Species,
    part_type: PartType,
    symmetry: Symmetry,
) -> EntityId {
    spawn_native_part(world, donor, part_type, symmetry)
}

/// Spawn a severed cybernetic limb with no modules
pub fn spawn_cyber_limb(world: &mut World, part_type: PartType, symmetry: Symmetry) -> EntityId {
    let id = world.spawn();
    let mut part = BodyPart::new(
        format!("cybernetic {}", part_name(part_type, symmetry)),
        part_type,
        symmetry,
    );
    part.cyber = Some(CyberLimb::default());
    world
        .items
        .insert(id, Item::new(part.name.clone(), format!("cyber-{:?}", part_type).to_lowercase()));
    world.parts.insert(id, part);
    id
}

pub fn spawn_organ(
    world: &mut World,
    kind: &str,
    host: PartType,
    donor: Option<Species>,
    integrity_cost: u32,
) -> EntityId {
    let id = world.spawn();
    world.organs.insert(
        id,
        Organ {
            kind: kind.to_string(),
            host,
            integrity_cost,
            donor,
        },
    );
    world.items.insert(id, Item::new(kind, format!("organ-{kind}")));
    id
}

pub fn spawn_implant(world: &mut World, kind: &str, integrity_cost: u32) -> EntityId {
    let id = world.spawn();
    world.implants.insert(
        id,
        Implant {
            kind: kind.to_string(),
            integrity_cost,
        },
    );
    world.items.insert(id, Item::new(kind, format!("implant-{kind}")));
    id
}

/// Spawn a plain item (usually a tool) on the floor
pub fn spawn_item(world: &mut World, item: Item, position: Vec2) -> EntityId {
    let id = world.spawn();
    world.items.insert(id, item);
    world.positions.insert(id, position);
    world.floor.push(id);
    id
}

// === GRAPH QUERIES ===

/// All parts of a body, depth-first from the root in attachment order
pub fn parts_of(world: &World, body: EntityId) -> Vec<EntityId> {
    match world.bodies.get(&body) {
        Some(b) => subtree(world, b.root),
        None => Vec::new(),
    }
}

/// A part and all parts attached beneath it, depth-first
pub fn subtree(world: &World, part: EntityId) -> Vec<EntityId> {
    let mut out = Vec::new();
    let mut stack = vec![part];
    while let Some(current) = stack.pop() {
        let Some(p) = world.parts.get(&current) else {
            continue;
        };
        out.push(current);
        for child in p.children.iter().rev() {
            stack.push(*child);
        }
    }
    out
}

pub fn find_part(
    world: &World,
    body: EntityId,
    part_type: PartType,
    symmetry: Symmetry,
) -> Option<EntityId> {
    parts_of(world, body).into_iter().find(|id| {
        world
            .parts
            .get(id)
            .is_some_and(|p| p.part_type == part_type && p.symmetry == symmetry)
    })
}

pub fn part_on_body(world: &World, body: EntityId, part: EntityId) -> bool {
    world.parts.get(&part).is_some_and(|p| p.body == Some(body))
}

pub fn species_of(world: &World, body: EntityId) -> Option<Species> {
    world.bodies.get(&body).map(|b| b.species)
}

// === HANDS ===

pub fn held_items(world: &World, user: EntityId) -> Vec<EntityId> {
    world
        .hands
        .get(&user)
        .map(|h| h.held().collect())
        .unwrap_or_default()
}

pub fn active_item(world: &World, user: EntityId) -> Option<EntityId> {
    world.hands.get(&user).and_then(|h| h.active_item())
}

pub fn is_holding(world: &World, user: EntityId, item: EntityId) -> bool {
    world.hands.get(&user).is_some_and(|h| h.holds(item))
}

/// Take an item out of every hand and off the floor
fn release(world: &mut World, item: EntityId) {
    for hands in world.hands.values_mut() {
        hands.remove(item);
    }
    world.floor.retain(|e| *e != item);
}

/// Put an item into a user's hands; returns false if both hands are full
pub fn give(world: &mut World, user: EntityId, item: EntityId) -> bool {
    let Some(hands) = world.hands.get(&user) else {
        return false;
    };
    if hands.holds(item) {
        return true;
    }
    if hands.held().count() >= hands.slots.len() {
        return false;
    }
    release(world, item);
    match world.hands.get_mut(&user) {
        Some(hands) => hands.put(item),
        None => false,
    }
}

/// Give an item to the user, dropping it at their feet if their hands are full
pub fn give_or_drop(world: &mut World, user: EntityId, item: EntityId) {
    if give(world, user, item) {
        return;
    }
    let at = world.position(user);
    release(world, item);
    world.positions.insert(item, at);
    world.floor.push(item);
}

// === ATTACH / DETACH ===

/// Structural checks for attaching `limb` under `parent`
pub fn can_attach(world: &World, parent: EntityId, limb: EntityId) -> Result<(), RejectReason> {
    let parent_part = world.parts.get(&parent).ok_or(RejectReason::UnknownPart)?;
    if parent_part.body.is_none() {
        return Err(RejectReason::PartNotOnBody);
    }
    let limb_part = world.parts.get(&limb).ok_or(RejectReason::InvalidTarget)?;
    if limb_part.is_attached() || !limb_part.part_type.can_attach_to(parent_part.part_type) {
        return Err(RejectReason::InvalidTarget);
    }
    let occupied = parent_part.children.iter().any(|child| {
        world.parts.get(child).is_some_and(|c| {
            c.part_type == limb_part.part_type && c.symmetry == limb_part.symmetry
        })
    });
    if occupied {
        return Err(RejectReason::SlotOccupied);
    }
    Ok(())
}

/// Attach a severed limb (and anything attached beneath it) to a body part.
///
/// Re-attached parts come back with closed layers: the old layer state is
/// dropped for the whole subtree.
pub fn attach_part(
    world: &mut World,
    parent: EntityId,
    limb: EntityId,
) -> Result<EntityId, RejectReason> {
    can_attach(world, parent, limb)?;
    let body = world
        .parts
        .get(&parent)
        .and_then(|p| p.body)
        .ok_or(RejectReason::PartNotOnBody)?;

    release(world, limb);
    world.positions.remove(&limb);
    if let Some(p) = world.parts.get_mut(&parent) {
        p.children.push(limb);
    }
    if let Some(l) = world.parts.get_mut(&limb) {
        l.parent = Some(parent);
    }
    for part in subtree(world, limb) {
        if let Some(p) = world.parts.get_mut(&part) {
            p.body = Some(body);
        }
        world.layer_states.remove(&part);
        panel_attached(world, body, part);
    }

    world.emit(WorldEvent::LimbAttached { body, limb });
    Ok(body)
}

/// Sever a limb and everything beneath it. Returns the body it left.
///
/// Biological parts without a donor tag take the body's species. Part-sourced
/// penalties leave the body's ledger with the part.
pub fn detach_part(world: &mut World, limb: EntityId) -> Result<EntityId, RejectReason> {
    let part = world.parts.get(&limb).ok_or(RejectReason::UnknownPart)?;
    let body = part.body.ok_or(RejectReason::PartNotOnBody)?;
    let parent = part.parent.ok_or(RejectReason::CannotDetachRoot)?;
    let species = species_of(world, body);

    if let Some(p) = world.parts.get_mut(&parent) {
        p.children.retain(|c| *c != limb);
    }
    if let Some(l) = world.parts.get_mut(&limb) {
        l.parent = None;
    }
    let severed = subtree(world, limb);
    for id in &severed {
        if let Some(p) = world.parts.get_mut(id) {
            p.body = None;
            if p.donor.is_none() && !p.is_cyber() {
                p.donor = species;
            }
        }
        if let Some(ledger) = world.integrity.get_mut(&body) {
            ledger.drop_part(*id);
        }
        panel_detached(world, body, *id);
    }
    if !world.items.contains_key(&limb) {
        let name = world.parts.get(&limb).map(|p| p.name.clone()).unwrap_or_default();
        world.items.insert(limb, Item::new(name, "severed-part"));
    }

    world.emit(WorldEvent::LimbDetached { body, limb });
    Ok(body)
}

// === ORGANS AND IMPLANTS ===

pub fn can_insert_organ(
    world: &World,
    part: EntityId,
    organ: EntityId,
) -> Result<(), RejectReason> {
    let host = world.parts.get(&part).ok_or(RejectReason::UnknownPart)?;
    let incoming = world.organs.get(&organ).ok_or(RejectReason::InvalidTarget)?;
    if incoming.host != host.part_type {
        return Err(RejectReason::InvalidTarget);
    }
    let occupied = host
        .organs
        .iter()
        .any(|o| world.organs.get(o).is_some_and(|o| o.kind == incoming.kind));
    if occupied {
        return Err(RejectReason::SlotOccupied);
    }
    Ok(())
}

pub fn insert_organ(
    world: &mut World,
    part: EntityId,
    organ: EntityId,
) -> Result<(), RejectReason> {
    can_insert_organ(world, part, organ)?;
    release(world, organ);
    world.positions.remove(&organ);
    let body = world.parts.get_mut(&part).and_then(|p| {
        p.organs.push(organ);
        p.body
    });
    if let Some(body) = body {
        world.emit(WorldEvent::OrganInserted { body, part, organ });
    }
    Ok(())
}

/// Take an organ out of a part; it carries the body's species as donor tag
pub fn remove_organ(
    world: &mut World,
    part: EntityId,
    organ: EntityId,
) -> Result<(), RejectReason> {
    let host = world.parts.get_mut(&part).ok_or(RejectReason::UnknownPart)?;
    let Some(index) = host.organs.iter().position(|o| *o == organ) else {
        return Err(RejectReason::TargetNotFound);
    };
    host.organs.remove(index);
    let body = host.body;
    let species = body.and_then(|b| species_of(world, b));
    if let Some(o) = world.organs.get_mut(&organ) {
        if o.donor.is_none() {
            o.donor = species;
        }
    }
    if let Some(body) = body {
        world.emit(WorldEvent::OrganRemoved { body, part, organ });
    }
    Ok(())
}

pub fn can_insert_implant(
    world: &World,
    part: EntityId,
    implant: EntityId,
) -> Result<(), RejectReason> {
    let host = world.parts.get(&part).ok_or(RejectReason::UnknownPart)?;
    let incoming = world.implants.get(&implant).ok_or(RejectReason::InvalidTarget)?;
    let occupied = host
        .implants
        .iter()
        .any(|i| world.implants.get(i).is_some_and(|i| i.kind == incoming.kind));
    if occupied {
        return Err(RejectReason::SlotOccupied);
    }
    Ok(())
}

pub fn insert_implant(
    world: &mut World,
    part: EntityId,
    implant: EntityId,
) -> Result<(), RejectReason> {
    can_insert_implant(world, part, implant)?;
    release(world, implant);
    world.positions.remove(&implant);
    let body = world.parts.get_mut(&part).and_then(|p| {
        p.implants.push(implant);
        p.body
    });
    if let Some(body) = body {
        world.emit(WorldEvent::ImplantInserted { body, part, implant });
    }
    Ok(())
}

pub fn remove_implant(
    world: &mut World,
    part: EntityId,
    implant: EntityId,
) -> Result<(), RejectReason> {
    let host = world.parts.get_mut(&part).ok_or(RejectReason::UnknownPart)?;
    let Some(index) = host.implants.iter().position(|i| *i == implant) else {
        return Err(RejectReason::TargetNotFound);
    };
    host.implants.remove(index);
    if let Some(body) = host.body {
        world.emit(WorldEvent::ImplantRemoved { body, part, implant });
    }
    Ok(())
}
