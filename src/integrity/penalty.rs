//! Integrity penalty ledger
//!
//! Penalties form a rose tree: each entry has its own amount plus ordered
//! children (an improvised-tool penalty nested under the step that caused
//! it, for example). The total of a body is the sum over every node of every
//! tree, both the contextual forest (room hygiene, open panels, ...) and the
//! per-part forests fed by surgery on individual parts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::EntityId;
use crate::ecs::events::{PenaltySelector, WorldEvent};
use crate::ecs::world::World;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PenaltyCategory {
    DirtyRoom,
    ImproperTools,
    UnsanitarySurgery,
    #[default]
    SurgicalDamage,
    OpenPanel,
    Other,
}

/// One node of a penalty tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyEntry {
    pub source_id: String,
    pub category: PenaltyCategory,
    pub amount: u32,
    pub children: Vec<PenaltyEntry>,
}

impl PenaltyEntry {
    pub fn new(source_id: impl Into<String>, category: PenaltyCategory, amount: u32) -> Self {
        Self {
            source_id: source_id.into(),
            category,
            amount,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: PenaltyEntry) -> Self {
        self.children.push(child);
        self
    }

    /// Amount of this node plus all descendants
    pub fn sum(&self) -> u32 {
        self.amount + self.children.iter().map(PenaltyEntry::sum).sum::<u32>()
    }

    /// First node (pre-order) matching the predicate
    pub fn find<F>(&self, pred: &F) -> Option<&PenaltyEntry>
    where
        F: Fn(&PenaltyEntry) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(pred))
    }
}

pub fn forest_sum(forest: &[PenaltyEntry]) -> u32 {
    forest.iter().map(PenaltyEntry::sum).sum()
}

pub fn forest_find<'a, F>(forest: &'a [PenaltyEntry], pred: &F) -> Option<&'a PenaltyEntry>
where
    F: Fn(&PenaltyEntry) -> bool,
{
    forest.iter().find_map(|entry| entry.find(pred))
}

/// Remove every matching subtree at any depth; returns the amount removed
pub fn remove_where<F>(forest: &mut Vec<PenaltyEntry>, pred: &F) -> u32
where
    F: Fn(&PenaltyEntry) -> bool,
{
    let mut removed = 0;
    forest.retain(|entry| {
        if pred(entry) {
            removed += entry.sum();
            false
        } else {
            true
        }
    });
    for entry in forest.iter_mut() {
        removed += remove_where(&mut entry.children, pred);
    }
    removed
}

/// Remove the first matching node only; its children take its place in the
/// parent's list so nested penalties survive. Returns the detached node with
/// no children.
pub fn detach_node<F>(forest: &mut Vec<PenaltyEntry>, pred: &F) -> Option<PenaltyEntry>
where
    F: Fn(&PenaltyEntry) -> bool,
{
    if let Some(index) = forest.iter().position(|entry| pred(entry)) {
        let mut node = forest.remove(index);
        let children = std::mem::take(&mut node.children);
        for (offset, child) in children.into_iter().enumerate() {
            forest.insert(index + offset, child);
        }
        return Some(node);
    }
    forest
        .iter_mut()
        .find_map(|entry| detach_node(&mut entry.children, pred))
}

/// Per-body penalty ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegritySurgery {
    contextual: Vec<PenaltyEntry>,
    parts: BTreeMap<EntityId, Vec<PenaltyEntry>>,
}

impl IntegritySurgery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, entry: PenaltyEntry) {
        self.contextual.push(entry);
    }

    pub fn apply_to_part(&mut self, part: EntityId, entry: PenaltyEntry) {
        self.parts.entry(part).or_default().push(entry);
    }

    /// Append a child under the first part entry matching `source_id`,
    /// or as a new part root when no such entry exists
    pub fn nest_in_part(&mut self, part: EntityId, parent_source: &str, child: PenaltyEntry) {
        let forest = self.parts.entry(part).or_default();
        if let Some(parent) = find_mut(forest, parent_source) {
            parent.children.push(child);
        } else {
            forest.push(child);
        }
    }

    pub fn contextual(&self) -> &[PenaltyEntry] {
        &self.contextual
    }

    pub fn part_entries(&self, part: EntityId) -> &[PenaltyEntry] {
        self.parts.get(&part).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contextual_total(&self) -> u32 {
        forest_sum(&self.contextual)
    }

    pub fn part_total(&self, part: EntityId) -> u32 {
        forest_sum(self.part_entries(part))
    }

    pub fn parts_total(&self) -> u32 {
        self.parts.values().map(|forest| forest_sum(forest)).sum()
    }

    pub fn total(&self) -> u32 {
        self.parts_total() + self.contextual_total()
    }

    pub fn find_in_part(&self, part: EntityId, source_id: &str) -> Option<&PenaltyEntry> {
        forest_find(self.part_entries(part), &|e: &PenaltyEntry| e.source_id == source_id)
    }

    /// Clear every subtree of a category, contextual and part-sourced
    pub fn clear_category(&mut self, category: PenaltyCategory) -> u32 {
        let pred = |e: &PenaltyEntry| e.category == category;
        let mut removed = remove_where(&mut self.contextual, &pred);
        for forest in self.parts.values_mut() {
            removed += remove_where(forest, &pred);
        }
        removed
    }

    /// Clear every subtree with a source id, contextual and part-sourced
    pub fn clear_source(&mut self, source_id: &str) -> u32 {
        let pred = |e: &PenaltyEntry| e.source_id == source_id;
        let mut removed = remove_where(&mut self.contextual, &pred);
        for forest in self.parts.values_mut() {
            removed += remove_where(forest, &pred);
        }
        removed
    }

    /// Remove a whole part-sourced subtree by source id
    pub fn remove_part_subtree(&mut self, part: EntityId, source_id: &str) -> u32 {
        match self.parts.get_mut(&part) {
            Some(forest) => remove_where(forest, &|e: &PenaltyEntry| e.source_id == source_id),
            None => 0,
        }
    }

    /// Remove one part-sourced node by source id, keeping its children.
    /// Returns the node's own recorded amount.
    pub fn remove_part_node(&mut self, part: EntityId, source_id: &str) -> Option<u32> {
        let forest = self.parts.get_mut(&part)?;
        detach_node(forest, &|e: &PenaltyEntry| e.source_id == source_id).map(|node| node.amount)
    }

    /// Forget every penalty sourced from a part (the part left the body)
    pub fn drop_part(&mut self, part: EntityId) -> u32 {
        self.parts
            .remove(&part)
            .map(|forest| forest_sum(&forest))
            .unwrap_or(0)
    }
}

fn find_mut<'a>(forest: &'a mut [PenaltyEntry], source_id: &str) -> Option<&'a mut PenaltyEntry> {
    for entry in forest.iter_mut() {
        if entry.source_id == source_id {
            return Some(entry);
        }
        if let Some(found) = find_mut(&mut entry.children, source_id) {
            return Some(found);
        }
    }
    None
}

// === WORLD API ===

/// Append a contextual penalty (with optional nested children) to a body
pub fn apply_penalty(
    world: &mut World,
    body: EntityId,
    amount: u32,
    source_id: &str,
    category: PenaltyCategory,
    children: Vec<PenaltyEntry>,
) {
    let mut entry = PenaltyEntry::new(source_id, category, amount);
    entry.children = children;
    tracing::debug!("Penalty {} ({:?}) +{} on {}", source_id, category, entry.sum(), body);
    world.integrity.entry(body).or_default().apply(entry);
}

/// Append a part-sourced penalty to the body's ledger
pub fn apply_part_penalty(world: &mut World, body: EntityId, part: EntityId, entry: PenaltyEntry) {
    tracing::debug!(
        "Part penalty {} ({:?}) +{} on {} part {}",
        entry.source_id,
        entry.category,
        entry.sum(),
        body,
        part
    );
    world.integrity.entry(body).or_default().apply_to_part(part, entry);
}

pub fn clear_penalty_category(world: &mut World, body: EntityId, category: PenaltyCategory) -> u32 {
    let removed = world
        .integrity
        .get_mut(&body)
        .map(|ledger| ledger.clear_category(category))
        .unwrap_or(0);
    if removed == 0 {
        tracing::debug!("No {:?} penalties to clear on {}", category, body);
    }
    removed
}

pub fn clear_penalty_source(world: &mut World, body: EntityId, source_id: &str) -> u32 {
    let removed = world
        .integrity
        .get_mut(&body)
        .map(|ledger| ledger.clear_source(source_id))
        .unwrap_or(0);
    if removed == 0 {
        tracing::debug!("No penalties from {} to clear on {}", source_id, body);
    }
    removed
}

/// Remove one part-sourced node (children kept); None if nothing matched
pub fn remove_part_penalty_node(
    world: &mut World,
    body: EntityId,
    part: EntityId,
    source_id: &str,
) -> Option<u32> {
    let removed = world
        .integrity
        .get_mut(&body)
        .and_then(|ledger| ledger.remove_part_node(part, source_id));
    if removed.is_none() {
        tracing::debug!("No {} penalty recorded on part {}", source_id, part);
    }
    removed
}

pub fn total_penalty(world: &World, body: EntityId) -> u32 {
    world.integrity.get(&body).map(|l| l.total()).unwrap_or(0)
}

/// Apply a penalty event pushed by another system
pub fn handle_penalty_event(world: &mut World, event: &WorldEvent) {
    match event {
        WorldEvent::PenaltyApplied { body, part: Some(part), entry } => {
            apply_part_penalty(world, *body, *part, entry.clone());
        }
        WorldEvent::PenaltyApplied { body, part: None, entry } => {
            world.integrity.entry(*body).or_default().apply(entry.clone());
        }
        WorldEvent::PenaltyCleared { body, selector: PenaltySelector::Category(category) } => {
            clear_penalty_category(world, *body, *category);
        }
        WorldEvent::PenaltyCleared { body, selector: PenaltySelector::Source(source) } => {
            clear_penalty_source(world, *body, source);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> PenaltyEntry {
        PenaltyEntry::new("saw-bone", PenaltyCategory::SurgicalDamage, 2)
            .with_child(PenaltyEntry::new("improvised:saw", PenaltyCategory::ImproperTools, 3))
    }

    #[test]
    fn test_sum_includes_children() {
        assert_eq!(nested().sum(), 5);
    }

    #[test]
    fn test_find_nested() {
        let tree = nested();
        let found = tree.find(&|e: &PenaltyEntry| e.category == PenaltyCategory::ImproperTools);
        assert_eq!(found.map(|e| e.amount), Some(3));
    }

    #[test]
    fn test_remove_where_takes_subtree() {
        let mut forest = vec![nested(), PenaltyEntry::new("dirty", PenaltyCategory::DirtyRoom, 1)];
        let removed = remove_where(&mut forest, &|e: &PenaltyEntry| e.source_id == "saw-bone");
        assert_eq!(removed, 5);
        assert_eq!(forest_sum(&forest), 1);
    }

    #[test]
    fn test_remove_where_nested_only() {
        let mut forest = vec![nested()];
        let removed = remove_where(&mut forest, &|e: &PenaltyEntry| {
            e.category == PenaltyCategory::ImproperTools
        });
        assert_eq!(removed, 3);
        assert_eq!(forest_sum(&forest), 2);
    }

    #[test]
    fn test_detach_node_promotes_children() {
        let mut forest = vec![nested()];
        let node = detach_node(&mut forest, &|e: &PenaltyEntry| e.source_id == "saw-bone");
        assert_eq!(node.map(|n| n.amount), Some(2));
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].source_id, "improvised:saw");
        assert_eq!(forest_sum(&forest), 3);
    }

    #[test]
    fn test_detach_missing_is_none() {
        let mut forest = vec![nested()];
        assert!(detach_node(&mut forest, &|e: &PenaltyEntry| e.source_id == "nope").is_none());
        assert_eq!(forest_sum(&forest), 5);
    }

    #[test]
    fn test_ledger_total_is_parts_plus_contextual() {
        let mut ledger = IntegritySurgery::new();
        ledger.apply_to_part(
            EntityId(2),
            PenaltyEntry::new("cut", PenaltyCategory::SurgicalDamage, 2),
        );
        ledger.apply(PenaltyEntry::new("room", PenaltyCategory::DirtyRoom, 3));
        assert_eq!(ledger.total(), 5);
        assert_eq!(ledger.total(), ledger.parts_total() + ledger.contextual_total());

        assert_eq!(ledger.clear_category(PenaltyCategory::DirtyRoom), 3);
        assert_eq!(ledger.total(), 2);
    }

    #[test]
    fn test_nest_in_part_falls_back_to_root() {
        let mut ledger = IntegritySurgery::new();
        let part = EntityId(4);
        ledger.nest_in_part(
            part,
            "missing",
            PenaltyEntry::new("improvised:x", PenaltyCategory::ImproperTools, 1),
        );
        assert_eq!(ledger.part_entries(part).len(), 1);

        ledger.apply_to_part(part, PenaltyEntry::new("cut", PenaltyCategory::SurgicalDamage, 2));
        ledger.nest_in_part(
            part,
            "cut",
            PenaltyEntry::new("improvised:y", PenaltyCategory::ImproperTools, 1),
        );
        assert_eq!(ledger.part_entries(part).len(), 2);
        assert_eq!(ledger.part_total(part), 4);
    }

    #[test]
    fn test_drop_part() {
        let mut ledger = IntegritySurgery::new();
        ledger.apply_to_part(
            EntityId(2),
            PenaltyEntry::new("cut", PenaltyCategory::SurgicalDamage, 2),
        );
        assert_eq!(ledger.drop_part(EntityId(2)), 2);
        assert_eq!(ledger.total(), 0);
        assert_eq!(ledger.drop_part(EntityId(2)), 0);
    }

    #[test]
    fn test_penalty_events() {
        let mut world = World::new();
        let body = world.spawn();
        handle_penalty_event(
            &mut world,
            &WorldEvent::PenaltyApplied {
                body,
                part: None,
                entry: PenaltyEntry::new("room", PenaltyCategory::DirtyRoom, 2),
            },
        );
        assert_eq!(total_penalty(&world, body), 2);
        handle_penalty_event(
            &mut world,
            &WorldEvent::PenaltyCleared {
                body,
                selector: PenaltySelector::Category(PenaltyCategory::DirtyRoom),
            },
        );
        assert_eq!(total_penalty(&world, body), 0);
    }
}
