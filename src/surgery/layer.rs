//! Per-part layer state
//!
//! Only facts are stored: which steps were performed and where each
//! sequence cursor sits. Whether a layer is open is always derived from the
//! performed sets against the catalog's opener steps, so the flags cannot
//! drift from the history that produced them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::body::graph::{can_attach, can_insert_implant, can_insert_organ, held_items};
use crate::body::part::PartType;
use crate::core::types::EntityId;
use crate::ecs::world::World;
use crate::surgery::catalog::{Layer, OperationId, StepAction, StepId, SurgeryCatalog, SurgeryStep};
use crate::surgery::reject::RejectReason;

/// Left on a part when an operation was done with improvised tools;
/// the matching repair operation consumes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovisedMarker {
    pub operation: OperationId,
    /// Source id of the penalty node charged for the improvised use
    pub penalty_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyPartLayerState {
    pub part_type: PartType,
    pub performed_skin_steps: BTreeSet<StepId>,
    /// Tissue and organ layer steps
    pub performed_tissue_steps: BTreeSet<StepId>,
    /// Sequence id -> last completed index (-1 = not started)
    pub sequence_progress: BTreeMap<String, i32>,
    pub markers: Vec<ImprovisedMarker>,
}

impl BodyPartLayerState {
    pub fn new(part_type: PartType) -> Self {
        Self {
            part_type,
            performed_skin_steps: BTreeSet::new(),
            performed_tissue_steps: BTreeSet::new(),
            sequence_progress: BTreeMap::new(),
            markers: Vec::new(),
        }
    }

    fn performed(&self, layer: Layer) -> &BTreeSet<StepId> {
        match layer {
            Layer::Skin => &self.performed_skin_steps,
            Layer::Tissue | Layer::Organ => &self.performed_tissue_steps,
        }
    }

    fn performed_mut(&mut self, layer: Layer) -> &mut BTreeSet<StepId> {
        match layer {
            Layer::Skin => &mut self.performed_skin_steps,
            Layer::Tissue | Layer::Organ => &mut self.performed_tissue_steps,
        }
    }

    pub fn has_performed(&self, layer: Layer, step: &str) -> bool {
        self.performed(layer).contains(step)
    }

    /// Returns false if the step was already recorded
    pub fn record(&mut self, layer: Layer, step: &str) -> bool {
        self.performed_mut(layer).insert(step.to_string())
    }

    /// Returns false if the step was not recorded
    pub fn unrecord(&mut self, layer: Layer, step: &str) -> bool {
        self.performed_mut(layer).remove(step)
    }

    pub fn progress(&self, sequence: &str) -> i32 {
        self.sequence_progress.get(sequence).copied().unwrap_or(-1)
    }

    /// Forward completion never moves the cursor backwards
    pub fn advance(&mut self, sequence: &str, index: i32) {
        let current = self.progress(sequence);
        self.sequence_progress
            .insert(sequence.to_string(), current.max(index));
    }

    /// Reverse completion at `index` leaves the cursor just before it
    pub fn regress(&mut self, sequence: &str, index: i32) {
        let current = self.progress(sequence);
        self.sequence_progress
            .insert(sequence.to_string(), current.min(index - 1));
    }

    pub fn has_marker(&self, operation: &str) -> bool {
        self.markers.iter().any(|m| m.operation == operation)
    }

    pub fn add_marker(&mut self, operation: &str, penalty_source: String) {
        self.markers.push(ImprovisedMarker {
            operation: operation.to_string(),
            penalty_source,
        });
    }

    /// Remove the oldest marker for an operation
    pub fn take_marker(&mut self, operation: &str) -> Option<ImprovisedMarker> {
        let index = self.markers.iter().position(|m| m.operation == operation)?;
        Some(self.markers.remove(index))
    }

    /// Has any step of this layer been performed?
    pub fn is_touched(&self, catalog: &SurgeryCatalog, layer: Layer) -> bool {
        self.performed(layer)
            .iter()
            .any(|id| catalog.step(id).is_some_and(|s| s.layer == layer))
    }
}

/// Layer state of a part, created closed on first access
pub fn layer_state(world: &mut World, part: EntityId) -> Option<&mut BodyPartLayerState> {
    let part_type = world.parts.get(&part)?.part_type;
    Some(
        world
            .layer_states
            .entry(part)
            .or_insert_with(|| BodyPartLayerState::new(part_type)),
    )
}

/// Read-only view: the stored state, or a fresh closed one
pub fn peek_layer_state(world: &World, part: EntityId) -> Option<BodyPartLayerState> {
    if let Some(state) = world.layer_states.get(&part) {
        return Some(state.clone());
    }
    world
        .parts
        .get(&part)
        .map(|p| BodyPartLayerState::new(p.part_type))
}

fn all_openers_performed(
    state: &BodyPartLayerState,
    catalog: &SurgeryCatalog,
    layer: Layer,
) -> Option<bool> {
    let mut any = false;
    for step in catalog.openers(layer, state.part_type) {
        any = true;
        if !state.has_performed(layer, &step.id) {
            return Some(false);
        }
    }
    any.then_some(true)
}

pub fn is_skin_open(state: &BodyPartLayerState, catalog: &SurgeryCatalog) -> bool {
    all_openers_performed(state, catalog, Layer::Skin).unwrap_or(false)
}

pub fn is_tissue_open(state: &BodyPartLayerState, catalog: &SurgeryCatalog) -> bool {
    all_openers_performed(state, catalog, Layer::Tissue).unwrap_or(false)
}

/// Parts with no organ openers (limbs) expose their contents once tissue is open
pub fn is_organ_open(state: &BodyPartLayerState, catalog: &SurgeryCatalog) -> bool {
    is_tissue_open(state, catalog)
        && all_openers_performed(state, catalog, Layer::Organ).unwrap_or(true)
}

pub fn is_layer_open(state: &BodyPartLayerState, catalog: &SurgeryCatalog, layer: Layer) -> bool {
    match layer {
        Layer::Skin => is_skin_open(state, catalog),
        Layer::Tissue => is_tissue_open(state, catalog),
        Layer::Organ => is_organ_open(state, catalog),
    }
}

/// Layer prerequisites of a step
pub fn check_layers(
    state: &BodyPartLayerState,
    catalog: &SurgeryCatalog,
    step: &SurgeryStep,
) -> Result<(), RejectReason> {
    if let Some(layer) = step.requires_open {
        if !is_layer_open(state, catalog, layer) {
            return Err(RejectReason::LayerClosed);
        }
    }
    if let Some(layer) = step.requires_closed {
        if state.is_touched(catalog, layer) {
            return Err(RejectReason::LayerOpen);
        }
    }
    Ok(())
}

/// Idempotency and sequence-position checks
pub fn check_position(
    state: &BodyPartLayerState,
    catalog: &SurgeryCatalog,
    step: &SurgeryStep,
) -> Result<(), RejectReason> {
    if let Some(seq) = &step.sequence {
        let progress = state.progress(&seq.id);
        if seq.reverse {
            if progress != seq.index {
                return Err(RejectReason::StepNotAvailable);
            }
        } else if progress >= seq.index || state.has_performed(step.layer, &step.id) {
            return Err(RejectReason::StepAlreadyPerformed);
        } else if progress != seq.index - 1 {
            return Err(RejectReason::StepNotAvailable);
        }
        return Ok(());
    }
    if let Some(undone) = step.undoes.as_deref() {
        let layer = catalog.step(undone).map(|s| s.layer).unwrap_or(step.layer);
        if !state.has_performed(layer, undone) {
            return Err(RejectReason::StepNotAvailable);
        }
        return Ok(());
    }
    if step.is_recorded() && state.has_performed(step.layer, &step.id) {
        return Err(RejectReason::StepAlreadyPerformed);
    }
    Ok(())
}

/// A step the surgeon can pick right now, with the entity it acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableStep {
    pub step: StepId,
    pub target: Option<EntityId>,
}

/// Entities an action step could act on, in hands or container order
pub fn action_targets(
    world: &World,
    user: EntityId,
    part: EntityId,
    action: StepAction,
) -> Vec<EntityId> {
    let Some(host) = world.parts.get(&part) else {
        return Vec::new();
    };
    match action {
        StepAction::None => Vec::new(),
        StepAction::InsertOrgan => held_items(world, user)
            .into_iter()
            .filter(|item| can_insert_organ(world, part, *item).is_ok())
            .collect(),
        StepAction::RemoveOrgan => host.organs.clone(),
        StepAction::InsertImplant => held_items(world, user)
            .into_iter()
            .filter(|item| can_insert_implant(world, part, *item).is_ok())
            .collect(),
        StepAction::RemoveImplant => host.implants.clone(),
        StepAction::AttachLimb => held_items(world, user)
            .into_iter()
            .filter(|item| can_attach(world, part, *item).is_ok())
            .collect(),
        StepAction::DetachLimb => Vec::new(),
    }
}

/// Every step currently offered on a part.
///
/// Catalog order, with action steps expanded per target. For a fixed layer
/// state and the same held items the result is identical call to call.
pub fn available_steps(
    world: &World,
    catalog: &SurgeryCatalog,
    user: EntityId,
    part: EntityId,
) -> Vec<AvailableStep> {
    let Some(state) = peek_layer_state(world, part) else {
        return Vec::new();
    };
    let is_root = world.parts.get(&part).is_some_and(|p| p.parent.is_none());

    let mut out = Vec::new();
    for step in catalog.steps() {
        if !step.applies_to(state.part_type) {
            continue;
        }
        if check_position(&state, catalog, step).is_err()
            || check_layers(&state, catalog, step).is_err()
        {
            continue;
        }
        if let Some(repaired) = catalog
            .step_operation(step)
            .and_then(|op| op.repair_operation_for.as_deref())
        {
            if !state.has_marker(repaired) {
                continue;
            }
        }
        match step.action {
            StepAction::None => out.push(AvailableStep {
                step: step.id.clone(),
                target: None,
            }),
            StepAction::DetachLimb => {
                if !is_root {
                    out.push(AvailableStep {
                        step: step.id.clone(),
                        target: None,
                    });
                }
            }
            action => {
                for target in action_targets(world, user, part, action) {
                    out.push(AvailableStep {
                        step: step.id.clone(),
                        target: Some(target),
                    });
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::graph::{find_part, spawn_humanoid};
    use crate::body::part::Symmetry;
    use crate::core::types::Species;

    fn catalog() -> SurgeryCatalog {
        SurgeryCatalog::with_defaults().unwrap()
    }

    fn open_skin(state: &mut BodyPartLayerState) {
        for (i, id) in ["make-incision", "clamp-vessels", "retract-skin"].iter().enumerate() {
            state.record(Layer::Skin, id);
            state.advance("skin", i as i32);
        }
    }

    #[test]
    fn test_fresh_part_is_closed() {
        let catalog = catalog();
        let state = BodyPartLayerState::new(PartType::Arm);
        assert!(!is_skin_open(&state, &catalog));
        assert!(!is_tissue_open(&state, &catalog));
        assert!(!is_organ_open(&state, &catalog));
        assert_eq!(state.progress("skin"), -1);
    }

    #[test]
    fn test_skin_needs_every_opener() {
        let catalog = catalog();
        let mut state = BodyPartLayerState::new(PartType::Arm);
        state.record(Layer::Skin, "make-incision");
        state.record(Layer::Skin, "clamp-vessels");
        assert!(!is_skin_open(&state, &catalog));
        state.record(Layer::Skin, "retract-skin");
        assert!(is_skin_open(&state, &catalog));
    }

    #[test]
    fn test_limb_organs_open_with_tissue() {
        let catalog = catalog();
        let mut arm = BodyPartLayerState::new(PartType::Arm);
        open_skin(&mut arm);
        arm.record(Layer::Tissue, "cut-tissue");
        arm.record(Layer::Tissue, "retract-tissue");
        assert!(is_organ_open(&arm, &catalog));

        let mut torso = BodyPartLayerState::new(PartType::Torso);
        open_skin(&mut torso);
        torso.record(Layer::Tissue, "cut-tissue");
        torso.record(Layer::Tissue, "retract-tissue");
        assert!(!is_organ_open(&torso, &catalog));
        torso.record(Layer::Organ, "saw-bone");
        assert!(is_organ_open(&torso, &catalog));
    }

    #[test]
    fn test_sequence_offers_next_and_reverse() {
        let catalog = catalog();
        let mut state = BodyPartLayerState::new(PartType::Arm);
        state.record(Layer::Skin, "make-incision");
        state.advance("skin", 0);

        let next = catalog.step("clamp-vessels").unwrap();
        let close = catalog.step("close-incision").unwrap();
        let again = catalog.step("make-incision").unwrap();
        let skip = catalog.step("retract-skin").unwrap();
        assert!(check_position(&state, &catalog, next).is_ok());
        assert!(check_position(&state, &catalog, close).is_ok());
        assert_eq!(
            check_position(&state, &catalog, again),
            Err(RejectReason::StepAlreadyPerformed)
        );
        assert_eq!(check_position(&state, &catalog, skip), Err(RejectReason::StepNotAvailable));
    }

    #[test]
    fn test_progress_monotone_until_reversed() {
        let mut state = BodyPartLayerState::new(PartType::Arm);
        state.advance("skin", 2);
        state.advance("skin", 1);
        assert_eq!(state.progress("skin"), 2);
        state.regress("skin", 2);
        assert_eq!(state.progress("skin"), 1);
    }

    #[test]
    fn test_requires_closed_blocks_on_touched_layer() {
        let catalog = catalog();
        let mut state = BodyPartLayerState::new(PartType::Arm);
        open_skin(&mut state);
        let unretract = catalog.step("unretract-skin").unwrap();
        assert!(check_layers(&state, &catalog, unretract).is_ok());
        state.record(Layer::Tissue, "cut-tissue");
        assert_eq!(check_layers(&state, &catalog, unretract), Err(RejectReason::LayerOpen));
    }

    #[test]
    fn test_markers() {
        let mut state = BodyPartLayerState::new(PartType::Arm);
        assert!(!state.has_marker("saw"));
        state.add_marker("saw", "improvised:saw:1".into());
        assert!(state.has_marker("saw"));
        assert_eq!(
            state.take_marker("saw").map(|m| m.penalty_source),
            Some("improvised:saw:1".into())
        );
        assert!(state.take_marker("saw").is_none());
    }

    #[test]
    fn test_available_steps_on_fresh_arm() {
        let catalog = catalog();
        let mut world = World::new();
        let body = spawn_humanoid(&mut world, Species::Human, "patient");
        let arm = find_part(&world, body, PartType::Arm, Symmetry::Left).unwrap();

        let steps = available_steps(&world, &catalog, body, arm);
        let ids: Vec<&str> = steps.iter().map(|s| s.step.as_str()).collect();
        assert!(ids.contains(&"make-incision"));
        assert!(!ids.contains(&"clamp-vessels"));
        assert!(!ids.contains(&"tend-wounds"));
        assert!(!ids.contains(&"repair-incision-damage"));
        assert!(!ids.contains(&"detach-limb"));
        assert_eq!(steps, available_steps(&world, &catalog, body, arm));
    }

    #[test]
    fn test_layer_state_created_on_access() {
        let mut world = World::new();
        let body = spawn_humanoid(&mut world, Species::Human, "patient");
        let head = find_part(&world, body, PartType::Head, Symmetry::None).unwrap();
        assert!(!world.layer_states.contains_key(&head));
        assert_eq!(layer_state(&mut world, head).map(|s| s.part_type), Some(PartType::Head));
        assert!(world.layer_states.contains_key(&head));
        assert!(layer_state(&mut world, EntityId(999)).is_none());
    }
}
