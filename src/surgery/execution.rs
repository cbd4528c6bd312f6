//! Step execution engine
//!
//! A request is validated against the catalog, the part's layer state, the
//! surgeon's tools and the body's integrity budget. Accepted requests become
//! a timed interaction; when it completes the request is validated again
//! (tools or layers may have changed while waiting) and only then are its
//! effects applied, all in one go. A cancelled interaction leaves no trace.

use std::collections::BTreeMap;

use crate::body::graph::{
    attach_part, can_attach, can_insert_implant, can_insert_organ, detach_part, give_or_drop,
    insert_implant, insert_organ, is_holding, remove_implant, remove_organ, species_of,
};
use crate::core::config::SurgeryConfig;
use crate::core::types::EntityId;
use crate::ecs::events::WorldEvent;
use crate::ecs::world::World;
use crate::integrity::penalty::{
    apply_part_penalty, clear_penalty_category, remove_part_penalty_node, PenaltyCategory,
    PenaltyEntry,
};
use crate::integrity::usage::{check_capacity, insertion_cost};
use crate::surgery::catalog::{
    Layer, StepAction, StepId, SurgeryCatalog, SurgeryOperation, SurgeryStep,
};
use crate::surgery::do_after::{DoAfterArgs, DoAfterId, DoAfterScheduler};
use crate::surgery::eligibility::{
    has_repair_marker, operation_tools, select_method, Eligibility, MethodKind, ToolRules,
};
use crate::surgery::layer::{check_layers, check_position, layer_state, peek_layer_state};
use crate::surgery::reject::RejectReason;

/// A surgeon asking to perform one step on one part
#[derive(Debug, Clone, PartialEq)]
pub struct StepRequest {
    pub user: EntityId,
    pub body: EntityId,
    pub part: EntityId,
    pub step: StepId,
    /// Organ, implant or limb the step moves
    pub target: Option<EntityId>,
    /// Method picked in the UI; None leaves it to the selection policy
    pub method: Option<MethodKind>,
}

impl StepRequest {
    pub fn new(user: EntityId, body: EntityId, part: EntityId, step: &str) -> Self {
        Self {
            user,
            body,
            part,
            step: step.to_string(),
            target: None,
            method: None,
        }
    }

    pub fn with_target(mut self, target: EntityId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_method(mut self, method: MethodKind) -> Self {
        self.method = Some(method);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Completed {
        body: EntityId,
        part: EntityId,
        step: StepId,
        method: Option<MethodKind>,
    },
    Rejected {
        step: StepId,
        reason: RejectReason,
    },
    /// No request is waiting on this do-after (already handled or cancelled)
    Unknown,
}

#[derive(Debug, Clone)]
struct PendingStep {
    request: StepRequest,
    method: Option<MethodKind>,
}

/// Outcome of validation: the step and how it will be performed
struct Plan<'a> {
    step: &'a SurgeryStep,
    operation: Option<&'a SurgeryOperation>,
    method: Option<MethodKind>,
    speed: f32,
    /// Ledger layer of the step this one undoes
    undone_layer: Option<Layer>,
}

pub struct SurgerySystem {
    catalog: SurgeryCatalog,
    tools: ToolRules,
    config: SurgeryConfig,
    pending: BTreeMap<DoAfterId, PendingStep>,
}

impl SurgerySystem {
    pub fn new(catalog: SurgeryCatalog, config: SurgeryConfig) -> Self {
        Self {
            tools: ToolRules::new(&config),
            catalog,
            config,
            pending: BTreeMap::new(),
        }
    }

    pub fn catalog(&self) -> &SurgeryCatalog {
        &self.catalog
    }

    pub fn tools(&self) -> &ToolRules {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRules {
        &mut self.tools
    }

    pub fn config(&self) -> &SurgeryConfig {
        &self.config
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: DoAfterId) -> bool {
        self.pending.contains_key(&id)
    }

    /// How a user could perform a step right now (UI display)
    pub fn step_eligibility(
        &self,
        world: &World,
        user: EntityId,
        part: EntityId,
        step: &SurgeryStep,
    ) -> Eligibility {
        match self.catalog.step_operation(step) {
            Some(op) if !has_repair_marker(world, part, op) => Eligibility::None,
            Some(op) => operation_tools(world, &self.tools, user, op).eligibility(),
            None => Eligibility::Primary,
        }
    }

    /// Validate a request and start its timed interaction
    pub fn request_step(
        &mut self,
        world: &World,
        scheduler: &mut impl DoAfterScheduler,
        request: StepRequest,
    ) -> Result<DoAfterId, RejectReason> {
        let (duration, method) = match self.validate(world, &request) {
            Ok(plan) => (plan.step.duration / plan.speed, plan.method),
            Err(reason) => {
                tracing::debug!("Rejected {} on part {}: {}", request.step, request.part, reason);
                return Err(reason);
            }
        };
        let id = scheduler.start(world, DoAfterArgs::new(request.user, request.body, duration));
        tracing::debug!(
            "{} accepted on part {} ({:?}, {:.1}s)",
            request.step,
            request.part,
            method,
            duration
        );
        self.pending.insert(id, PendingStep { request, method });
        Ok(id)
    }

    /// Forget a request whose interaction was cancelled; nothing was applied
    pub fn cancel(&mut self, id: DoAfterId) -> bool {
        match self.pending.remove(&id) {
            Some(pending) => {
                tracing::debug!("{} cancelled, {} not applied", id, pending.request.step);
                true
            }
            None => false,
        }
    }

    /// User-initiated abort of a running step
    pub fn abort(&mut self, scheduler: &mut impl DoAfterScheduler, id: DoAfterId) -> bool {
        scheduler.cancel(id);
        self.cancel(id)
    }

    /// Re-validate and apply a request whose interaction finished
    pub fn complete(&mut self, world: &mut World, id: DoAfterId) -> StepOutcome {
        let Some(pending) = self.pending.remove(&id) else {
            tracing::debug!("Completion for unknown {}", id);
            return StepOutcome::Unknown;
        };
        let mut request = pending.request;
        // Honour the method chosen at request time
        if pending.method.is_some() {
            request.method = pending.method;
        }

        let plan = match self.validate(world, &request) {
            Ok(plan) => plan,
            Err(reason) => {
                tracing::debug!(
                    "{} failed re-validation on part {}: {}",
                    request.step,
                    request.part,
                    reason
                );
                return StepOutcome::Rejected {
                    step: request.step,
                    reason,
                };
            }
        };
        if let Err(reason) = apply(world, &plan, &request, id) {
            return StepOutcome::Rejected {
                step: request.step,
                reason,
            };
        }

        tracing::info!(
            "Step {} completed on part {} of {} ({:?})",
            request.step,
            request.part,
            request.body,
            plan.method
        );
        world.emit(WorldEvent::StepCompleted {
            body: request.body,
            part: request.part,
            step: request.step.clone(),
        });
        StepOutcome::Completed {
            body: request.body,
            part: request.part,
            step: request.step,
            method: plan.method,
        }
    }

    fn validate(&self, world: &World, request: &StepRequest) -> Result<Plan<'_>, RejectReason> {
        let step = self.catalog.step(&request.step).ok_or(RejectReason::UnknownStep)?;
        let part = world.parts.get(&request.part).ok_or(RejectReason::UnknownPart)?;
        if part.body != Some(request.body) {
            return Err(RejectReason::PartNotOnBody);
        }
        if !step.applies_to(part.part_type) {
            return Err(RejectReason::InvalidPartType);
        }

        let class = step.step_class();
        let in_flight = self.pending.values().any(|p| {
            p.request.part == request.part
                && self
                    .catalog
                    .step(&p.request.step)
                    .is_some_and(|s| s.step_class() == class)
        });
        if in_flight {
            return Err(RejectReason::StepInProgress);
        }

        if step.action.is_insertion()
            && !species_of(world, request.body).is_some_and(|s| s.accepts_implants())
        {
            return Err(RejectReason::SpeciesCannotReceiveImplants);
        }

        let state = peek_layer_state(world, request.part).ok_or(RejectReason::UnknownPart)?;
        check_layers(&state, &self.catalog, step)?;
        check_position(&state, &self.catalog, step)?;

        let operation = self.catalog.step_operation(step);
        if let Some(op) = operation {
            if op.is_repair() && !has_repair_marker(world, request.part, op) {
                return Err(RejectReason::NothingToRepair);
            }
        }

        check_target(world, request, step.action)?;

        let (method, speed) = match operation {
            Some(op) => {
                let tools = operation_tools(world, &self.tools, request.user, op);
                let method =
                    select_method(&tools, request.method, self.config.allow_implicit_improvised)?;
                let speed = match (method, &op.secondary) {
                    (MethodKind::Secondary, Some(secondary)) => secondary.speed,
                    _ => op.speed,
                };
                (Some(method), speed)
            }
            None => (None, 1.0),
        };

        if step.action.is_insertion() {
            if let Some(target) = request.target {
                let extra = insertion_cost(world, request.body, target);
                check_capacity(world, &self.config, request.body, extra)?;
            }
        }

        let undone_layer = step
            .undoes
            .as_deref()
            .and_then(|id| self.catalog.step(id))
            .map(|s| s.layer);

        Ok(Plan {
            step,
            operation,
            method,
            speed,
            undone_layer,
        })
    }
}

fn held_target(
    world: &World,
    request: &StepRequest,
    missing: RejectReason,
    is_kind: impl Fn(EntityId) -> bool,
) -> Result<EntityId, RejectReason> {
    match request.target {
        Some(target) if is_kind(target) && is_holding(world, request.user, target) => Ok(target),
        _ => Err(missing),
    }
}

fn check_target(
    world: &World,
    request: &StepRequest,
    action: StepAction,
) -> Result<(), RejectReason> {
    let part = request.part;
    match action {
        StepAction::None => Ok(()),
        StepAction::InsertOrgan => {
            let organ = held_target(world, request, RejectReason::OrganNotInHand, |e| {
                world.organs.contains_key(&e)
            })?;
            can_insert_organ(world, part, organ)
        }
        StepAction::InsertImplant => {
            let implant = held_target(world, request, RejectReason::ImplantNotInHand, |e| {
                world.implants.contains_key(&e)
            })?;
            can_insert_implant(world, part, implant)
        }
        StepAction::AttachLimb => {
            let limb = held_target(world, request, RejectReason::LimbNotInHand, |e| {
                world.parts.contains_key(&e)
            })?;
            can_attach(world, part, limb)
        }
        StepAction::RemoveOrgan => {
            let installed = world.parts.get(&part).map(|p| &p.organs);
            match (request.target, installed) {
                (Some(t), Some(organs)) if organs.contains(&t) => Ok(()),
                _ => Err(RejectReason::TargetNotFound),
            }
        }
        StepAction::RemoveImplant => {
            let installed = world.parts.get(&part).map(|p| &p.implants);
            match (request.target, installed) {
                (Some(t), Some(implants)) if implants.contains(&t) => Ok(()),
                _ => Err(RejectReason::TargetNotFound),
            }
        }
        StepAction::DetachLimb => match world.parts.get(&part).and_then(|p| p.parent) {
            Some(_) => Ok(()),
            None => Err(RejectReason::CannotDetachRoot),
        },
    }
}

/// Container move first: it is the only effect that can still fail, so a
/// failure here leaves everything untouched
fn move_contents(
    world: &mut World,
    request: &StepRequest,
    action: StepAction,
) -> Result<(), RejectReason> {
    let part = request.part;
    let target = request.target;
    match (action, target) {
        (StepAction::None, _) => Ok(()),
        (StepAction::InsertOrgan, Some(organ)) => insert_organ(world, part, organ),
        (StepAction::RemoveOrgan, Some(organ)) => {
            remove_organ(world, part, organ)?;
            give_or_drop(world, request.user, organ);
            Ok(())
        }
        (StepAction::InsertImplant, Some(implant)) => insert_implant(world, part, implant),
        (StepAction::RemoveImplant, Some(implant)) => {
            remove_implant(world, part, implant)?;
            give_or_drop(world, request.user, implant);
            Ok(())
        }
        (StepAction::AttachLimb, Some(limb)) => attach_part(world, part, limb).map(|_| ()),
        (StepAction::DetachLimb, _) => {
            detach_part(world, part)?;
            give_or_drop(world, request.user, part);
            Ok(())
        }
        (_, None) => Err(RejectReason::InvalidTarget),
    }
}

fn apply(
    world: &mut World,
    plan: &Plan<'_>,
    request: &StepRequest,
    id: DoAfterId,
) -> Result<(), RejectReason> {
    let step = plan.step;
    let body = request.body;
    // An amputated part leaves the body; its damage stays on the stump
    let penalized = match step.action {
        StepAction::DetachLimb => world
            .parts
            .get(&request.part)
            .and_then(|p| p.parent)
            .unwrap_or(request.part),
        _ => request.part,
    };

    move_contents(world, request, step.action)?;

    match plan.operation {
        Some(op) if op.is_repair() => repair(world, body, penalized, op),
        _ => {
            if step.penalty > 0 {
                apply_part_penalty(
                    world,
                    body,
                    penalized,
                    PenaltyEntry::new(step.id.clone(), step.penalty_category, step.penalty),
                );
            }
            if let (Some(op), Some(MethodKind::Secondary)) = (plan.operation, plan.method) {
                improvise(world, body, penalized, step, op, id);
            }
        }
    }

    if let Some(undone) = step.undoes.as_deref() {
        let layer = plan.undone_layer.unwrap_or(step.layer);
        if let Some(state) = layer_state(world, request.part) {
            if !state.unrecord(layer, undone) {
                tracing::debug!("Undo of {} on {}: not recorded", undone, request.part);
            }
        }
    }

    if let Some(paired) = step.remove_penalty_step.as_deref() {
        if let Some(amount) = remove_part_penalty_node(world, body, penalized, paired) {
            tracing::debug!("Removed {} penalty {} from {}", paired, amount, penalized);
        }
    }

    if let Some(category) = step.clears_category {
        clear_penalty_category(world, body, category);
    }

    if let Some(part) = world.parts.get_mut(&request.part) {
        for t in &step.add_traits {
            part.traits.insert(t.clone());
        }
        for t in &step.remove_traits {
            part.traits.remove(t);
        }
    }

    if let Some(state) = layer_state(world, request.part) {
        if step.is_recorded() {
            state.record(step.layer, &step.id);
        }
        if let Some(seq) = &step.sequence {
            if seq.reverse {
                state.regress(&seq.id, seq.index);
            } else {
                state.advance(&seq.id, seq.index);
            }
        }
    }
    Ok(())
}

/// Charge the improvised-method penalty and leave the repair marker
fn improvise(
    world: &mut World,
    body: EntityId,
    part: EntityId,
    step: &SurgeryStep,
    op: &SurgeryOperation,
    id: DoAfterId,
) {
    let source = format!("improvised:{}:{}", op.id, id.0);
    let cost = op.secondary.as_ref().map(|s| s.integrity_cost).unwrap_or(0);
    let entry = PenaltyEntry::new(source.clone(), PenaltyCategory::ImproperTools, cost);
    if step.penalty > 0 {
        world
            .integrity
            .entry(body)
            .or_default()
            .nest_in_part(part, &step.id, entry);
    } else {
        apply_part_penalty(world, body, part, entry);
    }
    if let Some(state) = layer_state(world, part) {
        state.add_marker(&op.id, source);
    }
    tracing::debug!("Improvised {} on {} (+{})", op.id, part, cost);
}

/// Remove an improvised marker together with its penalty node
fn repair(world: &mut World, body: EntityId, part: EntityId, op: &SurgeryOperation) {
    let Some(repaired) = op.repair_operation_for.as_deref() else {
        return;
    };
    let Some(marker) = layer_state(world, part).and_then(|s| s.take_marker(repaired)) else {
        tracing::debug!("Repair {} on {}: no marker", op.id, part);
        return;
    };
    let removed = world
        .integrity
        .get_mut(&body)
        .map(|ledger| ledger.remove_part_subtree(part, &marker.penalty_source))
        .unwrap_or(0);
    tracing::debug!("Repaired {} on {} (-{})", repaired, part, removed);
}
