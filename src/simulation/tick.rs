//! Tick system - orchestrates simulation updates
//!
//! Order within a tick:
//! timed interactions -> world event dispatch -> cyberlimb drain ->
//! bio-rejection -> UI polling.
//!
//! Derived per-body state (usage, cyberlimb stats) is only rebuilt for bodies
//! named by an event this tick. Bodies are visited in id order so two runs
//! from the same state produce the same events.

use std::collections::BTreeSet;

use crate::core::types::EntityId;
use crate::cyberlimb::stats::{drain, recompute_stats, reset_service_time};
use crate::ecs::events::WorldEvent;
use crate::integrity::bio_rejection::update_bio_rejection;
use crate::integrity::penalty::handle_penalty_event;
use crate::integrity::usage::refresh_usage;
use crate::simulation::Simulation;
use crate::surgery::do_after::{CancelReason, DoAfterEvent, DoAfterId};
use crate::surgery::execution::StepOutcome;
use crate::surgery::reject::RejectReason;
use crate::surgery::ui::UiSessionId;

/// Events generated during a simulation tick
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    StepCompleted {
        id: DoAfterId,
        outcome: StepOutcome,
    },
    /// The interaction finished but the step no longer validated
    StepRejected {
        id: DoAfterId,
        step: String,
        reason: RejectReason,
    },
    StepCancelled {
        id: DoAfterId,
        reason: CancelReason,
    },
    CyberLimbsUpdated {
        body: EntityId,
        limb_count: usize,
        efficiency: f32,
    },
    MaterialsScanned {
        session: UiSessionId,
    },
}

/// Run one simulation tick
pub fn run_simulation_tick(sim: &mut Simulation) -> Vec<SimulationEvent> {
    let mut events = Vec::new();
    let dt = sim.surgery.config().tick_seconds;

    resolve_do_afters(sim, dt, &mut events);
    dispatch_world_events(sim, &mut events);

    let config = sim.surgery.config().clone();
    let mut cyber_bodies: Vec<EntityId> = sim.world.cyberlimb_stats.keys().copied().collect();
    cyber_bodies.sort();
    for body in cyber_bodies {
        drain(&mut sim.world, &config, body, dt);
    }

    let mut bodies: Vec<EntityId> = sim.world.bodies.keys().copied().collect();
    bodies.sort();
    for body in bodies {
        update_bio_rejection(&mut sim.world, &config, body, dt);
    }

    for session in sim.ui.poll(&sim.world, &config, dt) {
        events.push(SimulationEvent::MaterialsScanned { session });
    }

    sim.world.tick();
    events
}

fn resolve_do_afters(sim: &mut Simulation, dt: f32, events: &mut Vec<SimulationEvent>) {
    let tolerance = sim.surgery.config().movement_tolerance;
    for event in sim.do_afters.tick(&sim.world, tolerance, dt) {
        match event {
            DoAfterEvent::Completed(id) => match sim.surgery.complete(&mut sim.world, id) {
                StepOutcome::Rejected { step, reason } => {
                    events.push(SimulationEvent::StepRejected { id, step, reason });
                }
                StepOutcome::Unknown => {}
                outcome => events.push(SimulationEvent::StepCompleted { id, outcome }),
            },
            DoAfterEvent::Cancelled(id, reason) => {
                // Explicit aborts already dropped the request
                sim.surgery.cancel(id);
                events.push(SimulationEvent::StepCancelled { id, reason });
            }
        }
    }
}

/// Route queued world events to the systems keeping derived state
fn dispatch_world_events(sim: &mut Simulation, events: &mut Vec<SimulationEvent>) {
    let pending = sim.world.drain_events();
    if pending.is_empty() {
        return;
    }
    tracing::debug!("Dispatching {} world events", pending.len());

    let mut contents_changed = BTreeSet::new();
    let mut cyber_changed = BTreeSet::new();
    let mut service_reset = BTreeSet::new();
    for event in &pending {
        handle_penalty_event(&mut sim.world, event);
        if event.changes_contents() {
            contents_changed.insert(event.body());
        }
        if event.changes_cyberlimbs() {
            cyber_changed.insert(event.body());
        }
        if let WorldEvent::ServiceTimeReset { body } = event {
            service_reset.insert(*body);
        }
    }

    // Penalty changes move capacity, so every touched body gets fresh usage
    for body in pending.iter().map(WorldEvent::body).collect::<BTreeSet<_>>() {
        if contents_changed.contains(&body) || sim.world.integrity_usage.contains_key(&body) {
            refresh_usage(&mut sim.world, body);
        }
    }

    let config = sim.surgery.config().clone();
    for body in cyber_changed {
        if let Some(stats) = recompute_stats(&mut sim.world, &config, body) {
            events.push(SimulationEvent::CyberLimbsUpdated {
                body,
                limb_count: stats.limb_count,
                efficiency: stats.efficiency(),
            });
        }
    }
    for body in service_reset {
        reset_service_time(&mut sim.world, &config, body);
    }
}
