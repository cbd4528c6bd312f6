//! Surgery UI sessions
//!
//! Each open surgery window is a session in an arena keyed by a stable id.
//! Snapshots are rebuilt on demand and only handed out when they differ
//! from the last one sent, so callers can refresh freely without spamming
//! the client. The nearby-material scan runs on a poll interval and only
//! for open sessions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::body::graph::{parts_of, part_on_body};
use crate::body::part::PartType;
use crate::core::config::SurgeryConfig;
use crate::core::types::EntityId;
use crate::ecs::world::World;
use crate::surgery::catalog::Layer;
use crate::surgery::eligibility::Eligibility;
use crate::surgery::execution::SurgerySystem;
use crate::surgery::layer::{
    available_steps, is_organ_open, is_skin_open, is_tissue_open, layer_state, peek_layer_state,
};
use crate::surgery::reject::RejectReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UiSessionId(pub u32);

impl fmt::Display for UiSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ui {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartView {
    pub part: EntityId,
    pub name: String,
    pub part_type: PartType,
    pub skin_open: bool,
    pub tissue_open: bool,
    pub organ_open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub step: String,
    pub name: String,
    pub layer: Layer,
    pub target: Option<EntityId>,
    pub eligibility: Eligibility,
}

/// What the client shows for one surgery window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurgeryUiState {
    pub session: UiSessionId,
    pub body: EntityId,
    pub selected_part: Option<EntityId>,
    pub parts: Vec<PartView>,
    /// Steps offered on the selected part
    pub steps: Vec<StepView>,
    pub nearby_materials: Vec<EntityId>,
}

impl SurgeryUiState {
    pub fn to_json(&self) -> crate::core::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone)]
struct UiSession {
    user: EntityId,
    body: EntityId,
    selected_part: Option<EntityId>,
    last_sent: Option<SurgeryUiState>,
    since_poll: f32,
    nearby_materials: Vec<EntityId>,
}

#[derive(Debug, Clone, Default)]
pub struct SurgeryUi {
    sessions: BTreeMap<UiSessionId, UiSession>,
    next_id: u32,
}

impl SurgeryUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_open(&self, id: UiSessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn open(
        &mut self,
        world: &World,
        user: EntityId,
        body: EntityId,
    ) -> Result<UiSessionId, RejectReason> {
        if !world.bodies.contains_key(&body) {
            return Err(RejectReason::InvalidTarget);
        }
        self.next_id += 1;
        let id = UiSessionId(self.next_id);
        self.sessions.insert(
            id,
            UiSession {
                user,
                body,
                selected_part: None,
                last_sent: None,
                // First poll scans immediately
                since_poll: f32::INFINITY,
                nearby_materials: Vec::new(),
            },
        );
        tracing::debug!("Opened surgery {} for {} on {}", id, user, body);
        Ok(id)
    }

    pub fn close(&mut self, id: UiSessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Select the part the window works on; its layer state is created on
    /// first examination
    pub fn select_part(
        &mut self,
        world: &mut World,
        id: UiSessionId,
        part: EntityId,
    ) -> Result<(), RejectReason> {
        let session = self.sessions.get_mut(&id).ok_or(RejectReason::InvalidTarget)?;
        if !part_on_body(world, session.body, part) {
            return Err(RejectReason::PartNotOnBody);
        }
        layer_state(world, part);
        session.selected_part = Some(part);
        Ok(())
    }

    pub fn snapshot(
        &self,
        world: &World,
        system: &SurgerySystem,
        id: UiSessionId,
    ) -> Option<SurgeryUiState> {
        let session = self.sessions.get(&id)?;
        let catalog = system.catalog();

        let parts = parts_of(world, session.body)
            .into_iter()
            .filter_map(|part| {
                let p = world.parts.get(&part)?;
                let state = peek_layer_state(world, part)?;
                Some(PartView {
                    part,
                    name: p.name.clone(),
                    part_type: p.part_type,
                    skin_open: is_skin_open(&state, catalog),
                    tissue_open: is_tissue_open(&state, catalog),
                    organ_open: is_organ_open(&state, catalog),
                })
            })
            .collect();

        // A part that left the body deselects itself
        let selected_part = session
            .selected_part
            .filter(|part| part_on_body(world, session.body, *part));
        let steps = match selected_part {
            Some(part) => available_steps(world, catalog, session.user, part)
                .into_iter()
                .filter_map(|available| {
                    let step = catalog.step(&available.step)?;
                    Some(StepView {
                        name: step.display_name().to_string(),
                        layer: step.layer,
                        eligibility: system.step_eligibility(world, session.user, part, step),
                        target: available.target,
                        step: available.step,
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        Some(SurgeryUiState {
            session: id,
            body: session.body,
            selected_part,
            parts,
            steps,
            nearby_materials: session.nearby_materials.clone(),
        })
    }

    /// Snapshot only if it changed since the last one handed out
    pub fn refresh(
        &mut self,
        world: &World,
        system: &SurgerySystem,
        id: UiSessionId,
    ) -> Option<SurgeryUiState> {
        let snapshot = self.snapshot(world, system, id)?;
        let session = self.sessions.get_mut(&id)?;
        if session.last_sent.as_ref() == Some(&snapshot) {
            return None;
        }
        session.last_sent = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Advance poll timers; returns the sessions whose material scan ran.
    /// Sessions whose user or patient is gone are closed.
    pub fn poll(&mut self, world: &World, config: &SurgeryConfig, dt: f32) -> Vec<UiSessionId> {
        self.sessions.retain(|id, session| {
            let alive = world.hands.contains_key(&session.user)
                && world.bodies.contains_key(&session.body);
            if !alive {
                tracing::debug!("Closing surgery {}: participant gone", id);
            }
            alive
        });

        let mut scanned = Vec::new();
        for (id, session) in self.sessions.iter_mut() {
            session.since_poll += dt;
            if session.since_poll < config.ui_poll_interval {
                continue;
            }
            session.since_poll = 0.0;
            session.nearby_materials =
                scan_materials(world, session.user, config.material_scan_radius);
            scanned.push(*id);
        }
        scanned
    }
}

/// Loose items within `radius` of the user, in floor order
pub fn scan_materials(world: &World, user: EntityId, radius: f32) -> Vec<EntityId> {
    let origin = world.position(user);
    world
        .floor
        .iter()
        .copied()
        .filter(|item| world.position(*item).distance(&origin) <= radius)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::graph::{find_part, spawn_humanoid, spawn_item};
    use crate::body::item::Item;
    use crate::body::part::Symmetry;
    use crate::core::types::{Species, Vec2};
    use crate::surgery::catalog::SurgeryCatalog;

    fn setup() -> (World, SurgerySystem, EntityId, EntityId) {
        let mut world = World::new();
        let surgeon = spawn_humanoid(&mut world, Species::Human, "surgeon");
        let patient = spawn_humanoid(&mut world, Species::Human, "patient");
        let system =
            SurgerySystem::new(SurgeryCatalog::with_defaults().unwrap(), SurgeryConfig::default());
        (world, system, surgeon, patient)
    }

    #[test]
    fn test_refresh_only_on_change() {
        let (mut world, system, surgeon, patient) = setup();
        let mut ui = SurgeryUi::new();
        let id = ui.open(&world, surgeon, patient).unwrap();

        assert!(ui.refresh(&world, &system, id).is_some());
        assert!(ui.refresh(&world, &system, id).is_none());

        let arm = find_part(&world, patient, PartType::Arm, Symmetry::Left).unwrap();
        ui.select_part(&mut world, id, arm).unwrap();
        let state = ui.refresh(&world, &system, id).unwrap();
        assert_eq!(state.selected_part, Some(arm));
        assert!(state
            .steps
            .iter()
            .any(|s| s.step == "make-incision" && s.eligibility == Eligibility::None));
        assert!(ui.refresh(&world, &system, id).is_none());
    }

    #[test]
    fn test_select_part_must_be_on_body() {
        let (mut world, _system, surgeon, patient) = setup();
        let mut ui = SurgeryUi::new();
        let id = ui.open(&world, surgeon, patient).unwrap();
        let foreign = find_part(&world, surgeon, PartType::Arm, Symmetry::Left).unwrap();
        assert_eq!(ui.select_part(&mut world, id, foreign), Err(RejectReason::PartNotOnBody));

        let head = find_part(&world, patient, PartType::Head, Symmetry::None).unwrap();
        ui.select_part(&mut world, id, head).unwrap();
        assert!(world.layer_states.contains_key(&head));
    }

    #[test]
    fn test_poll_is_rate_limited() {
        let (mut world, _system, surgeon, patient) = setup();
        let config = SurgeryConfig::default();
        let mut ui = SurgeryUi::new();
        let id = ui.open(&world, surgeon, patient).unwrap();
        let gauze = spawn_item(&mut world, Item::new("gauze", "gauze"), Vec2::new(1.0, 0.0));
        spawn_item(&mut world, Item::new("far gauze", "gauze"), Vec2::new(10.0, 0.0));

        assert_eq!(ui.poll(&world, &config, 0.1), vec![id]);
        assert!(ui.poll(&world, &config, 0.5).is_empty());
        assert_eq!(ui.poll(&world, &config, 0.5), vec![id]);
        assert_eq!(ui.sessions[&id].nearby_materials, vec![gauze]);
    }

    #[test]
    fn test_closed_sessions_do_not_poll() {
        let (world, system, surgeon, patient) = setup();
        let config = SurgeryConfig::default();
        let mut ui = SurgeryUi::new();
        let id = ui.open(&world, surgeon, patient).unwrap();
        assert!(ui.close(id));
        assert!(ui.poll(&world, &config, 5.0).is_empty());
        assert!(ui.refresh(&world, &system, id).is_none());
    }

    #[test]
    fn test_sessions_close_when_patient_removed() {
        let (mut world, _system, surgeon, patient) = setup();
        let config = SurgeryConfig::default();
        let mut ui = SurgeryUi::new();
        ui.open(&world, surgeon, patient).unwrap();
        world.despawn(patient);
        ui.poll(&world, &config, 0.1);
        assert!(ui.is_empty());
    }
}
