//! Bio-rejection: damage that ramps toward the integrity overage
//!
//! The target is `max(0, usage - capacity)`. Current damage climbs toward the
//! target at `ramp_rate * excess` per second and never leaves `[0, excess]`.
//! A countermeasure reagent in the bloodstream reverses the ramp while it
//! lasts. Bodies without a bloodstream never accrue any of this.

use serde::{Deserialize, Serialize};

use crate::core::config::SurgeryConfig;
use crate::core::types::EntityId;
use crate::ecs::world::World;
use crate::integrity::usage::excess;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BioRejection {
    pub target: f32,
    pub current: f32,
}

impl BioRejection {
    /// Advance the ramp by `dt` seconds toward `excess`
    pub fn step(&mut self, excess: f32, dt: f32, rate: f32, suppression: Option<f32>) {
        self.target = excess.max(0.0);
        match suppression {
            Some(reduction) => {
                self.current -= reduction * dt;
            }
            None if self.current < self.target => {
                self.current += rate * self.target * dt;
            }
            None => {}
        }
        self.current = self.current.clamp(0.0, self.target);
    }
}

/// Per-tick update for one body
pub fn update_bio_rejection(world: &mut World, config: &SurgeryConfig, body: EntityId, dt: f32) {
    if !world.bloodstreams.contains_key(&body) {
        return;
    }
    let target = excess(world, config, body) as f32;

    let suppression = match world.bloodstreams.get_mut(&body) {
        Some(blood) if blood.has(&config.countermeasure_reagent) => {
            blood.metabolize(
                &config.countermeasure_reagent,
                config.countermeasure_metabolism_rate * dt,
            );
            Some(config.countermeasure_reduction_rate)
        }
        _ => None,
    };

    let state = world.bio_rejection.entry(body).or_default();
    let before = state.current;
    state.step(target, dt, config.bio_rejection_ramp_rate, suppression);
    if before == 0.0 && state.current > 0.0 {
        tracing::debug!("Bio-rejection started on {} (target {})", body, target);
    }
}

/// Damage currently dealt by bio-rejection; zero for bodies that cannot reject
pub fn bio_rejection_damage(world: &World, body: EntityId) -> f32 {
    if !world.bloodstreams.contains_key(&body) {
        return 0.0;
    }
    world.bio_rejection.get(&body).map(|b| b.current).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::graph::{spawn_humanoid, spawn_organ};
    use crate::body::part::PartType;
    use crate::core::types::Species;
    use crate::integrity::penalty::{apply_penalty, PenaltyCategory};

    #[test]
    fn test_step_ramps_not_jumps() {
        let mut state = BioRejection::default();
        state.step(2.0, 1.0, 0.1, None);
        assert!((state.current - 0.2).abs() < 0.0001);
        state.step(2.0, 100.0, 0.1, None);
        assert_eq!(state.current, 2.0);
    }

    #[test]
    fn test_step_clamps_when_target_drops() {
        let mut state = BioRejection { target: 3.0, current: 3.0 };
        state.step(1.0, 0.1, 0.1, None);
        assert_eq!(state.current, 1.0);
    }

    #[test]
    fn test_suppression_reduces_to_zero() {
        let mut state = BioRejection { target: 2.0, current: 1.0 };
        state.step(2.0, 1.0, 0.1, Some(0.5));
        assert!((state.current - 0.5).abs() < 0.0001);
        state.step(2.0, 10.0, 0.1, Some(0.5));
        assert_eq!(state.current, 0.0);
    }

    fn overloaded_body(world: &mut World) -> EntityId {
        let body = spawn_humanoid(world, Species::Human, "patient");
        let torso = world.bodies[&body].root;
        let organ = spawn_organ(world, "liver", PartType::Torso, Some(Species::Vox), 4);
        world.parts.get_mut(&torso).unwrap().organs.push(organ);
        apply_penalty(world, body, 4, "dirty-room", PenaltyCategory::DirtyRoom, vec![]);
        body
    }

    #[test]
    fn test_update_ramps_toward_excess() {
        let config = SurgeryConfig::default();
        let mut world = World::new();
        let body = overloaded_body(&mut world);
        // usage 4, capacity 6 - 4 = 2, excess 2
        update_bio_rejection(&mut world, &config, body, 1.0);
        let state = world.bio_rejection[&body];
        assert_eq!(state.target, 2.0);
        assert!(state.current > 0.0 && state.current < 2.0);
    }

    #[test]
    fn test_countermeasure_depletes_then_ramp_resumes() {
        let config = SurgeryConfig::default();
        let mut world = World::new();
        let body = overloaded_body(&mut world);
        for _ in 0..100 {
            update_bio_rejection(&mut world, &config, body, 1.0);
        }
        assert_eq!(bio_rejection_damage(&world, body), 2.0);

        world.bloodstreams.get_mut(&body).unwrap().add("immunosuppressant", 0.3);
        update_bio_rejection(&mut world, &config, body, 1.0);
        assert!(bio_rejection_damage(&world, body) < 2.0);

        for _ in 0..10 {
            update_bio_rejection(&mut world, &config, body, 1.0);
        }
        assert!(!world.bloodstreams[&body].has("immunosuppressant"));
        let after_depletion = bio_rejection_damage(&world, body);
        update_bio_rejection(&mut world, &config, body, 1.0);
        assert!(bio_rejection_damage(&world, body) > after_depletion);
    }

    #[test]
    fn test_no_bloodstream_no_damage() {
        let config = SurgeryConfig::default();
        let mut world = World::new();
        let body = overloaded_body(&mut world);
        world.bloodstreams.remove(&body);
        update_bio_rejection(&mut world, &config, body, 10.0);
        assert!(!world.bio_rejection.contains_key(&body));
        assert_eq!(bio_rejection_damage(&world, body), 0.0);
    }
}
