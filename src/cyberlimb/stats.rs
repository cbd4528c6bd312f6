//! Aggregate cyberlimb stats per body
//!
//! Recomputed whenever the body's limb topology or any limb's module set
//! changes. Current battery charge and remaining service time survive a
//! recompute (clamped down if capacity shrank); only the first cyberlimb a
//! body ever receives and an explicit service reset fill them. Losing every
//! cyberlimb parks the current values until one is attached again.

use serde::{Deserialize, Serialize};

use crate::body::graph::parts_of;
use crate::core::config::SurgeryConfig;
use crate::core::types::EntityId;
use crate::cyberlimb::module::LimbModule;
use crate::ecs::world::World;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyberLimbStats {
    pub limb_count: usize,
    pub battery_capacity: f32,
    pub battery_charge: f32,
    /// Seconds
    pub service_time_capacity: f32,
    pub service_time_remaining: f32,
    /// Efficiency from modules before depletion penalties (1.0 = 100%)
    pub base_efficiency: f32,
    pub manipulator_count: usize,
    pub capacitor_count: usize,
    pub has_cyber_legs: bool,
    /// Set once the body has hosted a cyberlimb; never cleared
    pub initialized: bool,
    depletion_multiplier: f32,
}

impl CyberLimbStats {
    pub fn battery_depleted(&self) -> bool {
        self.battery_charge <= 0.0
    }

    pub fn service_expired(&self) -> bool {
        self.service_time_remaining <= 0.0
    }

    /// Effective efficiency; each depleted resource multiplies independently
    pub fn efficiency(&self) -> f32 {
        let mut efficiency = self.base_efficiency;
        if self.battery_depleted() {
            efficiency *= self.depletion_multiplier;
        }
        if self.service_expired() {
            efficiency *= self.depletion_multiplier;
        }
        efficiency
    }
}

/// Walk every cyberlimb on the body and rebuild its aggregate stats
pub fn recompute_stats(
    world: &mut World,
    config: &SurgeryConfig,
    body: EntityId,
) -> Option<CyberLimbStats> {
    if !world.bodies.contains_key(&body) {
        return None;
    }

    let mut limb_count: usize = 0;
    let mut battery_capacity = 0.0_f32;
    let mut service_time = 0.0_f32;
    let mut manipulator_count: usize = 0;
    let mut capacitor_count: usize = 0;
    let mut has_cyber_legs = false;

    for part_id in parts_of(world, body) {
        let Some(part) = world.parts.get(&part_id) else {
            continue;
        };
        let Some(cyber) = part.cyber.as_ref() else {
            continue;
        };
        limb_count += 1;
        has_cyber_legs |= part.part_type.is_leg();
        battery_capacity += config.limb_base_battery;

        for module in cyber.modules.iter().filter_map(|m| world.limb_modules.get(m)) {
            match module {
                LimbModule::Battery { capacity } => battery_capacity += *capacity,
                LimbModule::Storage { service_time: extra } => service_time += *extra,
                LimbModule::Manipulator => manipulator_count += 1,
                LimbModule::Capacitor => capacitor_count += 1,
            }
        }
    }

    let service_time_capacity = if limb_count > 0 {
        (config.base_service_time + service_time)
            * (1.0 + capacitor_count as f32 * config.capacitor_bonus)
    } else {
        0.0
    };
    let base_efficiency =
        1.0 + manipulator_count.saturating_sub(1) as f32 * config.manipulator_bonus;

    let prev = world.cyberlimb_stats.get(&body);
    let initialized = limb_count > 0 || prev.is_some_and(|p| p.initialized);
    let (battery_charge, service_time_remaining) = match prev {
        Some(prev) if prev.initialized && limb_count == 0 => {
            (prev.battery_charge, prev.service_time_remaining)
        }
        Some(prev) if prev.initialized => (
            prev.battery_charge.min(battery_capacity),
            prev.service_time_remaining.min(service_time_capacity),
        ),
        _ => (battery_capacity, service_time_capacity),
    };

    let stats = CyberLimbStats {
        limb_count,
        battery_capacity,
        battery_charge,
        service_time_capacity,
        service_time_remaining,
        base_efficiency,
        manipulator_count,
        capacitor_count,
        has_cyber_legs,
        initialized,
        depletion_multiplier: config.depletion_multiplier,
    };
    tracing::debug!(
        "Cyberlimb stats for {}: {} limbs, battery {}/{}, service {}/{}, efficiency {}",
        body,
        limb_count,
        battery_charge,
        battery_capacity,
        service_time_remaining,
        service_time_capacity,
        stats.efficiency()
    );
    world.cyberlimb_stats.insert(body, stats.clone());
    Some(stats)
}

/// Maintenance reset: recompute, then refill service time
pub fn reset_service_time(world: &mut World, config: &SurgeryConfig, body: EntityId) {
    recompute_stats(world, config, body);
    if let Some(stats) = world.cyberlimb_stats.get_mut(&body) {
        stats.service_time_remaining = stats.service_time_capacity;
    }
}

/// Spend service time and battery for `dt` seconds of use
pub fn drain(world: &mut World, config: &SurgeryConfig, body: EntityId, dt: f32) {
    let Some(stats) = world.cyberlimb_stats.get_mut(&body) else {
        return;
    };
    if stats.limb_count == 0 {
        return;
    }
    let was_depleted = stats.battery_depleted();
    stats.service_time_remaining = (stats.service_time_remaining - dt).max(0.0);
    let used = config.battery_drain_per_limb * stats.limb_count as f32 * dt;
    stats.battery_charge = (stats.battery_charge - used).max(0.0);
    if !was_depleted && stats.battery_depleted() {
        tracing::info!("Cyberlimb battery depleted on {}", body);
    }
}

/// Charge the body's cyberlimb battery; returns the amount accepted
pub fn charge_battery(world: &mut World, body: EntityId, amount: f32) -> f32 {
    let Some(stats) = world.cyberlimb_stats.get_mut(&body) else {
        return 0.0;
    };
    let space = (stats.battery_capacity - stats.battery_charge).max(0.0);
    let added = amount.max(0.0).min(space);
    stats.battery_charge += added;
    added
}

/// Set remaining service time directly (clamped to capacity)
pub fn set_service_time_remaining(world: &mut World, body: EntityId, seconds: f32) {
    if let Some(stats) = world.cyberlimb_stats.get_mut(&body) {
        stats.service_time_remaining = seconds.clamp(0.0, stats.service_time_capacity);
    }
}

/// Movement speed multiplier from cyber legs, read at query time so
/// depletion shows up without any recompute
pub fn movement_speed_modifier(world: &World, body: EntityId) -> f32 {
    match world.cyberlimb_stats.get(&body) {
        Some(stats) if stats.has_cyber_legs => stats.efficiency().min(1.0),
        _ => 1.0,
    }
}
