//! Display surfaces: examine text and the health-scanner report

use serde::Serialize;

use crate::core::config::SurgeryConfig;
use crate::core::error::{Result, SurgeryError};
use crate::core::types::EntityId;
use crate::cyberlimb::stats::{movement_speed_modifier, CyberLimbStats};
use crate::ecs::world::World;
use crate::integrity::bio_rejection::bio_rejection_damage;
use crate::integrity::penalty::total_penalty;
use crate::integrity::usage::{capacity, compute_usage};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthScannerReport {
    pub body: EntityId,
    pub total_penalty: u32,
    pub contextual_penalty: u32,
    pub part_penalty: u32,
    pub integrity_usage: u32,
    pub integrity_capacity: u32,
    pub bio_rejection: f32,
    pub movement_speed: f32,
    pub cyberlimbs: Option<CyberLimbStats>,
}

impl HealthScannerReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn scan(world: &World, config: &SurgeryConfig, body: EntityId) -> Result<HealthScannerReport> {
    if !world.bodies.contains_key(&body) {
        return Err(SurgeryError::EntityNotFound(body));
    }
    let ledger = world.integrity.get(&body);
    let total = total_penalty(world, body);
    Ok(HealthScannerReport {
        body,
        total_penalty: total,
        contextual_penalty: ledger.map(|l| l.contextual_total()).unwrap_or(0),
        part_penalty: ledger.map(|l| l.parts_total()).unwrap_or(0),
        integrity_usage: compute_usage(world, body),
        integrity_capacity: capacity(config, total),
        bio_rejection: bio_rejection_damage(world, body),
        movement_speed: movement_speed_modifier(world, body),
        cyberlimbs: world
            .cyberlimb_stats
            .get(&body)
            .filter(|s| s.limb_count > 0)
            .cloned(),
    })
}

/// Lines shown when someone examines the body
pub fn examine_integrity(world: &World, config: &SurgeryConfig, body: EntityId) -> Vec<String> {
    let mut lines = Vec::new();
    let total = total_penalty(world, body);
    let usage = compute_usage(world, body);
    let cap = capacity(config, total);

    if usage > 0 || total > 0 {
        lines.push(format!("Integrity: {} / {} used", usage, cap));
    }
    if total > 0 {
        lines.push(format!("Surgical complications: {}", total));
    }
    let rejection = bio_rejection_damage(world, body);
    if rejection > 0.0 {
        lines.push(format!("Showing signs of bio-rejection ({:.1})", rejection));
    }
    if let Some(stats) = world.cyberlimb_stats.get(&body).filter(|s| s.limb_count > 0) {
        lines.push(format!(
            "Cyberlimbs: battery {:.0}/{:.0}, service {:.0}s/{:.0}s, efficiency {:.0}%",
            stats.battery_charge,
            stats.battery_capacity,
            stats.service_time_remaining,
            stats.service_time_capacity,
            stats.efficiency() * 100.0
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::graph::spawn_humanoid;
    use crate::core::types::Species;
    use crate::integrity::penalty::{apply_penalty, PenaltyCategory};

    #[test]
    fn test_clean_body_examines_empty() {
        let config = SurgeryConfig::default();
        let mut world = World::new();
        let body = spawn_humanoid(&mut world, Species::Human, "patient");
        assert!(examine_integrity(&world, &config, body).is_empty());
    }

    #[test]
    fn test_scan_reports_penalties() {
        let config = SurgeryConfig::default();
        let mut world = World::new();
        let body = spawn_humanoid(&mut world, Species::Human, "patient");
        apply_penalty(&mut world, body, 3, "dirty-room", PenaltyCategory::DirtyRoom, vec![]);

        let report = scan(&world, &config, body).unwrap();
        assert_eq!(report.total_penalty, 3);
        assert_eq!(report.contextual_penalty, 3);
        assert_eq!(report.integrity_capacity, 3);
        assert!(report.to_json().unwrap().contains("\"total_penalty\": 3"));

        let lines = examine_integrity(&world, &config, body);
        assert!(lines.iter().any(|l| l.contains("complications: 3")));
    }

    #[test]
    fn test_scan_unknown_body() {
        let config = SurgeryConfig::default();
        let world = World::new();
        assert!(matches!(
            scan(&world, &config, EntityId(9)),
            Err(SurgeryError::EntityNotFound(_))
        ));
    }
}
