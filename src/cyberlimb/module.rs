//! Cyberlimb modules and maintenance
//!
//! Modules are items installed into a cyberlimb through its maintenance
//! panel. While a panel is open the body carries an `OpenPanel` penalty;
//! sealing the panel clears that whole category.

use serde::{Deserialize, Serialize};

use crate::body::graph::{give_or_drop, is_holding, parts_of};
use crate::core::config::SurgeryConfig;
use crate::core::types::EntityId;
use crate::ecs::events::WorldEvent;
use crate::ecs::world::World;
use crate::integrity::penalty::{
    apply_penalty, clear_penalty_category, clear_penalty_source, PenaltyCategory,
};
use crate::surgery::reject::RejectReason;

/// Cybernetic state carried by a body part
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CyberLimb {
    /// Installed module entities, in install order
    pub modules: Vec<EntityId>,
    pub panel_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LimbModule {
    /// Extra battery capacity
    Battery { capacity: f32 },
    /// Extra service time (seconds)
    Storage { service_time: f32 },
    /// Counts toward limb efficiency
    Manipulator,
    /// Multiplies total service time
    Capacitor,
}

/// Integrity penalty while a panel stays open
const OPEN_PANEL_PENALTY: u32 = 1;

fn cyber_limb_mut(world: &mut World, limb: EntityId) -> Result<&mut CyberLimb, RejectReason> {
    world
        .parts
        .get_mut(&limb)
        .ok_or(RejectReason::UnknownPart)?
        .cyber
        .as_mut()
        .ok_or(RejectReason::NotCyberLimb)
}

fn panel_source(limb: EntityId) -> String {
    format!("open-panel:{}", limb.0)
}

fn panel_is_open(world: &World, limb: EntityId) -> bool {
    world
        .parts
        .get(&limb)
        .and_then(|p| p.cyber.as_ref())
        .is_some_and(|c| c.panel_open)
}

/// Charge the body for an open panel on a limb that just joined it
pub(crate) fn panel_attached(world: &mut World, body: EntityId, limb: EntityId) {
    if panel_is_open(world, limb) {
        apply_penalty(
            world,
            body,
            OPEN_PANEL_PENALTY,
            &panel_source(limb),
            PenaltyCategory::OpenPanel,
            vec![],
        );
    }
}

/// An open panel leaving the body takes its penalty along
pub(crate) fn panel_detached(world: &mut World, body: EntityId, limb: EntityId) {
    if panel_is_open(world, limb) {
        clear_penalty_source(world, body, &panel_source(limb));
    }
}

pub fn open_panel(world: &mut World, limb: EntityId) -> Result<(), RejectReason> {
    let cyber = cyber_limb_mut(world, limb)?;
    if cyber.panel_open {
        return Ok(());
    }
    cyber.panel_open = true;
    if let Some(body) = world.parts.get(&limb).and_then(|p| p.body) {
        panel_attached(world, body, limb);
    }
    Ok(())
}

/// Seal a maintenance panel. Clears the body's open-panel category once no
/// other limb on the body still has its panel open.
pub fn close_panel(world: &mut World, limb: EntityId) -> Result<(), RejectReason> {
    let cyber = cyber_limb_mut(world, limb)?;
    if !cyber.panel_open {
        return Ok(());
    }
    cyber.panel_open = false;
    let Some(body) = world.parts.get(&limb).and_then(|p| p.body) else {
        return Ok(());
    };
    let others_open = parts_of(world, body)
        .into_iter()
        .any(|p| panel_is_open(world, p));
    if others_open {
        clear_penalty_source(world, body, &panel_source(limb));
    } else {
        clear_penalty_category(world, body, PenaltyCategory::OpenPanel);
    }
    Ok(())
}

/// Install a held module into a limb with an open panel
pub fn install_module(
    world: &mut World,
    config: &SurgeryConfig,
    user: EntityId,
    limb: EntityId,
    module: EntityId,
) -> Result<(), RejectReason> {
    if !world.limb_modules.contains_key(&module) || !is_holding(world, user, module) {
        return Err(RejectReason::ModuleNotInHand);
    }
    let cyber = cyber_limb_mut(world, limb)?;
    if !cyber.panel_open {
        return Err(RejectReason::PanelClosed);
    }
    if cyber.modules.len() >= config.max_modules_per_limb {
        return Err(RejectReason::ModuleSlotsFull);
    }
    cyber.modules.push(module);
    if let Some(hands) = world.hands.get_mut(&user) {
        hands.remove(module);
    }
    if let Some(body) = world.parts.get(&limb).and_then(|p| p.body) {
        world.emit(WorldEvent::ModuleInstalled { body, limb, module });
    }
    Ok(())
}

/// Pull a module out of a limb with an open panel into the user's hands
pub fn remove_module(
    world: &mut World,
    user: EntityId,
    limb: EntityId,
    module: EntityId,
) -> Result<(), RejectReason> {
    let cyber = cyber_limb_mut(world, limb)?;
    if !cyber.panel_open {
        return Err(RejectReason::PanelClosed);
    }
    let Some(index) = cyber.modules.iter().position(|m| *m == module) else {
        return Err(RejectReason::TargetNotFound);
    };
    cyber.modules.remove(index);
    give_or_drop(world, user, module);
    if let Some(body) = world.parts.get(&limb).and_then(|p| p.body) {
        world.emit(WorldEvent::ModuleRemoved { body, limb, module });
    }
    Ok(())
}

/// Replace a limb's wiring during maintenance; refills the body's service time
pub fn replace_wiring(world: &mut World, limb: EntityId) -> Result<(), RejectReason> {
    let cyber = cyber_limb_mut(world, limb)?;
    if !cyber.panel_open {
        return Err(RejectReason::PanelClosed);
    }
    if let Some(body) = world.parts.get(&limb).and_then(|p| p.body) {
        world.emit(WorldEvent::ServiceTimeReset { body });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::graph::{
        attach_part, detach_part, find_part, give, spawn_cyber_limb, spawn_humanoid, spawn_item,
    };
    use crate::body::item::Item;
    use crate::body::part::{PartType, Symmetry};
    use crate::core::types::{Species, Vec2};
    use crate::integrity::penalty::total_penalty;

    fn setup() -> (World, EntityId, EntityId) {
        let mut world = World::new();
        let body = spawn_humanoid(&mut world, Species::Human, "patient");
        let torso = world.bodies[&body].root;
        let arm = find_part(&world, body, PartType::Arm, Symmetry::Left).unwrap();
        detach_part(&mut world, arm).unwrap();
        let limb = spawn_cyber_limb(&mut world, PartType::Arm, Symmetry::Left);
        attach_part(&mut world, torso, limb).unwrap();
        world.drain_events();
        (world, body, limb)
    }

    fn spawn_module(world: &mut World, user: EntityId, module: LimbModule) -> EntityId {
        let id = spawn_item(world, Item::new("module", "limb-module"), Vec2::default());
        world.limb_modules.insert(id, module);
        give(world, user, id);
        id
    }

    #[test]
    fn test_panel_penalty_lifecycle() {
        let (mut world, body, limb) = setup();
        open_panel(&mut world, limb).unwrap();
        assert_eq!(total_penalty(&world, body), 1);
        open_panel(&mut world, limb).unwrap();
        assert_eq!(total_penalty(&world, body), 1);
        close_panel(&mut world, limb).unwrap();
        assert_eq!(total_penalty(&world, body), 0);
    }

    #[test]
    fn test_open_panel_penalty_follows_limb() {
        let (mut world, body, limb) = setup();
        let torso = world.bodies[&body].root;
        open_panel(&mut world, limb).unwrap();
        detach_part(&mut world, limb).unwrap();
        assert_eq!(total_penalty(&world, body), 0);

        attach_part(&mut world, torso, limb).unwrap();
        assert_eq!(total_penalty(&world, body), 1);

        detach_part(&mut world, limb).unwrap();
        close_panel(&mut world, limb).unwrap();
        attach_part(&mut world, torso, limb).unwrap();
        assert_eq!(total_penalty(&world, body), 0);
    }

    #[test]
    fn test_install_requires_open_panel() {
        let config = SurgeryConfig::default();
        let (mut world, body, limb) = setup();
        let module = spawn_module(&mut world, body, LimbModule::Manipulator);
        assert_eq!(
            install_module(&mut world, &config, body, limb, module),
            Err(RejectReason::PanelClosed)
        );
        open_panel(&mut world, limb).unwrap();
        install_module(&mut world, &config, body, limb, module).unwrap();
        assert!(!is_holding(&world, body, module));
        assert_eq!(world.drain_events().len(), 1);
    }

    #[test]
    fn test_slot_limit() {
        let config = SurgeryConfig { max_modules_per_limb: 1, ..Default::default() };
        let (mut world, body, limb) = setup();
        open_panel(&mut world, limb).unwrap();
        let first = spawn_module(&mut world, body, LimbModule::Capacitor);
        install_module(&mut world, &config, body, limb, first).unwrap();
        let second = spawn_module(&mut world, body, LimbModule::Capacitor);
        assert_eq!(
            install_module(&mut world, &config, body, limb, second),
            Err(RejectReason::ModuleSlotsFull)
        );
    }

    #[test]
    fn test_remove_module_returns_to_hand() {
        let config = SurgeryConfig::default();
        let (mut world, body, limb) = setup();
        open_panel(&mut world, limb).unwrap();
        let module = spawn_module(&mut world, body, LimbModule::Battery { capacity: 50.0 });
        install_module(&mut world, &config, body, limb, module).unwrap();
        remove_module(&mut world, body, limb, module).unwrap();
        assert!(is_holding(&world, body, module));
        assert_eq!(
            remove_module(&mut world, body, limb, module),
            Err(RejectReason::TargetNotFound)
        );
    }

    #[test]
    fn test_biological_limb_is_not_cyber() {
        let (mut world, body, _) = setup();
        let leg = find_part(&world, body, PartType::Leg, Symmetry::Left).unwrap();
        assert_eq!(open_panel(&mut world, leg), Err(RejectReason::NotCyberLimb));
    }
}
