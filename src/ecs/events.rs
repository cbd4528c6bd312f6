//! Typed world events
//!
//! Systems push events as they mutate the body graph; the simulation
//! dispatcher drains them once per tick and routes them to the systems that
//! keep derived per-body state (integrity usage, cyberlimb stats, penalties).

use serde::{Deserialize, Serialize};

use crate::core::types::EntityId;
use crate::integrity::penalty::{PenaltyCategory, PenaltyEntry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    LimbAttached { body: EntityId, limb: EntityId },
    LimbDetached { body: EntityId, limb: EntityId },
    OrganInserted { body: EntityId, part: EntityId, organ: EntityId },
    OrganRemoved { body: EntityId, part: EntityId, organ: EntityId },
    ImplantInserted { body: EntityId, part: EntityId, implant: EntityId },
    ImplantRemoved { body: EntityId, part: EntityId, implant: EntityId },
    ModuleInstalled { body: EntityId, limb: EntityId, module: EntityId },
    ModuleRemoved { body: EntityId, limb: EntityId, module: EntityId },
    /// Maintenance replaced the wiring; service time refills
    ServiceTimeReset { body: EntityId },
    PenaltyApplied {
        body: EntityId,
        part: Option<EntityId>,
        entry: PenaltyEntry,
    },
    PenaltyCleared {
        body: EntityId,
        selector: PenaltySelector,
    },
    StepCompleted { body: EntityId, part: EntityId, step: String },
}

/// Which penalty subtrees a clear event removes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PenaltySelector {
    Category(PenaltyCategory),
    Source(String),
}

impl WorldEvent {
    pub fn body(&self) -> EntityId {
        match self {
            WorldEvent::LimbAttached { body, .. }
            | WorldEvent::LimbDetached { body, .. }
            | WorldEvent::OrganInserted { body, .. }
            | WorldEvent::OrganRemoved { body, .. }
            | WorldEvent::ImplantInserted { body, .. }
            | WorldEvent::ImplantRemoved { body, .. }
            | WorldEvent::ModuleInstalled { body, .. }
            | WorldEvent::ModuleRemoved { body, .. }
            | WorldEvent::ServiceTimeReset { body }
            | WorldEvent::PenaltyApplied { body, .. }
            | WorldEvent::PenaltyCleared { body, .. }
            | WorldEvent::StepCompleted { body, .. } => *body,
        }
    }

    /// Does this event change what the body hosts (and so its integrity usage)?
    pub fn changes_contents(&self) -> bool {
        matches!(
            self,
            WorldEvent::LimbAttached { .. }
                | WorldEvent::LimbDetached { .. }
                | WorldEvent::OrganInserted { .. }
                | WorldEvent::OrganRemoved { .. }
                | WorldEvent::ImplantInserted { .. }
                | WorldEvent::ImplantRemoved { .. }
        )
    }

    /// Does this event require cyberlimb stats to be recomputed?
    pub fn changes_cyberlimbs(&self) -> bool {
        matches!(
            self,
            WorldEvent::LimbAttached { .. }
                | WorldEvent::LimbDetached { .. }
                | WorldEvent::ModuleInstalled { .. }
                | WorldEvent::ModuleRemoved { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_routing_flags() {
        let body = EntityId(1);
        let limb = EntityId(2);
        let attached = WorldEvent::LimbAttached { body, limb };
        assert!(attached.changes_contents());
        assert!(attached.changes_cyberlimbs());
        assert_eq!(attached.body(), body);

        let module = WorldEvent::ModuleInstalled { body, limb, module: EntityId(3) };
        assert!(!module.changes_contents());
        assert!(module.changes_cyberlimbs());

        let reset = WorldEvent::ServiceTimeReset { body };
        assert!(!reset.changes_cyberlimbs());
    }
}
