//! Stable rejection reasons for surgical requests
//!
//! Expected failures are values, not errors. The kebab-case code returned by
//! `as_str` is what the popup layer keys its messages on.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    UnknownStep,
    UnknownPart,
    PartNotOnBody,
    InvalidPartType,
    StepInProgress,
    SpeciesCannotReceiveImplants,
    LayerClosed,
    LayerOpen,
    StepAlreadyPerformed,
    StepNotAvailable,
    MissingTool,
    NothingToRepair,
    OrganNotInHand,
    LimbNotInHand,
    ImplantNotInHand,
    ModuleNotInHand,
    InvalidTarget,
    TargetNotFound,
    SlotOccupied,
    CannotDetachRoot,
    IntegrityOverCapacity,
    NotCyberLimb,
    PanelClosed,
    ModuleSlotsFull,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::UnknownStep => "unknown-step",
            RejectReason::UnknownPart => "unknown-part",
            RejectReason::PartNotOnBody => "part-not-on-body",
            RejectReason::InvalidPartType => "invalid-part-type",
            RejectReason::StepInProgress => "step-in-progress",
            RejectReason::SpeciesCannotReceiveImplants => "slime-cannot-receive-implants",
            RejectReason::LayerClosed => "layer-closed",
            RejectReason::LayerOpen => "layer-open",
            RejectReason::StepAlreadyPerformed => "step-already-performed",
            RejectReason::StepNotAvailable => "step-not-available",
            RejectReason::MissingTool => "missing-tool",
            RejectReason::NothingToRepair => "nothing-to-repair",
            RejectReason::OrganNotInHand => "organ-not-in-hand",
            RejectReason::LimbNotInHand => "limb-not-in-hand",
            RejectReason::ImplantNotInHand => "implant-not-in-hand",
            RejectReason::ModuleNotInHand => "module-not-in-hand",
            RejectReason::InvalidTarget => "invalid-target",
            RejectReason::TargetNotFound => "target-not-found",
            RejectReason::SlotOccupied => "slot-occupied",
            RejectReason::CannotDetachRoot => "cannot-detach-root",
            RejectReason::IntegrityOverCapacity => "integrity-over-capacity",
            RejectReason::NotCyberLimb => "not-cyber-limb",
            RejectReason::PanelClosed => "panel-closed",
            RejectReason::ModuleSlotsFull => "module-slots-full",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(RejectReason::MissingTool.as_str(), "missing-tool");
        assert_eq!(RejectReason::OrganNotInHand.as_str(), "organ-not-in-hand");
        assert_eq!(
            RejectReason::IntegrityOverCapacity.to_string(),
            "integrity-over-capacity"
        );
        assert_eq!(
            RejectReason::SpeciesCannotReceiveImplants.as_str(),
            "slime-cannot-receive-implants"
        );
    }

    #[test]
    fn test_serde_code_matches_as_str() {
        let json = serde_json::to_string(&RejectReason::StepInProgress).unwrap();
        assert_eq!(json, "\"step-in-progress\"");
    }
}
