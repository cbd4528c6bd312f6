//! Body parts and the bodies that own them

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::types::{EntityId, Species};
use crate::cyberlimb::module::CyberLimb;

/// Anatomical part type; constrains which surgical steps apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartType {
    Torso,
    Head,
    Arm,
    Hand,
    Leg,
    Foot,
    Tail,
}

impl PartType {
    /// Part types this part can be attached to
    pub fn attaches_to(&self) -> &'static [PartType] {
        match self {
            PartType::Torso => &[],
            PartType::Head | PartType::Arm | PartType::Leg | PartType::Tail => &[PartType::Torso],
            PartType::Hand => &[PartType::Arm],
            PartType::Foot => &[PartType::Leg],
        }
    }

    pub fn can_attach_to(&self, parent: PartType) -> bool {
        self.attaches_to().contains(&parent)
    }

    /// Does this part carry the body's weight?
    pub fn is_leg(&self) -> bool {
        matches!(self, PartType::Leg | PartType::Foot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Symmetry {
    #[default]
    None,
    Left,
    Right,
}

/// A body part, attached or severed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyPart {
    pub name: String,
    pub part_type: PartType,
    pub symmetry: Symmetry,
    /// Owning body while attached
    pub body: Option<EntityId>,
    pub parent: Option<EntityId>,
    /// Attached child parts, in attachment order
    pub children: Vec<EntityId>,
    pub organs: Vec<EntityId>,
    pub implants: Vec<EntityId>,
    /// Named traits grafted onto the part by surgery
    pub traits: BTreeSet<String>,
    /// Integrity charged when hosted by a body of another species
    pub integrity_cost: u32,
    /// Species the part grew on; None for mechanical parts
    pub donor: Option<Species>,
    pub cyber: Option<CyberLimb>,
}

impl BodyPart {
    pub fn new(name: impl Into<String>, part_type: PartType, symmetry: Symmetry) -> Self {
        Self {
            name: name.into(),
            part_type,
            symmetry,
            body: None,
            parent: None,
            children: Vec::new(),
            organs: Vec::new(),
            implants: Vec::new(),
            traits: BTreeSet::new(),
            integrity_cost: 2,
            donor: None,
            cyber: None,
        }
    }

    pub fn is_cyber(&self) -> bool {
        self.cyber.is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.body.is_some()
    }
}

/// A body: a species and the root of its part tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub name: String,
    pub species: Species,
    pub root: EntityId,
}
