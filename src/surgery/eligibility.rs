//! Operation eligibility: can this user perform this operation, and how?

use serde::{Deserialize, Serialize};

use crate::body::graph::held_items;
use crate::core::config::SurgeryConfig;
use crate::core::types::EntityId;
use crate::ecs::world::World;
use crate::surgery::catalog::SurgeryOperation;
use crate::surgery::layer::peek_layer_state;
use crate::surgery::reject::RejectReason;
use crate::surgery::tools::{item_satisfies, CapabilityAllowList, ToolEvaluators, ToolQuality};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodKind {
    Primary,
    /// Improvised; costs integrity and time
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Eligibility {
    Primary,
    Secondary,
    None,
}

/// Everything deciding which held items count as which tools
pub struct ToolRules {
    pub evaluators: ToolEvaluators,
    pub allow_list: CapabilityAllowList,
    pub master_tool: ToolQuality,
}

impl ToolRules {
    pub fn new(config: &SurgeryConfig) -> Self {
        Self {
            evaluators: ToolEvaluators::with_defaults(),
            allow_list: CapabilityAllowList::new(),
            master_tool: ToolQuality::new(&config.master_tool_quality),
        }
    }
}

/// First held item usable for each method of an operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationTools {
    pub primary: Option<EntityId>,
    pub secondary: Option<EntityId>,
}

impl OperationTools {
    pub fn eligibility(&self) -> Eligibility {
        if self.primary.is_some() {
            Eligibility::Primary
        } else if self.secondary.is_some() {
            Eligibility::Secondary
        } else {
            Eligibility::None
        }
    }

    pub fn item_for(&self, method: MethodKind) -> Option<EntityId> {
        match method {
            MethodKind::Primary => self.primary,
            MethodKind::Secondary => self.secondary,
        }
    }
}

pub fn operation_tools(
    world: &World,
    rules: &ToolRules,
    user: EntityId,
    operation: &SurgeryOperation,
) -> OperationTools {
    let held = held_items(world, user);
    let primary = held.iter().copied().find(|id| {
        world.items.get(id).is_some_and(|item| {
            item_satisfies(item, &operation.primary_tools, &rules.allow_list, &rules.master_tool)
        })
    });

    // Repairs are never improvised
    let secondary = if operation.is_repair() {
        None
    } else {
        operation.secondary.as_ref().and_then(|method| {
            let evaluator = rules.evaluators.get(&method.evaluator)?;
            held.iter().copied().find(|id| {
                world
                    .items
                    .get(id)
                    .is_some_and(|item| evaluator.satisfied_by(item, &method.tools))
            })
        })
    };

    OperationTools { primary, secondary }
}

/// Does the part carry the marker a repair operation consumes?
pub fn has_repair_marker(world: &World, part: EntityId, operation: &SurgeryOperation) -> bool {
    match operation.repair_operation_for.as_deref() {
        Some(repaired) => peek_layer_state(world, part).is_some_and(|s| s.has_marker(repaired)),
        None => true,
    }
}

pub fn can_use_operation(
    world: &World,
    rules: &ToolRules,
    user: EntityId,
    part: EntityId,
    operation: &SurgeryOperation,
) -> Eligibility {
    if !has_repair_marker(world, part, operation) {
        return Eligibility::None;
    }
    operation_tools(world, rules, user, operation).eligibility()
}

/// Pick the method a step runs with.
///
/// An explicit choice is honoured or rejected. Without one, primary wins;
/// the improvised path is only taken implicitly when the policy allows it.
pub fn select_method(
    tools: &OperationTools,
    explicit: Option<MethodKind>,
    allow_implicit_improvised: bool,
) -> Result<MethodKind, RejectReason> {
    let method = match explicit {
        Some(method) => method,
        None if tools.primary.is_some() => MethodKind::Primary,
        None if allow_implicit_improvised => MethodKind::Secondary,
        None => return Err(RejectReason::MissingTool),
    };
    match tools.item_for(method) {
        Some(_) => Ok(method),
        None => Err(RejectReason::MissingTool),
    }
}
