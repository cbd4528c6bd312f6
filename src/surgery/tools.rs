//! Tool capabilities and improvised-method evaluators

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::body::item::Item;

/// Capability tag carried by a tool ("scalpel", "retractor", ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolQuality(pub String);

impl ToolQuality {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pluggable predicate deciding whether a held item can stand in for the
/// proper tools of an operation
pub trait ToolEvaluator: Send + Sync {
    fn satisfied_by(&self, item: &Item, tools: &[ToolQuality]) -> bool;
}

/// Anything with an edge
pub struct SharpTool;

impl ToolEvaluator for SharpTool {
    fn satisfied_by(&self, item: &Item, _tools: &[ToolQuality]) -> bool {
        item.sharp
    }
}

/// Anything heavy enough to break bone
pub struct BluntDamageTool {
    pub min_damage: f32,
}

impl ToolEvaluator for BluntDamageTool {
    fn satisfied_by(&self, item: &Item, _tools: &[ToolQuality]) -> bool {
        item.blunt_damage >= self.min_damage
    }
}

/// Anything hot enough to cauterize
pub struct HeatSource {
    pub min_heat: f32,
}

impl ToolEvaluator for HeatSource {
    fn satisfied_by(&self, item: &Item, _tools: &[ToolQuality]) -> bool {
        item.heat >= self.min_heat
    }
}

/// Item carries every quality listed in the method's tool set
pub struct HasTools;

impl ToolEvaluator for HasTools {
    fn satisfied_by(&self, item: &Item, tools: &[ToolQuality]) -> bool {
        !tools.is_empty() && tools.iter().all(|t| item.qualities.contains(t))
    }
}

/// Evaluators keyed by the name operations refer to them by
pub struct ToolEvaluators {
    by_name: AHashMap<String, Box<dyn ToolEvaluator>>,
}

impl ToolEvaluators {
    pub fn new() -> Self {
        Self {
            by_name: AHashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut evaluators = Self::new();
        evaluators.register("sharp-tool", SharpTool);
        evaluators.register("blunt-damage-tool", BluntDamageTool { min_damage: 5.0 });
        evaluators.register("heat-source", HeatSource { min_heat: 300.0 });
        evaluators.register("has-tools", HasTools);
        evaluators
    }

    pub fn register(&mut self, name: &str, evaluator: impl ToolEvaluator + 'static) {
        self.by_name.insert(name.to_string(), Box::new(evaluator));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolEvaluator> {
        self.by_name.get(name).map(|e| e.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

impl Default for ToolEvaluators {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Legacy items that count as having a capability without declaring it,
/// keyed by item prototype
#[derive(Debug, Clone, Default)]
pub struct CapabilityAllowList {
    entries: AHashMap<String, AHashSet<ToolQuality>>,
}

impl CapabilityAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&mut self, prototype: &str, quality: &str) {
        self.entries
            .entry(prototype.to_string())
            .or_default()
            .insert(ToolQuality::new(quality));
    }

    pub fn allows(&self, prototype: &str, quality: &ToolQuality) -> bool {
        self.entries.get(prototype).is_some_and(|q| q.contains(quality))
    }
}

/// Does one item satisfy every required quality (or carry the master tool)?
pub fn item_satisfies(
    item: &Item,
    required: &[ToolQuality],
    allow_list: &CapabilityAllowList,
    master: &ToolQuality,
) -> bool {
    if item.qualities.contains(master) {
        return true;
    }
    !required.is_empty()
        && required
            .iter()
            .all(|q| item.qualities.contains(q) || allow_list.allows(&item.prototype, q))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(name: &str) -> ToolQuality {
        ToolQuality::new(name)
    }

    #[test]
    fn test_item_needs_all_qualities() {
        let item = Item::new("scalpel", "scalpel").with_quality("scalpel");
        let allow = CapabilityAllowList::new();
        let master = q("omnitool");
        assert!(item_satisfies(&item, &[q("scalpel")], &allow, &master));
        assert!(!item_satisfies(&item, &[q("scalpel"), q("cautery")], &allow, &master));
    }

    #[test]
    fn test_master_tool_satisfies_anything() {
        let item = Item::new("omnitool", "omnitool").with_quality("omnitool");
        let allow = CapabilityAllowList::new();
        assert!(item_satisfies(&item, &[q("saw"), q("retractor")], &allow, &q("omnitool")));
    }

    #[test]
    fn test_allow_list_grants_capability() {
        let item = Item::new("old wrench", "legacy-wrench");
        let mut allow = CapabilityAllowList::new();
        allow.allow("legacy-wrench", "retractor");
        let master = q("omnitool");
        assert!(item_satisfies(&item, &[q("retractor")], &allow, &master));
        assert!(!item_satisfies(&item, &[q("saw")], &allow, &master));

        let other = Item::new("wrench", "wrench");
        assert!(!item_satisfies(&other, &[q("retractor")], &allow, &master));
    }

    #[test]
    fn test_allow_list_keeps_qualities_per_prototype() {
        let mut allow = CapabilityAllowList::new();
        allow.allow("legacy-wrench", "retractor");
        allow.allow("legacy-wrench", "hemostat");
        allow.allow("legacy-wrench", "retractor");
        allow.allow("crowbar", "saw");

        assert!(allow.allows("legacy-wrench", &q("retractor")));
        assert!(allow.allows("legacy-wrench", &q("hemostat")));
        assert!(!allow.allows("legacy-wrench", &q("saw")));
        assert!(allow.allows("crowbar", &q("saw")));
        assert!(!allow.allows("crowbar", &q("retractor")));
        assert!(!allow.allows("legacy", &q("retractor")));

        let wrench = Item::new("old wrench", "legacy-wrench");
        let master = q("omnitool");
        assert!(item_satisfies(&wrench, &[q("retractor"), q("hemostat")], &allow, &master));
    }

    #[test]
    fn test_default_evaluators() {
        let evaluators = ToolEvaluators::with_defaults();
        let toolbox = Item::new("toolbox", "toolbox").with_blunt(10.0);
        let shard = Item::new("glass shard", "shard").with_sharp();
        let lighter = Item::new("lighter", "lighter").with_heat(600.0);

        let blunt = evaluators.get("blunt-damage-tool").unwrap();
        assert!(blunt.satisfied_by(&toolbox, &[]));
        assert!(!blunt.satisfied_by(&shard, &[]));
        assert!(evaluators.get("sharp-tool").unwrap().satisfied_by(&shard, &[]));
        assert!(evaluators.get("heat-source").unwrap().satisfied_by(&lighter, &[]));
        assert!(evaluators.get("missing").is_none());
    }

    #[test]
    fn test_has_tools_evaluator() {
        let wirecutters = Item::new("wirecutters", "wirecutters").with_quality("cutting");
        assert!(HasTools.satisfied_by(&wirecutters, &[q("cutting")]));
        assert!(!HasTools.satisfied_by(&wirecutters, &[q("prying")]));
        assert!(!HasTools.satisfied_by(&wirecutters, &[]));
    }
}
