//! Surgery catalog: operations and steps
//!
//! The catalog is static data, loaded once from TOML and validated before
//! anything uses it. Malformed entries fail the load; nothing is checked
//! lazily at request time.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::body::part::PartType;
use crate::core::error::{Result, SurgeryError};
use crate::integrity::penalty::PenaltyCategory;
use crate::surgery::tools::{ToolEvaluators, ToolQuality};

pub type OperationId = String;
pub type StepId = String;

const DEFAULT_CATALOG: &str = include_str!("../../data/surgery.toml");

/// Anatomical access tier a step operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    Skin,
    Tissue,
    Organ,
}

fn default_speed() -> f32 {
    1.0
}

fn default_duration() -> f32 {
    2.0
}

/// Improvised way to perform an operation without its proper tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryMethod {
    /// Name of a registered tool evaluator
    pub evaluator: String,
    #[serde(default)]
    pub tools: Vec<ToolQuality>,
    /// Penalty charged to the part when this method is used
    #[serde(default)]
    pub integrity_cost: u32,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurgeryOperation {
    pub id: OperationId,
    pub primary_tools: Vec<ToolQuality>,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub secondary: Option<SecondaryMethod>,
    /// Operation whose improvised damage this one repairs
    #[serde(default)]
    pub repair_operation_for: Option<OperationId>,
}

impl SurgeryOperation {
    pub fn is_repair(&self) -> bool {
        self.repair_operation_for.is_some()
    }
}

/// Position of a step in a bidirectional sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSequence {
    pub id: String,
    pub index: i32,
    #[serde(default)]
    pub reverse: bool,
}

/// Container move a step performs on completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepAction {
    #[default]
    None,
    InsertOrgan,
    RemoveOrgan,
    InsertImplant,
    RemoveImplant,
    AttachLimb,
    DetachLimb,
}

impl StepAction {
    /// Adds foreign material to the body
    pub fn is_insertion(&self) -> bool {
        matches!(
            self,
            StepAction::InsertOrgan | StepAction::InsertImplant | StepAction::AttachLimb
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurgeryStep {
    pub id: StepId,
    #[serde(default)]
    pub name: String,
    pub layer: Layer,
    pub part_types: Vec<PartType>,
    #[serde(default)]
    pub operation: Option<OperationId>,
    /// Performing every opener of a layer opens it
    #[serde(default)]
    pub opens_layer: bool,
    #[serde(default)]
    pub requires_open: Option<Layer>,
    /// Layer that must be untouched (no steps performed on it)
    #[serde(default)]
    pub requires_closed: Option<Layer>,
    /// Paired step removed from the performed set on completion
    #[serde(default)]
    pub undoes: Option<StepId>,
    #[serde(default)]
    pub penalty: u32,
    #[serde(default)]
    pub penalty_category: PenaltyCategory,
    /// Paired step whose recorded penalty this step removes
    #[serde(default)]
    pub remove_penalty_step: Option<StepId>,
    #[serde(default)]
    pub clears_category: Option<PenaltyCategory>,
    #[serde(default)]
    pub sequence: Option<StepSequence>,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub action: StepAction,
    #[serde(default)]
    pub add_traits: Vec<String>,
    #[serde(default)]
    pub remove_traits: Vec<String>,
    /// Seconds at speed 1.0
    #[serde(default = "default_duration")]
    pub duration: f32,
}

impl SurgeryStep {
    pub fn applies_to(&self, part_type: PartType) -> bool {
        self.part_types.contains(&part_type)
    }

    /// Recorded in the part's performed-step ledger on completion. Undo
    /// steps are never recorded; they erase their pair instead.
    pub fn is_recorded(&self) -> bool {
        !self.repeatable && self.action == StepAction::None && self.undoes.is_none()
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Key that in-flight requests on the same part must not share
    pub fn step_class(&self) -> &str {
        match &self.sequence {
            Some(seq) => &seq.id,
            None => &self.id,
        }
    }
}

/// Raw TOML layout
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    operations: Vec<SurgeryOperation>,
    #[serde(default)]
    steps: Vec<SurgeryStep>,
}

/// Immutable, indexed set of operations and steps
#[derive(Debug, Clone)]
pub struct SurgeryCatalog {
    operations: Vec<SurgeryOperation>,
    steps: Vec<SurgeryStep>,
    operation_index: AHashMap<OperationId, usize>,
    step_index: AHashMap<StepId, usize>,
}

impl SurgeryCatalog {
    /// Built-in catalog
    pub fn with_defaults() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CATALOG)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Self::from_toml_str_with(text, &ToolEvaluators::with_defaults())
    }

    /// Parse and validate against a specific evaluator registry
    pub fn from_toml_str_with(text: &str, evaluators: &ToolEvaluators) -> Result<Self> {
        let file: CatalogFile = toml::from_str(text)?;
        Self::build(file.operations, file.steps, evaluators)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: CatalogFile = toml::from_str(&content)
            .map_err(|e| SurgeryError::Catalog(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::build(file.operations, file.steps, &ToolEvaluators::with_defaults())?;
        tracing::info!(
            "Loaded surgery catalog {} ({} operations, {} steps)",
            path.display(),
            catalog.operations.len(),
            catalog.steps.len()
        );
        Ok(catalog)
    }

    pub fn build(
        operations: Vec<SurgeryOperation>,
        steps: Vec<SurgeryStep>,
        evaluators: &ToolEvaluators,
    ) -> Result<Self> {
        let errors = validate(&operations, &steps, evaluators);
        if !errors.is_empty() {
            return Err(SurgeryError::CatalogValidation(errors));
        }
        let operation_index = operations
            .iter()
            .enumerate()
            .map(|(i, op)| (op.id.clone(), i))
            .collect();
        let step_index = steps
            .iter()
            .enumerate()
            .map(|(i, step)| (step.id.clone(), i))
            .collect();
        Ok(Self {
            operations,
            steps,
            operation_index,
            step_index,
        })
    }

    pub fn operation(&self, id: &str) -> Option<&SurgeryOperation> {
        self.operation_index.get(id).map(|&i| &self.operations[i])
    }

    pub fn step(&self, id: &str) -> Option<&SurgeryStep> {
        self.step_index.get(id).map(|&i| &self.steps[i])
    }

    /// Steps in catalog order
    pub fn steps(&self) -> &[SurgeryStep] {
        &self.steps
    }

    pub fn operations(&self) -> &[SurgeryOperation] {
        &self.operations
    }

    pub fn step_operation(&self, step: &SurgeryStep) -> Option<&SurgeryOperation> {
        step.operation.as_deref().and_then(|id| self.operation(id))
    }

    /// Steps whose completion opens `layer` on a part of this type
    pub fn openers(&self, layer: Layer, part_type: PartType) -> impl Iterator<Item = &SurgeryStep> {
        self.steps
            .iter()
            .filter(move |s| s.opens_layer && s.layer == layer && s.applies_to(part_type))
    }

    /// Sequence ids in stable order
    pub fn sequence_ids(&self) -> BTreeSet<&str> {
        self.steps
            .iter()
            .filter_map(|s| s.sequence.as_ref().map(|seq| seq.id.as_str()))
            .collect()
    }

    /// The step at a sequence position, if any applies to this part type
    pub fn sequence_step(
        &self,
        sequence: &str,
        index: i32,
        reverse: bool,
        part_type: PartType,
    ) -> Option<&SurgeryStep> {
        self.steps.iter().find(|s| {
            s.applies_to(part_type)
                && s.sequence
                    .as_ref()
                    .is_some_and(|q| q.id == sequence && q.index == index && q.reverse == reverse)
        })
    }
}

fn validate(
    operations: &[SurgeryOperation],
    steps: &[SurgeryStep],
    evaluators: &ToolEvaluators,
) -> Vec<String> {
    let mut errors = Vec::new();

    let mut op_ids = BTreeSet::new();
    for op in operations {
        if !op_ids.insert(op.id.as_str()) {
            errors.push(format!("Duplicate operation id '{}'", op.id));
        }
        if op.primary_tools.is_empty() {
            errors.push(format!("Operation '{}' has no primary tools", op.id));
        }
        if op.speed <= 0.0 {
            errors.push(format!("Operation '{}' speed must be positive", op.id));
        }
        if let Some(secondary) = &op.secondary {
            if !evaluators.contains(&secondary.evaluator) {
                errors.push(format!(
                    "Operation '{}' uses unknown evaluator '{}'",
                    op.id, secondary.evaluator
                ));
            }
            if secondary.speed <= 0.0 {
                errors.push(format!("Operation '{}' secondary speed must be positive", op.id));
            }
        }
    }
    for op in operations {
        if let Some(target) = &op.repair_operation_for {
            if !op_ids.contains(target.as_str()) {
                errors.push(format!(
                    "Operation '{}' repairs unknown operation '{}'",
                    op.id, target
                ));
            }
            if op.secondary.is_some() {
                errors.push(format!("Repair operation '{}' cannot have a secondary method", op.id));
            }
        }
    }

    let mut step_ids = BTreeSet::new();
    for step in steps {
        if !step_ids.insert(step.id.as_str()) {
            errors.push(format!("Duplicate step id '{}'", step.id));
        }
    }

    // (sequence id, reverse) -> indices
    let mut sequences: BTreeMap<(&str, bool), Vec<i32>> = BTreeMap::new();
    for step in steps {
        if step.part_types.is_empty() {
            errors.push(format!("Step '{}' applies to no part types", step.id));
        }
        if step.duration <= 0.0 {
            errors.push(format!("Step '{}' duration must be positive", step.id));
        }
        if let Some(op) = &step.operation {
            if !op_ids.contains(op.as_str()) {
                errors.push(format!("Step '{}' references unknown operation '{}'", step.id, op));
            }
        }
        for (field, reference) in [
            ("undoes", &step.undoes),
            ("remove_penalty_step", &step.remove_penalty_step),
        ] {
            if let Some(other) = reference {
                if !step_ids.contains(other.as_str()) {
                    errors.push(format!("Step '{}' {} unknown step '{}'", step.id, field, other));
                }
            }
        }
        if let Some(seq) = &step.sequence {
            if step.action != StepAction::None || step.repeatable {
                errors.push(format!(
                    "Sequence step '{}' cannot be repeatable or an action",
                    step.id
                ));
            }
            // Part-type variants may share a position, so collect once per step
            sequences.entry((seq.id.as_str(), seq.reverse)).or_default().push(seq.index);
        }
    }

    for ((id, reverse), indices) in &mut sequences {
        indices.sort_unstable();
        indices.dedup();
        let contiguous = indices.iter().enumerate().all(|(i, index)| *index == i as i32);
        if !contiguous {
            errors.push(format!(
                "Sequence '{}' {} indices are not contiguous from 0: {:?}",
                id,
                if *reverse { "reverse" } else { "forward" },
                indices
            ));
        }
    }
    for ((id, reverse), indices) in &sequences {
        if *reverse {
            let forward = sequences.get(&(*id, false));
            for index in indices {
                if !forward.is_some_and(|f| f.contains(index)) {
                    errors.push(format!(
                        "Sequence '{}' reverse step {} has no forward counterpart",
                        id, index
                    ));
                }
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_loads() {
        let catalog = SurgeryCatalog::with_defaults().unwrap();
        assert!(catalog.step("make-incision").is_some());
        assert!(catalog.operation("incision").is_some());
        assert!(catalog.sequence_ids().contains("skin"));
        assert!(catalog.openers(Layer::Skin, PartType::Arm).count() > 0);
    }

    #[test]
    fn test_sequence_lookup() {
        let catalog = SurgeryCatalog::with_defaults().unwrap();
        let first = catalog.sequence_step("skin", 0, false, PartType::Torso).unwrap();
        assert_eq!(first.id, "make-incision");
        let close = catalog.sequence_step("skin", 0, true, PartType::Torso).unwrap();
        assert_eq!(close.undoes.as_deref(), Some("make-incision"));
    }

    #[test]
    fn test_rejects_unknown_references() {
        let text = r#"
            [[operations]]
            id = "incision"
            primary_tools = ["scalpel"]
            [operations.secondary]
            evaluator = "wishful-thinking"

            [[steps]]
            id = "cut"
            layer = "skin"
            part_types = ["arm"]
            operation = "missing-op"
            undoes = "nope"
        "#;
        match SurgeryCatalog::from_toml_str(text) {
            Err(SurgeryError::CatalogValidation(errors)) => {
                assert_eq!(errors.len(), 3, "{:?}", errors);
            }
            other => panic!("expected validation failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_rejects_gapped_sequence() {
        let text = r#"
            [[steps]]
            id = "a"
            layer = "skin"
            part_types = ["arm"]
            sequence = { id = "skin", index = 0 }

            [[steps]]
            id = "c"
            layer = "skin"
            part_types = ["arm"]
            sequence = { id = "skin", index = 2 }
        "#;
        assert!(matches!(
            SurgeryCatalog::from_toml_str(text),
            Err(SurgeryError::CatalogValidation(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let text = r#"
            [[operations]]
            id = "incision"
            primary_tools = ["scalpel"]

            [[operations]]
            id = "incision"
            primary_tools = ["scalpel"]
        "#;
        assert!(matches!(
            SurgeryCatalog::from_toml_str(text),
            Err(SurgeryError::CatalogValidation(_))
        ));
    }

    #[test]
    fn test_malformed_toml_fails() {
        let text = "[[steps]]\nid = \"x\"\n";
        assert!(matches!(
            SurgeryCatalog::from_toml_str(text),
            Err(SurgeryError::TomlError(_))
        ));
    }

    #[test]
    fn test_step_class_groups_sequences() {
        let catalog = SurgeryCatalog::with_defaults().unwrap();
        let open = catalog.step("make-incision").unwrap();
        let close = catalog.step("close-incision").unwrap();
        assert_eq!(open.step_class(), close.step_class());
        let tend = catalog.step("tend-wounds").unwrap();
        assert_eq!(tend.step_class(), "tend-wounds");
    }
}
