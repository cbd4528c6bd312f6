//! Organs, implants and the bloodstream

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::body::part::PartType;
use crate::core::types::Species;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organ {
    /// Organ slot name ("heart", "brain", ...); one per part
    pub kind: String,
    /// Part type the organ lives in
    pub host: PartType,
    pub integrity_cost: u32,
    pub donor: Option<Species>,
}

/// Mechanical implant; always charges integrity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implant {
    pub kind: String,
    pub integrity_cost: u32,
}

/// Internal fluid store holding metabolizable reagents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bloodstream {
    reagents: BTreeMap<String, f32>,
}

impl Bloodstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, reagent: &str, amount: f32) {
        *self.reagents.entry(reagent.to_string()).or_insert(0.0) += amount.max(0.0);
    }

    pub fn quantity(&self, reagent: &str) -> f32 {
        self.reagents.get(reagent).copied().unwrap_or(0.0)
    }

    pub fn has(&self, reagent: &str) -> bool {
        self.quantity(reagent) > 0.0
    }

    /// Remove up to `amount`, returns amount actually removed
    pub fn metabolize(&mut self, reagent: &str, amount: f32) -> f32 {
        let Some(current) = self.reagents.get_mut(reagent) else {
            return 0.0;
        };
        let removed = amount.min(*current);
        *current -= removed;
        if *current <= 0.0 {
            self.reagents.remove(reagent);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bloodstream_metabolize() {
        let mut blood = Bloodstream::new();
        blood.add("immunosuppressant", 1.0);
        assert!(blood.has("immunosuppressant"));

        assert_eq!(blood.metabolize("immunosuppressant", 0.4), 0.4);
        assert!((blood.quantity("immunosuppressant") - 0.6).abs() < 0.0001);

        assert!((blood.metabolize("immunosuppressant", 5.0) - 0.6).abs() < 0.0001);
        assert!(!blood.has("immunosuppressant"));
    }

    #[test]
    fn test_metabolize_missing_reagent() {
        let mut blood = Bloodstream::new();
        assert_eq!(blood.metabolize("water", 1.0), 0.0);
    }
}
