//! Simulation configuration with documented constants
//!
//! All tuning numbers for surgery, integrity and cyberlimbs live here.
//! Values can be overridden from a TOML file; missing keys keep defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{Result, SurgeryError};

/// Configuration for the surgery and integrity systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurgeryConfig {
    // === SIMULATION ===
    /// Seconds of simulated time per tick
    pub tick_seconds: f32,

    // === INTEGRITY ===
    /// Integrity capacity of a body with no penalties
    ///
    /// Every point of integrity penalty shrinks the capacity by one.
    /// Non-native organs, limbs and implants spend from this budget.
    pub base_integrity_capacity: u32,

    // === BIO-REJECTION ===
    /// Damage per second gained per unit of capacity overage
    ///
    /// At 0.1 with an overage of 2, damage climbs 0.2 per second until
    /// it reaches the overage itself.
    pub bio_rejection_ramp_rate: f32,

    /// Reagent that suppresses bio-rejection while in the bloodstream
    pub countermeasure_reagent: String,

    /// Damage removed per second while the countermeasure is present
    pub countermeasure_reduction_rate: f32,

    /// Units of countermeasure metabolized per second
    pub countermeasure_metabolism_rate: f32,

    // === CYBERLIMBS ===
    /// Service time granted to any body with at least one cyberlimb (seconds)
    pub base_service_time: f32,

    /// Battery capacity built into every cyberlimb
    pub limb_base_battery: f32,

    /// Battery drained per limb per second
    pub battery_drain_per_limb: f32,

    /// Efficiency gained per manipulator module beyond the first
    pub manipulator_bonus: f32,

    /// Service time multiplier gained per capacitor module
    pub capacitor_bonus: f32,

    /// Efficiency multiplier applied for each depleted resource
    ///
    /// Battery and service time apply independently, so both empty
    /// gives 0.5 * 0.5 at the default.
    pub depletion_multiplier: f32,

    /// Module slots per cyberlimb
    pub max_modules_per_limb: usize,

    // === TIMED INTERACTIONS ===
    /// Distance a user may drift before a timed interaction breaks
    pub movement_tolerance: f32,

    // === METHOD SELECTION ===
    /// Fall back to an improvised method when the request names none
    /// and no primary tool is held
    pub allow_implicit_improvised: bool,

    /// Tool quality that satisfies any primary tool requirement
    pub master_tool_quality: String,

    // === UI ===
    /// Seconds between nearby-material scans for an open surgery UI
    pub ui_poll_interval: f32,

    /// Radius of the nearby-material scan (world units)
    pub material_scan_radius: f32,
}

impl Default for SurgeryConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1.0 / 30.0,

            base_integrity_capacity: 6,

            bio_rejection_ramp_rate: 0.1,
            countermeasure_reagent: "immunosuppressant".into(),
            countermeasure_reduction_rate: 0.5,
            countermeasure_metabolism_rate: 0.1,

            // Five minutes
            base_service_time: 300.0,
            limb_base_battery: 100.0,
            battery_drain_per_limb: 0.05,
            manipulator_bonus: 0.1,
            capacitor_bonus: 0.1,
            depletion_multiplier: 0.5,
            max_modules_per_limb: 8,

            movement_tolerance: 0.25,

            allow_implicit_improvised: true,
            master_tool_quality: "omnitool".into(),

            ui_poll_interval: 1.0,
            material_scan_radius: 1.5,
        }
    }
}

impl SurgeryConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML, keeping defaults for missing keys
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SurgeryConfig = toml::from_str(content)?;
        config.validate().map_err(SurgeryError::Config)?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.tick_seconds <= 0.0 {
            return Err("tick_seconds must be positive".into());
        }

        if self.bio_rejection_ramp_rate <= 0.0 {
            return Err("bio_rejection_ramp_rate must be positive".into());
        }

        if self.countermeasure_reduction_rate < 0.0 || self.countermeasure_metabolism_rate < 0.0 {
            return Err("Countermeasure rates cannot be negative".into());
        }

        if self.base_service_time <= 0.0 {
            return Err(format!(
                "base_service_time ({}) must be positive",
                self.base_service_time
            ));
        }

        if !(0.0..=1.0).contains(&self.depletion_multiplier) {
            return Err(format!(
                "depletion_multiplier ({}) should be within [0, 1]",
                self.depletion_multiplier
            ));
        }

        if self.max_modules_per_limb == 0 {
            return Err("max_modules_per_limb must be at least 1".into());
        }

        if self.ui_poll_interval <= 0.0 {
            return Err("ui_poll_interval must be positive".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SurgeryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SurgeryConfig::from_toml_str("base_integrity_capacity = 10\n").unwrap();
        assert_eq!(config.base_integrity_capacity, 10);
        assert_eq!(config.base_service_time, 300.0);
        assert_eq!(config.countermeasure_reagent, "immunosuppressant");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = SurgeryConfig::from_toml_str("depletion_multiplier = 2.0\n");
        assert!(matches!(result, Err(SurgeryError::Config(_))));

        let result = SurgeryConfig::from_toml_str("max_modules_per_limb = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let result = SurgeryConfig::from_toml_str("tick_seconds = [");
        assert!(matches!(result, Err(SurgeryError::TomlError(_))));
    }
}
