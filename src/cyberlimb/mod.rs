//! Cybernetic limbs: modules, maintenance and aggregate stats

pub mod module;
pub mod stats;

pub use module::{
    close_panel, install_module, open_panel, remove_module, replace_wiring, CyberLimb, LimbModule,
};
pub use stats::{
    charge_battery, drain, movement_speed_modifier, recompute_stats, reset_service_time,
    set_service_time_remaining, CyberLimbStats,
};
