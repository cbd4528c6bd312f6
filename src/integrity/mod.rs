//! Bio-integrity: penalty ledger, usage and capacity, bio-rejection

pub mod bio_rejection;
pub mod examine;
pub mod penalty;
pub mod usage;

pub use bio_rejection::{bio_rejection_damage, update_bio_rejection, BioRejection};
pub use examine::{examine_integrity, scan, HealthScannerReport};
pub use penalty::{
    apply_part_penalty, apply_penalty, clear_penalty_category, clear_penalty_source,
    handle_penalty_event, remove_part_penalty_node, total_penalty, IntegritySurgery,
    PenaltyCategory, PenaltyEntry,
};
pub use usage::{capacity, check_capacity, compute_usage, refresh_usage, IntegrityUsage};
