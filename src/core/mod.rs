pub mod config;
pub mod error;
pub mod types;

pub use config::SurgeryConfig;
pub use error::{Result, SurgeryError};
pub use types::{EntityId, Species, Tick, Vec2};
