pub mod events;
pub mod world;

pub use events::{PenaltySelector, WorldEvent};
pub use world::World;
