//! Surgery Sim - layered surgery, bio-integrity and cyberlimb simulation
//!
//! Bodies are graphs of parts hosting organs and implants. Surgery steps
//! open and close a part's skin, tissue and organ layers, move contents in
//! and out, and leave integrity penalties behind. Foreign contents spend a
//! body's integrity capacity; running over it drives bio-rejection.

pub mod body;
pub mod core;
pub mod cyberlimb;
pub mod ecs;
pub mod integrity;
pub mod simulation;
pub mod surgery;
