//! Body graph: parts, organs, implants, held items

pub mod graph;
pub mod item;
pub mod organ;
pub mod part;

pub use item::{Hands, Item};
pub use organ::{Bloodstream, Implant, Organ};
pub use part::{Body, BodyPart, PartType, Symmetry};
