// Data models (structs)
pub mod geometry;
pub mod hazard;
pub mod job;
pub mod settings;

pub use geometry::*;
pub use hazard::*;
pub use job::*;
pub use settings::*;
