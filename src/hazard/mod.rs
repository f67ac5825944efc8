pub mod model;
pub mod summary;

pub use model::{classify, coefficients, evaluate, probability, volume, ModelCoefficients};
pub use summary::{summarize, AreaSummary};
