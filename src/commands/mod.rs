// Command handlers exposed to the host (binary or routing layer)
pub mod analysis;
pub mod settings;

pub use analysis::{AnalysisInfo, AnalysisService};
