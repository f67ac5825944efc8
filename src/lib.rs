pub mod cache;
pub mod commands;
pub mod error;
pub mod file_manager;
pub mod gateway;
pub mod hazard;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod utils;

pub use commands::{AnalysisInfo, AnalysisService};
pub use error::{AnalysisError, FileError, GatewayError, PipelineError};
pub use models::{AnalysisSettings, FeatureCollection, Geometry, Job, JobStatus};

use commands::settings::get_settings;
use file_manager::initialize_json_file;
use log::info;
use utils::{get_logs_dir, get_settings_json_path, initialize_data_directories};

/// Creates the app data layout and returns the settings in effect.
/// A fresh install gets a settings.json with defaults.
pub fn initialize_app_data() -> Result<AnalysisSettings, FileError> {
    initialize_data_directories()?;
    initialize_json_file(&get_settings_json_path(), &AnalysisSettings::default())?;

    let removed = logging::cleanup_old_logs(&get_logs_dir());
    if removed > 0 {
        info!("Removed {} expired log files", removed);
    }

    get_settings()
}
