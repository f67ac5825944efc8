// Settings command handlers - file-backed, partial updates
use crate::error::FileError;
use crate::file_manager::{read_json_file, read_json_file_or_default, write_json_file};
use crate::models::AnalysisSettings;
use crate::utils::get_settings_json_path;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsParams {
    pub perimeter_path: Option<PathBuf>,
    pub dem_path: Option<PathBuf>,
    pub dnbr_path: Option<PathBuf>,
    pub projected_epsg: Option<u32>,
    pub rainfall_schedule: Option<Vec<f64>>,
    pub perimeter_buffer_m: Option<f64>,
    pub zone_buffer_m: Option<f64>,
    pub stream_threshold_km2: Option<f64>,
    pub job_retention_hours: Option<u64>,
    pub cache_dir: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub whitebox_path: Option<PathBuf>,
    pub workers_dir: Option<PathBuf>,
    pub python_path: Option<String>,
}

/// Get current settings from the JSON file
pub fn get_settings() -> Result<AnalysisSettings, FileError> {
    load_settings(&get_settings_json_path())
}

/// Settings at `path`, defaults when the file is missing
pub fn load_settings(path: &Path) -> Result<AnalysisSettings, FileError> {
    read_json_file_or_default(path)
}

/// Update settings with partial update support
pub fn update_settings(path: &Path, params: UpdateSettingsParams) -> Result<AnalysisSettings, FileError> {
    let mut current = load_settings(path)?;

    if let Some(perimeter_path) = params.perimeter_path {
        current.perimeter_path = perimeter_path;
    }
    if let Some(dem_path) = params.dem_path {
        current.dem_path = dem_path;
    }
    if let Some(dnbr_path) = params.dnbr_path {
        current.dnbr_path = dnbr_path;
    }
    if let Some(projected_epsg) = params.projected_epsg {
        current.projected_epsg = projected_epsg;
    }
    if let Some(rainfall_schedule) = params.rainfall_schedule {
        // An empty schedule would produce basins with no estimates
        if !rainfall_schedule.is_empty() {
            current.rainfall_schedule = rainfall_schedule;
        }
    }
    if let Some(perimeter_buffer_m) = params.perimeter_buffer_m {
        current.perimeter_buffer_m = perimeter_buffer_m;
    }
    if let Some(zone_buffer_m) = params.zone_buffer_m {
        current.zone_buffer_m = zone_buffer_m;
    }
    if let Some(stream_threshold_km2) = params.stream_threshold_km2 {
        current.stream_threshold_km2 = stream_threshold_km2;
    }
    if let Some(job_retention_hours) = params.job_retention_hours {
        current.job_retention_hours = job_retention_hours;
    }
    if let Some(cache_dir) = params.cache_dir {
        current.cache_dir = if cache_dir.as_os_str().is_empty() { None } else { Some(cache_dir) };
    }
    if let Some(scratch_dir) = params.scratch_dir {
        current.scratch_dir = if scratch_dir.as_os_str().is_empty() { None } else { Some(scratch_dir) };
    }
    if let Some(whitebox_path) = params.whitebox_path {
        current.whitebox_path = whitebox_path;
    }
    if let Some(workers_dir) = params.workers_dir {
        current.workers_dir = if workers_dir.as_os_str().is_empty() { None } else { Some(workers_dir) };
    }
    if let Some(python_path) = params.python_path {
        current.python_path = if python_path.is_empty() { None } else { Some(python_path) };
    }

    write_json_file(path, &current)?;

    debug!("Updated settings: {:?}", current);

    Ok(current)
}

/// Apply a JSON patch file of `UpdateSettingsParams` to the settings at `path`
pub fn apply_settings_file(path: &Path, patch: &Path) -> Result<AnalysisSettings, FileError> {
    let params: UpdateSettingsParams = read_json_file(patch)?;
    update_settings(path, params)
}
