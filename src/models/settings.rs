// Analysis settings data models
use crate::utils::{get_cache_dir, get_default_dem_path, get_default_dnbr_path, get_default_perimeter_path};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub perimeter_path: PathBuf,
    pub dem_path: PathBuf,
    pub dnbr_path: PathBuf,
    /// Working CRS for slope and area math (UTM zone 11N by default)
    pub projected_epsg: u32,
    /// I15 rainfall intensities in mm/hr
    pub rainfall_schedule: Vec<f64>,
    pub perimeter_buffer_m: f64,
    pub zone_buffer_m: f64,
    pub stream_threshold_km2: f64,
    pub basin_intersect_buffer_m: f64,
    pub basin_clip_buffer_m: f64,
    pub min_basin_area_km2: f64,
    pub max_basin_area_km2: f64,
    /// dNBR above this counts as burned
    pub moderate_dnbr_threshold: f64,
    pub high_dnbr_threshold: f64,
    /// dNBR at or below this is treated as invalid
    pub dnbr_floor: f64,
    pub job_retention_hours: u64,
    pub cache_dir: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub whitebox_path: PathBuf,
    pub workers_dir: Option<PathBuf>,
    pub python_path: Option<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            perimeter_path: get_default_perimeter_path(),
            dem_path: get_default_dem_path(),
            dnbr_path: get_default_dnbr_path(),
            projected_epsg: 32611,
            rainfall_schedule: vec![16.0, 20.0, 24.0, 40.0],
            perimeter_buffer_m: 500.0,
            zone_buffer_m: 200.0,
            stream_threshold_km2: 0.025,
            basin_intersect_buffer_m: 100.0,
            basin_clip_buffer_m: 50.0,
            min_basin_area_km2: 0.01,
            max_basin_area_km2: 8.0,
            moderate_dnbr_threshold: 100.0,
            high_dnbr_threshold: 500.0,
            dnbr_floor: -5000.0,
            job_retention_hours: 24,
            cache_dir: None,
            scratch_dir: None,
            whitebox_path: PathBuf::from("whitebox_tools"),
            workers_dir: None,
            python_path: None,
        }
    }
}

impl AnalysisSettings {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(get_cache_dir)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn job_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.job_retention_hours as i64)
    }
}
