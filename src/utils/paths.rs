use crate::error::FileError;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

static APP_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

pub fn get_app_data_dir() -> PathBuf {
    APP_DATA_DIR
        .get_or_init(|| {
            let base_dir = dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."));
            base_dir.join("Debrisflow")
        })
        .clone()
}

pub fn get_data_dir() -> PathBuf {
    get_app_data_dir().join("data")
}

pub fn get_cache_dir() -> PathBuf {
    get_app_data_dir().join("cache")
}

pub fn get_inputs_dir() -> PathBuf {
    get_app_data_dir().join("inputs")
}

pub fn get_logs_dir() -> PathBuf {
    get_app_data_dir().join("logs")
}

pub fn get_settings_json_path() -> PathBuf {
    get_data_dir().join("settings.json")
}

/// Default location of the perimeter source when settings do not override it
pub fn get_default_perimeter_path() -> PathBuf {
    get_inputs_dir().join("perimeter.shp")
}

pub fn get_default_dem_path() -> PathBuf {
    get_inputs_dir().join("dem.tif")
}

pub fn get_default_dnbr_path() -> PathBuf {
    get_inputs_dir().join("dnbr.tif")
}

pub fn initialize_data_directories() -> Result<(), FileError> {
    let directories = [get_data_dir(), get_cache_dir(), get_inputs_dir(), get_logs_dir()];

    for dir in &directories {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|source| FileError::Io {
                action: "create directory",
                path: dir.clone(),
                source,
            })?;
            log::info!("Created directory: {:?}", dir);
        }
    }

    log::info!("Data directories initialized at: {:?}", get_app_data_dir());
    Ok(())
}
