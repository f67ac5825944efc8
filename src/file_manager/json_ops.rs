// Atomic JSON file operations

use crate::error::FileError;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

lazy_static::lazy_static! {
    static ref FILE_LOCK: Mutex<()> = Mutex::new(());
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> FileError {
    let path = path.to_path_buf();
    move |source| FileError::Io { action, path, source }
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, FileError> {
    let _lock = FILE_LOCK.lock();

    if !path.exists() {
        return Err(FileError::NotFound(path.to_path_buf()));
    }

    let mut file = File::open(path).map_err(io_error("open", path))?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(io_error("read", path))?;

    serde_json::from_str(&contents).map_err(|source| FileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes JSON atomically using write-to-temp-then-rename
pub fn write_json_file<T: Serialize>(path: &Path, data: &T) -> Result<(), FileError> {
    let _lock = FILE_LOCK.lock();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error("create directory", parent))?;
    }

    let json_string = serde_json::to_string_pretty(data).map_err(FileError::Serialize)?;

    let temp_path = path.with_extension("tmp");

    let mut temp_file = File::create(&temp_path).map_err(io_error("create temp file", &temp_path))?;

    temp_file
        .write_all(json_string.as_bytes())
        .map_err(io_error("write temp file", &temp_path))?;

    temp_file
        .sync_all()
        .map_err(io_error("sync temp file", &temp_path))?;

    fs::rename(&temp_path, path).map_err(io_error("rename temp file to", path))?;

    Ok(())
}

/// Removes a JSON file, returning whether it existed
pub fn remove_json_file(path: &Path) -> Result<bool, FileError> {
    let _lock = FILE_LOCK.lock();

    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path).map_err(io_error("remove", path))?;
    Ok(true)
}

pub fn initialize_json_file<T: Serialize>(path: &Path, default: &T) -> Result<(), FileError> {
    if !path.exists() {
        log::info!("Initializing JSON file: {:?}", path);
        write_json_file(path, default)?;
    }
    Ok(())
}

pub fn read_json_file_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, FileError> {
    if path.exists() {
        read_json_file(path)
    } else {
        Ok(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");
        let mut data = BTreeMap::new();
        data.insert("basins".to_string(), 3);

        write_json_file(&path, &data).unwrap();
        let loaded: BTreeMap<String, i32> = read_json_file(&path).unwrap();

        assert_eq!(loaded, data);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Vec<i32>, _> = read_json_file(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_remove_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot.json");
        write_json_file(&path, &vec![1, 2]).unwrap();

        assert!(remove_json_file(&path).unwrap());
        assert!(!remove_json_file(&path).unwrap());
    }

    #[test]
    fn test_initialize_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        write_json_file(&path, &vec![7]).unwrap();

        initialize_json_file(&path, &Vec::<i32>::new()).unwrap();
        let loaded: Vec<i32> = read_json_file_or_default(&path).unwrap();
        assert_eq!(loaded, vec![7]);
    }
}
