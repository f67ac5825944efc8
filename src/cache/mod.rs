// Durable result slots
// One shared slot (basins + perimeter) for the default run, one file per job
// for zone runs. Writes go through the atomic JSON writer, so a slot is either
// absent or complete.

use crate::error::FileError;
use crate::file_manager::{read_json_file, remove_json_file, write_json_file};
use crate::models::FeatureCollection;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

const BASINS_FILE: &str = "basins.geojson";
const PERIMETER_FILE: &str = "perimeter.geojson";

#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
}

/// Job ids are generated tokens; anything else cannot name a slot.
fn is_valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl ResultCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn basins_path(&self) -> PathBuf {
        self.dir.join(BASINS_FILE)
    }

    fn perimeter_path(&self) -> PathBuf {
        self.dir.join(PERIMETER_FILE)
    }

    fn zone_path(&self, job_id: &str) -> Option<PathBuf> {
        is_valid_job_id(job_id).then(|| self.dir.join(format!("zone_{}.geojson", job_id)))
    }

    /// `basins.geojson` is written last, so its presence marks a complete entry.
    pub fn has_default(&self) -> bool {
        self.basins_path().is_file()
    }

    pub fn read_default(&self) -> Result<FeatureCollection, FileError> {
        read_json_file(&self.basins_path())
    }

    pub fn read_perimeter(&self) -> Result<FeatureCollection, FileError> {
        read_json_file(&self.perimeter_path())
    }

    pub fn read_zone(&self, job_id: &str) -> Result<FeatureCollection, FileError> {
        let path = self
            .zone_path(job_id)
            .ok_or_else(|| FileError::NotFound(self.dir.join(job_id)))?;
        read_json_file(&path)
    }

    /// Feature count of the default slot, 0 if it cannot be read
    pub fn count_default_features(&self) -> usize {
        self.read_default().map(|fc| fc.len()).unwrap_or(0)
    }

    pub fn write_default(&self, results: &FeatureCollection, perimeter: &FeatureCollection) -> Result<(), FileError> {
        write_json_file(&self.perimeter_path(), perimeter)?;
        if let Err(e) = write_json_file(&self.basins_path(), results) {
            if let Err(cleanup) = remove_json_file(&self.perimeter_path()) {
                warn!("Failed to remove orphaned perimeter: {}", cleanup);
            }
            return Err(e);
        }
        info!("Cached {} basins in {:?}", results.len(), self.dir);
        Ok(())
    }

    pub fn write_zone(&self, job_id: &str, results: &FeatureCollection) -> Result<(), FileError> {
        let path = self
            .zone_path(job_id)
            .ok_or_else(|| FileError::NotFound(self.dir.join(job_id)))?;
        write_json_file(&path, results)?;
        info!("Cached {} zone basins for job {}", results.len(), job_id);
        Ok(())
    }

    /// Removes the shared slot. Zone slots are left alone.
    pub fn clear_default(&self) -> Result<(), FileError> {
        let basins = remove_json_file(&self.basins_path())?;
        let perimeter = remove_json_file(&self.perimeter_path())?;
        debug!("Cleared default cache (basins: {}, perimeter: {})", basins, perimeter);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feature, Geometry};

    fn collection(n: usize) -> FeatureCollection {
        let geometry = Geometry::polygon(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]]);
        FeatureCollection::new((0..n).map(|_| Feature::new(geometry.clone(), Default::default())).collect())
    }

    #[test]
    fn test_missing_default_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        assert!(!cache.has_default());
        assert!(matches!(cache.read_default(), Err(FileError::NotFound(_))));
        assert_eq!(cache.count_default_features(), 0);
    }

    #[test]
    fn test_default_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        cache.write_default(&collection(3), &collection(1)).unwrap();

        assert!(cache.has_default());
        assert_eq!(cache.count_default_features(), 3);
        assert_eq!(cache.read_perimeter().unwrap().len(), 1);

        cache.clear_default().unwrap();
        assert!(!cache.has_default());
        assert!(cache.read_perimeter().is_err());
    }

    #[test]
    fn test_failed_perimeter_write_leaves_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        std::fs::create_dir_all(dir.path().join(PERIMETER_FILE)).unwrap();

        assert!(cache.write_default(&collection(2), &collection(1)).is_err());
        assert!(!cache.has_default());
        assert!(matches!(cache.read_default(), Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_failed_basins_write_leaves_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        std::fs::create_dir_all(dir.path().join(BASINS_FILE)).unwrap();

        assert!(cache.write_default(&collection(2), &collection(1)).is_err());
        assert!(!cache.has_default());
        assert!(!dir.path().join(PERIMETER_FILE).exists());
    }

    #[test]
    fn test_clear_leaves_zone_slots() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        cache.write_default(&collection(1), &collection(1)).unwrap();
        cache.write_zone("zone-a", &collection(2)).unwrap();

        cache.clear_default().unwrap();
        assert_eq!(cache.read_zone("zone-a").unwrap().len(), 2);
    }

    #[test]
    fn test_zone_slots_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path());
        cache.write_zone("a1", &collection(1)).unwrap();
        cache.write_zone("b2", &collection(4)).unwrap();

        assert_eq!(cache.read_zone("a1").unwrap().len(), 1);
        assert_eq!(cache.read_zone("b2").unwrap().len(), 4);
        assert!(matches!(cache.read_zone("c3"), Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_zone_id_cannot_escape_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join("cache"));
        assert!(matches!(cache.read_zone("../basins"), Err(FileError::NotFound(_))));
        assert!(cache.write_zone("../x", &collection(1)).is_err());
    }
}
