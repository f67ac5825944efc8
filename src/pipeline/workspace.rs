// Per-run scratch directory
// The directory and everything in it is removed when the Workspace drops,
// on success, error, or panic unwinding alike

use crate::error::PipelineError;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub const WORKSPACE_PREFIX: &str = "debrisflow_";

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create(root: &Path, job_id: &str) -> Result<Self, PipelineError> {
        fs::create_dir_all(root).map_err(|source| PipelineError::Workspace {
            root: root.to_path_buf(),
            source,
        })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}{}_", WORKSPACE_PREFIX, job_id))
            .tempdir_in(root)
            .map_err(|source| PipelineError::Workspace {
                root: root.to_path_buf(),
                source,
            })?;

        debug!("Created workspace {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a named intermediate artifact
    pub fn artifact(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        debug!("Removing workspace {:?}", self.dir.path());
    }
}

/// Removes scratch directories left behind by a process that died mid-run.
pub fn sweep_stale_workspaces(root: &Path, max_age: Duration) -> usize {
    if !root.exists() {
        return 0;
    }

    let now = SystemTime::now();
    let mut removed = 0;

    if let Ok(entries) = fs::read_dir(root) {
        for entry in entries.flatten() {
            let path = entry.path();
            let is_workspace = path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(WORKSPACE_PREFIX));
            if !is_workspace {
                continue;
            }
            if let Ok(modified) = fs::metadata(&path).and_then(|meta| meta.modified()) {
                if let Ok(age) = now.duration_since(modified) {
                    if age > max_age && fs::remove_dir_all(&path).is_ok() {
                        info!("Cleaned up stale workspace: {:?}", path.file_name());
                        removed += 1;
                    }
                }
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let workspace = Workspace::create(root.path(), "job1").unwrap();
            fs::write(workspace.artifact("dem_utm.tif"), b"x").unwrap();
            assert!(workspace.path().exists());
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_workspace_removed_on_error_path() {
        fn failing_run(root: &Path) -> Result<PathBuf, String> {
            let workspace = Workspace::create(root, "job2").map_err(|e| e.to_string())?;
            let path = workspace.path().to_path_buf();
            Err(path.display().to_string())
        }
        let root = tempfile::tempdir().unwrap();
        let leaked = failing_run(root.path()).unwrap_err();
        assert!(!Path::new(&leaked).exists());
    }

    #[test]
    fn test_sweep_only_touches_old_workspaces() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("debrisflow_old")).unwrap();
        fs::create_dir(root.path().join("unrelated")).unwrap();

        assert_eq!(sweep_stale_workspaces(root.path(), Duration::from_secs(3600)), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(sweep_stale_workspaces(root.path(), Duration::ZERO), 1);
        assert!(!root.path().join("debrisflow_old").exists());
        assert!(root.path().join("unrelated").exists());
    }
}
