// In-memory job state table
// Inserts and lookups share one coarse lock. Each entry is written only by the
// JobReporter of the worker that owns the run.

use crate::error::{error_trace, PipelineError};
use crate::models::{Job, JobStatus, FINAL_STAGE};
use crate::pipeline::Stage;
use chrono::{Duration, Utc};
use log::{error, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct JobTable {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.write().insert(job.id.clone(), job);
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Snapshot of a job, or a synthetic `not_found` status on a miss
    pub fn status(&self, job_id: &str) -> Job {
        self.get(job_id).unwrap_or_else(|| Job::not_found(job_id))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update(&self, job_id: &str, update_fn: impl FnOnce(&mut Job)) {
        if let Some(job) = self.jobs.write().get_mut(job_id) {
            update_fn(job);
        }
    }

    /// Drops terminal jobs that finished more than `retention` ago. Running jobs stay.
    pub fn evict_expired(&self, retention: Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| {
            !job.is_terminal() || job.finished_at.map_or(true, |finished| finished > cutoff)
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            info!("Evicted {} expired jobs", evicted);
        }
        evicted
    }
}

/// Write handle for one job, held by the worker running its pipeline
pub struct JobReporter {
    job_id: String,
    zone: bool,
    table: Arc<JobTable>,
}

impl JobReporter {
    pub fn new(table: Arc<JobTable>, job_id: String, zone: bool) -> Self {
        Self { job_id, zone, table }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn advance(&self, stage: Stage) {
        let message = stage.message(self.zone);
        info!("Job {}: {} - {}", self.job_id, stage, message);
        self.table.update(&self.job_id, |job| {
            if job.status != JobStatus::Running {
                return;
            }
            job.stage = job.stage.max(stage.number());
            job.progress = job.progress.max(stage.progress());
            job.message = message.to_string();
        });
    }

    pub fn complete(&self, basin_count: usize) {
        let message = if self.zone {
            format!("Zone analysis complete! Found {} sub-basins.", basin_count)
        } else {
            format!("Analysis complete! Found {} sub-basins.", basin_count)
        };
        info!("Job {}: {}", self.job_id, message);
        self.table.update(&self.job_id, |job| {
            if job.is_terminal() {
                return;
            }
            job.status = JobStatus::Completed;
            job.stage = FINAL_STAGE;
            job.progress = 100;
            job.message = message;
            job.basin_count = Some(basin_count);
            job.finished_at = Some(Utc::now());
        });
    }

    /// Records a terminal error. Stage and progress stay where the run stopped.
    pub fn fail(&self, err: &PipelineError) {
        let description = err.to_string();
        let trace = error_trace(err);
        error!("Job {} failed: {}", self.job_id, trace);
        self.table.update(&self.job_id, |job| {
            if job.is_terminal() {
                return;
            }
            let stage_line = Stage::ALL
                .iter()
                .find(|s| s.number() == job.stage)
                .map(|s| format!("at {}\n", s))
                .unwrap_or_default();
            job.status = JobStatus::Error;
            job.message = format!("Error: {}", description);
            job.error = Some(description);
            job.trace = Some(format!("{}{}", stage_line, trace));
            job.finished_at = Some(Utc::now());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter(table: &Arc<JobTable>, id: &str) -> JobReporter {
        table.insert(Job::running(id.to_string(), false));
        JobReporter::new(table.clone(), id.to_string(), false)
    }

    #[test]
    fn test_unknown_job_is_not_found() {
        let table = JobTable::new();
        let job = table.status("nope");
        assert_eq!(job.status, JobStatus::NotFound);
        assert!(table.is_empty());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let table = Arc::new(JobTable::new());
        let r = reporter(&table, "a");
        r.advance(Stage::FlowAccumulation);
        r.advance(Stage::FillDepressions);

        let job = table.status("a");
        assert_eq!(job.stage, 5);
        assert_eq!(job.progress, Stage::FlowAccumulation.progress());
    }

    #[test]
    fn test_failure_freezes_stage_and_progress() {
        let table = Arc::new(JobTable::new());
        let r = reporter(&table, "b");
        r.advance(Stage::FlowDirection);
        r.fail(&PipelineError::InvalidInput("broken raster".to_string()));

        let job = table.status("b");
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.stage, 4);
        assert_eq!(job.progress, 40);
        assert_eq!(job.error.as_deref(), Some("Invalid input: broken raster"));
        assert!(job.trace.unwrap().starts_with("at Stage 4 (flow direction)"));
    }

    #[test]
    fn test_terminal_state_is_set_once() {
        let table = Arc::new(JobTable::new());
        let r = reporter(&table, "c");
        r.complete(3);
        r.fail(&PipelineError::InvalidInput("late".to_string()));
        r.advance(Stage::LoadInputs);

        let job = table.status("c");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.basin_count, Some(3));
        assert_eq!(job.progress, 100);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_eviction_keeps_running_and_recent_jobs() {
        let table = Arc::new(JobTable::new());
        reporter(&table, "running");

        let mut old = Job::cached("old".to_string(), 1);
        old.finished_at = Some(Utc::now() - Duration::hours(48));
        table.insert(old);
        table.insert(Job::cached("fresh".to_string(), 1));

        assert_eq!(table.evict_expired(Duration::hours(24)), 1);
        assert!(table.get("old").is_none());
        assert!(table.get("fresh").is_some());
        assert!(table.get("running").is_some());
    }
}
