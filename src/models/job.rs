// Analysis job data models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final stage number of a pipeline run
pub const FINAL_STAGE: u8 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Error,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub stage: u8, // 0-10
    pub message: String,
    pub progress: u8, // 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basin_count: Option<usize>,
    pub zone: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn running(id: String, zone: bool) -> Self {
        let message = if zone {
            "Starting zone analysis..."
        } else {
            "Starting analysis..."
        };
        Self {
            id,
            status: JobStatus::Running,
            stage: 0,
            message: message.to_string(),
            progress: 0,
            error: None,
            trace: None,
            basin_count: None,
            zone,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// A job that completed without running, backed by the default cache slot
    pub fn cached(id: String, basin_count: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Completed,
            stage: FINAL_STAGE,
            message: "Analysis complete! (Cached results loaded)".to_string(),
            progress: 100,
            error: None,
            trace: None,
            basin_count: Some(basin_count),
            zone: false,
            created_at: now,
            finished_at: Some(now),
        }
    }

    /// Synthetic lookup-miss response. Never stored in the job table.
    pub fn not_found(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: JobStatus::NotFound,
            stage: 0,
            message: format!("Job {} not found", id),
            progress: 0,
            error: Some(format!("Job {} not found", id)),
            trace: None,
            basin_count: None,
            zone: false,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub job_id: String,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneStartResponse {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let job = Job::not_found("abc");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "not_found");
        assert_eq!(json["error"], "Job abc not found");
        assert!(json.get("trace").is_none());
    }

    #[test]
    fn test_cached_job_is_terminal() {
        let job = Job::cached("cached_x".to_string(), 12);
        assert!(job.is_terminal());
        assert_eq!(job.stage, FINAL_STAGE);
        assert_eq!(job.basin_count, Some(12));
        assert!(!Job::running("r".to_string(), true).is_terminal());
    }
}
