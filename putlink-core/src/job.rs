//! Jobs: fetches the remote service is running (or has run) on the account's behalf.
//!
//! A [`Job`] comes out of [`Bucket::fetch`](crate::bucket::Bucket::fetch) or [`list_jobs`].
//! The service owns the status vocabulary, so statuses the client does not know are kept
//! verbatim in [`JobStatus::Other`] instead of being rejected.
//!
//! [`Job::destroy`] is terminal: once it succeeds the job ignores later status updates.

use std::fmt;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::contract::{decode_records, lenient, params, Params, Session};
use crate::error::{PutlinkError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Waiting,
    InProgress,
    Completed,
    Failed,
    /// A status string this client does not know, kept exactly as sent.
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Waiting => "WAITING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "ERROR",
            JobStatus::Other(raw) => raw,
        }
    }

    /// True for a failed job, or any status string carrying the service's error marker.
    pub fn is_failure(&self) -> bool {
        match self {
            JobStatus::Failed => true,
            JobStatus::Other(raw) => {
                let raw = raw.to_ascii_uppercase();
                raw.contains("ERROR") || raw.contains("FAIL")
            }
            _ => false,
        }
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "WAITING" => JobStatus::Waiting,
            "IN_PROGRESS" => JobStatus::InProgress,
            "COMPLETED" => JobStatus::Completed,
            "ERROR" => JobStatus::Failed,
            _ => JobStatus::Other(raw),
        }
    }
}

impl From<&str> for JobStatus {
    fn from(raw: &str) -> Self {
        JobStatus::from(raw.to_string())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transfer record as the service reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRecord {
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub percent_done: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    /// `None` when the service reported the transfer without an id; such a job cannot be
    /// refreshed or cancelled.
    id: Option<u64>,
    display_name: String,
    status: JobStatus,
    percent_complete: u8,
    destroyed: bool,
}

impl From<JobRecord> for Job {
    fn from(record: JobRecord) -> Self {
        if record.id.is_none() {
            warn!(name = %record.name, status = ?record.status, "Transfer record carried no id");
        }
        Job {
            id: record.id,
            display_name: record.name,
            status: record
                .status
                .map(JobStatus::from)
                .unwrap_or(JobStatus::Waiting),
            percent_complete: record.percent_done.unwrap_or(0).min(100) as u8,
            destroyed: false,
        }
    }
}

impl Job {
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn percent_complete(&self) -> u8 {
        self.percent_complete
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Apply a fresher record for this job. Ignored once the job is destroyed or when the
    /// record belongs to another job. Returns whether anything changed.
    pub fn apply_update(&mut self, record: JobRecord) -> bool {
        if self.destroyed {
            warn!(job_id = ?self.id, "Ignoring update for destroyed job");
            return false;
        }
        if self.id.is_none() || record.id != self.id {
            return false;
        }
        let updated = Job::from(record);
        let changed = updated.status != self.status
            || updated.percent_complete != self.percent_complete
            || updated.display_name != self.display_name;
        self.status = updated.status;
        self.percent_complete = updated.percent_complete;
        self.display_name = updated.display_name;
        changed
    }

    /// Re-read this job from the service's transfer list. A destroyed job is left untouched.
    pub async fn refresh<S: Session + ?Sized>(&mut self, session: &S) -> Result<&mut Self> {
        if self.destroyed {
            return Ok(self);
        }
        let Some(id) = self.id else {
            warn!(name = %self.display_name, "Cannot refresh a job without an id");
            return Ok(self);
        };
        let (resource, operation) = ("transfers", "list");
        let records = session
            .invoke(resource, operation, Params::new())
            .await
            .map_err(|e| {
                error!(error = %e, job_id = id, "Failed to refresh job");
                e
            })?;
        if let Some(record) = decode_records::<JobRecord>(resource, operation, records)?
            .into_iter()
            .find(|r| r.id == Some(id))
        {
            self.apply_update(record);
        } else {
            warn!(job_id = id, "Job no longer listed by the service");
        }
        Ok(self)
    }

    /// Cancel the job on the service. Terminal; destroying twice is a no-op.
    /// A job without an id is rejected before anything is sent.
    pub async fn destroy<S: Session + ?Sized>(&mut self, session: &S) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        let Some(id) = self.id else {
            error!(name = %self.display_name, "Cannot cancel a job without an id");
            return Err(PutlinkError::InvalidInput(format!(
                "job '{}' has no id to cancel",
                self.display_name
            )));
        };
        info!(job_id = id, "Cancelling job");
        session
            .invoke("transfers", "cancel", params([("id", json!(id))]))
            .await
            .map_err(|e| {
                error!(error = %e, job_id = id, "Failed to cancel job");
                e
            })?;
        self.destroyed = true;
        info!(job_id = id, "Job cancelled");
        Ok(())
    }
}

/// All transfers currently known to the service.
pub async fn list_jobs<S: Session + ?Sized>(session: &S) -> Result<Vec<Job>> {
    let (resource, operation) = ("transfers", "list");
    info!(resource, operation, "Listing jobs");
    let records = session
        .invoke(resource, operation, Params::new())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list jobs");
            e
        })?;
    let jobs: Vec<Job> = decode_records::<JobRecord>(resource, operation, records)?
        .into_iter()
        .map(Job::from)
        .collect();
    info!(count = jobs.len(), "Listed jobs");
    Ok(jobs)
}

/// Cancel every job concurrently (fail fast).
pub async fn destroy_all<S: Session + ?Sized>(session: &S, jobs: &mut [Job]) -> Result<()> {
    let cancellations = jobs.iter_mut().map(|job| job.destroy(session));
    try_join_all(cancellations).await?;
    Ok(())
}
