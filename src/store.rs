//! Durable job persistence with status expressed as storage location.
//!
//! [`JobStore`] implements the CRUD surface over job documents and is
//! generic over a [`JobRepository`], the seam that hides the storage
//! medium. The shipped implementations are [`fs::FsRepository`] (status
//! directories on local disk) and [`memory::InMemoryRepository`] for
//! tests.

use std::path::Path;

use thiserror::Error;
use uuid::Uuid;

use crate::job::{Job, JobStatus, JobStep, StepAction, StepArgs, StepStatus};

pub mod fs;
pub mod memory;

pub use fs::FsRepository;
pub use memory::InMemoryRepository;

type Result<T> = std::result::Result<T, StoreError>;

/// Failure reasons for store operations.
///
/// Expected conditions (absent job, conflicting state, bad index) are
/// error values, never panics; callers are expected to match on them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The job id does not resolve to a document in any status bucket.
    #[error("job not found")]
    NotFound,
    /// The operation clashes with existing state, e.g. creating an id
    /// that already exists, or remixing without a concrete prior artifact.
    #[error("conflicting job state: {0}")]
    Conflict(&'static str),
    /// A step index fell outside the job's current step range.
    #[error("step index {index} out of range for {len} steps")]
    OutOfRange { index: isize, len: usize },
    /// Job ids become file names and are validated accordingly.
    #[error("invalid job id: {0:?}")]
    InvalidId(String),
    #[error("error accessing the job store")]
    Io(#[from] std::io::Error),
    #[error("error encoding or decoding a job document")]
    Json(#[from] serde_json::Error),
}

/// Storage seam for job documents.
///
/// Status is positional: a job lives in exactly one status bucket at a
/// time and [`JobRepository::relocate`] is the only transition. Each call
/// is expected to be atomic from the perspective of concurrent readers.
pub trait JobRepository {
    /// Creates the status buckets if absent. Must be idempotent.
    fn init(&self) -> Result<()>;
    /// Which status bucket currently holds `id`, probing in
    /// [`JobStatus::RESOLVE_ORDER`].
    fn resolve(&self, id: &str) -> Option<JobStatus>;
    fn read(&self, id: &str) -> Result<Job>;
    fn write(&self, id: &str, job: &Job) -> Result<()>;
    fn relocate(&self, id: &str, status: JobStatus) -> Result<()>;
    fn remove(&self, id: &str) -> Result<()>;
    /// Ids currently in `status`, sorted for deterministic listings.
    fn ids(&self, status: JobStatus) -> Result<Vec<String>>;
}

/// Durable CRUD over job documents.
#[derive(Debug, Clone)]
pub struct JobStore<R> {
    repo: R,
}

impl<R> JobStore<R>
where
    R: JobRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Creates the status buckets if absent. Idempotent.
    pub fn init(&self) -> Result<()> {
        self.repo.init()
    }

    /// Suggests a fresh job id with the given prefix.
    pub fn suggest_job_id(prefix: &str) -> String {
        let tail = Uuid::new_v4().simple().to_string();
        format!("{prefix}-{}", &tail[..8])
    }

    /// Creates an empty job under `id`, failing with
    /// [`StoreError::Conflict`] rather than overwriting when the id
    /// already resolves anywhere.
    pub fn create_job(&self, id: &str) -> Result<()> {
        validate_job_id(id)?;
        if self.repo.resolve(id).is_some() {
            return Err(StoreError::Conflict("job id already exists"));
        }
        tracing::debug!(%id, "creating job");
        self.repo.write(id, &Job::new())
    }

    /// Appends a `process` step with the given args.
    pub fn add_step(&self, id: &str, args: StepArgs) -> Result<()> {
        self.update_job(id, |job| {
            job.steps.push(JobStep::queued(args));
            Ok(())
        })
    }

    /// Appends a `remix` step: its `target_path` is rewritten to the
    /// previous step's `output_path`. Fails when there is no prior step
    /// or the prior step has no concrete (non-directory) output artifact.
    pub fn remix_step(&self, id: &str, mut args: StepArgs) -> Result<()> {
        self.update_job(id, |job| {
            let previous = job
                .steps
                .last()
                .ok_or(StoreError::Conflict("remix requires a prior step"))?;
            let output = previous
                .args
                .output_path()
                .ok_or(StoreError::Conflict("previous step has no output path"))?
                .to_owned();
            if Path::new(&output).is_dir() {
                return Err(StoreError::Conflict(
                    "previous step output is a directory",
                ));
            }
            args.set_target_path(output);
            let mut step = JobStep::queued(args);
            step.action = StepAction::Remix;
            job.steps.push(step);
            Ok(())
        })
    }

    /// Inserts a `process` step at `index`. Negative indices count from
    /// the end; the append position is accepted.
    pub fn insert_step(&self, id: &str, index: isize, args: StepArgs) -> Result<()> {
        self.update_job(id, |job| {
            let len = job.steps.len();
            let at = normalize_insert_index(index, len)
                .ok_or(StoreError::OutOfRange { index, len })?;
            job.steps.insert(at, JobStep::queued(args));
            Ok(())
        })
    }

    /// Removes the step at `index`. Negative indices count from the end.
    pub fn remove_step(&self, id: &str, index: isize) -> Result<()> {
        self.update_job(id, |job| {
            let len = job.steps.len();
            let at = normalize_index(index, len).ok_or(StoreError::OutOfRange { index, len })?;
            job.steps.remove(at);
            Ok(())
        })
    }

    pub fn set_step_status(&self, id: &str, index: isize, status: StepStatus) -> Result<()> {
        self.update_job(id, |job| {
            let len = job.steps.len();
            let at = normalize_index(index, len).ok_or(StoreError::OutOfRange { index, len })?;
            job.steps[at].status = status;
            Ok(())
        })
    }

    pub fn set_step_action(&self, id: &str, index: isize, action: StepAction) -> Result<()> {
        self.update_job(id, |job| {
            let len = job.steps.len();
            let at = normalize_index(index, len).ok_or(StoreError::OutOfRange { index, len })?;
            job.steps[at].action = action;
            Ok(())
        })
    }

    pub fn step_status(&self, id: &str, index: isize) -> Result<StepStatus> {
        let job = self.job(id)?;
        let len = job.steps.len();
        let at = normalize_index(index, len).ok_or(StoreError::OutOfRange { index, len })?;
        Ok(job.steps[at].status)
    }

    /// Reads the job document for `id`.
    pub fn job(&self, id: &str) -> Result<Job> {
        if self.repo.resolve(id).is_none() {
            return Err(StoreError::NotFound);
        }
        self.repo.read(id)
    }

    /// Relocates the job file into the `status` bucket. This is the only
    /// status-transition primitive.
    pub fn move_job_file(&self, id: &str, status: JobStatus) -> Result<()> {
        if self.repo.resolve(id).is_none() {
            return Err(StoreError::NotFound);
        }
        tracing::debug!(%id, %status, "moving job file");
        self.repo.relocate(id, status)
    }

    pub fn delete_job_file(&self, id: &str) -> Result<()> {
        if self.repo.resolve(id).is_none() {
            return Err(StoreError::NotFound);
        }
        tracing::debug!(%id, "deleting job file");
        self.repo.remove(id)
    }

    /// Drains every status bucket.
    pub fn delete_all_jobs(&self) -> Result<()> {
        for status in JobStatus::RESOLVE_ORDER {
            for id in self.repo.ids(status)? {
                self.repo.remove(&id)?;
            }
        }
        Ok(())
    }

    pub fn job_ids(&self, status: JobStatus) -> Result<Vec<String>> {
        self.repo.ids(status)
    }

    /// Union over all buckets, queued first, then failed, then completed.
    pub fn all_job_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for status in JobStatus::RESOLVE_ORDER {
            ids.extend(self.repo.ids(status)?);
        }
        Ok(ids)
    }

    pub fn job_status(&self, id: &str) -> Option<JobStatus> {
        self.repo.resolve(id)
    }

    /// Number of steps in the job, 0 when the job is absent.
    pub fn step_total(&self, id: &str) -> usize {
        self.job(id).map(|job| job.steps.len()).unwrap_or(0)
    }

    fn update_job<T>(&self, id: &str, apply: impl FnOnce(&mut Job) -> Result<T>) -> Result<T> {
        if self.repo.resolve(id).is_none() {
            return Err(StoreError::NotFound);
        }
        let mut job = self.repo.read(id)?;
        let value = apply(&mut job)?;
        job.touch();
        self.repo.write(id, &job)?;
        Ok(value)
    }
}

/// Normalizes a possibly negative step index against `len`, Python style:
/// `index < 0` resolves to `len + index`. Returns `None` out of range.
fn normalize_index(index: isize, len: usize) -> Option<usize> {
    let resolved = if index < 0 { index + len as isize } else { index };
    (0..len as isize)
        .contains(&resolved)
        .then_some(resolved as usize)
}

/// Insert positions additionally accept the append slot at `len`.
fn normalize_insert_index(index: isize, len: usize) -> Option<usize> {
    if index == len as isize {
        return Some(len);
    }
    normalize_index(index, len)
}

fn validate_job_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_owned()))
    }
}
