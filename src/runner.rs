//! Step execution, temp-path isolation, and output assembly for one job.
//!
//! The runner never knows what a step computes: the per-step transform is
//! an injected [`StepHandler`], and video assembly is an injected
//! [`VideoConcat`]. Steps execute strictly sequentially because step N
//! may consume step N-1's temp output.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::instrument;

use crate::job::{JobStatus, JobStep, StepAction, StepArgs, StepStatus};
use crate::store::{JobRepository, JobStore, StoreError};

/// Extensions treated as video artifacts during the merge phase.
const VIDEO_EXTENSIONS: [&str; 6] = ["avi", "m4v", "mkv", "mov", "mp4", "webm"];

type Result<T> = std::result::Result<T, RunError>;

/// Performs the actual transformation for one step.
///
/// Implemented for any `FnMut(&StepArgs) -> bool` closure; no structured
/// error payload crosses this boundary, only success or failure.
pub trait StepHandler {
    fn handle_step(&mut self, args: &StepArgs) -> bool;
}

impl<F> StepHandler for F
where
    F: FnMut(&StepArgs) -> bool,
{
    fn handle_step(&mut self, args: &StepArgs) -> bool {
        self(args)
    }
}

/// Concatenates temp video artifacts, in order, into one output file.
///
/// Implemented for any `FnMut(&[PathBuf], &Path) -> bool` closure.
pub trait VideoConcat {
    fn concat_videos(&mut self, inputs: &[PathBuf], output: &Path) -> bool;
}

impl<F> VideoConcat for F
where
    F: FnMut(&[PathBuf], &Path) -> bool,
{
    fn concat_videos(&mut self, inputs: &[PathBuf], output: &Path) -> bool {
        self(inputs, output)
    }
}

/// Why a job run failed.
#[derive(Debug, Error)]
pub enum RunError {
    /// The external handler reported failure for a step.
    #[error("step {index} of job {id} failed")]
    StepFailed { id: String, index: usize },
    /// A temp artifact could not be assembled into its final output.
    /// Output assembly is part of the job's success contract.
    #[error("failed to assemble output {}", output.display())]
    MergeFailed { output: PathBuf },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Executes all steps of one job in order and finalizes its status.
pub struct JobRunner<'a, R, C> {
    store: &'a JobStore<R>,
    concat: C,
    temp_dir: PathBuf,
}

impl<'a, R, C> JobRunner<'a, R, C>
where
    R: JobRepository,
    C: VideoConcat,
{
    pub fn new(store: &'a JobStore<R>, concat: C) -> Self {
        Self {
            store,
            concat,
            temp_dir: std::env::temp_dir().join("mediaq"),
        }
    }

    /// Overrides where per-step temp artifacts are written.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Runs every step of the job, assembles the outputs, and moves the
    /// job file to `completed` on success or `failed` on any failure.
    #[instrument(skip(self, handler))]
    pub fn run_job<H>(&mut self, id: &str, handler: &mut H) -> Result<()>
    where
        H: StepHandler,
    {
        let job = self.store.job(id)?;
        let outcome = self
            .run_steps(id, &job.steps, handler)
            .and_then(|()| self.merge_steps(id, &job.steps));
        match outcome {
            Ok(()) => {
                self.store.move_job_file(id, JobStatus::Completed)?;
                tracing::debug!(%id, "job complete");
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%id, %error, "job failed");
                self.store.move_job_file(id, JobStatus::Failed)?;
                Err(error)
            }
        }
    }

    /// Runs every queued job, stopping at the first failure and leaving
    /// the remaining jobs untouched in the queue.
    pub fn run_all_jobs<H>(&mut self, handler: &mut H) -> Result<()>
    where
        H: StepHandler,
    {
        for id in self.store.job_ids(JobStatus::Queued)? {
            self.run_job(&id, handler)?;
        }
        Ok(())
    }

    /// Runs `steps` in document order against the handler.
    ///
    /// Non-directory output paths are rewritten in memory to a temp path
    /// scoped to `(job id, step index, output basename)` so that jobs
    /// sharing a literal output path cannot collide before the merge
    /// phase. Remix steps have their `target_path` rewritten to the
    /// previous step's temp output, not its final path, which is what
    /// makes chained steps consume each other's intermediate artifacts.
    ///
    /// Step statuses are persisted as the run progresses; the first
    /// failing step ends the run.
    pub fn run_steps<H>(&self, id: &str, steps: &[JobStep], handler: &mut H) -> Result<()>
    where
        H: StepHandler,
    {
        fs::create_dir_all(&self.temp_dir).map_err(StoreError::from)?;
        let mut previous_output: Option<PathBuf> = None;
        for (index, step) in steps.iter().enumerate() {
            let mut args = step.args.clone();
            let temp_output = step
                .args
                .output_path()
                .filter(|output| !Path::new(output).is_dir())
                .map(|output| self.step_temp_path(id, index, output));
            if let Some(temp) = &temp_output {
                args.set_output_path(temp.to_string_lossy().into_owned());
            }
            if step.action == StepAction::Remix {
                if let Some(previous) = &previous_output {
                    args.set_target_path(previous.to_string_lossy().into_owned());
                }
            }

            tracing::debug!(%id, index, action = %step.action, "running step");
            let succeeded = handler.handle_step(&args);
            let status = if succeeded {
                StepStatus::Completed
            } else {
                StepStatus::Failed
            };
            self.store.set_step_status(id, index as isize, status)?;
            if !succeeded {
                tracing::warn!(%id, index, "step handler reported failure");
                return Err(RunError::StepFailed {
                    id: id.to_owned(),
                    index,
                });
            }

            previous_output =
                temp_output.or_else(|| step.args.output_path().map(PathBuf::from));
        }
        Ok(())
    }

    /// Assembles each step's temp artifact into its final output path.
    ///
    /// Artifacts are grouped by the original (non-temp) `output_path` in
    /// first-seen order. Groups consisting entirely of videos are
    /// concatenated in step order through the injected collaborator;
    /// anything else is moved into place, later steps overwriting
    /// earlier ones. The first failure fails the job.
    pub fn merge_steps(&mut self, id: &str, steps: &[JobStep]) -> Result<()> {
        for (output, temps) in self.output_groups(id, steps) {
            let assembled = if temps.iter().all(|temp| is_video(temp)) {
                self.concat.concat_videos(&temps, &output)
            } else {
                move_artifacts(&temps, &output)
            };
            if !assembled {
                tracing::error!(%id, output = %output.display(), "failed to assemble output");
                return Err(RunError::MergeFailed { output });
            }
            tracing::debug!(%id, output = %output.display(), "assembled output");
        }
        Ok(())
    }

    /// Moves a failed job back to the queue with every step reset.
    pub fn retry_job(&self, id: &str) -> Result<()> {
        if self.store.job_status(id) != Some(JobStatus::Failed) {
            return Err(StoreError::Conflict("only failed jobs can be retried").into());
        }
        for index in 0..self.store.step_total(id) {
            self.store
                .set_step_status(id, index as isize, StepStatus::Queued)?;
        }
        self.store.move_job_file(id, JobStatus::Queued)?;
        tracing::debug!(%id, "job requeued for retry");
        Ok(())
    }

    /// Requeues every failed job.
    pub fn retry_all_jobs(&self) -> Result<()> {
        for id in self.store.job_ids(JobStatus::Failed)? {
            self.retry_job(&id)?;
        }
        Ok(())
    }

    /// Temp artifacts grouped by original output path, in step order.
    fn output_groups(&self, id: &str, steps: &[JobStep]) -> Vec<(PathBuf, Vec<PathBuf>)> {
        let mut groups: Vec<(PathBuf, Vec<PathBuf>)> = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            let Some(output) = step.args.output_path() else {
                continue;
            };
            if Path::new(output).is_dir() {
                continue;
            }
            let temp = self.step_temp_path(id, index, output);
            let output = PathBuf::from(output);
            match groups.iter_mut().find(|(path, _)| *path == output) {
                Some((_, temps)) => temps.push(temp),
                None => groups.push((output, vec![temp])),
            }
        }
        groups
    }

    fn step_temp_path(&self, id: &str, index: usize, output: &str) -> PathBuf {
        let name = Path::new(output)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("output");
        self.temp_dir.join(format!("{id}-{index}-{name}"))
    }
}

fn move_artifacts(temps: &[PathBuf], output: &Path) -> bool {
    temps
        .iter()
        .all(|temp| fs::rename(temp, output).is_ok())
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
