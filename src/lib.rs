//! A durable, file-backed job scheduler for batch media pipelines.
//!
//! The media transform itself (face/frame compositing, encoding) is an
//! external collaborator. This crate owns everything around it:
//!
//! - [`store::JobStore`] persists jobs as JSON documents whose status is
//!   the directory their file lives in (`queued/`, `failed/`,
//!   `completed/`); relocating the file is the only status transition.
//! - [`runner::JobRunner`] executes one job's steps in order through an
//!   injected [`runner::StepHandler`], isolates each step's output in a
//!   temp location, resolves remix chaining, and stitches the temp
//!   artifacts back into final outputs.
//! - [`process::ProcessManager`] is the cooperative cancellation
//!   primitive shared by every consumer of a run.
//! - [`dispatcher::run_parallel`] shards per-item work across a fixed
//!   pool of worker threads.
//!
//! One job runs at a time, synchronously, on the calling thread;
//! parallelism lives inside the external per-item work.
//!
//! # Example
//!
//! ```
//! use mediaq::prelude::*;
//!
//! let root = tempfile::tempdir().unwrap();
//! let store = JobStore::new(FsRepository::new(root.path().join("jobs")));
//! store.init().unwrap();
//!
//! store.create_job("intro").unwrap();
//! store
//!     .add_step(
//!         "intro",
//!         StepArgs::from_iter([
//!             ("target_path".to_owned(), "clip.mp4".into()),
//!             (
//!                 "output_path".to_owned(),
//!                 root.path().join("final.mp4").display().to_string().into(),
//!             ),
//!         ]),
//!     )
//!     .unwrap();
//!
//! // The handler is the external pipeline; here it just materializes
//! // the step's artifact.
//! let mut handler = |args: &StepArgs| {
//!     std::fs::write(args.output_path().unwrap(), b"frames").is_ok()
//! };
//!
//! let mut runner = JobRunner::new(&store, mediaq::testing::RecordingConcat::default())
//!     .with_temp_dir(root.path().join("tmp"));
//! runner.run_job("intro", &mut handler).unwrap();
//!
//! assert_eq!(store.job_status("intro"), Some(JobStatus::Completed));
//! assert!(root.path().join("final.mp4").is_file());
//! ```

pub mod dispatcher;
pub mod job;
pub mod prelude;
pub mod process;
pub mod runner;
pub mod store;
pub mod testing;

pub use job::{Job, JobStatus, JobStep, StepAction, StepArgs, StepStatus};
pub use runner::{JobRunner, RunError};
pub use store::{JobStore, StoreError};
