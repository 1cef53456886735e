//! The purpose of this module is to alleviate the need to import many of
//! the `mediaq` types.
//!
//! ```
//! # #![allow(unused_imports)]
//! use mediaq::prelude::*;
//! ```
pub use crate::dispatcher::{run_parallel, DispatchOptions, QueuePayload};
pub use crate::job::{Job, JobStatus, JobStep, StepAction, StepArgs, StepStatus};
pub use crate::process::{ProcessManager, ProcessState};
pub use crate::runner::{JobRunner, RunError, StepHandler, VideoConcat};
pub use crate::store::{FsRepository, InMemoryRepository, JobRepository, JobStore, StoreError};
