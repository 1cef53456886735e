//! The durable job document and its constituent types.

use std::fmt::Display;

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema marker written into every job document.
pub const JOB_VERSION: &str = "1";

const TARGET_PATH: &str = "target_path";
const OUTPUT_PATH: &str = "output_path";

/// A durable unit of work composed of ordered steps.
///
/// The document deliberately carries no status field: a job's status is
/// encoded by which status directory its file resides in, and relocating
/// the file is the only transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub version: String,
    /// Set once at creation, immutable thereafter.
    pub date_created: DateTime<FixedOffset>,
    /// Bumped by every mutating store operation.
    pub date_updated: Option<DateTime<FixedOffset>>,
    /// Insertion order is execution order.
    pub steps: Vec<JobStep>,
}

impl Job {
    pub(crate) fn new() -> Self {
        Self {
            version: JOB_VERSION.to_owned(),
            date_created: now(),
            date_updated: None,
            steps: Vec::new(),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.date_updated = Some(now());
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// One invocation of the external pipeline within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStep {
    pub action: StepAction,
    pub args: StepArgs,
    pub status: StepStatus,
}

impl JobStep {
    pub(crate) fn queued(args: StepArgs) -> Self {
        Self {
            action: StepAction::Process,
            args,
            status: StepStatus::Queued,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    /// The step's target input is caller-supplied.
    Process,
    /// The step consumes the previous step's output as its target input.
    Remix,
}

impl Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => write!(f, "process"),
            Self::Remix => write!(f, "remix"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Queued,
    Completed,
    Failed,
}

impl Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The positional status of a job: which storage bucket holds its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    Failed,
    Completed,
}

impl JobStatus {
    /// Probe order when resolving an id. Active jobs resolve first; this
    /// ordering decides which copy wins if callers ever misuse ids and
    /// must be preserved exactly.
    pub const RESOLVE_ORDER: [JobStatus; 3] =
        [JobStatus::Queued, JobStatus::Failed, JobStatus::Completed];

    /// Name of the directory backing this status.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Failed => "failed",
            Self::Completed => "completed",
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Opaque pipeline parameters for one step.
///
/// The scheduler interprets only two reserved keys, `target_path` and
/// `output_path`; everything else passes through to the step handler
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepArgs(Map<String, Value>);

impl StepArgs {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn target_path(&self) -> Option<&str> {
        self.path_value(TARGET_PATH)
    }

    pub fn output_path(&self) -> Option<&str> {
        self.path_value(OUTPUT_PATH)
    }

    pub fn set_target_path(&mut self, path: impl Into<String>) {
        self.0.insert(TARGET_PATH.to_owned(), Value::String(path.into()));
    }

    pub fn set_output_path(&mut self, path: impl Into<String>) {
        self.0.insert(OUTPUT_PATH.to_owned(), Value::String(path.into()));
    }

    fn path_value(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for StepArgs {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl FromIterator<(String, Value)> for StepArgs {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> StepArgs {
        StepArgs::from_iter([
            ("target_path".to_owned(), "t.mp4".into()),
            ("output_path".to_owned(), "o.mp4".into()),
            ("face_enhancer_blend".to_owned(), 80.into()),
        ])
    }

    #[test]
    fn document_matches_the_on_disk_schema() {
        let mut job = Job::new();
        job.steps.push(JobStep::queued(args()));

        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["version"], "1");
        assert_eq!(value["date_updated"], Value::Null);
        assert_eq!(value["steps"][0]["action"], "process");
        assert_eq!(value["steps"][0]["status"], "queued");
        assert_eq!(value["steps"][0]["args"]["target_path"], "t.mp4");
        assert_eq!(value["steps"][0]["args"]["face_enhancer_blend"], 80);
    }

    #[test]
    fn document_parses_timestamps_with_offset() {
        let raw = r#"{
            "version": "1",
            "date_created": "2026-08-23T10:15:00+02:00",
            "date_updated": null,
            "steps": []
        }"#;

        let job: Job = serde_json::from_str(raw).unwrap();

        assert_eq!(job.version, JOB_VERSION);
        assert!(job.date_updated.is_none());
        assert!(job.steps.is_empty());
    }

    #[test]
    fn reserved_keys_have_typed_accessors() {
        let mut args = args();

        assert_eq!(args.target_path(), Some("t.mp4"));
        assert_eq!(args.output_path(), Some("o.mp4"));

        args.set_target_path("previous.mp4");
        assert_eq!(args.target_path(), Some("previous.mp4"));
        // Non-reserved keys pass through opaquely.
        assert_eq!(args.get("face_enhancer_blend"), Some(&80.into()));
    }

    #[test]
    fn touch_sets_date_updated() {
        let mut job = Job::new();
        assert!(job.date_updated.is_none());
        job.touch();
        assert!(job.date_updated.is_some());
    }
}
