//! Helpers for testing code built on the scheduler's collaborator seams.
//!
//! [`RecordingHandler`] and [`RecordingConcat`] stand in for the external
//! pipeline: they record every invocation so tests can assert on call
//! order and arguments, while producing just enough filesystem effect
//! (an artifact per step, a stitched output per group) for the merge
//! phase to complete.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::job::StepArgs;
use crate::runner::{StepHandler, VideoConcat};

/// Step handler that records each call and replays scripted results.
///
/// On a successful call it writes an empty artifact at the step's
/// `output_path` so a following merge phase has something to move.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    calls: Vec<StepArgs>,
    results: VecDeque<bool>,
}

impl RecordingHandler {
    /// A handler that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays `results` in order, succeeding once they run out.
    pub fn with_results(results: impl IntoIterator<Item = bool>) -> Self {
        Self {
            calls: Vec::new(),
            results: results.into_iter().collect(),
        }
    }

    /// Every recorded invocation, in call order.
    pub fn calls(&self) -> &[StepArgs] {
        &self.calls
    }
}

impl StepHandler for RecordingHandler {
    fn handle_step(&mut self, args: &StepArgs) -> bool {
        self.calls.push(args.clone());
        let succeeded = self.results.pop_front().unwrap_or(true);
        if succeeded {
            if let Some(output) = args.output_path() {
                let _ = fs::write(output, b"");
            }
        }
        succeeded
    }
}

/// Concatenation collaborator that records each call and, on success,
/// stitches the input files into the output in order.
///
/// Clones share the recorded calls, so a test can keep a handle while
/// the runner owns the collaborator.
#[derive(Debug, Clone)]
pub struct RecordingConcat {
    calls: Arc<Mutex<Vec<(Vec<PathBuf>, PathBuf)>>>,
    result: bool,
}

impl Default for RecordingConcat {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            result: true,
        }
    }
}

impl RecordingConcat {
    /// A concatenator that reports failure on every call.
    pub fn failing() -> Self {
        Self {
            result: false,
            ..Self::default()
        }
    }

    /// Every recorded `(inputs, output)` pair, in call order.
    pub fn calls(&self) -> Vec<(Vec<PathBuf>, PathBuf)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl VideoConcat for RecordingConcat {
    fn concat_videos(&mut self, inputs: &[PathBuf], output: &Path) -> bool {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((inputs.to_vec(), output.to_path_buf()));
        if !self.result {
            return false;
        }
        let mut stitched = Vec::new();
        for input in inputs {
            match fs::read(input) {
                Ok(bytes) => stitched.extend(bytes),
                Err(_) => return false,
            }
        }
        fs::write(output, stitched).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_handler_replays_scripted_results() {
        let mut handler = RecordingHandler::with_results([true, false]);
        let args = StepArgs::default();

        assert!(handler.handle_step(&args));
        assert!(!handler.handle_step(&args));
        // Scripted results exhausted: default back to success.
        assert!(handler.handle_step(&args));
        assert_eq!(handler.calls().len(), 3);
    }

    #[test]
    fn recording_concat_stitches_inputs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("0.mp4");
        let second = dir.path().join("1.mp4");
        fs::write(&first, b"ab").unwrap();
        fs::write(&second, b"cd").unwrap();
        let output = dir.path().join("out.mp4");
        let mut concat = RecordingConcat::default();

        assert!(concat.concat_videos(&[first, second], &output));

        assert_eq!(fs::read(output).unwrap(), b"abcd");
        assert_eq!(concat.calls().len(), 1);
    }

    #[test]
    fn failing_concat_still_records_the_call() {
        let mut concat = RecordingConcat::failing();
        let observer = concat.clone();

        assert!(!concat.concat_videos(&[PathBuf::from("a.mp4")], Path::new("out.mp4")));
        assert_eq!(observer.calls().len(), 1);
    }
}
