//! Cooperative process-state machine shared across one run.
//!
//! The state is the sole cancellation signal in the system: the per-item
//! hot loop pulls payloads through [`ProcessManager::manage`], which
//! checks the state on every pull. Cancellation latency therefore equals
//! the consumer's pull interval; nothing is interrupted in flight.

use std::fmt::Display;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of one run: `Pending → Checking → Pending` for pre-run
/// verification, `Pending → Processing → Stopping → Pending` for an
/// active run and its cooperative cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessState {
    Pending = 0,
    Checking = 1,
    Processing = 2,
    Stopping = 3,
}

impl ProcessState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Checking,
            2 => Self::Processing,
            3 => Self::Stopping,
            _ => Self::Pending,
        }
    }
}

impl Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Checking => "checking",
            Self::Processing => "processing",
            Self::Stopping => "stopping",
        };
        write!(f, "{name}")
    }
}

/// Cheaply cloneable handle over the shared run state.
///
/// Designed for one active run with one controller; inject one manager
/// per run so independent runs (and tests) do not interfere.
#[derive(Debug, Clone, Default)]
pub struct ProcessManager {
    state: Arc<AtomicU8>,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProcessState {
        ProcessState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: ProcessState) {
        tracing::debug!(%state, "process state change");
        self.state.store(state as u8, Ordering::Release);
    }

    /// Pre-run verification, e.g. asset availability.
    pub fn check(&self) {
        self.set(ProcessState::Checking);
    }

    /// Marks the run active.
    pub fn start(&self) {
        self.set(ProcessState::Processing);
    }

    /// Requests cooperative cancellation of the active run.
    pub fn stop(&self) {
        self.set(ProcessState::Stopping);
    }

    /// Returns to idle once the run has drained.
    pub fn end(&self) {
        self.set(ProcessState::Pending);
    }

    pub fn is_pending(&self) -> bool {
        self.state() == ProcessState::Pending
    }

    pub fn is_checking(&self) -> bool {
        self.state() == ProcessState::Checking
    }

    pub fn is_processing(&self) -> bool {
        self.state() == ProcessState::Processing
    }

    pub fn is_stopping(&self) -> bool {
        self.state() == ProcessState::Stopping
    }

    /// Forward-only view over `payloads` that yields the next item only
    /// while the state is `processing` at the instant of the pull, and
    /// silently ends otherwise.
    pub fn manage<I>(&self, payloads: I) -> Manage<I::IntoIter>
    where
        I: IntoIterator,
    {
        Manage {
            manager: self.clone(),
            payloads: payloads.into_iter(),
        }
    }
}

/// Iterator returned by [`ProcessManager::manage`].
pub struct Manage<I> {
    manager: ProcessManager,
    payloads: I,
}

impl<I> Iterator for Manage<I>
where
    I: Iterator,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.manager
            .is_processing()
            .then(|| self.payloads.next())
            .flatten()
    }
}
