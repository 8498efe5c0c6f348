use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use kiln_model::WorkerId;

/// Process-wide worker id sequence; pooled and temporary workers share it.
static WORKER_SEQ: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_worker_id() -> WorkerId {
    WorkerId::new(WORKER_SEQ.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Busy,
    /// Evicted after an abnormal exit or pool teardown; never reused.
    Terminated,
}

impl WorkerState {
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Busy => "busy",
            WorkerState::Terminated => "terminated",
        }
    }
}

/// Bookkeeping for one pooled worker slot.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    state: WorkerState,
    last_exit_code: Option<i32>,
    runs: u64,
}

impl WorkerHandle {
    /// A fresh worker, already claimed.
    pub(crate) fn spawn() -> Self {
        Self {
            id: next_worker_id(),
            state: WorkerState::Busy,
            last_exit_code: None,
            runs: 0,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub(crate) fn claim(&mut self) {
        self.state = WorkerState::Busy;
    }

    /// Record a finished run; a healthy worker goes back to idle, anything else is terminated.
    pub(crate) fn finish(&mut self, exit_code: Option<i32>, healthy: bool) {
        self.runs += 1;
        self.last_exit_code = exit_code;
        self.state = if healthy {
            WorkerState::Idle
        } else {
            WorkerState::Terminated
        };
    }

    pub(crate) fn terminate(&mut self) {
        self.state = WorkerState::Terminated;
    }
}

impl fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, runs={})", self.id, self.state.as_label(), self.runs)
    }
}
