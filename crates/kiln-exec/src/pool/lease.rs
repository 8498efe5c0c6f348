use tokio_util::sync::CancellationToken;

use kiln_model::WorkerId;

use super::WorkerPool;

/// Exclusive use of a worker for one command.
///
/// Dropping the lease returns the worker to the pool. Unless [`Lease::complete`]
/// recorded a clean exit, the worker is evicted, which covers panics and
/// cancellation of the calling future.
pub(crate) struct Lease<'a> {
    pool: &'a WorkerPool,
    worker: WorkerId,
    cancel: CancellationToken,
    /// Pool generation at claim time; `None` for temporary workers.
    generation: Option<u64>,
    exit_code: Option<i32>,
    healthy: bool,
}

impl<'a> Lease<'a> {
    pub(crate) fn pooled(pool: &'a WorkerPool, worker: WorkerId, cancel: CancellationToken, generation: u64) -> Self {
        Self {
            pool,
            worker,
            cancel,
            generation: Some(generation),
            exit_code: None,
            healthy: false,
        }
    }

    pub(crate) fn temporary(pool: &'a WorkerPool, worker: WorkerId, cancel: CancellationToken) -> Self {
        Self {
            pool,
            worker,
            cancel,
            generation: None,
            exit_code: None,
            healthy: false,
        }
    }

    pub(crate) fn worker(&self) -> WorkerId {
        self.worker
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn is_temporary(&self) -> bool {
        self.generation.is_none()
    }

    pub(crate) fn complete(&mut self, exit_code: Option<i32>, healthy: bool) {
        self.exit_code = exit_code;
        self.healthy = healthy;
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        match self.generation {
            Some(generation) => self
                .pool
                .release(self.worker, generation, self.exit_code, self.healthy),
            None => self.cancel.cancel(),
        }
    }
}
