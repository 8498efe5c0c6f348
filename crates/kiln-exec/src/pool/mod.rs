//! Bounded pool of compiler workers.
//!
//! ## Claiming
//! 1. Reuse an idle worker.
//! 2. Otherwise create one while `idle + busy < capacity`.
//! 3. Otherwise wait for a release (notification plus a bounded poll) up to the
//!    wait ceiling, then fall back to a temporary worker outside capacity accounting.
//!
//! ## Releasing
//! A worker whose command exited 0 goes back to idle. Any other ending
//! (non-zero exit, timeout, spawn failure, cancellation, shutdown) terminates it.
//! Release happens in [`lease::Lease`]'s `Drop`, so it runs on every exit path.
//!
//! The state mutex only guards bookkeeping and is never held across an await.
mod lease;
mod worker;
pub use worker::{WorkerHandle, WorkerState};

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::{sync::Notify, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use kiln_core::{
    EngineContext,
    error::{BuildError, CliFailure},
    executor::CommandExecutor,
    metrics::PoolEvent,
    recorder::MetricSample,
};
use kiln_model::{CommandOutput, CommandSpec, Labels, OP_CLI_EXECUTION, PoolConfig, PoolStats, WorkerId};

use crate::{
    ExecError,
    error::ExecResult,
    metrics::{EXECUTOR_WORKER_POOL, WORKER_KIND_POOLED, WORKER_KIND_TEMPORARY, run_outcome},
    process::ProcessRunner,
};
use lease::Lease;
use worker::next_worker_id;

/// Tag key naming whether a command ran on a pooled or temporary worker.
const TAG_WORKER_KIND: &str = "worker_kind";

struct BusyWorker {
    handle: WorkerHandle,
    cancel: CancellationToken,
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<WorkerHandle>,
    busy: HashMap<WorkerId, BusyWorker>,
    /// Bumped by `clear_pool`; leases from older generations release as no-ops.
    generation: u64,
    closed: bool,
    temporary_spawned: u64,
    evicted: u64,
}

/// Capacity-bounded executor of compiler commands.
pub struct WorkerPool {
    cfg: PoolConfig,
    ctx: EngineContext,
    runner: ProcessRunner,
    state: Mutex<PoolState>,
    released: Notify,
    /// Parent of every per-command token; cancelled once on shutdown.
    root: CancellationToken,
}

impl WorkerPool {
    pub fn new(cfg: PoolConfig, ctx: EngineContext) -> ExecResult<Self> {
        cfg.validate()
            .map_err(|e| ExecError::InvalidConfig(e.to_string()))?;
        let runner = ProcessRunner::new(cfg.limits.clone())?;
        Ok(Self {
            cfg,
            ctx,
            runner,
            state: Mutex::new(PoolState::default()),
            released: Notify::new(),
            root: CancellationToken::new(),
        })
    }

    /// Replace the process runner, e.g. to change output logging.
    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Snapshot of the idle workers, oldest first.
    pub fn idle_workers(&self) -> Vec<WorkerHandle> {
        self.state().idle.iter().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    fn try_claim(&self, command: &str) -> Result<Option<Lease<'_>>, BuildError> {
        let mut st = self.state();
        if st.closed {
            return Err(CliFailure::pool_closed(command).into());
        }

        let (handle, event) = if let Some(mut handle) = st.idle.pop_front() {
            handle.claim();
            (handle, PoolEvent::Reused)
        } else if st.idle.len() + st.busy.len() < self.cfg.capacity {
            (WorkerHandle::spawn(), PoolEvent::Spawned)
        } else {
            return Ok(None);
        };

        let id = handle.id();
        let cancel = self.root.child_token();
        let generation = st.generation;
        st.busy.insert(
            id,
            BusyWorker {
                handle,
                cancel: cancel.clone(),
            },
        );
        drop(st);

        debug!(worker = %id, event = event.as_label(), "worker claimed");
        self.ctx.metrics().record_pool_event(event);
        Ok(Some(Lease::pooled(self, id, cancel, generation)))
    }

    async fn acquire(&self, command: &str) -> Result<Lease<'_>, BuildError> {
        if let Some(lease) = self.try_claim(command)? {
            return Ok(lease);
        }

        let ceiling = Duration::from_millis(self.cfg.wait_ceiling_ms);
        let poll = Duration::from_millis(self.cfg.poll_interval_ms.max(1));
        let deadline = Instant::now() + ceiling;
        debug!(capacity = self.cfg.capacity, "pool saturated; waiting for a worker");

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let _ = tokio::time::timeout(poll.min(remaining), self.released.notified()).await;
            if let Some(lease) = self.try_claim(command)? {
                return Ok(lease);
            }
        }

        let id = next_worker_id();
        let temporary_spawned = {
            let mut st = self.state();
            if st.closed {
                return Err(CliFailure::pool_closed(command).into());
            }
            st.temporary_spawned += 1;
            st.temporary_spawned
        };
        warn!(
            worker = %id,
            capacity = self.cfg.capacity,
            waited_ms = self.cfg.wait_ceiling_ms,
            temporary_spawned,
            "pool saturated; spawning temporary worker",
        );
        self.ctx.metrics().record_pool_event(PoolEvent::Saturated);
        Ok(Lease::temporary(self, id, self.root.child_token()))
    }

    /// Return a pooled worker; called from [`Lease`]'s `Drop`.
    fn release(&self, id: WorkerId, generation: u64, exit_code: Option<i32>, healthy: bool) {
        let mut st = self.state();
        if st.generation != generation {
            return;
        }
        let Some(BusyWorker { mut handle, .. }) = st.busy.remove(&id) else {
            return;
        };

        let keep = healthy && !st.closed;
        handle.finish(exit_code, keep);
        if keep {
            st.idle.push_back(handle);
        } else {
            st.evicted += 1;
        }
        drop(st);

        if !keep {
            debug!(worker = %id, exit_code, "worker evicted");
            self.ctx.metrics().record_pool_event(PoolEvent::Evicted);
        }
        self.released.notify_one();
    }

    /// Terminate every tracked worker and cancel in-flight commands.
    ///
    /// Returns how many workers were dropped.
    pub fn clear_pool(&self) -> usize {
        let (idle, busy) = {
            let mut st = self.state();
            let idle = std::mem::take(&mut st.idle);
            let busy = std::mem::take(&mut st.busy);
            st.generation += 1;
            st.evicted += (idle.len() + busy.len()) as u64;
            (idle, busy)
        };

        let total = idle.len() + busy.len();
        for mut worker in busy.into_values() {
            worker.handle.terminate();
            worker.cancel.cancel();
        }
        drop(idle);
        for _ in 0..total {
            self.ctx.metrics().record_pool_event(PoolEvent::Evicted);
        }

        info!(terminated = total, "worker pool cleared");
        self.released.notify_waiters();
        total
    }

    fn observe(&self, cmd: &CommandSpec, lease_kind: &'static str, res: &Result<CommandOutput, ExecError>, elapsed: Duration) {
        let outcome = run_outcome(res);
        let duration_ms = match res {
            Ok(out) => out.duration_ms,
            Err(_) => elapsed.as_millis() as u64,
        };
        self.ctx
            .metrics()
            .record_command_completed(OP_CLI_EXECUTION, outcome, duration_ms);
        self.ctx.recorder().record(
            MetricSample::new(OP_CLI_EXECUTION, duration_ms as f64 / 1000.0, res.as_ref().is_ok_and(|o| o.success))
                .with_tags(
                    Labels::new()
                        .with("program", cmd.program())
                        .with(TAG_WORKER_KIND, lease_kind),
                ),
        );
    }
}

#[async_trait]
impl CommandExecutor for WorkerPool {
    fn name(&self) -> &'static str {
        EXECUTOR_WORKER_POOL
    }

    #[instrument(level = "debug", skip(self, cmd), fields(program = %cmd.program()))]
    async fn execute(&self, cmd: &CommandSpec) -> Result<CommandOutput, BuildError> {
        cmd.validate().map_err(ExecError::from)?;
        let command = cmd.command_line();
        let mut lease = self.acquire(&command).await?;
        let kind = if lease.is_temporary() {
            WORKER_KIND_TEMPORARY
        } else {
            WORKER_KIND_POOLED
        };

        self.ctx.metrics().record_command_started(OP_CLI_EXECUTION);
        let started = Instant::now();
        let res = self.runner.run(cmd, lease.worker(), lease.cancel_token()).await;
        match &res {
            Ok(out) => lease.complete(out.exit_code, out.success),
            Err(_) => lease.complete(None, false),
        }
        drop(lease);
        self.observe(cmd, kind, &res, started.elapsed());

        let out = res?;
        if out.success {
            Ok(out)
        } else {
            Err(CliFailure::exited(command, out.exit_code, out.stdout, out.stderr).into())
        }
    }

    /// Fan out on temporary workers; capacity is not consulted.
    async fn execute_concurrently(&self, cmds: &[CommandSpec]) -> Result<Vec<CommandOutput>, BuildError> {
        if self.is_closed() {
            let first = cmds.first().map(CommandSpec::command_line).unwrap_or_default();
            return Err(CliFailure::pool_closed(first).into());
        }

        let batch = self.root.child_token();
        let mut set = JoinSet::new();
        for (idx, cmd) in cmds.iter().cloned().enumerate() {
            let runner = self.runner.clone();
            let token = batch.clone();
            let worker = next_worker_id();
            self.ctx.metrics().record_command_started(OP_CLI_EXECUTION);
            set.spawn(async move {
                let started = Instant::now();
                let res = runner.run(&cmd, worker, &token).await;
                (idx, cmd, res, started.elapsed())
            });
        }
        debug!(commands = cmds.len(), "bulk fan-out started");

        let mut results: Vec<Option<CommandOutput>> = (0..cmds.len()).map(|_| None).collect();
        let mut failure: Option<BuildError> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, cmd, res, elapsed)) => {
                    self.observe(&cmd, WORKER_KIND_TEMPORARY, &res, elapsed);
                    match res {
                        Ok(out) => results[idx] = Some(out),
                        Err(e) if failure.is_none() => {
                            warn!(command = %cmd.command_line(), error = %e, "bulk command failed; cancelling siblings");
                            batch.cancel();
                            failure = Some(e.into());
                        }
                        Err(_) => {}
                    }
                }
                Err(join_err) => {
                    if failure.is_none() {
                        batch.cancel();
                        failure = Some(BuildError::Internal(format!("command task failed: {join_err}")));
                    }
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        results
            .into_iter()
            .map(|out| out.ok_or_else(|| BuildError::Internal("command produced no result".into())))
            .collect()
    }

    fn stats(&self) -> PoolStats {
        let st = self.state();
        PoolStats {
            capacity: self.cfg.capacity,
            idle: st.idle.len(),
            busy: st.busy.len(),
            temporary_spawned: st.temporary_spawned,
            evicted: st.evicted,
        }
    }

    async fn shutdown(&self, grace: Duration) {
        {
            let mut st = self.state();
            if st.closed {
                return;
            }
            st.closed = true;
        }
        info!(grace_ms = grace.as_millis() as u64, "worker pool closed; draining");
        self.released.notify_waiters();

        let poll = Duration::from_millis(self.cfg.poll_interval_ms.max(1));
        let deadline = Instant::now() + grace;
        loop {
            let busy = self.state().busy.len();
            if busy == 0 {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(busy, "grace period elapsed; terminating in-flight commands");
                break;
            }
            let _ = tokio::time::timeout(poll.min(remaining), self.released.notified()).await;
        }

        self.clear_pool();
        self.root.cancel();
    }
}

#[cfg(test)]
mod tests {
    use kiln_model::ErrorClass;

    use super::*;

    fn pool(capacity: usize, wait_ceiling_ms: u64) -> WorkerPool {
        let cfg = PoolConfig {
            capacity,
            wait_ceiling_ms,
            poll_interval_ms: 5,
            ..PoolConfig::default()
        };
        WorkerPool::new(cfg, EngineContext::default()).unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let cfg = PoolConfig {
            capacity: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            WorkerPool::new(cfg, EngineContext::default()),
            Err(ExecError::InvalidConfig(_))
        ));
    }

    #[test]
    fn capacity_bounds_claims() {
        let p = pool(1, 10);
        let _held = p.try_claim("x").unwrap().unwrap();
        assert!(p.try_claim("x").unwrap().is_none());
        assert_eq!(p.stats().busy, 1);
    }

    #[test]
    fn dropped_lease_without_clean_exit_evicts() {
        let p = pool(2, 10);
        let lease = p.try_claim("x").unwrap().unwrap();
        drop(lease);
        let s = p.stats();
        assert_eq!((s.idle, s.busy, s.evicted), (0, 0, 1));
    }

    #[test]
    fn clean_release_is_reused() {
        let p = pool(1, 10);
        let mut lease = p.try_claim("x").unwrap().unwrap();
        let id = lease.worker();
        lease.complete(Some(0), true);
        drop(lease);

        let idle = p.idle_workers();
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].id(), id);
        assert_eq!(idle[0].runs(), 1);
        assert_eq!(idle[0].state(), WorkerState::Idle);

        let again = p.try_claim("x").unwrap().unwrap();
        assert_eq!(again.worker(), id);
    }

    #[test]
    fn leases_from_before_clear_release_as_noops() {
        let p = pool(1, 10);
        let mut stale = p.try_claim("x").unwrap().unwrap();
        assert_eq!(p.clear_pool(), 1);
        assert!(stale.cancel_token().is_cancelled());

        stale.complete(Some(0), true);
        drop(stale);
        let s = p.stats();
        assert_eq!((s.idle, s.busy, s.evicted), (0, 0, 1));
    }

    #[tokio::test]
    async fn saturation_falls_back_to_temporary_worker() {
        let p = pool(1, 20);
        let _held = p.try_claim("x").unwrap().unwrap();

        let lease = p.acquire("x").await.unwrap();
        assert!(lease.is_temporary());
        let s = p.stats();
        assert_eq!(s.temporary_spawned, 1);
        assert_eq!(s.busy, 1);
    }

    #[tokio::test]
    async fn waiter_receives_released_worker() {
        let p = pool(1, 5_000);
        let mut held = p.try_claim("x").unwrap().unwrap();
        let id = held.worker();

        let release = async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            held.complete(Some(0), true);
            drop(held);
        };
        let (lease, ()) = tokio::join!(p.acquire("x"), release);

        let lease = lease.unwrap();
        assert!(!lease.is_temporary());
        assert_eq!(lease.worker(), id);
        assert_eq!(p.stats().temporary_spawned, 0);
    }

    #[tokio::test]
    async fn closed_pool_rejects_new_commands() {
        let p = pool(1, 10);
        p.shutdown(Duration::ZERO).await;
        assert!(p.is_closed());

        let err = p.execute(&CommandSpec::new("true", 1_000)).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::CliFailure { retryable: false });
    }
}
