//! Run coordination
//!
//! The calling thread spawns one scoped worker per root and then only
//! listens to worker events. It stops the run once every worker is idle
//! and every node has completed.

use crate::error::{SchedulerError, SchedulerResult};
use crate::executor::{Mailbox, RunContext, Worker, WorkerEvent};
use crate::graph::TaskGraph;
use crate::report::{RunReport, WorkerStats};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError};
use morph_storage::{StorageError, VersionedStore};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

impl TaskGraph {
    /// Execute the graph against `store`
    ///
    /// Writes land in the store's version history; call
    /// [`VersionedStore::commit`] or [`VersionedStore::dump`] afterwards to
    /// fold them into committed state. A graph runs at most once.
    pub fn run(&self, store: &VersionedStore) -> SchedulerResult<RunReport> {
        if self.executed.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyExecuted);
        }
        let schema = self.schema();
        if store.len() < schema {
            return Err(StorageError::UnknownVariable {
                variable: schema - 1,
                schema: store.len(),
            }
            .into());
        }

        let started = Instant::now();
        let mode = self.config.mode;
        let roots = self.roots().to_vec();
        let workers = roots.len();

        let (event_tx, event_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (mailboxes, inboxes): (Vec<_>, Vec<_>) = (0..workers).map(|_| Mailbox::new()).unzip();
        let ctx = RunContext::new(self, store, mailboxes, event_tx);

        info!(%mode, nodes = self.len(), workers, "executing task graph");

        let (outcome, worker_stats, panicked) = thread::scope(|scope| {
            let handles: Vec<_> = inboxes
                .into_iter()
                .zip(roots)
                .enumerate()
                .map(|(id, (inbox, root))| {
                    let worker = Worker::new(id, &ctx, inbox, stop_rx.clone());
                    scope.spawn(move || worker.run(root))
                })
                .collect();

            let outcome = supervise(&ctx, &event_rx, workers, self.config.stall_timeout());
            drop(stop_tx);

            let mut stats = Vec::with_capacity(workers);
            let mut panicked = None;
            for (id, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(s) => stats.push(s),
                    Err(_) => {
                        panicked.get_or_insert(id);
                    }
                }
            }
            (outcome, stats, panicked)
        });

        outcome?;
        if let Some(worker) = panicked {
            return Err(SchedulerError::WorkerPanicked(worker));
        }

        let mut aborted_transactions: Vec<_> = ctx
            .aborted_transactions()
            .into_iter()
            .filter_map(|txn| self.transaction_timestamp(txn))
            .collect();
        aborted_transactions.sort_unstable();

        let report = RunReport {
            mode,
            workers,
            nodes: self.len(),
            executed: sum(&worker_stats, |s| s.executed),
            skipped: sum(&worker_stats, |s| s.skipped),
            aborted: self.nodes().iter().filter(|n| n.is_aborted()).count(),
            handoffs: sum(&worker_stats, |s| s.handed_off),
            aborted_transactions,
            elapsed: started.elapsed(),
            worker_stats,
        };
        self.metrics.record_run();

        info!(
            executed = report.executed,
            skipped = report.skipped,
            aborted_txns = report.aborted_transactions.len(),
            handoffs = report.handoffs,
            elapsed_us = report.elapsed.as_micros() as u64,
            "task graph executed"
        );
        Ok(report)
    }
}

fn sum(stats: &[WorkerStats], field: impl Fn(&WorkerStats) -> usize) -> usize {
    stats.iter().map(field).sum()
}

/// Track idle flags until the run completes or fails
fn supervise(
    ctx: &RunContext<'_>,
    events: &Receiver<WorkerEvent>,
    workers: usize,
    stall_timeout: Duration,
) -> SchedulerResult<()> {
    let mut idle = vec![false; workers];
    let mut idle_count = 0;

    loop {
        let event = if idle_count == workers {
            let remaining = ctx.remaining();
            if remaining == 0 {
                return Ok(());
            }
            match events.recv_timeout(stall_timeout) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    let remaining = ctx.remaining();
                    warn!(remaining, "all workers idle with nodes pending");
                    return Err(SchedulerError::Stalled { remaining });
                }
            }
        } else {
            match events.recv() {
                Ok(event) => event,
                Err(_) => {
                    return Err(SchedulerError::Stalled {
                        remaining: ctx.remaining(),
                    })
                }
            }
        };

        match event {
            WorkerEvent::Idle(worker) => {
                if !idle[worker] {
                    idle[worker] = true;
                    idle_count += 1;
                }
            }
            WorkerEvent::Busy(worker) => {
                if idle[worker] {
                    idle[worker] = false;
                    idle_count -= 1;
                }
            }
            WorkerEvent::Fatal(worker, err) => {
                warn!(worker, error = %err, "stopping run");
                return Err(err);
            }
        }
    }
}
