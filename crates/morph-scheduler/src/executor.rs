//! Graph workers
//!
//! Each worker starts from one root and walks the temporal chain of its
//! variable depth-first. Nodes it unblocks along the way go on a local LIFO
//! stack, or in `DfsNotify` mode straight to an idle worker that asked for
//! them. A rejected operation triggers an abort cascade over every
//! transaction that observed its writes.
//!
//! Cascades run under a single lock. Completing a node that was skipped
//! because it was aborted takes the same lock first, so its dependents are
//! never released before the cascade that reached it has marked them too.

use crate::config::ExecutionMode;
use crate::error::{SchedulerError, SchedulerResult};
use crate::graph::TaskGraph;
use crate::node::{NodeId, NodeStatus};
use crate::report::WorkerStats;
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use morph_storage::{ParamView, TargetView, VersionedStore};
use morph_types::{OperationError, OperationKind};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, debug_span, trace, warn};

/// Message from a worker to the coordinator
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// Out of local work, waiting
    Idle(usize),
    /// Received a hand-off after going idle
    Busy(usize),
    /// Unrecoverable error; the run must stop
    Fatal(usize, SchedulerError),
}

/// Hand-off slot of one worker
pub(crate) struct Mailbox {
    tx: Sender<NodeId>,
    waiting: AtomicBool,
}

impl Mailbox {
    pub(crate) fn new() -> (Self, Receiver<NodeId>) {
        let (tx, rx) = bounded(1);
        let mailbox = Self {
            tx,
            waiting: AtomicBool::new(false),
        };
        (mailbox, rx)
    }

    /// Deliver `node` if the owner is parked waiting for work
    fn offer(&self, node: NodeId) -> bool {
        self.waiting
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            && self.tx.try_send(node).is_ok()
    }
}

/// State shared by all workers of one run
pub(crate) struct RunContext<'a> {
    pub(crate) graph: &'a TaskGraph,
    pub(crate) store: &'a VersionedStore,
    remaining: AtomicUsize,
    mailboxes: Vec<Mailbox>,
    /// Rolled-back transactions; held for the whole of a cascade
    aborted: Mutex<HashSet<usize>>,
    events: Sender<WorkerEvent>,
}

impl<'a> RunContext<'a> {
    pub(crate) fn new(
        graph: &'a TaskGraph,
        store: &'a VersionedStore,
        mailboxes: Vec<Mailbox>,
        events: Sender<WorkerEvent>,
    ) -> Self {
        Self {
            graph,
            store,
            remaining: AtomicUsize::new(graph.len()),
            mailboxes,
            aborted: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// Nodes not yet completed
    pub(crate) fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Indices of rolled-back transactions
    pub(crate) fn aborted_transactions(&self) -> Vec<usize> {
        self.aborted.lock().iter().copied().collect()
    }

    fn notify(&self, event: WorkerEvent) {
        // Coordinator only hangs up after the run is decided
        let _ = self.events.send(event);
    }
}

/// Reports a panicking worker to the coordinator
struct PanicGuard<'c, 'a> {
    worker: usize,
    ctx: &'c RunContext<'a>,
}

impl Drop for PanicGuard<'_, '_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.ctx.notify(WorkerEvent::Fatal(
                self.worker,
                SchedulerError::WorkerPanicked(self.worker),
            ));
        }
    }
}

/// One graph worker
pub(crate) struct Worker<'c, 'a> {
    id: usize,
    ctx: &'c RunContext<'a>,
    inbox: Receiver<NodeId>,
    stop: Receiver<()>,
    stack: Vec<NodeId>,
    stats: WorkerStats,
}

impl<'c, 'a> Worker<'c, 'a> {
    pub(crate) fn new(
        id: usize,
        ctx: &'c RunContext<'a>,
        inbox: Receiver<NodeId>,
        stop: Receiver<()>,
    ) -> Self {
        Self {
            id,
            ctx,
            inbox,
            stop,
            stack: Vec::new(),
            stats: WorkerStats {
                worker: id,
                ..Default::default()
            },
        }
    }

    /// Thread entry point
    pub(crate) fn run(mut self, root: NodeId) -> WorkerStats {
        let _guard = PanicGuard {
            worker: self.id,
            ctx: self.ctx,
        };
        let _span = debug_span!("worker", id = self.id).entered();
        trace!(%root, "worker started");
        if let Err(err) = self.drive(root) {
            warn!(error = %err, "worker failed");
            self.ctx.notify(WorkerEvent::Fatal(self.id, err));
        }
        trace!("worker stopped");
        self.stats
    }

    fn drive(&mut self, root: NodeId) -> SchedulerResult<()> {
        self.stack.push(root);
        loop {
            while let Some(id) = self.stack.pop() {
                if self.stopped() {
                    return Ok(());
                }
                self.walk(id)?;
            }
            match self.park() {
                Some(id) => self.walk(id)?,
                None => return Ok(()),
            }
        }
    }

    fn stopped(&self) -> bool {
        matches!(self.stop.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Wait for a hand-off or the stop broadcast
    fn park(&mut self) -> Option<NodeId> {
        let ctx = self.ctx;
        ctx.notify(WorkerEvent::Idle(self.id));
        let mailbox = &ctx.mailboxes[self.id];
        mailbox.waiting.store(true, Ordering::Release);

        select! {
            recv(self.inbox) -> msg => match msg {
                Ok(id) => {
                    self.stats.received += 1;
                    ctx.notify(WorkerEvent::Busy(self.id));
                    Some(id)
                }
                Err(_) => None,
            },
            recv(self.stop) -> _ => {
                mailbox.waiting.store(false, Ordering::Release);
                None
            }
        }
    }

    /// Follow the temporal chain from `start` while this worker claims it
    fn walk(&mut self, start: NodeId) -> SchedulerResult<()> {
        let mut current = Some(start);
        while let Some(id) = current {
            current = self.process(id)?;
        }
        Ok(())
    }

    /// Run or skip one node, then complete it
    fn process(&mut self, id: NodeId) -> SchedulerResult<Option<NodeId>> {
        let ctx = self.ctx;
        let node = ctx.graph.node(id);

        match node.try_start() {
            Ok(true) => {}
            Ok(false) => {
                self.stats.skipped += 1;
                ctx.graph.metrics.record_skipped();
                trace!(node = %id, name = node.name(), "skipping aborted node");
                return Ok(self.complete(id, true));
            }
            Err(status) => {
                return Err(SchedulerError::InvalidTransition { node: id, status });
            }
        }

        let op = node.operation();
        let started = Instant::now();
        let mut target = TargetView::new(ctx.store, node.timestamp(), node.target());
        let params = ParamView::new(ctx.store, node.required_versions(), op.parameters());

        match op.execute(&mut target, &params) {
            Ok(()) => {
                if op.kind() == OperationKind::Write && !target.is_written() {
                    return Err(SchedulerError::MissingTargetWrite {
                        operation: op.name().to_string(),
                        timestamp: node.timestamp(),
                        variable: node.target(),
                    });
                }
                if node.finish() {
                    self.stats.executed += 1;
                    ctx.graph.metrics.record_executed(started.elapsed());
                    debug!(
                        node = %id,
                        name = op.name(),
                        timestamp = node.timestamp(),
                        "node executed"
                    );
                    Ok(self.complete(id, false))
                } else {
                    // Aborted mid-flight: the write may have landed after the revert
                    ctx.store.revert(node.timestamp());
                    self.stats.skipped += 1;
                    ctx.graph.metrics.record_skipped();
                    debug!(node = %id, name = op.name(), "write discarded by abort");
                    Ok(self.complete(id, true))
                }
            }
            Err(OperationError::Rejected(reason)) => {
                debug!(
                    node = %id,
                    name = op.name(),
                    timestamp = node.timestamp(),
                    %reason,
                    "operation rejected"
                );
                self.cascade(id);
                self.stats.skipped += 1;
                ctx.graph.metrics.record_skipped();
                Ok(self.complete(id, true))
            }
            Err(OperationError::Storage(err)) => Err(err.into()),
        }
    }

    /// Release everything waiting on `id`; returns the claimed temporal successor
    fn complete(&mut self, id: NodeId, skipped: bool) -> Option<NodeId> {
        let graph = self.ctx.graph;
        let node = graph.node(id);

        if skipped {
            // Wait out any cascade still marking this node's readers
            drop(self.ctx.aborted.lock());
        }

        for &dependent in node.param_dependents() {
            self.release(dependent);
        }

        let mut next = None;
        if let Some(successor) = node.temporal_next() {
            let successor_node = graph.node(successor);
            if successor_node.release() {
                successor_node.claim();
                next = Some(successor);
            }
        }

        self.ctx.remaining.fetch_sub(1, Ordering::AcqRel);
        next
    }

    fn release(&mut self, id: NodeId) {
        let graph = self.ctx.graph;
        let node = graph.node(id);
        let notify = graph.config.mode == ExecutionMode::DfsNotify;

        if node.release() {
            node.claim();
            if notify {
                if let Some(worker) = node.notify_slot() {
                    if worker != self.id && self.ctx.mailboxes[worker].offer(id) {
                        self.stats.handed_off += 1;
                        graph.metrics.record_handoff();
                        trace!(from = self.id, to = worker, node = %id, "node handed off");
                        return;
                    }
                }
            }
            self.stack.push(id);
        } else if notify && self.stack.len() < graph.config.notify_threshold {
            node.register_interest(self.id);
        }
    }

    /// Roll back the transaction of `failed` and everything that read its writes
    fn cascade(&mut self, failed: NodeId) {
        let ctx = self.ctx;
        let graph = ctx.graph;
        let mut aborted = ctx.aborted.lock();
        let mut queue = VecDeque::new();

        self.abort_transaction(graph.node(failed).transaction(), &mut aborted, &mut queue);

        while let Some(id) = queue.pop_front() {
            let node = graph.node(id);
            for &dependent in node.param_dependents() {
                let txn = graph.node(dependent).transaction();
                self.abort_transaction(txn, &mut aborted, &mut queue);
            }

            if node.operation().kind() != OperationKind::Write {
                continue;
            }
            let (variable, version) = (node.target(), node.timestamp());
            let mut cursor = node.temporal_next();
            while let Some(next) = cursor {
                let successor = graph.node(next);
                if successor.reads_version(variable, version) {
                    self.abort_transaction(successor.transaction(), &mut aborted, &mut queue);
                }
                if successor.operation().kind() == OperationKind::Write {
                    break;
                }
                cursor = successor.temporal_next();
            }
        }
    }

    fn abort_transaction(
        &mut self,
        txn: usize,
        aborted: &mut HashSet<usize>,
        queue: &mut VecDeque<NodeId>,
    ) {
        if !aborted.insert(txn) {
            return;
        }
        let graph = self.ctx.graph;
        let nodes = graph.transaction_nodes(txn);
        let mut marked: u64 = 0;
        for &id in &nodes {
            if graph.node(id).abort() != NodeStatus::Aborted {
                marked += 1;
                queue.push_back(id);
            }
        }
        let timestamp = graph.transaction_timestamp(txn).unwrap_or_default();
        let moved = self.ctx.store.revert(timestamp);

        self.stats.aborts_started += 1;
        graph.metrics.record_aborted_txn();
        graph.metrics.record_aborted_nodes(marked);
        warn!(timestamp, nodes = marked, cursors = moved, "transaction aborted");
    }
}
