//! Task precedence graph construction
//!
//! Transactions are sorted by timestamp and decomposed into one node per
//! operation. While walking them in order we keep, per variable, the last
//! node touching it (temporal chain) and the last write to it (parameter
//! dependencies).

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::metrics::SchedulerMetrics;
use crate::node::{GraphNode, NodeId};
use morph_storage::{VarIdx, VersionedStore, BASE_VERSION};
use morph_types::{OperationKind, Timestamp, Transaction};
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::debug;

/// Dependency graph of one transaction batch
pub struct TaskGraph {
    pub(crate) nodes: Vec<GraphNode>,
    partitions: Vec<Vec<NodeId>>,
    roots: Vec<NodeId>,
    txn_tails: Vec<NodeId>,
    txn_timestamps: Vec<Timestamp>,
    pub(crate) config: SchedulerConfig,
    pub(crate) metrics: Arc<SchedulerMetrics>,
    pub(crate) executed: AtomicBool,
}

impl TaskGraph {
    /// Build the graph of `transactions` over the schema of `store`
    ///
    /// The store is only consulted for its schema size.
    pub fn build(
        store: &VersionedStore,
        mut transactions: Vec<Transaction>,
        config: SchedulerConfig,
    ) -> SchedulerResult<Self> {
        config.validate()?;
        let schema = store.len();
        validate(&transactions, schema)?;

        // Timestamps are distinct, so the order is total.
        transactions.sort_by_key(Transaction::timestamp);

        let total = transactions.iter().map(Transaction::len).sum();
        let mut nodes: Vec<GraphNode> = Vec::with_capacity(total);
        let mut partitions: Vec<Vec<NodeId>> = vec![Vec::new(); schema];
        let mut last_node: Vec<Option<NodeId>> = vec![None; schema];
        let mut last_write: Vec<Option<NodeId>> = vec![None; schema];
        let mut txn_tails = Vec::with_capacity(transactions.len());
        let mut txn_timestamps = Vec::with_capacity(transactions.len());

        for (txn_idx, txn) in transactions.into_iter().enumerate() {
            let timestamp = txn.timestamp();
            let mut last_in_txn: Option<NodeId> = None;

            for op in txn.into_operations() {
                let id = NodeId::new(nodes.len());
                let target = op.target();
                let kind = op.kind();
                let params = op.parameters().to_vec();
                let mut node = GraphNode::new(op, txn_idx, timestamp, last_in_txn);
                let mut pending = 0;

                let version_of = |slot: Option<NodeId>, nodes: &[GraphNode]| {
                    slot.map(|w| nodes[w.index()].timestamp)
                        .unwrap_or(BASE_VERSION)
                };

                match kind {
                    OperationKind::Write => {
                        let mut linked: Vec<VarIdx> = Vec::new();
                        for (i, &p) in params.iter().enumerate() {
                            if p == target {
                                node.required_versions[i] = version_of(last_write[target], &nodes);
                                continue;
                            }
                            // Never written in this batch: read committed state.
                            let Some(writer) = last_write[p] else {
                                continue;
                            };
                            node.required_versions[i] = nodes[writer.index()].timestamp;
                            if !linked.contains(&p) {
                                linked.push(p);
                                nodes[writer.index()].param_dependents.push(id);
                                pending += 1;
                            }
                        }
                        last_write[target] = Some(id);
                    }
                    OperationKind::Read => {
                        node.required_versions[0] = version_of(last_write[target], &nodes);
                    }
                    OperationKind::CompareAndSet => {
                        return Err(SchedulerError::UnsupportedOperation {
                            operation: node.name().to_string(),
                            kind,
                        });
                    }
                }

                if let Some(prev) = last_node[target] {
                    nodes[prev.index()].temporal_next = Some(id);
                    pending += 1;
                }
                last_node[target] = Some(id);

                node.seal(pending);
                partitions[target].push(id);
                nodes.push(node);
                last_in_txn = Some(id);
            }

            if let Some(tail) = last_in_txn {
                txn_tails.push(tail);
                txn_timestamps.push(timestamp);
            }
        }

        let roots: Vec<NodeId> = partitions
            .iter()
            .filter_map(|p| p.first().copied())
            .filter(|id| nodes[id.index()].pending() == 0)
            .collect();

        debug!(
            nodes = nodes.len(),
            transactions = txn_tails.len(),
            roots = roots.len(),
            "task graph built"
        );

        Ok(Self {
            nodes,
            partitions,
            roots,
            txn_tails,
            txn_timestamps,
            config,
            metrics: Arc::new(SchedulerMetrics::new()),
            executed: AtomicBool::new(false),
        })
    }

    /// Share `metrics` with this graph's workers
    pub fn with_metrics(mut self, metrics: Arc<SchedulerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Metrics recorded by this graph's workers
    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    /// Configuration the graph runs with
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of variables the graph was built over
    pub fn schema(&self) -> usize {
        self.partitions.len()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by ID
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.index()]
    }

    /// All nodes in construction order
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Worker entry points, one per root partition
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Nodes targeting `variable`, in temporal order
    pub fn partition(&self, variable: VarIdx) -> &[NodeId] {
        self.partitions
            .get(variable)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of transactions
    pub fn transaction_count(&self) -> usize {
        self.txn_tails.len()
    }

    /// Timestamp of transaction `txn`
    pub fn transaction_timestamp(&self, txn: usize) -> Option<Timestamp> {
        self.txn_timestamps.get(txn).copied()
    }

    /// Nodes of transaction `txn` in declared order, via the local chain
    pub fn transaction_nodes(&self, txn: usize) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = self.txn_tails.get(txn).copied();
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.node(id).local_prev;
        }
        chain.reverse();
        chain
    }

    /// Number of parameter-dependency edges
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.param_dependents.len()).sum()
    }
}

fn validate(transactions: &[Transaction], schema: usize) -> SchedulerResult<()> {
    let mut seen: HashSet<Timestamp> = HashSet::with_capacity(transactions.len());
    for txn in transactions {
        let timestamp = txn.timestamp();
        if timestamp == BASE_VERSION {
            return Err(SchedulerError::ReservedTimestamp);
        }
        if !seen.insert(timestamp) {
            return Err(SchedulerError::DuplicateTimestamp(timestamp));
        }
        if txn.is_empty() {
            return Err(SchedulerError::EmptyTransaction(timestamp));
        }
        for op in txn.operations() {
            if op.kind() == OperationKind::CompareAndSet {
                return Err(SchedulerError::UnsupportedOperation {
                    operation: op.name().to_string(),
                    kind: op.kind(),
                });
            }
            let out_of_range = std::iter::once(op.target())
                .chain(op.parameters().iter().copied())
                .find(|&v| v >= schema);
            if let Some(variable) = out_of_range {
                return Err(SchedulerError::UnknownVariable {
                    operation: op.name().to_string(),
                    variable,
                    schema,
                });
            }
        }
    }
    Ok(())
}
