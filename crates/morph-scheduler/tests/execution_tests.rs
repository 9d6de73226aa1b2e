//! Execution integration tests for morph-scheduler
//!
//! Runs whole batches through both traversal modes and checks the final
//! committed state, the abort cascade and the run report.

mod common;

use common::{banker_batch, deposit, set_balance, transfer};
use morph_scheduler::{ExecutionMode, NodeStatus, Scheduler, SchedulerConfig, TaskGraph};
use morph_storage::VersionedStore;
use morph_types::{OperationError, ReadOp, Transaction, WriteOp};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MODES: [ExecutionMode; 2] = [ExecutionMode::Dfs, ExecutionMode::DfsNotify];

fn config(mode: ExecutionMode) -> SchedulerConfig {
    SchedulerConfig {
        notify_threshold: 2,
        ..SchedulerConfig::with_mode(mode)
    }
}

// ==================== Banker Tests ====================

#[test]
fn test_banker_both_modes() {
    for mode in MODES {
        for _ in 0..50 {
            let store = VersionedStore::new(2);
            let report = Scheduler::new(config(mode))
                .unwrap()
                .execute(&store, banker_batch())
                .unwrap();

            assert!(report.is_clean());
            assert_eq!(report.nodes, 5);
            assert_eq!(report.executed, 5);
            assert_eq!(store.dump(), vec![500, 0]);
        }
    }
}

#[test]
fn test_deposit_only() {
    let store = VersionedStore::new(2);
    let report = Scheduler::default()
        .execute(&store, vec![deposit(111, 0, 500)])
        .unwrap();
    assert_eq!(report.workers, 1);
    assert_eq!(store.dump(), vec![500, 0]);
}

#[test]
fn test_banker_versions_before_commit() {
    let store = VersionedStore::new(2);
    Scheduler::default().execute(&store, banker_batch()).unwrap();

    assert_eq!(store.versions(0).unwrap(), vec![0, 111, 222, 333]);
    assert_eq!(store.versions(1).unwrap(), vec![0, 222, 333]);
    assert_eq!(store.read(222, 1).unwrap(), 200);
    assert_eq!(store.read(222, 0).unwrap(), 300);
    assert_eq!(store.latest_version(0).unwrap(), 333);
}

// ==================== Abort Cascade Tests ====================

#[test]
fn test_insufficient_funds_cascades() {
    for mode in MODES {
        let store = VersionedStore::new(2);
        let txns = vec![
            set_balance(111, 0, 100),
            transfer(222, 0, 1, 200),
            transfer(333, 1, 0, 200),
            set_balance(444, 1, 50),
        ];
        let scheduler = Scheduler::new(config(mode)).unwrap();
        let report = scheduler.execute(&store, txns).unwrap();

        // 333 read what 222 wrote; the blind write at 444 did not
        assert_eq!(report.aborted_transactions, vec![222, 333]);
        assert_eq!(report.executed, 2);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.aborted, 4);
        assert_eq!(store.dump(), vec![100, 50]);

        let snap = scheduler.snapshot();
        assert_eq!(snap.txns_aborted, 2);
        assert_eq!(snap.nodes_aborted, 4);
    }
}

#[test]
fn test_abort_does_not_touch_earlier_writes() {
    let store = VersionedStore::with_values(vec![10, 0]);
    let txns = vec![deposit(1, 0, 5), transfer(2, 0, 1, 1_000)];
    let report = Scheduler::default().execute(&store, txns).unwrap();

    assert_eq!(report.aborted_transactions, vec![2]);
    assert_eq!(store.dump(), vec![15, 0]);
}

#[test]
fn test_partial_execution_rolled_back() {
    for mode in MODES {
        let store = VersionedStore::with_values(vec![1, 2, 3]);
        let slow = WriteOp::new("slow write", 0, vec![], |t, _| {
            std::thread::sleep(Duration::from_millis(50));
            t.set(99)?;
            Ok(())
        });
        let reject = WriteOp::new("reject", 1, vec![], |_, _| {
            Err(OperationError::rejected("declined"))
        });
        let txns = vec![
            Transaction::new(10).with(slow).with(reject),
            set_balance(20, 2, 7),
        ];
        let report = Scheduler::new(config(mode))
            .unwrap()
            .execute(&store, txns)
            .unwrap();

        assert_eq!(report.aborted_transactions, vec![10]);
        assert_eq!(report.executed, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(store.versions(0).unwrap(), vec![0]);
        assert_eq!(store.dump(), vec![1, 2, 7]);
    }
}

#[test]
fn test_aborted_nodes_keep_status() {
    let store = VersionedStore::new(2);
    let txns = vec![set_balance(1, 0, 10), transfer(2, 0, 1, 20)];
    let graph = TaskGraph::build(&store, txns, SchedulerConfig::default()).unwrap();
    graph.run(&store).unwrap();

    let statuses: Vec<NodeStatus> = graph.nodes().iter().map(|n| n.status()).collect();
    assert_eq!(
        statuses,
        vec![NodeStatus::Executed, NodeStatus::Aborted, NodeStatus::Aborted]
    );
}

// ==================== Ordering Tests ====================

fn mix(a: i64, b: i64, ts: u64) -> i64 {
    (a * 31 + b + ts as i64) % 1_000_003
}

#[test]
fn test_results_match_serial_order() {
    const VARS: usize = 4;
    const TXNS: u64 = 200;

    let mut expected = vec![0i64; VARS];
    for ts in 1..=TXNS {
        let (t, p) = ((ts as usize) % VARS, (ts as usize + 1) % VARS);
        expected[t] = mix(expected[t], expected[p], ts);
    }

    for mode in MODES {
        let store = VersionedStore::new(VARS);
        let txns = (1..=TXNS)
            .rev()
            .map(|ts| {
                let (t, p) = ((ts as usize) % VARS, (ts as usize + 1) % VARS);
                Transaction::new(ts).with(WriteOp::new("mix", t, vec![t, p], move |v, params| {
                    v.set(mix(params.get(0)?, params.get(1)?, ts))?;
                    Ok(())
                }))
            })
            .collect();
        Scheduler::new(config(mode))
            .unwrap()
            .execute(&store, txns)
            .unwrap();
        assert_eq!(store.dump(), expected);
    }
}

#[test]
fn test_no_double_execution() {
    const NODES: usize = 300;

    for mode in MODES {
        let counts: Arc<Vec<AtomicUsize>> =
            Arc::new((0..NODES).map(|_| AtomicUsize::new(0)).collect());
        let store = VersionedStore::new(8);
        let txns = (0..NODES)
            .map(|i| {
                let counts = Arc::clone(&counts);
                let target = i % 8;
                let param = (i * 7 + 3) % 8;
                Transaction::new(i as u64 + 1).with(WriteOp::new(
                    "count",
                    target,
                    vec![param],
                    move |t, p| {
                        counts[i].fetch_add(1, Ordering::SeqCst);
                        t.set(p.get(0)? + 1)?;
                        Ok(())
                    },
                ))
            })
            .collect();

        let report = Scheduler::new(config(mode))
            .unwrap()
            .execute(&store, txns)
            .unwrap();

        assert_eq!(report.executed, NODES);
        assert!(counts.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }
}

#[test]
fn test_large_batch_terminates_in_notify_mode() {
    const ACCOUNTS: usize = 32;

    let store = VersionedStore::with_values(vec![1_000_000; ACCOUNTS]);
    let txns = (0..5_000u64)
        .map(|i| {
            let from = (i as usize * 13) % ACCOUNTS;
            let to = (from + 1 + i as usize % (ACCOUNTS - 1)) % ACCOUNTS;
            transfer(i + 1, from, to, 1)
        })
        .collect();
    let config = SchedulerConfig {
        notify_threshold: 1,
        ..SchedulerConfig::with_mode(ExecutionMode::DfsNotify)
    };
    let report = Scheduler::new(config).unwrap().execute(&store, txns).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.executed, 10_000);
    assert_eq!(
        report.worker_stats.iter().map(|w| w.received).sum::<usize>(),
        report.handoffs
    );
    assert_eq!(store.dump().iter().sum::<i64>(), 1_000_000 * ACCOUNTS as i64);
}

#[test]
fn test_idle_worker_reactivated_by_handoff() {
    for _ in 0..5 {
        let store = VersionedStore::new(3);
        let slow = WriteOp::new("slow", 1, vec![], |t, _| {
            std::thread::sleep(Duration::from_millis(100));
            t.set(2)?;
            Ok(())
        });
        let join = WriteOp::new("join", 2, vec![0, 1], |t, p| {
            t.set(p.get(0)? + p.get(1)?)?;
            Ok(())
        });
        let txns = vec![
            set_balance(1, 0, 1),
            Transaction::new(2).with(slow),
            Transaction::new(3).with(join),
        ];
        let config = SchedulerConfig::with_mode(ExecutionMode::DfsNotify);
        let report = Scheduler::new(config).unwrap().execute(&store, txns).unwrap();

        // The fast root's worker parks with interest in the join node
        assert_eq!(report.workers, 2);
        assert!(report.handoffs >= 1);
        assert_eq!(
            report.worker_stats.iter().map(|w| w.received).sum::<usize>(),
            report.handoffs
        );
        assert_eq!(
            report.worker_stats.iter().map(|w| w.handed_off).sum::<usize>(),
            report.handoffs
        );
        assert_eq!(report.executed, 3);
        assert_eq!(store.dump(), vec![1, 2, 3]);
    }
}

// ==================== Operation Kind Tests ====================

#[test]
fn test_read_sees_preceding_write() {
    let seen = Arc::new(AtomicI64::new(-1));
    let sink = Arc::clone(&seen);

    let store = VersionedStore::new(1);
    let txns = vec![
        set_balance(3, 0, 9),
        Transaction::new(2).with(ReadOp::new("observe", 0, move |p| {
            sink.store(p.get(0)?, Ordering::SeqCst);
            Ok(())
        })),
        set_balance(1, 0, 5),
    ];
    let report = Scheduler::default().execute(&store, txns).unwrap();

    assert_eq!(report.executed, 3);
    assert_eq!(seen.load(Ordering::SeqCst), 5);
    assert_eq!(store.dump(), vec![9]);
}

#[test]
fn test_rejected_read_aborts_its_transaction() {
    let store = VersionedStore::new(2);
    let txns = vec![Transaction::new(5)
        .with(WriteOp::new("write", 1, vec![], |t, _| {
            t.set(4)?;
            Ok(())
        }))
        .with(ReadOp::new("guard", 0, |p| {
            if p.get(0)? == 0 {
                return Err(OperationError::rejected("empty"));
            }
            Ok(())
        }))];
    let report = Scheduler::default().execute(&store, txns).unwrap();

    assert_eq!(report.aborted_transactions, vec![5]);
    assert_eq!(store.dump(), vec![0, 0]);
}
