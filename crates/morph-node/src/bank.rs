//! Banker workload
//!
//! Accounts are store variables holding balances. A transfer is two writes
//! in one transaction: the receiver is credited first, then the sender is
//! debited. Both check the sender's balance, so an overdraft rejects the
//! whole transaction.

use crate::config::BankConfig;
use crate::error::{NodeError, NodeResult};
use morph_storage::{Value, VarIdx, VersionedStore};
use morph_types::{OperationError, Timestamp, Transaction, WriteOp};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Rejection reason for overdrafts
pub const INSUFFICIENT_BALANCE: &str = "insufficient balance";

/// Rejection reason for a credit past `Value::MAX`
pub const BALANCE_OVERFLOW: &str = "balance overflow";

fn credit(balance: Value, amount: Value) -> Result<Value, OperationError> {
    balance
        .checked_add(amount)
        .ok_or_else(|| OperationError::rejected(BALANCE_OVERFLOW))
}

/// One bank transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    /// Credit `amount` to `account`
    Deposit {
        /// Transaction timestamp
        timestamp: Timestamp,
        /// Account credited
        account: VarIdx,
        /// Amount
        amount: Value,
    },
    /// Move `amount` from `from` to `to`
    Transfer {
        /// Transaction timestamp
        timestamp: Timestamp,
        /// Account debited
        from: VarIdx,
        /// Account credited
        to: VarIdx,
        /// Amount
        amount: Value,
    },
}

impl Instruction {
    /// Transaction timestamp
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Deposit { timestamp, .. } | Self::Transfer { timestamp, .. } => *timestamp,
        }
    }

    /// Highest account index referenced
    pub fn max_account(&self) -> VarIdx {
        match self {
            Self::Deposit { account, .. } => *account,
            Self::Transfer { from, to, .. } => (*from).max(*to),
        }
    }

    /// Build the transaction
    pub fn to_transaction(&self) -> Transaction {
        match *self {
            Self::Deposit {
                timestamp,
                account,
                amount,
            } => deposit(timestamp, account, amount),
            Self::Transfer {
                timestamp,
                from,
                to,
                amount,
            } => transfer(timestamp, from, to, amount),
        }
    }
}

/// Credit `amount` to `account`
pub fn deposit(timestamp: Timestamp, account: VarIdx, amount: Value) -> Transaction {
    Transaction::new(timestamp).with(WriteOp::new(
        format!("deposit {amount} into {account}"),
        account,
        vec![account],
        move |target, params| {
            target.set(credit(params.get(0)?, amount)?)?;
            Ok(())
        },
    ))
}

/// Move `amount` from `from` to `to`
pub fn transfer(timestamp: Timestamp, from: VarIdx, to: VarIdx, amount: Value) -> Transaction {
    let receive = WriteOp::new(
        format!("{to} receive {amount} from {from}"),
        to,
        vec![from, to],
        move |target, params| {
            if params.get(0)? < amount {
                return Err(OperationError::rejected(INSUFFICIENT_BALANCE));
            }
            target.set(credit(params.get(1)?, amount)?)?;
            Ok(())
        },
    );
    let send = WriteOp::new(
        format!("{from} send {amount} to {to}"),
        from,
        vec![from],
        move |target, params| {
            let balance = params.get(0)?;
            if balance < amount {
                return Err(OperationError::rejected(INSUFFICIENT_BALANCE));
            }
            let rest = balance
                .checked_sub(amount)
                .ok_or_else(|| OperationError::rejected(BALANCE_OVERFLOW))?;
            target.set(rest)?;
            Ok(())
        },
    );
    Transaction::new(timestamp).with(receive).with(send)
}

/// Batch file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFile {
    /// Opening balances; missing accounts start at zero
    #[serde(default)]
    pub balances: Vec<Value>,
    /// Transactions, in any order
    pub instructions: Vec<Instruction>,
}

impl BatchFile {
    /// Load a batch from a JSON file
    pub fn load(path: &Path) -> NodeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// A store together with the transactions to run against it
pub struct Workload {
    /// Store holding the opening balances
    pub store: VersionedStore,
    /// Transactions to execute
    pub transactions: Vec<Transaction>,
}

impl Workload {
    /// Size the store to fit every referenced account
    pub fn new(mut balances: Vec<Value>, instructions: &[Instruction]) -> NodeResult<Self> {
        if instructions.iter().any(|ix| matches!(ix, Instruction::Transfer { from, to, .. } if from == to)) {
            return Err(NodeError::InvalidInput(
                "transfer source and destination must differ".into(),
            ));
        }
        if instructions.iter().any(|ix| match ix {
            Instruction::Deposit { amount, .. } | Instruction::Transfer { amount, .. } => *amount < 0,
        }) {
            return Err(NodeError::InvalidInput("amounts must be non-negative".into()));
        }

        let schema = instructions
            .iter()
            .map(|ix| ix.max_account() + 1)
            .max()
            .unwrap_or(0)
            .max(balances.len());
        balances.resize(schema, 0);

        let first = instructions.iter().map(Instruction::timestamp).min();
        let last = instructions.iter().map(Instruction::timestamp).max();
        debug!(instructions = instructions.len(), schema, ?first, ?last, "workload built");

        Ok(Self {
            store: VersionedStore::with_values(balances),
            transactions: instructions.iter().map(Instruction::to_transaction).collect(),
        })
    }

    /// Load a workload from a batch file
    pub fn from_file(path: &Path) -> NodeResult<Self> {
        let batch = BatchFile::load(path)?;
        Self::new(batch.balances, &batch.instructions)
    }
}

/// Deposit 500 into A at 111, transfer 200 A->B at 222 and back at 333
///
/// Submitted in shuffled order; the final state is A=500, B=0.
pub fn banker_demo<R: Rng>(rng: &mut R) -> Vec<Instruction> {
    const A: VarIdx = 0;
    const B: VarIdx = 1;
    let mut instructions = vec![
        Instruction::Deposit {
            timestamp: 111,
            account: A,
            amount: 500,
        },
        Instruction::Transfer {
            timestamp: 222,
            from: A,
            to: B,
            amount: 200,
        },
        Instruction::Transfer {
            timestamp: 333,
            from: B,
            to: A,
            amount: 200,
        },
    ];
    instructions.shuffle(rng);
    instructions
}

/// Seeded batch of `txns` deposits and transfers over `config.accounts`
pub fn random_batch(txns: usize, config: &BankConfig, seed: u64) -> NodeResult<Vec<Instruction>> {
    if config.accounts < 2 {
        return Err(NodeError::InvalidInput(
            "random workload needs at least two accounts".into(),
        ));
    }
    if config.max_amount < 1 {
        return Err(NodeError::InvalidInput("max_amount must be positive".into()));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut instructions: Vec<Instruction> = (0..txns)
        .map(|i| {
            let timestamp = i as Timestamp + 1;
            let amount = rng.gen_range(1..=config.max_amount);
            let from = rng.gen_range(0..config.accounts);
            if rng.gen_bool(0.2) {
                Instruction::Deposit {
                    timestamp,
                    account: from,
                    amount,
                }
            } else {
                let to = (from + rng.gen_range(1..config.accounts)) % config.accounts;
                Instruction::Transfer {
                    timestamp,
                    from,
                    to,
                    amount,
                }
            }
        })
        .collect();
    instructions.shuffle(&mut rng);
    Ok(instructions)
}
