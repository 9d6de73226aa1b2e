//! Shared fixtures: a tiny bank built from write operations

#![allow(dead_code)]

use morph_storage::VarIdx;
use morph_types::{OperationError, Timestamp, Transaction, WriteOp};

fn credit(balance: i64, amount: i64) -> Result<i64, OperationError> {
    balance
        .checked_add(amount)
        .ok_or_else(|| OperationError::rejected("balance overflow"))
}

/// Blind write of `value` to `account`
pub fn set_balance(timestamp: Timestamp, account: VarIdx, value: i64) -> Transaction {
    Transaction::new(timestamp).with(WriteOp::new(
        format!("set {account}"),
        account,
        vec![],
        move |t, _| {
            t.set(value)?;
            Ok(())
        },
    ))
}

/// Credit `amount` to `account`
pub fn deposit(timestamp: Timestamp, account: VarIdx, amount: i64) -> Transaction {
    Transaction::new(timestamp).with(WriteOp::new(
        format!("deposit {account}"),
        account,
        vec![account],
        move |t, p| {
            t.set(credit(p.get(0)?, amount)?)?;
            Ok(())
        },
    ))
}

/// Move `amount` from `from` to `to`, rejecting on insufficient balance
pub fn transfer(timestamp: Timestamp, from: VarIdx, to: VarIdx, amount: i64) -> Transaction {
    let receive = WriteOp::new(
        format!("{to} receive from {from}"),
        to,
        vec![from, to],
        move |t, p| {
            if p.get(0)? < amount {
                return Err(OperationError::rejected("insufficient balance"));
            }
            t.set(credit(p.get(1)?, amount)?)?;
            Ok(())
        },
    );
    let send = WriteOp::new(
        format!("{from} send to {to}"),
        from,
        vec![from],
        move |t, p| {
            let balance = p.get(0)?;
            if balance < amount {
                return Err(OperationError::rejected("insufficient balance"));
            }
            t.set(balance - amount)?;
            Ok(())
        },
    );
    Transaction::new(timestamp).with(receive).with(send)
}

/// Deposit A, transfer A->B, transfer B->A; ends at A=500, B=0
pub fn banker_batch() -> Vec<Transaction> {
    vec![
        transfer(333, 1, 0, 200),
        deposit(111, 0, 500),
        transfer(222, 0, 1, 200),
    ]
}
