//! fin-testkit
//!
//! In-memory store fakes used ONLY by tests. Both fakes support fault
//! injection: a scripted number of failing writes (surfaced as transient
//! store errors) and, for the remote, a reachability toggle. Operation
//! counters let tests assert exactly how many writes a sync cycle performed.

mod local;
mod remote;

pub use local::MemoryLocalStore;
pub use remote::MemoryRemoteStore;

use chrono::{DateTime, TimeZone, Utc};
use fin_schemas::{
    Budget, BudgetPeriod, Category, Money, Payload, Record, Tag, Transaction, Transfer, Wallet,
    WalletKind,
};

/// Deterministic timestamp helper for scenario tests.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn wallet_record(id: &str, name: &str, balance: i64, at: DateTime<Utc>) -> Record {
    Record::with_id(
        id,
        Payload::Wallet(Wallet {
            name: name.to_string(),
            kind: WalletKind::Cash,
            balance: Money::from_major(balance),
        }),
        at,
    )
}

pub fn category_record(id: &str, name: &str, at: DateTime<Utc>) -> Record {
    Record::with_id(
        id,
        Payload::Category(Category {
            name: name.to_string(),
            color: None,
        }),
        at,
    )
}

pub fn tag_record(id: &str, name: &str, at: DateTime<Utc>) -> Record {
    Record::with_id(
        id,
        Payload::Tag(Tag {
            name: name.to_string(),
            color: None,
        }),
        at,
    )
}

pub fn budget_record(id: &str, category_id: &str, amount: i64, at: DateTime<Utc>) -> Record {
    Record::with_id(
        id,
        Payload::Budget(Budget {
            category_id: category_id.to_string(),
            amount: Money::from_major(amount),
            period: BudgetPeriod::Monthly,
        }),
        at,
    )
}

pub fn expense_record(
    id: &str,
    wallet_id: &str,
    category_id: &str,
    amount: i64,
    at: DateTime<Utc>,
) -> Record {
    Record::with_id(
        id,
        Payload::Transaction(Transaction {
            amount: Money::from_major(amount),
            category_id: category_id.to_string(),
            wallet_id: wallet_id.to_string(),
            is_income: false,
            tags: Default::default(),
            date: at,
            notes: String::new(),
            photo: None,
            overdraft_override: false,
        }),
        at,
    )
}

pub fn income_record(
    id: &str,
    wallet_id: &str,
    category_id: &str,
    amount: i64,
    at: DateTime<Utc>,
) -> Record {
    let mut r = expense_record(id, wallet_id, category_id, amount, at);
    if let Payload::Transaction(tx) = &mut r.payload {
        tx.is_income = true;
    }
    r
}

pub fn transfer_record(
    id: &str,
    from_wallet_id: &str,
    to_wallet_id: &str,
    amount: i64,
    at: DateTime<Utc>,
) -> Record {
    Record::with_id(
        id,
        Payload::Transfer(Transfer {
            from_wallet_id: from_wallet_id.to_string(),
            to_wallet_id: to_wallet_id.to_string(),
            amount: Money::from_major(amount),
            date: at,
            notes: String::new(),
            photo: None,
        }),
        at,
    )
}
