//! Canonical ↔ remote shape translation.
//!
//! The remote store keeps its own field naming (camelCase envelope, a
//! `type: income|expense` discriminator instead of a boolean, `wallet` /
//! `category` / `photoUrl` reference names). Translation happens here, at
//! the sync boundary, and nowhere else; the pair of functions is lossless
//! and mutually inverse for every valid record.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use fin_schemas::{
    Budget, BudgetPeriod, Category, EntityKind, Frequency, Money, Payload, Record, Recurring,
    SyncStatus, Tag, Transaction, Transfer, Wallet, WalletKind,
};

use crate::SyncError;

/// Serialize a canonical record into the remote document shape.
pub fn to_remote_shape(record: &Record) -> Value {
    let mut doc = Map::new();
    doc.insert("id".into(), json!(record.id));
    doc.insert(
        "lastModified".into(),
        json!(record.last_modified.to_rfc3339()),
    );
    doc.insert(
        "deletedAt".into(),
        match record.deleted_at {
            Some(at) => json!(at.to_rfc3339()),
            None => Value::Null,
        },
    );

    match &record.payload {
        Payload::Category(c) => {
            doc.insert("name".into(), json!(c.name));
            doc.insert("color".into(), json!(c.color));
        }
        Payload::Tag(t) => {
            doc.insert("name".into(), json!(t.name));
            doc.insert("color".into(), json!(t.color));
        }
        Payload::Wallet(w) => {
            doc.insert("name".into(), json!(w.name));
            doc.insert("walletType".into(), json!(wallet_kind_str(w.kind)));
            doc.insert("balance".into(), json!(w.balance.to_string()));
        }
        Payload::Budget(b) => {
            doc.insert("category".into(), json!(b.category_id));
            doc.insert("amount".into(), json!(b.amount.to_string()));
            doc.insert("period".into(), json!(period_str(b.period)));
        }
        Payload::Recurring(r) => {
            doc.insert("name".into(), json!(r.name));
            doc.insert("amount".into(), json!(r.amount.to_string()));
            doc.insert("category".into(), json!(r.category_id));
            doc.insert("wallet".into(), json!(r.wallet_id));
            doc.insert("frequency".into(), json!(frequency_str(r.frequency)));
            doc.insert(
                "nextOccurrence".into(),
                json!(r.next_occurrence.to_rfc3339()),
            );
        }
        Payload::Transfer(t) => {
            doc.insert("fromWallet".into(), json!(t.from_wallet_id));
            doc.insert("toWallet".into(), json!(t.to_wallet_id));
            doc.insert("amount".into(), json!(t.amount.to_string()));
            doc.insert("transferDate".into(), json!(t.date.to_rfc3339()));
            doc.insert("notes".into(), json!(t.notes));
            doc.insert("photoUrl".into(), json!(t.photo));
        }
        Payload::Transaction(t) => {
            doc.insert("amount".into(), json!(t.amount.to_string()));
            doc.insert("category".into(), json!(t.category_id));
            doc.insert("wallet".into(), json!(t.wallet_id));
            doc.insert(
                "type".into(),
                json!(if t.is_income { "income" } else { "expense" }),
            );
            doc.insert("tags".into(), json!(t.tags));
            doc.insert("transactionDate".into(), json!(t.date.to_rfc3339()));
            doc.insert("notes".into(), json!(t.notes));
            doc.insert("photoUrl".into(), json!(t.photo));
            doc.insert("overdraftOverride".into(), json!(t.overdraft_override));
        }
    }

    Value::Object(doc)
}

/// Parse a remote document back into a canonical record.
///
/// The result carries `SyncStatus::Synced`: it mirrors the remote, nothing
/// is pending upload.
pub fn from_remote_shape(kind: EntityKind, doc: &Value) -> Result<Record, SyncError> {
    let id = required_str(kind, doc, "id")?.to_string();
    let last_modified = date_field(kind, doc, "lastModified")?;
    let deleted_at = match doc.get("deletedAt") {
        None | Some(Value::Null) => None,
        Some(_) => Some(date_field(kind, doc, "deletedAt")?),
    };

    let payload = match kind {
        EntityKind::Category => Payload::Category(Category {
            name: required_str(kind, doc, "name")?.to_string(),
            color: optional_str(doc, "color"),
        }),
        EntityKind::Tag => Payload::Tag(Tag {
            name: required_str(kind, doc, "name")?.to_string(),
            color: optional_str(doc, "color"),
        }),
        EntityKind::Wallet => Payload::Wallet(Wallet {
            name: required_str(kind, doc, "name")?.to_string(),
            kind: parse_wallet_kind(required_str(kind, doc, "walletType")?)
                .ok_or_else(|| malformed(kind, "walletType", "unknown wallet type"))?,
            balance: money_field(kind, doc, "balance")?,
        }),
        EntityKind::Budget => Payload::Budget(Budget {
            category_id: required_str(kind, doc, "category")?.to_string(),
            amount: money_field(kind, doc, "amount")?,
            period: parse_period(required_str(kind, doc, "period")?)
                .ok_or_else(|| malformed(kind, "period", "unknown period"))?,
        }),
        EntityKind::Recurring => Payload::Recurring(Recurring {
            name: required_str(kind, doc, "name")?.to_string(),
            amount: money_field(kind, doc, "amount")?,
            category_id: required_str(kind, doc, "category")?.to_string(),
            wallet_id: required_str(kind, doc, "wallet")?.to_string(),
            frequency: parse_frequency(required_str(kind, doc, "frequency")?)
                .ok_or_else(|| malformed(kind, "frequency", "unknown frequency"))?,
            next_occurrence: date_field(kind, doc, "nextOccurrence")?,
        }),
        EntityKind::Transfer => Payload::Transfer(Transfer {
            from_wallet_id: required_str(kind, doc, "fromWallet")?.to_string(),
            to_wallet_id: required_str(kind, doc, "toWallet")?.to_string(),
            amount: money_field(kind, doc, "amount")?,
            date: date_field(kind, doc, "transferDate")?,
            notes: optional_str(doc, "notes").unwrap_or_default(),
            photo: optional_str(doc, "photoUrl"),
        }),
        EntityKind::Transaction => Payload::Transaction(Transaction {
            amount: money_field(kind, doc, "amount")?,
            category_id: required_str(kind, doc, "category")?.to_string(),
            wallet_id: required_str(kind, doc, "wallet")?.to_string(),
            is_income: match required_str(kind, doc, "type")? {
                "income" => true,
                "expense" => false,
                other => {
                    return Err(malformed(
                        kind,
                        "type",
                        &format!("expected income|expense, got '{other}'"),
                    ))
                }
            },
            tags: doc
                .get("tags")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            date: date_field(kind, doc, "transactionDate")?,
            notes: optional_str(doc, "notes").unwrap_or_default(),
            photo: optional_str(doc, "photoUrl"),
            overdraft_override: doc
                .get("overdraftOverride")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
    };

    Ok(Record {
        id,
        last_modified,
        deleted_at,
        sync_status: SyncStatus::Synced,
        payload,
    })
}

fn malformed(kind: EntityKind, field: &str, detail: &str) -> SyncError {
    SyncError::MalformedRemote {
        kind,
        detail: format!("{field}: {detail}"),
    }
}

fn required_str<'a>(kind: EntityKind, doc: &'a Value, field: &str) -> Result<&'a str, SyncError> {
    doc.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(kind, field, "missing or not a string"))
}

fn optional_str(doc: &Value, field: &str) -> Option<String> {
    doc.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn money_field(kind: EntityKind, doc: &Value, field: &str) -> Result<Money, SyncError> {
    required_str(kind, doc, field)?
        .parse::<Money>()
        .map_err(|e| malformed(kind, field, &e.to_string()))
}

fn date_field(kind: EntityKind, doc: &Value, field: &str) -> Result<DateTime<Utc>, SyncError> {
    let raw = required_str(kind, doc, field)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| malformed(kind, field, &e.to_string()))
}

fn wallet_kind_str(kind: WalletKind) -> &'static str {
    match kind {
        WalletKind::Cash => "cash",
        WalletKind::Bank => "bank",
        WalletKind::CreditCard => "credit_card",
        WalletKind::EWallet => "e_wallet",
    }
}

fn parse_wallet_kind(s: &str) -> Option<WalletKind> {
    match s {
        "cash" => Some(WalletKind::Cash),
        "bank" => Some(WalletKind::Bank),
        "credit_card" => Some(WalletKind::CreditCard),
        "e_wallet" => Some(WalletKind::EWallet),
        _ => None,
    }
}

fn period_str(period: BudgetPeriod) -> &'static str {
    match period {
        BudgetPeriod::Weekly => "weekly",
        BudgetPeriod::Monthly => "monthly",
        BudgetPeriod::Yearly => "yearly",
    }
}

fn parse_period(s: &str) -> Option<BudgetPeriod> {
    match s {
        "weekly" => Some(BudgetPeriod::Weekly),
        "monthly" => Some(BudgetPeriod::Monthly),
        "yearly" => Some(BudgetPeriod::Yearly),
        _ => None,
    }
}

fn frequency_str(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Daily => "daily",
        Frequency::Weekly => "weekly",
        Frequency::Monthly => "monthly",
        Frequency::Yearly => "yearly",
    }
}

fn parse_frequency(s: &str) -> Option<Frequency> {
    match s {
        "daily" => Some(Frequency::Daily),
        "weekly" => Some(Frequency::Weekly),
        "monthly" => Some(Frequency::Monthly),
        "yearly" => Some(Frequency::Yearly),
        _ => None,
    }
}
