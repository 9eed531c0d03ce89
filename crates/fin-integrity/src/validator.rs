//! Generic descriptor-driven schema validation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use fin_schemas::{descriptors, Constraint, EntityKind, FieldDescriptor, FieldKind, Record};

use crate::{ItemError, ValidationReport};

/// Check every non-tombstoned record of a collection against the entity's
/// descriptor table: required-field presence, value-type match, domain
/// constraints. Purely local; nothing here ever reaches the remote.
pub fn validate_collection(kind: EntityKind, records: &[Record]) -> ValidationReport {
    let descs = descriptors(kind);
    let mut per_item_errors = Vec::new();
    let mut total = 0usize;
    let mut invalid = 0usize;

    for record in records.iter().filter(|r| !r.is_tombstoned()) {
        total += 1;
        let before = per_item_errors.len();
        validate_record(record, descs, &mut per_item_errors);
        if per_item_errors.len() > before {
            invalid += 1;
        }
    }

    ValidationReport {
        entity_kind: kind,
        total,
        valid_count: total - invalid,
        invalid_count: invalid,
        per_item_errors,
    }
}

fn validate_record(record: &Record, descs: &[FieldDescriptor], errors: &mut Vec<ItemError>) {
    // Payload reflection: the serialized form is exactly what the descriptor
    // table describes.
    let value = match serde_json::to_value(&record.payload) {
        Ok(v) => v,
        Err(e) => {
            errors.push(ItemError {
                entity_id: record.id.clone(),
                field: String::new(),
                message: format!("payload not serializable: {e}"),
            });
            return;
        }
    };

    let mut push = |field: &str, message: String| {
        errors.push(ItemError {
            entity_id: record.id.clone(),
            field: field.to_string(),
            message,
        });
    };

    for desc in descs {
        let field = match value.get(desc.name) {
            Some(v) if !v.is_null() => v,
            _ => {
                if desc.required {
                    push(desc.name, "required field missing".to_string());
                }
                continue;
            }
        };

        if let Err(msg) = check_kind(field, desc.kind) {
            push(desc.name, msg);
            continue;
        }
        if let Err(msg) = check_constraint(field, desc.constraint) {
            push(desc.name, msg);
        }
    }
}

fn check_kind(value: &Value, kind: FieldKind) -> Result<(), String> {
    match kind {
        FieldKind::Text | FieldKind::Reference(_) => match value.as_str() {
            Some(_) => Ok(()),
            None => Err(format!("expected string, got {}", type_name(value))),
        },
        FieldKind::Bool => match value.as_bool() {
            Some(_) => Ok(()),
            None => Err(format!("expected bool, got {}", type_name(value))),
        },
        FieldKind::Decimal => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("expected decimal string, got {}", type_name(value)))?;
            Decimal::from_str(s)
                .map(|_| ())
                .map_err(|_| format!("'{s}' is not a decimal"))
        }
        FieldKind::Date => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("expected timestamp string, got {}", type_name(value)))?;
            s.parse::<DateTime<Utc>>()
                .map(|_| ())
                .map_err(|_| format!("'{s}' is not a valid timestamp"))
        }
        FieldKind::TagSet => match value.as_array() {
            Some(items) if items.iter().all(Value::is_string) => Ok(()),
            Some(_) => Err("tag set contains non-string entries".to_string()),
            None => Err(format!("expected array, got {}", type_name(value))),
        },
        FieldKind::OneOf(allowed) => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("expected enum string, got {}", type_name(value)))?;
            if allowed.contains(&s) {
                Ok(())
            } else {
                Err(format!("'{s}' not in {allowed:?}"))
            }
        }
    }
}

fn check_constraint(value: &Value, constraint: Constraint) -> Result<(), String> {
    match constraint {
        Constraint::None => Ok(()),
        Constraint::Positive => {
            // Kind check already guaranteed a parseable decimal string.
            let s = value.as_str().unwrap_or_default();
            let d = Decimal::from_str(s).unwrap_or_default();
            if d > Decimal::ZERO {
                Ok(())
            } else {
                Err(format!("must be > 0, got {s}"))
            }
        }
        Constraint::NonEmpty { max_len } => {
            let s = value.as_str().unwrap_or_default();
            if s.trim().is_empty() {
                Err("must not be empty".to_string())
            } else if s.chars().count() > max_len {
                Err(format!("longer than {max_len} characters"))
            } else {
                Ok(())
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fin_schemas::{Money, Payload, Transaction, Wallet, WalletKind};

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_000, 0).unwrap()
    }

    fn good_wallet() -> Record {
        Record::with_id(
            "w-1",
            Payload::Wallet(Wallet {
                name: "Cash".to_string(),
                kind: WalletKind::Cash,
                balance: Money::from_major(100),
            }),
            t0(),
        )
    }

    fn tx(amount: &str) -> Record {
        Record::with_id(
            "tx-1",
            Payload::Transaction(Transaction {
                amount: amount.parse().unwrap(),
                category_id: "cat-1".to_string(),
                wallet_id: "w-1".to_string(),
                is_income: false,
                tags: Default::default(),
                date: t0(),
                notes: String::new(),
                photo: None,
                overdraft_override: false,
            }),
            t0(),
        )
    }

    #[test]
    fn valid_wallet_passes() {
        let report = validate_collection(EntityKind::Wallet, &[good_wallet()]);
        assert!(report.is_clean());
        assert_eq!(report.valid_count, 1);
    }

    #[test]
    fn empty_wallet_name_rejected() {
        let mut w = good_wallet();
        w.as_wallet_mut().unwrap().name = "  ".to_string();
        let report = validate_collection(EntityKind::Wallet, &[w]);
        assert_eq!(report.invalid_count, 1);
        assert_eq!(report.per_item_errors[0].field, "name");
    }

    #[test]
    fn over_long_name_rejected() {
        let mut w = good_wallet();
        w.as_wallet_mut().unwrap().name = "x".repeat(65);
        let report = validate_collection(EntityKind::Wallet, &[w]);
        assert_eq!(report.invalid_count, 1);
    }

    #[test]
    fn non_positive_amount_rejected() {
        let report = validate_collection(EntityKind::Transaction, &[tx("0")]);
        assert_eq!(report.invalid_count, 1);
        assert_eq!(report.per_item_errors[0].field, "amount");
    }

    #[test]
    fn positive_amount_passes() {
        let report = validate_collection(EntityKind::Transaction, &[tx("30000")]);
        assert!(report.is_clean());
    }

    #[test]
    fn tombstoned_records_skipped() {
        let mut w = good_wallet();
        w.as_wallet_mut().unwrap().name = String::new();
        w.tombstone(t0());
        let report = validate_collection(EntityKind::Wallet, &[w]);
        assert_eq!(report.total, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn mixed_collection_counts_each_record_once() {
        let mut bad = good_wallet();
        bad.id = "w-2".to_string();
        bad.as_wallet_mut().unwrap().name = String::new();
        let report = validate_collection(EntityKind::Wallet, &[good_wallet(), bad]);
        assert_eq!(report.total, 2);
        assert_eq!(report.valid_count, 1);
        assert_eq!(report.invalid_count, 1);
    }
}
