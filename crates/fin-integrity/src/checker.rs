//! Cross-entity reference checks and duplicate-id detection.

use std::collections::BTreeSet;

use fin_schemas::{EntityKind, Payload};

use crate::{AccountSnapshot, IntegrityReport, IntegritySummary, Issue, IssueKind, Severity};

/// Scan every active record of every entity type and report dangling
/// cross-references and duplicated identifiers.
///
/// Deterministic: the same snapshot always yields the same issues in the
/// same order.
pub fn check_referential_integrity(snapshot: &AccountSnapshot) -> IntegrityReport {
    let mut issues: Vec<Issue> = Vec::new();

    let categories = snapshot.active_ids(EntityKind::Category);
    let tags = snapshot.active_ids(EntityKind::Tag);
    let wallets = snapshot.active_ids(EntityKind::Wallet);

    for kind in EntityKind::DEPENDENCY_ORDER {
        detect_duplicate_ids(snapshot, kind, &mut issues);
    }

    for record in snapshot.active(EntityKind::Transaction) {
        if let Payload::Transaction(tx) = &record.payload {
            if !categories.contains(tx.category_id.as_str()) {
                issues.push(Issue::new(
                    IssueKind::OrphanedExpenseCategory,
                    EntityKind::Transaction,
                    &record.id,
                    Some(tx.category_id.clone()),
                ));
            }
            if !wallets.contains(tx.wallet_id.as_str()) {
                issues.push(Issue::new(
                    IssueKind::OrphanedExpenseWallet,
                    EntityKind::Transaction,
                    &record.id,
                    Some(tx.wallet_id.clone()),
                ));
            }
            for tag in &tx.tags {
                if !tags.contains(tag.as_str()) {
                    issues.push(Issue::new(
                        IssueKind::OrphanedExpenseTag,
                        EntityKind::Transaction,
                        &record.id,
                        Some(tag.clone()),
                    ));
                }
            }
        }
    }

    for record in snapshot.active(EntityKind::Transfer) {
        if let Payload::Transfer(tr) = &record.payload {
            if tr.from_wallet_id == tr.to_wallet_id {
                issues.push(Issue::new(
                    IssueKind::TransferSameWallet,
                    EntityKind::Transfer,
                    &record.id,
                    Some(tr.from_wallet_id.clone()),
                ));
            }
            for wallet_id in [&tr.from_wallet_id, &tr.to_wallet_id] {
                if !wallets.contains(wallet_id.as_str()) {
                    issues.push(Issue::new(
                        IssueKind::OrphanedTransferWallet,
                        EntityKind::Transfer,
                        &record.id,
                        Some(wallet_id.clone()),
                    ));
                }
            }
        }
    }

    for record in snapshot.active(EntityKind::Budget) {
        if let Payload::Budget(b) = &record.payload {
            if !categories.contains(b.category_id.as_str()) {
                issues.push(Issue::new(
                    IssueKind::OrphanedBudgetCategory,
                    EntityKind::Budget,
                    &record.id,
                    Some(b.category_id.clone()),
                ));
            }
        }
    }

    for record in snapshot.active(EntityKind::Recurring) {
        if let Payload::Recurring(r) = &record.payload {
            if !categories.contains(r.category_id.as_str()) {
                issues.push(Issue::new(
                    IssueKind::OrphanedRecurringCategory,
                    EntityKind::Recurring,
                    &record.id,
                    Some(r.category_id.clone()),
                ));
            }
            if !wallets.contains(r.wallet_id.as_str()) {
                issues.push(Issue::new(
                    IssueKind::OrphanedRecurringWallet,
                    EntityKind::Recurring,
                    &record.id,
                    Some(r.wallet_id.clone()),
                ));
            }
        }
    }

    issues.sort();

    let summary = summarize(snapshot, &issues);
    IntegrityReport { issues, summary }
}

fn detect_duplicate_ids(snapshot: &AccountSnapshot, kind: EntityKind, issues: &mut Vec<Issue>) {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut reported: BTreeSet<&str> = BTreeSet::new();
    for record in snapshot.active(kind) {
        if !seen.insert(record.id.as_str()) && reported.insert(record.id.as_str()) {
            issues.push(Issue::new(
                IssueKind::DuplicateId,
                kind,
                &record.id,
                Some(record.id.clone()),
            ));
        }
    }
}

fn summarize(snapshot: &AccountSnapshot, issues: &[Issue]) -> IntegritySummary {
    let mut summary = IntegritySummary {
        scanned: snapshot.total_active(),
        issue_count: issues.len(),
        ..Default::default()
    };
    for issue in issues {
        match issue.severity {
            Severity::Critical => summary.critical += 1,
            Severity::High => summary.high += 1,
            Severity::Medium => summary.medium += 1,
        }
        if issue.auto_fixable {
            summary.auto_fixable += 1;
        }
    }
    summary
}
