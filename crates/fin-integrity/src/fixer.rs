//! Auto-repair for fixable integrity issues.
//!
//! Repairs reroute dangling category/wallet references to a well-known
//! fallback entity, creating it on first use; dangling tag references are
//! dropped from the set rather than fabricating a tag. Every write goes
//! through the record's local mutation path so the repair gets a fresh
//! `last_modified` and is picked up by the next sync.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use fin_schemas::{Category, EntityKind, Money, Payload, Record, Wallet, WalletKind};
use fin_store::{LocalStore, StoreError};

use crate::{Issue, IssueKind};

pub const FALLBACK_CATEGORY_NAME: &str = "Other";
pub const FALLBACK_WALLET_NAME: &str = "Cash";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixReport {
    pub fixed: usize,
    pub skipped: usize,
    /// Ids of fallback entities created during this pass.
    pub created_fallbacks: Vec<String>,
}

pub struct AutoFixer<'a> {
    local: &'a dyn LocalStore,
    account_id: &'a str,
}

impl<'a> AutoFixer<'a> {
    pub fn new(local: &'a dyn LocalStore, account_id: &'a str) -> Self {
        Self { local, account_id }
    }

    /// Apply every auto-fixable issue; non-fixable ones are counted as
    /// skipped and logged as warnings for the user.
    pub async fn apply(
        &self,
        issues: &[Issue],
        now: DateTime<Utc>,
    ) -> Result<FixReport, StoreError> {
        let mut report = FixReport::default();
        // Lazily created, then reused for every issue in the pass.
        let mut fallback_category: Option<String> = None;
        let mut fallback_wallet: Option<String> = None;

        for issue in issues {
            if !issue.auto_fixable {
                warn!(
                    kind = issue.kind.as_str(),
                    entity = %issue.entity_kind,
                    id = %issue.entity_id,
                    "integrity issue requires manual attention"
                );
                report.skipped += 1;
                continue;
            }

            let Some(mut record) = self
                .local
                .get_by_id(issue.entity_kind, &issue.entity_id, self.account_id)
                .await?
            else {
                // Fixed or removed since the check ran.
                report.skipped += 1;
                continue;
            };

            let repaired = match issue.kind {
                IssueKind::OrphanedExpenseCategory
                | IssueKind::OrphanedBudgetCategory
                | IssueKind::OrphanedRecurringCategory => {
                    let fallback = self
                        .ensure_fallback_category(&mut fallback_category, &mut report, now)
                        .await?;
                    reassign_category(&mut record, &fallback)
                }
                IssueKind::OrphanedExpenseWallet | IssueKind::OrphanedRecurringWallet => {
                    let fallback = self
                        .ensure_fallback_wallet(&mut fallback_wallet, &mut report, now)
                        .await?;
                    reassign_wallet(&mut record, &fallback)
                }
                IssueKind::OrphanedExpenseTag => match (&mut record.payload, &issue.reference) {
                    (Payload::Transaction(tx), Some(tag)) => tx.tags.remove(tag),
                    _ => false,
                },
                _ => false,
            };

            if repaired {
                record.touch(now);
                self.local.update(record, self.account_id).await?;
                info!(
                    kind = issue.kind.as_str(),
                    entity = %issue.entity_kind,
                    id = %issue.entity_id,
                    "auto-fixed integrity issue"
                );
                report.fixed += 1;
            } else {
                report.skipped += 1;
            }
        }

        Ok(report)
    }

    async fn ensure_fallback_category(
        &self,
        cached: &mut Option<String>,
        report: &mut FixReport,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        if let Some(id) = cached {
            return Ok(id.clone());
        }
        let existing = self
            .local
            .get_all(EntityKind::Category, self.account_id)
            .await?
            .into_iter()
            .find(|r| {
                !r.is_tombstoned()
                    && r.as_category().is_some_and(|c| c.name == FALLBACK_CATEGORY_NAME)
            });
        let id = match existing {
            Some(r) => r.id,
            None => {
                let record = Record::new(
                    Payload::Category(Category {
                        name: FALLBACK_CATEGORY_NAME.to_string(),
                        color: None,
                    }),
                    now,
                );
                let id = record.id.clone();
                self.local.add(record, self.account_id).await?;
                report.created_fallbacks.push(id.clone());
                id
            }
        };
        *cached = Some(id.clone());
        Ok(id)
    }

    async fn ensure_fallback_wallet(
        &self,
        cached: &mut Option<String>,
        report: &mut FixReport,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        if let Some(id) = cached {
            return Ok(id.clone());
        }
        let existing = self
            .local
            .get_all(EntityKind::Wallet, self.account_id)
            .await?
            .into_iter()
            .find(|r| {
                !r.is_tombstoned()
                    && r.as_wallet().is_some_and(|w| w.name == FALLBACK_WALLET_NAME)
            });
        let id = match existing {
            Some(r) => r.id,
            None => {
                let record = Record::new(
                    Payload::Wallet(Wallet {
                        name: FALLBACK_WALLET_NAME.to_string(),
                        kind: WalletKind::Cash,
                        balance: Money::ZERO,
                    }),
                    now,
                );
                let id = record.id.clone();
                self.local.add(record, self.account_id).await?;
                report.created_fallbacks.push(id.clone());
                id
            }
        };
        *cached = Some(id.clone());
        Ok(id)
    }
}

fn reassign_category(record: &mut Record, fallback_id: &str) -> bool {
    match &mut record.payload {
        Payload::Transaction(tx) => {
            tx.category_id = fallback_id.to_string();
            true
        }
        Payload::Budget(b) => {
            b.category_id = fallback_id.to_string();
            true
        }
        Payload::Recurring(r) => {
            r.category_id = fallback_id.to_string();
            true
        }
        _ => false,
    }
}

fn reassign_wallet(record: &mut Record, fallback_id: &str) -> bool {
    match &mut record.payload {
        Payload::Transaction(tx) => {
            tx.wallet_id = fallback_id.to_string();
            true
        }
        Payload::Recurring(r) => {
            r.wallet_id = fallback_id.to_string();
            true
        }
        _ => false,
    }
}
