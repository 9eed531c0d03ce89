use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use fin_schemas::{EntityKind, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

/// What went wrong, named by the reference that failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    OrphanedExpenseCategory,
    OrphanedExpenseWallet,
    OrphanedExpenseTag,
    OrphanedTransferWallet,
    TransferSameWallet,
    OrphanedBudgetCategory,
    OrphanedRecurringCategory,
    OrphanedRecurringWallet,
    DuplicateId,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::DuplicateId => Severity::Critical,
            IssueKind::OrphanedTransferWallet
            | IssueKind::TransferSameWallet
            | IssueKind::OrphanedExpenseWallet
            | IssueKind::OrphanedRecurringWallet => Severity::High,
            IssueKind::OrphanedExpenseCategory
            | IssueKind::OrphanedExpenseTag
            | IssueKind::OrphanedBudgetCategory
            | IssueKind::OrphanedRecurringCategory => Severity::Medium,
        }
    }

    /// Whether the fixer has a safe repair. Duplicate ids never are; neither
    /// are transfer wallet problems, since rerouting a value movement to a
    /// fallback wallet would corrupt two balances.
    pub fn auto_fixable(&self) -> bool {
        match self {
            IssueKind::OrphanedExpenseCategory
            | IssueKind::OrphanedExpenseWallet
            | IssueKind::OrphanedExpenseTag
            | IssueKind::OrphanedBudgetCategory
            | IssueKind::OrphanedRecurringCategory
            | IssueKind::OrphanedRecurringWallet => true,
            IssueKind::DuplicateId
            | IssueKind::OrphanedTransferWallet
            | IssueKind::TransferSameWallet => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::OrphanedExpenseCategory => "orphaned_expense_category",
            IssueKind::OrphanedExpenseWallet => "orphaned_expense_wallet",
            IssueKind::OrphanedExpenseTag => "orphaned_expense_tag",
            IssueKind::OrphanedTransferWallet => "orphaned_transfer_wallet",
            IssueKind::TransferSameWallet => "transfer_same_wallet",
            IssueKind::OrphanedBudgetCategory => "orphaned_budget_category",
            IssueKind::OrphanedRecurringCategory => "orphaned_recurring_category",
            IssueKind::OrphanedRecurringWallet => "orphaned_recurring_wallet",
            IssueKind::DuplicateId => "duplicate_id",
        }
    }
}

/// One referential-integrity finding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Issue {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub kind: IssueKind,
    /// The id that failed to resolve (dangling category/wallet/tag id, or
    /// the duplicated id itself).
    pub reference: Option<String>,
    pub severity: Severity,
    pub auto_fixable: bool,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        reference: Option<String>,
    ) -> Self {
        Self {
            entity_kind,
            entity_id: entity_id.into(),
            kind,
            reference,
            severity: kind.severity(),
            auto_fixable: kind.auto_fixable(),
        }
    }
}

/// Cross-entity check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub issues: Vec<Issue>,
    pub summary: IntegritySummary,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegritySummary {
    pub scanned: usize,
    pub issue_count: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub auto_fixable: usize,
}

/// Schema-level error on one record's field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub entity_id: String,
    pub field: String,
    pub message: String,
}

/// Per-collection schema check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub entity_kind: EntityKind,
    pub total: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub per_item_errors: Vec<ItemError>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_count == 0
    }
}

/// All of one account's collections, captured for a checking pass.
#[derive(Debug, Default, Clone)]
pub struct AccountSnapshot {
    collections: BTreeMap<EntityKind, Vec<Record>>,
}

impl AccountSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: EntityKind, records: Vec<Record>) {
        self.collections.insert(kind, records);
    }

    pub fn records(&self, kind: EntityKind) -> &[Record] {
        self.collections.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-tombstoned records of a kind.
    pub fn active(&self, kind: EntityKind) -> impl Iterator<Item = &Record> {
        self.records(kind).iter().filter(|r| !r.is_tombstoned())
    }

    /// Ids of non-tombstoned records of a kind.
    pub fn active_ids(&self, kind: EntityKind) -> BTreeSet<&str> {
        self.active(kind).map(|r| r.id.as_str()).collect()
    }

    pub fn total_active(&self) -> usize {
        EntityKind::DEPENDENCY_ORDER
            .iter()
            .map(|k| self.active(*k).count())
            .sum()
    }

    /// Capture every collection of `account_id` from the local store.
    pub async fn load(
        local: &dyn fin_store::LocalStore,
        account_id: &str,
    ) -> Result<Self, fin_store::StoreError> {
        let mut snapshot = Self::new();
        for kind in EntityKind::DEPENDENCY_ORDER {
            snapshot.insert(kind, local.get_all(kind, account_id).await?);
        }
        Ok(snapshot)
    }
}
