use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Money;

/// The seven replicated entity types, in no particular order.
///
/// Reconciliation and import always walk kinds in [`EntityKind::DEPENDENCY_ORDER`]
/// so a referencing record never lands before its referents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    Tag,
    Wallet,
    Budget,
    Recurring,
    Transfer,
    Transaction,
}

impl EntityKind {
    /// Referents before referencers: a Transaction is reconciled only after
    /// the Category and Wallet it points at.
    pub const DEPENDENCY_ORDER: [EntityKind; 7] = [
        EntityKind::Category,
        EntityKind::Tag,
        EntityKind::Wallet,
        EntityKind::Budget,
        EntityKind::Recurring,
        EntityKind::Transfer,
        EntityKind::Transaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::Tag => "tag",
            EntityKind::Wallet => "wallet",
            EntityKind::Budget => "budget",
            EntityKind::Recurring => "recurring",
            EntityKind::Transfer => "transfer",
            EntityKind::Transaction => "transaction",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" => Some(EntityKind::Category),
            "tag" => Some(EntityKind::Tag),
            "wallet" => Some(EntityKind::Wallet),
            "budget" => Some(EntityKind::Budget),
            "recurring" => Some(EntityKind::Recurring),
            "transfer" => Some(EntityKind::Transfer),
            "transaction" => Some(EntityKind::Transaction),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local replication bookkeeping. Never consulted for conflict resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    #[default]
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    Cash,
    Bank,
    CreditCard,
    EWallet,
}

impl WalletKind {
    pub const ALL: &'static [&'static str] = &["cash", "bank", "credit_card", "e_wallet"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    pub const ALL: &'static [&'static str] = &["weekly", "monthly", "yearly"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const ALL: &'static [&'static str] = &["daily", "weekly", "monthly", "yearly"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub name: String,
    pub kind: WalletKind,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: Money,
    pub category_id: String,
    pub wallet_id: String,
    pub is_income: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub photo: Option<String>,
    /// Explicit, serialized marker that this expense was recorded past the
    /// balance check (manual data-entry recovery). Recalculation treats such
    /// records as accepted.
    #[serde(default)]
    pub overdraft_override: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from_wallet_id: String,
    pub to_wallet_id: String,
    pub amount: Money,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub category_id: String,
    pub amount: Money,
    pub period: BudgetPeriod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurring {
    pub name: String,
    pub amount: Money,
    pub category_id: String,
    pub wallet_id: String,
    pub frequency: Frequency,
    pub next_occurrence: DateTime<Utc>,
}

/// Entity payload, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Payload {
    Category(Category),
    Tag(Tag),
    Wallet(Wallet),
    Budget(Budget),
    Recurring(Recurring),
    Transfer(Transfer),
    Transaction(Transaction),
}

impl Payload {
    pub fn kind(&self) -> EntityKind {
        match self {
            Payload::Category(_) => EntityKind::Category,
            Payload::Tag(_) => EntityKind::Tag,
            Payload::Wallet(_) => EntityKind::Wallet,
            Payload::Budget(_) => EntityKind::Budget,
            Payload::Recurring(_) => EntityKind::Recurring,
            Payload::Transfer(_) => EntityKind::Transfer,
            Payload::Transaction(_) => EntityKind::Transaction,
        }
    }
}

/// Common envelope around every replicated entity.
///
/// `last_modified` is the single canonical modification timestamp: every
/// write path must refresh it via [`Record::touch`]. `deleted_at` is the
/// tombstone instant; records are never physically removed until the purge
/// sweep. `sync_status` is device-local bookkeeping only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Record {
    /// New record with a generated id, marked pending upload.
    pub fn new(payload: Payload, now: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), payload, now)
    }

    pub fn with_id(id: impl Into<String>, payload: Payload, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            last_modified: now,
            deleted_at: None,
            sync_status: SyncStatus::Pending,
            payload,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// The instant this version speaks for in conflict resolution: the
    /// tombstone time when tombstoned, otherwise the last modification.
    pub fn resolution_instant(&self) -> DateTime<Utc> {
        self.deleted_at.unwrap_or(self.last_modified)
    }

    /// The local mutation path: refresh the canonical timestamp and flag the
    /// record for upload. Every local edit (user, auto-fix, import) funnels
    /// through this.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_modified = now;
        self.sync_status = SyncStatus::Pending;
    }

    /// Tombstone this record at `now`. Also a local mutation.
    pub fn tombstone(&mut self, now: DateTime<Utc>) {
        self.deleted_at = Some(now);
        self.touch(now);
    }

    pub fn as_wallet(&self) -> Option<&Wallet> {
        match &self.payload {
            Payload::Wallet(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_wallet_mut(&mut self) -> Option<&mut Wallet> {
        match &mut self.payload {
            Payload::Wallet(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_transaction(&self) -> Option<&Transaction> {
        match &self.payload {
            Payload::Transaction(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_transaction_mut(&mut self) -> Option<&mut Transaction> {
        match &mut self.payload {
            Payload::Transaction(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_transfer(&self) -> Option<&Transfer> {
        match &self.payload {
            Payload::Transfer(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&Category> {
        match &self.payload {
            Payload::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Tag> {
        match &self.payload {
            Payload::Tag(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_budget(&self) -> Option<&Budget> {
        match &self.payload {
            Payload::Budget(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_recurring(&self) -> Option<&Recurring> {
        match &self.payload {
            Payload::Recurring(r) => Some(r),
            _ => None,
        }
    }
}
