//! Entity Schema Registry.
//!
//! One static descriptor table per entity kind, consulted by the generic
//! validator in fin-integrity. Adding a field to a payload struct means
//! adding a descriptor here; there are no per-entity validation functions.

use crate::entity::{BudgetPeriod, EntityKind, Frequency, WalletKind};

/// Expected value shape of a payload field, as seen in its JSON form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form string.
    Text,
    /// Decimal string (Money serialization).
    Decimal,
    Bool,
    /// RFC 3339 timestamp string.
    Date,
    /// Id of another entity; resolution is checked by the cross-reference
    /// pass, not the schema pass.
    Reference(EntityKind),
    /// Set of tag ids.
    TagSet,
    /// Enum membership over the listed snake_case values.
    OneOf(&'static [&'static str]),
}

/// Domain constraint applied after the type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    None,
    /// Decimal must be strictly greater than zero.
    Positive,
    /// Non-empty after trimming, at most `max_len` characters.
    NonEmpty { max_len: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub constraint: Constraint,
}

const fn field(
    name: &'static str,
    kind: FieldKind,
    required: bool,
    constraint: Constraint,
) -> FieldDescriptor {
    FieldDescriptor {
        name,
        kind,
        required,
        constraint,
    }
}

const NAME_MAX: usize = 64;

static CATEGORY: &[FieldDescriptor] = &[
    field(
        "name",
        FieldKind::Text,
        true,
        Constraint::NonEmpty { max_len: NAME_MAX },
    ),
    field("color", FieldKind::Text, false, Constraint::None),
];

static TAG: &[FieldDescriptor] = &[
    field(
        "name",
        FieldKind::Text,
        true,
        Constraint::NonEmpty { max_len: NAME_MAX },
    ),
    field("color", FieldKind::Text, false, Constraint::None),
];

static WALLET: &[FieldDescriptor] = &[
    field(
        "name",
        FieldKind::Text,
        true,
        Constraint::NonEmpty { max_len: NAME_MAX },
    ),
    field("kind", FieldKind::OneOf(WalletKind::ALL), true, Constraint::None),
    field("balance", FieldKind::Decimal, true, Constraint::None),
];

static BUDGET: &[FieldDescriptor] = &[
    field(
        "category_id",
        FieldKind::Reference(EntityKind::Category),
        true,
        Constraint::None,
    ),
    field("amount", FieldKind::Decimal, true, Constraint::Positive),
    field(
        "period",
        FieldKind::OneOf(BudgetPeriod::ALL),
        true,
        Constraint::None,
    ),
];

static RECURRING: &[FieldDescriptor] = &[
    field(
        "name",
        FieldKind::Text,
        true,
        Constraint::NonEmpty { max_len: NAME_MAX },
    ),
    field("amount", FieldKind::Decimal, true, Constraint::Positive),
    field(
        "category_id",
        FieldKind::Reference(EntityKind::Category),
        true,
        Constraint::None,
    ),
    field(
        "wallet_id",
        FieldKind::Reference(EntityKind::Wallet),
        true,
        Constraint::None,
    ),
    field(
        "frequency",
        FieldKind::OneOf(Frequency::ALL),
        true,
        Constraint::None,
    ),
    field("next_occurrence", FieldKind::Date, true, Constraint::None),
];

static TRANSFER: &[FieldDescriptor] = &[
    field(
        "from_wallet_id",
        FieldKind::Reference(EntityKind::Wallet),
        true,
        Constraint::None,
    ),
    field(
        "to_wallet_id",
        FieldKind::Reference(EntityKind::Wallet),
        true,
        Constraint::None,
    ),
    field("amount", FieldKind::Decimal, true, Constraint::Positive),
    field("date", FieldKind::Date, true, Constraint::None),
    field("notes", FieldKind::Text, false, Constraint::None),
    field("photo", FieldKind::Text, false, Constraint::None),
];

static TRANSACTION: &[FieldDescriptor] = &[
    field("amount", FieldKind::Decimal, true, Constraint::Positive),
    field(
        "category_id",
        FieldKind::Reference(EntityKind::Category),
        true,
        Constraint::None,
    ),
    field(
        "wallet_id",
        FieldKind::Reference(EntityKind::Wallet),
        true,
        Constraint::None,
    ),
    field("is_income", FieldKind::Bool, true, Constraint::None),
    field("tags", FieldKind::TagSet, false, Constraint::None),
    field("date", FieldKind::Date, true, Constraint::None),
    field("notes", FieldKind::Text, false, Constraint::None),
    field("photo", FieldKind::Text, false, Constraint::None),
    field("overdraft_override", FieldKind::Bool, false, Constraint::None),
];

/// Descriptor table for one entity kind.
pub fn descriptors(kind: EntityKind) -> &'static [FieldDescriptor] {
    match kind {
        EntityKind::Category => CATEGORY,
        EntityKind::Tag => TAG,
        EntityKind::Wallet => WALLET,
        EntityKind::Budget => BUDGET,
        EntityKind::Recurring => RECURRING,
        EntityKind::Transfer => TRANSFER,
        EntityKind::Transaction => TRANSACTION,
    }
}
