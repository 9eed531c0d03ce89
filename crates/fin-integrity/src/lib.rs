//! fin-integrity
//!
//! Referential Integrity Validator.
//!
//! Architectural decisions:
//! - Schema checks are driven entirely by the fin-schemas descriptor table;
//!   there is one generic validator, no per-entity validation functions.
//! - Checking is pure logic over an [`AccountSnapshot`]; only the
//!   [`AutoFixer`] touches a store, and its writes go through the same local
//!   mutation path as user edits (fresh timestamp, pending upload).
//! - Issues never block sync. Non-fixable ones are surfaced as warnings.
//! - Deterministic output: issues are always sorted the same way.

mod checker;
mod fixer;
mod types;
mod validator;

pub use checker::check_referential_integrity;
pub use fixer::{AutoFixer, FixReport, FALLBACK_CATEGORY_NAME, FALLBACK_WALLET_NAME};
pub use types::*;
pub use validator::validate_collection;
