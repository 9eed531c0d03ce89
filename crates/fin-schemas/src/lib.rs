//! fin-schemas
//!
//! Shared data model for the replication core: the record envelope, the seven
//! entity payloads, the [`Money`] decimal type, and the static field
//! descriptor table consulted by the generic validator.
//!
//! Pure data. No IO, no time reads, no randomness beyond id generation.

mod entity;
mod money;
mod registry;

pub use entity::*;
pub use money::Money;
pub use registry::{descriptors, Constraint, FieldDescriptor, FieldKind};
