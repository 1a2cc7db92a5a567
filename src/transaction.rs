//! Transaction module split into the variant registry, payloads, the envelope and its lifecycle

pub mod attachment;
pub mod duplicates;
pub mod kind;
pub mod lifecycle;
pub mod types;
pub mod validation;

pub use attachment::Attachment;
pub use duplicates::DuplicateTracker;
pub use kind::TransactionKind;
pub use types::*;
pub use validation::ValidationContext;
