// Thin re-export module: implementation is in `blockchain/core.rs` so block identity,
// retargeting, acceptance and chain state can evolve as separate submodules.

pub mod core;
pub use core::*;
