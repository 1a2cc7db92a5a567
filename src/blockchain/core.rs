// core.rs splits block handling into submodules: the block itself, retargeting, forging rights,
// block-level validation, acceptance, and the chain state the transaction variants act on.
pub mod chain;
pub mod difficulty;
pub mod generation;
pub mod processor;
pub mod state;
pub mod validation;

pub use chain::*;
pub use generation::*;
pub use processor::*;
pub use state::*;
pub use validation::*;
