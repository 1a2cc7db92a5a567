//! Error types for ForgeChain

use thiserror::Error;

/// Every failure the state-transition core can report.
///
/// The variants follow the chain's validation taxonomy: `NotValid` is permanent,
/// `NotCurrentlyValid` may succeed against a later chain state, `BlockOutOfOrder` asks the
/// caller to fetch a missing ancestor, and `IllegalState` is a caller-side sequencing bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Not valid: {0}")]
    NotValid(String),
    #[error("Not currently valid: {0}")]
    NotCurrentlyValid(String),
    #[error("Block out of order: {0}")]
    BlockOutOfOrder(String),
    #[error("Illegal state: {0}")]
    IllegalState(String),
    #[error("No transaction variant for type {type_}, subtype {subtype}")]
    UnknownVariant { type_: u8, subtype: u8 },
    #[error("{name} (type {type_}, subtype {subtype}) is no longer supported")]
    RetiredVariant {
        type_: u8,
        subtype: u8,
        name: &'static str,
    },
    #[error("Double spend detected: {0}")]
    DoubleSpend(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl ChainError {
    /// True for failures that no future chain state can fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ChainError::NotValid(_)
                | ChainError::UnknownVariant { .. }
                | ChainError::RetiredVariant { .. }
                | ChainError::CryptoError(_)
                | ChainError::Serialization(_)
        )
    }

    /// True for failures where the same unit of work may be retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChainError::NotCurrentlyValid(_) | ChainError::BlockOutOfOrder(_)
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<hex::FromHexError> for ChainError {
    fn from(err: hex::FromHexError) -> Self {
        ChainError::NotValid(format!("Invalid hex string: {}", err))
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
