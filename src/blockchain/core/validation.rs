/// Block-level checks: header/payload consistency and the transactions a block carries
use super::chain::{Block, BLOCK_VERSION, MAX_NUMBER_OF_TRANSACTIONS, MAX_PAYLOAD_LENGTH};
use super::state::ChainState;
use crate::config::ProtocolParams;
use crate::error::ChainError;
use crate::transaction::{DuplicateTracker, ValidationContext};
use std::collections::HashSet;

/// Seconds a transaction timestamp may run ahead of its block.
pub const MAX_TIMEDRIFT: i32 = 15;

/// Header fields that summarize the payload must agree with the transactions carried.
pub fn validate_payload(block: &Block) -> Result<(), ChainError> {
    if block.version() != BLOCK_VERSION {
        return Err(ChainError::NotValid(format!(
            "Unsupported block version {}",
            block.version()
        )));
    }
    if block.transactions().len() > MAX_NUMBER_OF_TRANSACTIONS {
        return Err(ChainError::NotValid(format!(
            "Block carries {} transactions (max: {})",
            block.transactions().len(),
            MAX_NUMBER_OF_TRANSACTIONS
        )));
    }
    if block.payload_length() < 0 || block.payload_length() as usize > MAX_PAYLOAD_LENGTH {
        return Err(ChainError::NotValid(format!(
            "Invalid payload length {}",
            block.payload_length()
        )));
    }
    if !block.payload_matches()? {
        return Err(ChainError::NotValid(
            "Payload hash, length or totals don't match the transactions".to_string(),
        ));
    }
    Ok(())
}

/// Validates every transaction of a linked block at the block's height and timestamp.
///
/// Duplicate detection is done in one pass: block-level keys first, then the general ones.
pub fn validate_block_transactions(
    block: &Block,
    state: &dyn ChainState,
    params: &ProtocolParams,
) -> Result<(), ChainError> {
    let height = block.height()?;
    let ctx = ValidationContext::new(height, block.timestamp(), params);
    let mut tracker = DuplicateTracker::new();
    let mut seen_ids = HashSet::with_capacity(block.transactions().len());

    for tx in block.transactions() {
        let id = tx.id()?;
        if !seen_ids.insert(id) {
            return Err(ChainError::NotValid(format!(
                "Transaction {} appears twice in block",
                id
            )));
        }
        if height > 0
            && (tx.timestamp() > block.timestamp().saturating_add(MAX_TIMEDRIFT)
                || tx.expiration() < block.timestamp())
        {
            return Err(ChainError::NotValid(format!(
                "Invalid transaction timestamp {} for block timestamp {}, transaction {}",
                tx.timestamp(),
                block.timestamp(),
                id
            )));
        }
        tx.validate(state, &ctx)?;
        if tx.is_block_duplicate(&mut tracker, state) || tx.is_duplicate(&mut tracker) {
            return Err(ChainError::NotCurrentlyValid(format!(
                "Transaction {} is a duplicate",
                id
            )));
        }
    }
    Ok(())
}
