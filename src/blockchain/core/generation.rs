//! Forging-right checks.
//!
//! A generator may extend `previous` when its generation signature chains from the predecessor's
//! and the hit derived from it falls inside the window its stake opens for the elapsed time.

use super::chain::Block;
use super::processor::BlockSource;
use crate::config::ONE_COIN;
use crate::crypto::{full_hash_to_id, AccountId};
use crate::error::ChainError;
use crate::ledger::{Ledger, SharedLedger};
use primitive_types::U256;
use tracing::debug;

/// Stake and hit policy for a chain.
pub trait GenerationOracle {
    /// Whole-coin stake counted for `account` when forging at `height`.
    fn effective_balance(&self, account: AccountId, height: u32) -> i64;

    fn verify_hit(&self, hit: u64, effective_balance: i64, previous: &Block, timestamp: i32) -> bool;
}

/// Reference hit window: the hit must fall in `[ebt * (elapsed - 1), ebt * elapsed)` where
/// `ebt` is the previous base target scaled by the effective balance.
pub fn hit_in_window(hit: u64, effective_balance: i64, previous_base_target: i64, elapsed: i64) -> bool {
    if elapsed <= 0 || effective_balance <= 0 || previous_base_target <= 0 {
        return false;
    }
    let effective_base_target =
        U256::from(previous_base_target as u64) * U256::from(effective_balance as u64);
    let previous_target = effective_base_target * U256::from((elapsed - 1) as u64);
    let target = previous_target + effective_base_target;
    let hit = U256::from(hit);
    hit >= previous_target && hit < target
}

/// Checks the generation signature and hit of `block` against its predecessor.
///
/// Fails with `BlockOutOfOrder` when the predecessor is unknown to `source`.
pub fn verify_generation_signature(
    block: &Block,
    source: &dyn BlockSource,
    oracle: &dyn GenerationOracle,
) -> Result<bool, ChainError> {
    let previous = source.block(block.previous_block_id()).ok_or_else(|| {
        ChainError::BlockOutOfOrder(format!(
            "Can't verify signature because previous block {} is missing",
            block.previous_block_id()
        ))
    })?;

    let generator = block.generator_id();
    let effective_balance = oracle.effective_balance(generator, previous.height()? + 1);
    if effective_balance <= 0 {
        debug!("Generator {} has no effective balance", generator);
        return Ok(false);
    }

    let expected = previous.next_generation_signature(block.generator_public_key());
    if &expected != block.generation_signature() {
        debug!("Generation signature of generator {} does not chain", generator);
        return Ok(false);
    }

    let hit = full_hash_to_id(&expected);
    Ok(oracle.verify_hit(hit, effective_balance, previous, block.timestamp()))
}

/// Stakes the confirmed balance held in a shared ledger.
#[derive(Clone)]
pub struct LedgerStakeOracle {
    ledger: SharedLedger,
}

impl LedgerStakeOracle {
    pub fn new(ledger: SharedLedger) -> Self {
        Self { ledger }
    }
}

impl GenerationOracle for LedgerStakeOracle {
    fn effective_balance(&self, account: AccountId, _height: u32) -> i64 {
        self.ledger.lock().balance(account) / ONE_COIN
    }

    fn verify_hit(&self, hit: u64, effective_balance: i64, previous: &Block, timestamp: i32) -> bool {
        let Ok(base_target) = previous.base_target() else {
            return false;
        };
        let elapsed = timestamp as i64 - previous.timestamp() as i64;
        hit_in_window(hit, effective_balance, base_target, elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::InMemoryChain;
    use crate::config::ProtocolParams;
    use crate::crypto::KeyPair;
    use crate::ledger::InMemoryLedger;

    const STAKE_COINS: i64 = 1_000_000;

    /// A genesis chain plus an oracle over a ledger where `forger` holds [`STAKE_COINS`].
    fn setup(forger: &KeyPair) -> (InMemoryChain, LedgerStakeOracle) {
        let params = ProtocolParams::default();
        let creator = KeyPair::from_passphrase("genesis").unwrap();
        let genesis = Block::genesis(&creator, Vec::new(), &params).unwrap();
        let mut ledger = InMemoryLedger::new();
        ledger.credit(forger.account_id(), STAKE_COINS * ONE_COIN).unwrap();
        let oracle = LedgerStakeOracle::new(SharedLedger::new(ledger));
        (InMemoryChain::new(genesis).unwrap(), oracle)
    }

    /// First timestamp at which `forger` may extend the genesis block.
    fn winning_timestamp(chain: &InMemoryChain, forger: &KeyPair) -> i32 {
        let genesis = chain.last_block();
        let hit = full_hash_to_id(&genesis.next_generation_signature(&forger.public_key()));
        let effective_base_target = genesis.base_target().unwrap() as u64 * STAKE_COINS as u64;
        genesis.timestamp() + (hit / effective_base_target) as i32 + 1
    }

    #[test]
    fn test_staked_generator_may_forge_inside_its_window() {
        let forger = KeyPair::from_passphrase("forger").unwrap();
        let (chain, oracle) = setup(&forger);
        assert_eq!(oracle.effective_balance(forger.account_id(), 1), STAKE_COINS);

        let timestamp = winning_timestamp(&chain, &forger);
        let block = Block::generate(chain.last_block(), &forger, timestamp, Vec::new()).unwrap();
        assert!(verify_generation_signature(&block, &chain, &oracle).unwrap());

        let late = Block::generate(chain.last_block(), &forger, timestamp + 1, Vec::new()).unwrap();
        assert!(!verify_generation_signature(&late, &chain, &oracle).unwrap());
    }

    #[test]
    fn test_altered_generation_signature_is_refused() {
        let forger = KeyPair::from_passphrase("forger").unwrap();
        let (chain, oracle) = setup(&forger);
        let timestamp = winning_timestamp(&chain, &forger);
        let block = Block::generate(chain.last_block(), &forger, timestamp, Vec::new()).unwrap();

        // Generation signature occupies header bytes 104..136.
        let mut bytes = block.bytes().unwrap().to_vec();
        bytes[104] ^= 0x01;
        let altered = Block::parse_bytes(&bytes, Vec::new()).unwrap();
        assert_ne!(altered.generation_signature(), block.generation_signature());
        assert!(!verify_generation_signature(&altered, &chain, &oracle).unwrap());
    }

    #[test]
    fn test_generator_without_stake_is_refused() {
        let forger = KeyPair::from_passphrase("forger").unwrap();
        let idle = KeyPair::from_passphrase("idle").unwrap();
        let (chain, oracle) = setup(&forger);
        assert_eq!(oracle.effective_balance(idle.account_id(), 1), 0);
        let block = Block::generate(chain.last_block(), &idle, 60, Vec::new()).unwrap();
        assert!(!verify_generation_signature(&block, &chain, &oracle).unwrap());
    }

    #[test]
    fn test_unknown_predecessor_is_out_of_order() {
        let forger = KeyPair::from_passphrase("forger").unwrap();
        let (chain, oracle) = setup(&forger);
        let first = Block::generate(chain.last_block(), &forger, 60, Vec::new()).unwrap();
        let second = Block::generate(&first, &forger, 120, Vec::new()).unwrap();
        assert!(matches!(
            verify_generation_signature(&second, &chain, &oracle),
            Err(ChainError::BlockOutOfOrder(_))
        ));
    }

    #[test]
    fn test_hit_window_bounds() {
        // ebt = 10 * 5 = 50; elapsed 3 opens [100, 150).
        assert!(!hit_in_window(99, 5, 10, 3));
        assert!(hit_in_window(100, 5, 10, 3));
        assert!(hit_in_window(149, 5, 10, 3));
        assert!(!hit_in_window(150, 5, 10, 3));
    }

    #[test]
    fn test_no_time_elapsed_never_hits() {
        assert!(!hit_in_window(0, 1_000, 1_000, 0));
        assert!(!hit_in_window(0, 1_000, 1_000, -5));
    }

    #[test]
    fn test_no_stake_never_hits() {
        assert!(!hit_in_window(0, 0, 1_000, 10));
    }

    #[test]
    fn test_large_values_do_not_overflow() {
        assert!(hit_in_window(u64::MAX, i64::MAX, i64::MAX, 1));
        assert!(!hit_in_window(u64::MAX, i64::MAX, i64::MAX, 2));
    }
}
