//! Block acceptance and candidate selection.
//!
//! [`Blockchain`] owns the linked blocks, the chain state and a handle on the shared ledger.
//! Accepting a block runs the checks in order (linkage, signature, forging right, payload,
//! transactions), then reserves and applies every transaction against scratch copies of the
//! ledger and state which replace the live ones only when the whole block succeeds.

use super::chain::{Block, MAX_NUMBER_OF_TRANSACTIONS, MAX_PAYLOAD_LENGTH};
use super::generation::{verify_generation_signature, GenerationOracle};
use super::state::{ChainState, InMemoryChainState};
use super::validation::{validate_block_transactions, validate_payload, MAX_TIMEDRIFT};
use crate::config::ProtocolParams;
use crate::crypto::KeyPair;
use crate::error::ChainError;
use crate::ledger::{Ledger, SharedLedger};
use crate::transaction::{DuplicateTracker, LifecycleState, Transaction, ValidationContext};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Read access to already linked blocks.
pub trait BlockSource {
    fn block_at_height(&self, height: u32) -> Option<&Block>;
    fn block(&self, id: u64) -> Option<&Block>;
}

/// Linked blocks from genesis to tip.
#[derive(Debug, Clone)]
pub struct InMemoryChain {
    blocks: Vec<Block>,
    by_id: HashMap<u64, usize>,
}

impl InMemoryChain {
    /// Starts a chain from a genesis block linked at height 0.
    pub fn new(genesis: Block) -> Result<Self, ChainError> {
        if genesis.height()? != 0 {
            return Err(ChainError::IllegalState(
                "First block of a chain must sit at height 0".to_string(),
            ));
        }
        let mut by_id = HashMap::new();
        by_id.insert(genesis.id()?, 0);
        Ok(Self {
            blocks: vec![genesis],
            by_id,
        })
    }

    pub fn last_block(&self) -> &Block {
        // Never empty: constructed from a genesis block and only grows.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn height(&self) -> u32 {
        (self.blocks.len() - 1) as u32
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Appends a block already linked on top of the current tip.
    pub fn push(&mut self, block: Block) -> Result<(), ChainError> {
        let tip_id = self.last_block().id()?;
        if block.previous_block_id() != tip_id || block.height()? != self.height() + 1 {
            return Err(ChainError::IllegalState(format!(
                "Block {} does not extend the tip {}",
                block.string_id()?,
                tip_id
            )));
        }
        let id = block.id()?;
        let last = self.blocks.len() - 1;
        self.blocks[last].set_next_block_id(id)?;
        self.by_id.insert(id, self.blocks.len());
        self.blocks.push(block);
        Ok(())
    }
}

impl BlockSource for InMemoryChain {
    fn block_at_height(&self, height: u32) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    fn block(&self, id: u64) -> Option<&Block> {
        self.by_id.get(&id).map(|&index| &self.blocks[index])
    }
}

/// Reserves every transaction not already reserved, then applies them all in block order.
///
/// A failed reservation releases the ones made here, most recent first.
fn accept_transactions(
    transactions: &mut [Transaction],
    ledger: &mut dyn Ledger,
    state: &mut dyn ChainState,
    params: &ProtocolParams,
) -> Result<(), ChainError> {
    let mut reserved_here = Vec::with_capacity(transactions.len());
    for index in 0..transactions.len() {
        if transactions[index].lifecycle_state() != LifecycleState::Unvalidated {
            continue;
        }
        let failure = match transactions[index].reserve(ledger, params) {
            Ok(true) => {
                reserved_here.push(index);
                continue;
            }
            Ok(false) => ChainError::NotCurrentlyValid(format!(
                "Double spending transaction {}",
                transactions[index].string_id()?
            )),
            Err(e) => e,
        };
        for &earlier in reserved_here.iter().rev() {
            transactions[earlier].release(ledger, params)?;
        }
        return Err(failure);
    }
    for tx in transactions.iter_mut() {
        tx.apply(ledger, state, params)?;
    }
    Ok(())
}

pub struct Blockchain {
    chain: InMemoryChain,
    state: InMemoryChainState,
    ledger: SharedLedger,
    params: ProtocolParams,
    oracle: Box<dyn GenerationOracle + Send + Sync>,
}

impl Blockchain {
    /// Starts a chain from `genesis`, applying its transactions to `ledger`.
    ///
    /// The ledger must allow the genesis creator's balance to go negative.
    pub fn new(
        mut genesis: Block,
        ledger: SharedLedger,
        params: ProtocolParams,
        oracle: Box<dyn GenerationOracle + Send + Sync>,
    ) -> Result<Self, ChainError> {
        params.validate()?;
        if genesis.link().is_none() {
            genesis.link_as_genesis(&params)?;
        }
        if !genesis.verify_signature() {
            return Err(ChainError::NotValid("Invalid genesis block signature".to_string()));
        }
        validate_payload(&genesis)?;
        let mut state = InMemoryChainState::new();
        validate_block_transactions(&genesis, &state, &params)?;
        {
            let mut guard = ledger.lock();
            let mut scratch = guard.clone();
            accept_transactions(genesis.transactions_mut(), &mut scratch, &mut state, &params)?;
            *guard = scratch;
        }
        let chain = InMemoryChain::new(genesis)?;
        chain.last_block().apply(&mut *ledger.lock(), &chain)?;
        info!(
            "Genesis block {} applied with {} transactions",
            chain.last_block().string_id()?,
            chain.last_block().transactions().len()
        );
        Ok(Self {
            chain,
            state,
            ledger,
            params,
            oracle,
        })
    }

    pub fn chain(&self) -> &InMemoryChain {
        &self.chain
    }

    pub fn state(&self) -> &InMemoryChainState {
        &self.state
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    pub fn last_block(&self) -> &Block {
        self.chain.last_block()
    }

    pub fn height(&self) -> u32 {
        self.chain.height()
    }

    /// Links, verifies and applies `block` on top of the current tip.
    ///
    /// Nothing in the ledger or state changes unless every step succeeds. When the block is
    /// refused, reservations its transactions already hold on the live ledger (from
    /// [`Blockchain::select_for_block`]) are released, most recent first.
    pub fn apply_block(&mut self, mut block: Block) -> Result<(), ChainError> {
        if let Err(e) = self.accept_block(&mut block) {
            self.release_reservations(&mut block);
            return Err(e);
        }
        info!(
            "Accepted block {} at height {} from generator {} ({} transactions, fee {})",
            block.string_id()?,
            block.height()?,
            block.generator_id(),
            block.transactions().len(),
            block.total_fee_nqt()
        );
        self.chain.push(block)
    }

    fn accept_block(&mut self, block: &mut Block) -> Result<(), ChainError> {
        let previous = self.chain.last_block();
        let previous_id = previous.id()?;
        if block.previous_block_id() != previous_id {
            return Err(ChainError::BlockOutOfOrder(format!(
                "Block {} does not extend the tip {}",
                block.string_id()?,
                previous_id
            )));
        }
        if block.timestamp() <= previous.timestamp() {
            return Err(ChainError::NotValid(format!(
                "Block timestamp {} is not after previous block timestamp {}",
                block.timestamp(),
                previous.timestamp()
            )));
        }
        block.link_to_chain(previous, &self.chain, &self.params)?;

        if !block.verify_signature() {
            return Err(ChainError::NotValid(format!(
                "Invalid signature on block {}",
                block.string_id()?
            )));
        }
        if !verify_generation_signature(block, &self.chain, self.oracle.as_ref())? {
            return Err(ChainError::NotValid(format!(
                "Generator {} is not entitled to forge block {}",
                block.generator_id(),
                block.string_id()?
            )));
        }
        validate_payload(block)?;
        validate_block_transactions(block, &self.state, &self.params)?;

        // Lifecycle changes land on copies so a refused block keeps its live reservations.
        let mut transactions = block.transactions().to_vec();
        let mut state = self.state.clone();
        {
            let mut guard = self.ledger.lock();
            let mut scratch = guard.clone();
            accept_transactions(&mut transactions, &mut scratch, &mut state, &self.params)?;
            block.apply(&mut scratch, &self.chain)?;
            *guard = scratch;
        }
        self.state = state;
        block.transactions_mut().clone_from_slice(&transactions);
        Ok(())
    }

    fn release_reservations(&self, block: &mut Block) {
        let mut ledger = self.ledger.lock();
        for tx in block.transactions_mut().iter_mut().rev() {
            if tx.lifecycle_state() != LifecycleState::Reserved {
                continue;
            }
            if let Err(e) = tx.release(&mut *ledger, &self.params) {
                warn!(
                    "Release of transaction {} from a refused block failed: {}",
                    tx.string_id_or_unsigned(),
                    e
                );
            }
        }
    }

    /// Picks candidates for the next block in submission order, reserving each.
    ///
    /// Candidates that are invalid, duplicate or unaffordable are dropped; earlier picks are kept.
    pub fn select_for_block(&self, candidates: Vec<Transaction>, timestamp: i32) -> Vec<Transaction> {
        let ctx = ValidationContext::new(self.height() + 1, timestamp, &self.params);
        let mut tracker = DuplicateTracker::new();
        let mut selected = Vec::new();
        let mut payload_length = 0usize;
        let mut ledger = self.ledger.lock();

        for mut tx in candidates {
            if selected.len() >= MAX_NUMBER_OF_TRANSACTIONS {
                break;
            }
            let id = tx.string_id().unwrap_or_else(|_| "<unsigned>".to_string());
            if payload_length + tx.size() > MAX_PAYLOAD_LENGTH {
                debug!("Transaction {} does not fit in the payload", id);
                continue;
            }
            if tx.timestamp() > timestamp.saturating_add(MAX_TIMEDRIFT) || tx.expiration() < timestamp {
                debug!("Transaction {} is outside its validity window", id);
                continue;
            }
            if let Err(e) = tx.validate(&self.state, &ctx) {
                debug!("Dropping transaction {}: {}", id, e);
                continue;
            }
            if tx.is_unconfirmed_duplicate(&mut tracker)
                || tx.is_block_duplicate(&mut tracker, &self.state)
                || tx.is_duplicate(&mut tracker)
            {
                debug!("Dropping duplicate transaction {}", id);
                continue;
            }
            if tx.lifecycle_state() == LifecycleState::Unvalidated {
                match tx.reserve(&mut *ledger, &self.params) {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!("Dropping double spending transaction {}", id);
                        continue;
                    }
                    Err(e) => {
                        warn!("Reservation of transaction {} failed: {}", id, e);
                        continue;
                    }
                }
            }
            payload_length += tx.size();
            selected.push(tx);
        }
        selected
    }

    /// Forges a successor of the tip from `candidates`. The result still has to go through
    /// [`Blockchain::apply_block`].
    pub fn generate_block(
        &self,
        keypair: &KeyPair,
        timestamp: i32,
        candidates: Vec<Transaction>,
    ) -> Result<Block, ChainError> {
        let transactions = self.select_for_block(candidates, timestamp);
        Block::generate(self.last_block(), keypair, timestamp, transactions)
    }
}
