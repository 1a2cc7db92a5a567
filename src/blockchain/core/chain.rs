use super::difficulty;
use super::processor::BlockSource;
use crate::codec::{ByteReader, ByteWriter};
use crate::config::ProtocolParams;
use crate::crypto::{
    account_id, full_hash_to_id, parse_hex_array, parse_unsigned_id, sha256, verify_signature,
    AccountId, KeyPair, PublicKeyBytes, Sha256Hash, SignatureBytes,
};
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::transaction::Transaction;
use once_cell::sync::OnceCell;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

pub const BLOCK_VERSION: i32 = 3;
pub const MAX_NUMBER_OF_TRANSACTIONS: usize = 255;
pub const MAX_PAYLOAD_LENGTH: usize = MAX_NUMBER_OF_TRANSACTIONS * 1024;

/// Header length without the trailing signature.
const UNSIGNED_HEADER_LENGTH: usize = 4 + 4 + 8 + 4 + 8 + 8 + 4 + 32 + 32 + 32 + 32;

/// Values fixed when a block is linked to its predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub height: u32,
    pub base_target: i64,
    pub cumulative_difficulty: U256,
}

#[derive(Debug, Clone)]
pub struct Block {
    version: i32,
    timestamp: i32,
    previous_block_id: u64,
    total_amount_nqt: i64,
    total_fee_nqt: i64,
    payload_length: i32,
    payload_hash: Sha256Hash,
    generator_public_key: PublicKeyBytes,
    generation_signature: Sha256Hash,
    previous_block_hash: Sha256Hash,
    block_signature: Option<SignatureBytes>,
    transactions: Vec<Transaction>,

    link: Option<ChainLink>,
    next_block_id: Option<u64>,

    bytes: OnceCell<Vec<u8>>,
    id: OnceCell<u64>,
    string_id: OnceCell<String>,
    generator_id: OnceCell<AccountId>,
    signature_verified: OnceCell<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockJson {
    version: i32,
    timestamp: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_block: Option<String>,
    #[serde(rename = "totalAmountNQT")]
    total_amount_nqt: i64,
    #[serde(rename = "totalFeeNQT")]
    total_fee_nqt: i64,
    payload_length: i32,
    payload_hash: String,
    generator_public_key: String,
    generation_signature: String,
    previous_block_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    block_signature: Option<String>,
    #[serde(default)]
    transactions: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_target: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cumulative_difficulty: Option<String>,
}

/// Payload hash, payload length and totals over `transactions`.
fn payload_summary(transactions: &[Transaction]) -> Result<(Sha256Hash, i32, i64, i64), ChainError> {
    let mut payload = Vec::new();
    let mut total_amount: i64 = 0;
    let mut total_fee: i64 = 0;
    for tx in transactions {
        payload.extend_from_slice(tx.bytes());
        total_amount = total_amount
            .checked_add(tx.amount_nqt())
            .ok_or_else(|| ChainError::NotValid("Block total amount overflows".to_string()))?;
        total_fee = total_fee
            .checked_add(tx.fee_nqt())
            .ok_or_else(|| ChainError::NotValid("Block total fee overflows".to_string()))?;
    }
    Ok((sha256(&payload), payload.len() as i32, total_amount, total_fee))
}

impl Block {
    fn unsigned(
        timestamp: i32,
        previous_block_id: u64,
        previous_block_hash: Sha256Hash,
        generator_public_key: PublicKeyBytes,
        generation_signature: Sha256Hash,
        transactions: Vec<Transaction>,
    ) -> Result<Self, ChainError> {
        if transactions.len() > MAX_NUMBER_OF_TRANSACTIONS {
            return Err(ChainError::NotValid(format!(
                "Too many transactions: {} (max: {})",
                transactions.len(),
                MAX_NUMBER_OF_TRANSACTIONS
            )));
        }
        let (payload_hash, payload_length, total_amount_nqt, total_fee_nqt) =
            payload_summary(&transactions)?;
        Ok(Self {
            version: BLOCK_VERSION,
            timestamp,
            previous_block_id,
            total_amount_nqt,
            total_fee_nqt,
            payload_length,
            payload_hash,
            generator_public_key,
            generation_signature,
            previous_block_hash,
            block_signature: None,
            transactions,
            link: None,
            next_block_id: None,
            bytes: OnceCell::new(),
            id: OnceCell::new(),
            string_id: OnceCell::new(),
            generator_id: OnceCell::new(),
            signature_verified: OnceCell::new(),
        })
    }

    /// Builds, signs and links the first block of a chain.
    pub fn genesis(
        keypair: &KeyPair,
        transactions: Vec<Transaction>,
        params: &ProtocolParams,
    ) -> Result<Self, ChainError> {
        let mut block = Self::unsigned(0, 0, [0u8; 32], keypair.public_key(), [0u8; 32], transactions)?;
        block.sign(keypair)?;
        block.link_as_genesis(params)?;
        Ok(block)
    }

    /// Builds and signs a successor of `previous`. Linking is left to the caller.
    pub fn generate(
        previous: &Block,
        keypair: &KeyPair,
        timestamp: i32,
        transactions: Vec<Transaction>,
    ) -> Result<Self, ChainError> {
        let public_key = keypair.public_key();
        let mut block = Self::unsigned(
            timestamp,
            previous.id()?,
            sha256(previous.bytes()?),
            public_key,
            previous.next_generation_signature(&public_key),
            transactions,
        )?;
        block.sign(keypair)?;
        Ok(block)
    }

    /// Generation signature a successor generated by `generator_public_key` must carry.
    pub fn next_generation_signature(&self, generator_public_key: &PublicKeyBytes) -> Sha256Hash {
        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(&self.generation_signature);
        data.extend_from_slice(generator_public_key);
        sha256(&data)
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn timestamp(&self) -> i32 {
        self.timestamp
    }

    pub fn previous_block_id(&self) -> u64 {
        self.previous_block_id
    }

    pub fn total_amount_nqt(&self) -> i64 {
        self.total_amount_nqt
    }

    pub fn total_fee_nqt(&self) -> i64 {
        self.total_fee_nqt
    }

    pub fn payload_length(&self) -> i32 {
        self.payload_length
    }

    pub fn payload_hash(&self) -> &Sha256Hash {
        &self.payload_hash
    }

    pub fn generator_public_key(&self) -> &PublicKeyBytes {
        &self.generator_public_key
    }

    pub fn generation_signature(&self) -> &Sha256Hash {
        &self.generation_signature
    }

    pub fn previous_block_hash(&self) -> &Sha256Hash {
        &self.previous_block_hash
    }

    pub fn block_signature(&self) -> Option<&SignatureBytes> {
        self.block_signature.as_ref()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub(crate) fn transactions_mut(&mut self) -> &mut [Transaction] {
        &mut self.transactions
    }

    pub fn next_block_id(&self) -> Option<u64> {
        self.next_block_id
    }

    pub fn link(&self) -> Option<&ChainLink> {
        self.link.as_ref()
    }

    fn require_link(&self) -> Result<&ChainLink, ChainError> {
        self.link.as_ref().ok_or_else(|| {
            ChainError::IllegalState(format!(
                "Block {} has not been linked into the chain",
                self.string_id().unwrap_or_else(|_| "<unsigned>".to_string())
            ))
        })
    }

    pub fn height(&self) -> Result<u32, ChainError> {
        Ok(self.require_link()?.height)
    }

    pub fn base_target(&self) -> Result<i64, ChainError> {
        Ok(self.require_link()?.base_target)
    }

    pub fn cumulative_difficulty(&self) -> Result<U256, ChainError> {
        Ok(self.require_link()?.cumulative_difficulty)
    }

    pub fn generator_id(&self) -> AccountId {
        *self
            .generator_id
            .get_or_init(|| account_id(&self.generator_public_key))
    }

    fn write_header(&self, w: &mut ByteWriter) {
        w.put_i32(self.version)
            .put_i32(self.timestamp)
            .put_u64(self.previous_block_id)
            .put_i32(self.transactions.len() as i32)
            .put_i64(self.total_amount_nqt)
            .put_i64(self.total_fee_nqt)
            .put_i32(self.payload_length)
            .put_bytes(&self.payload_hash)
            .put_bytes(&self.generator_public_key)
            .put_bytes(&self.generation_signature)
            .put_bytes(&self.previous_block_hash);
    }

    /// Header encoding with the signature stripped; this is what gets signed.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(UNSIGNED_HEADER_LENGTH);
        self.write_header(&mut w);
        w.into_bytes()
    }

    /// Full signed header encoding.
    pub fn bytes(&self) -> Result<&[u8], ChainError> {
        let signature = self.block_signature.as_ref().ok_or_else(|| {
            ChainError::IllegalState("Block is not signed yet".to_string())
        })?;
        Ok(self.bytes.get_or_init(|| {
            let mut w = ByteWriter::with_capacity(UNSIGNED_HEADER_LENGTH + 64);
            self.write_header(&mut w);
            w.put_bytes(signature);
            w.into_bytes()
        }))
    }

    pub fn id(&self) -> Result<u64, ChainError> {
        if let Some(id) = self.id.get() {
            return Ok(*id);
        }
        let id = full_hash_to_id(&sha256(self.bytes()?));
        Ok(*self.id.get_or_init(|| id))
    }

    pub fn string_id(&self) -> Result<String, ChainError> {
        let id = self.id()?;
        Ok(self.string_id.get_or_init(|| id.to_string()).clone())
    }

    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), ChainError> {
        if keypair.public_key() != self.generator_public_key {
            return Err(ChainError::CryptoError(
                "Signing key does not match the generator public key".to_string(),
            ));
        }
        if self.link.is_some() {
            return Err(ChainError::IllegalState(
                "Cannot re-sign a block that is already linked".to_string(),
            ));
        }
        self.block_signature = Some(keypair.sign(&self.unsigned_bytes())?);
        self.bytes = OnceCell::new();
        self.id = OnceCell::new();
        self.string_id = OnceCell::new();
        self.signature_verified = OnceCell::new();
        Ok(())
    }

    /// Checks the block signature against the generator key. Computed at most once.
    pub fn verify_signature(&self) -> bool {
        *self.signature_verified.get_or_init(|| match &self.block_signature {
            Some(signature) => verify_signature(
                &self.generator_public_key,
                &self.unsigned_bytes(),
                signature,
            )
            .is_ok(),
            None => false,
        })
    }

    /// Fixes height, base target and cumulative difficulty relative to `previous`. Runs once.
    pub fn link_to_chain(
        &mut self,
        previous: &Block,
        source: &dyn BlockSource,
        params: &ProtocolParams,
    ) -> Result<(), ChainError> {
        if self.link.is_some() {
            return Err(ChainError::IllegalState(format!(
                "Block {} is already linked",
                self.string_id()?
            )));
        }
        let previous_id = previous.id()?;
        if previous_id != self.previous_block_id {
            return Err(ChainError::IllegalState(format!(
                "Previous block id doesn't match: expected {}, got {}",
                self.previous_block_id, previous_id
            )));
        }
        let height = previous.height()?.checked_add(1).ok_or_else(|| {
            ChainError::IllegalState("Chain height overflows".to_string())
        })?;
        let (base_target, cumulative_difficulty) =
            difficulty::calculate(previous, self.timestamp, source, params)?;
        self.link = Some(ChainLink {
            height,
            base_target,
            cumulative_difficulty,
        });
        self.link_transactions()?;
        info!(
            "Linked block {} at height {} (base target {}, cumulative difficulty {})",
            self.string_id()?,
            height,
            base_target,
            cumulative_difficulty
        );
        Ok(())
    }

    /// Links a first block at height 0.
    pub fn link_as_genesis(&mut self, params: &ProtocolParams) -> Result<(), ChainError> {
        if self.link.is_some() {
            return Err(ChainError::IllegalState("Genesis block is already linked".to_string()));
        }
        if self.previous_block_id != 0 {
            return Err(ChainError::IllegalState(
                "Genesis block cannot have a previous block".to_string(),
            ));
        }
        self.link = Some(ChainLink {
            height: 0,
            base_target: params.initial_base_target,
            cumulative_difficulty: U256::zero(),
        });
        self.link_transactions()
    }

    fn link_transactions(&mut self) -> Result<(), ChainError> {
        let id = self.id()?;
        let height = self.height()?;
        for (index, tx) in self.transactions.iter_mut().enumerate() {
            tx.set_block(id, height, index as u16)?;
        }
        Ok(())
    }

    pub fn set_next_block_id(&mut self, next_block_id: u64) -> Result<(), ChainError> {
        match self.next_block_id {
            Some(existing) if existing != next_block_id => Err(ChainError::IllegalState(format!(
                "Block {} already has successor {}",
                self.string_id()?,
                existing
            ))),
            _ => {
                self.next_block_id = Some(next_block_id);
                Ok(())
            }
        }
    }

    /// Credits the generator with the block's fees, minus the shares owed to the generators
    /// of the three preceding blocks.
    pub fn apply(&self, ledger: &mut dyn Ledger, source: &dyn BlockSource) -> Result<(), ChainError> {
        let generator = self.generator_id();
        ledger.apply_public_key(generator, &self.generator_public_key)?;
        let height = self.height()?;
        let mut total_back_fees: i64 = 0;
        if height > 3 {
            let mut back_fees = [0i64; 3];
            for tx in &self.transactions {
                for (share, fee) in back_fees.iter_mut().zip(tx.back_fees()) {
                    *share = share.checked_add(fee).ok_or_else(|| {
                        ChainError::NotValid("Back fee total overflows".to_string())
                    })?;
                }
            }
            for (i, &fee) in back_fees.iter().enumerate() {
                if fee == 0 {
                    break;
                }
                let earlier_height = height - i as u32 - 1;
                let earlier = source.block_at_height(earlier_height).ok_or_else(|| {
                    ChainError::IllegalState(format!("No block at height {}", earlier_height))
                })?;
                let earlier_generator = earlier.generator_id();
                ledger.add_to_balance_and_unconfirmed_balance(earlier_generator, fee)?;
                ledger.add_to_forged_balance(earlier_generator, fee)?;
                total_back_fees += fee;
                debug!(
                    "Back fee {} to generator {} of block at height {}",
                    fee, earlier_generator, earlier_height
                );
            }
        }
        let reward = self.total_fee_nqt - total_back_fees;
        if reward != 0 {
            ledger.add_to_balance_and_unconfirmed_balance(generator, reward)?;
            ledger.add_to_forged_balance(generator, reward)?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Value, ChainError> {
        let transactions = self
            .transactions
            .iter()
            .map(Transaction::to_json)
            .collect::<Result<Vec<_>, _>>()?;
        let json = BlockJson {
            version: self.version,
            timestamp: self.timestamp,
            previous_block: (self.previous_block_id != 0).then(|| self.previous_block_id.to_string()),
            total_amount_nqt: self.total_amount_nqt,
            total_fee_nqt: self.total_fee_nqt,
            payload_length: self.payload_length,
            payload_hash: hex::encode(self.payload_hash),
            generator_public_key: hex::encode(self.generator_public_key),
            generation_signature: hex::encode(self.generation_signature),
            previous_block_hash: hex::encode(self.previous_block_hash),
            block_signature: self.block_signature.map(hex::encode),
            transactions,
            block: self.string_id().ok(),
            height: self.link.as_ref().map(|l| l.height),
            base_target: self.link.as_ref().map(|l| l.base_target),
            cumulative_difficulty: self
                .link
                .as_ref()
                .map(|l| l.cumulative_difficulty.to_string()),
        };
        Ok(serde_json::to_value(json)?)
    }

    /// Parses the structured form. A block whose signature does not verify is rejected.
    pub fn parse_json(value: &Value) -> Result<Self, ChainError> {
        let json = BlockJson::deserialize(value)
            .map_err(|e| ChainError::NotValid(format!("Invalid block JSON: {}", e)))?;
        let transactions = json
            .transactions
            .iter()
            .map(Transaction::parse_json)
            .collect::<Result<Vec<_>, _>>()?;
        let mut block = Self::unsigned(
            json.timestamp,
            match json.previous_block.as_deref() {
                Some(id) => parse_unsigned_id(id)?,
                None => 0,
            },
            parse_hex_array::<32>("previousBlockHash", &json.previous_block_hash)?,
            parse_hex_array::<32>("generatorPublicKey", &json.generator_public_key)?,
            parse_hex_array::<32>("generationSignature", &json.generation_signature)?,
            transactions,
        )?;
        // The header is taken as declared; payload consistency is checked on acceptance.
        block.version = json.version;
        block.total_amount_nqt = json.total_amount_nqt;
        block.total_fee_nqt = json.total_fee_nqt;
        block.payload_length = json.payload_length;
        block.payload_hash = parse_hex_array::<32>("payloadHash", &json.payload_hash)?;
        if let Some(signature) = json.block_signature.as_deref() {
            block.block_signature = Some(parse_hex_array::<64>("blockSignature", signature)?);
        }
        block.check_parsed_signature()?;
        if let Some(declared) = json.block.as_deref() {
            if parse_unsigned_id(declared)? != block.id()? {
                return Err(ChainError::NotValid(format!(
                    "Block id {} does not match its content",
                    declared
                )));
            }
        }
        Ok(block)
    }

    /// Parses the binary header layout; `transactions` are supplied separately.
    pub fn parse_bytes(header: &[u8], transactions: Vec<Transaction>) -> Result<Self, ChainError> {
        let mut r = ByteReader::new(header);
        let version = r.i32()?;
        let timestamp = r.i32()?;
        let previous_block_id = r.u64()?;
        let transaction_count = r.i32()?;
        let total_amount_nqt = r.i64()?;
        let total_fee_nqt = r.i64()?;
        let payload_length = r.i32()?;
        let payload_hash: Sha256Hash = r.array()?;
        let generator_public_key: PublicKeyBytes = r.array()?;
        let generation_signature: Sha256Hash = r.array()?;
        let previous_block_hash: Sha256Hash = r.array()?;
        let block_signature = if r.remaining() > 0 {
            Some(r.array::<64>()?)
        } else {
            None
        };
        r.finish()?;
        if transaction_count < 0 || transaction_count as usize != transactions.len() {
            return Err(ChainError::NotValid(format!(
                "Header declares {} transactions, got {}",
                transaction_count,
                transactions.len()
            )));
        }
        let mut block = Self::unsigned(
            timestamp,
            previous_block_id,
            previous_block_hash,
            generator_public_key,
            generation_signature,
            transactions,
        )?;
        block.version = version;
        block.total_amount_nqt = total_amount_nqt;
        block.total_fee_nqt = total_fee_nqt;
        block.payload_length = payload_length;
        block.payload_hash = payload_hash;
        block.block_signature = block_signature;
        Ok(block)
    }

    fn check_parsed_signature(&self) -> Result<(), ChainError> {
        if !self.verify_signature() {
            debug!("Rejecting block with invalid signature from generator {}", self.generator_id());
            return Err(ChainError::NotValid("Invalid block signature".to_string()));
        }
        Ok(())
    }

    /// Whether the header's payload fields match the carried transactions.
    pub(crate) fn payload_matches(&self) -> Result<bool, ChainError> {
        let (hash, length, amount, fee) = payload_summary(&self.transactions)?;
        Ok(hash == self.payload_hash
            && length == self.payload_length
            && amount == self.total_amount_nqt
            && fee == self.total_fee_nqt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::InMemoryChain;
    use crate::config::ONE_COIN;
    use crate::ledger::InMemoryLedger;
    use crate::transaction::{Attachment, TransactionBuilder};

    fn genesis(params: &ProtocolParams) -> (KeyPair, Block) {
        let creator = KeyPair::from_passphrase("genesis").unwrap();
        let block = Block::genesis(&creator, Vec::new(), params).unwrap();
        (creator, block)
    }

    #[test]
    fn test_signature_and_id_are_stable() {
        let params = ProtocolParams::default();
        let (_, block) = genesis(&params);
        assert!(block.verify_signature());
        assert!(block.verify_signature());
        assert_eq!(block.id().unwrap(), block.id().unwrap());
        assert_eq!(block.string_id().unwrap(), block.id().unwrap().to_string());
        assert_eq!(block.bytes().unwrap().len(), UNSIGNED_HEADER_LENGTH + 64);
    }

    #[test]
    fn test_unsigned_block_has_no_identity() {
        let creator = KeyPair::from_passphrase("genesis").unwrap();
        let block = Block::unsigned(0, 0, [0; 32], creator.public_key(), [0; 32], Vec::new()).unwrap();
        assert!(matches!(block.id(), Err(ChainError::IllegalState(_))));
        assert!(!block.verify_signature());
        assert!(matches!(block.height(), Err(ChainError::IllegalState(_))));
    }

    #[test]
    fn test_generate_and_link() {
        let params = ProtocolParams::default();
        let (creator, genesis) = genesis(&params);
        let chain = InMemoryChain::new(genesis.clone()).unwrap();
        let forger = KeyPair::from_passphrase("forger").unwrap();
        let mut next = Block::generate(&genesis, &forger, 60, Vec::new()).unwrap();
        assert_eq!(next.previous_block_id(), genesis.id().unwrap());
        assert_eq!(
            next.generation_signature(),
            &genesis.next_generation_signature(&forger.public_key())
        );
        next.link_to_chain(&genesis, &chain, &params).unwrap();
        assert_eq!(next.height().unwrap(), 1);
        assert!(next.cumulative_difficulty().unwrap() > genesis.cumulative_difficulty().unwrap());
        assert!(matches!(
            next.link_to_chain(&genesis, &chain, &params),
            Err(ChainError::IllegalState(_))
        ));
        assert!(matches!(next.sign(&forger), Err(ChainError::IllegalState(_))));
        assert!(matches!(next.sign(&creator), Err(ChainError::CryptoError(_))));
    }

    #[test]
    fn test_link_to_wrong_previous() {
        let params = ProtocolParams::default();
        let (_, genesis) = genesis(&params);
        let chain = InMemoryChain::new(genesis.clone()).unwrap();
        let forger = KeyPair::from_passphrase("forger").unwrap();
        let first = Block::generate(&genesis, &forger, 60, Vec::new()).unwrap();
        let mut second = Block::generate(&first, &forger, 120, Vec::new()).unwrap();
        assert!(matches!(
            second.link_to_chain(&genesis, &chain, &params),
            Err(ChainError::IllegalState(_))
        ));
    }

    #[test]
    fn test_json_rejects_bad_signature() {
        let params = ProtocolParams::default();
        let (_, genesis) = genesis(&params);
        let forger = KeyPair::from_passphrase("forger").unwrap();
        let payment = TransactionBuilder::new(forger.public_key(), Attachment::OrdinaryPayment, 30)
            .recipient(7)
            .amount(ONE_COIN)
            .fee(ONE_COIN)
            .sign(&forger)
            .unwrap();
        let block = Block::generate(&genesis, &forger, 60, vec![payment]).unwrap();
        let json = block.to_json().unwrap();
        let parsed = Block::parse_json(&json).unwrap();
        assert_eq!(parsed.id().unwrap(), block.id().unwrap());
        assert_eq!(parsed.transactions().len(), 1);
        assert!(parsed.payload_matches().unwrap());

        let mut tampered = json.clone();
        tampered["timestamp"] = 61.into();
        tampered.as_object_mut().unwrap().remove("block");
        assert!(matches!(Block::parse_json(&tampered), Err(ChainError::NotValid(_))));
    }

    #[test]
    fn test_bytes_round_trip() {
        let params = ProtocolParams::default();
        let (_, genesis) = genesis(&params);
        let forger = KeyPair::from_passphrase("forger").unwrap();
        let block = Block::generate(&genesis, &forger, 60, Vec::new()).unwrap();
        let parsed = Block::parse_bytes(block.bytes().unwrap(), Vec::new()).unwrap();
        assert_eq!(parsed.id().unwrap(), block.id().unwrap());
        assert!(parsed.verify_signature());
        assert!(Block::parse_bytes(&block.bytes().unwrap()[..100], Vec::new()).is_err());
    }

    #[test]
    fn test_generator_reward_without_back_fees() {
        let params = ProtocolParams::default();
        let (_, genesis) = genesis(&params);
        let chain = InMemoryChain::new(genesis.clone()).unwrap();
        let forger = KeyPair::from_passphrase("forger").unwrap();
        let sender = KeyPair::from_passphrase("sender").unwrap();
        let payment = TransactionBuilder::new(sender.public_key(), Attachment::OrdinaryPayment, 30)
            .recipient(7)
            .amount(ONE_COIN)
            .fee(3 * ONE_COIN)
            .sign(&sender)
            .unwrap();
        let mut block = Block::generate(&genesis, &forger, 60, vec![payment]).unwrap();
        block.link_to_chain(&genesis, &chain, &params).unwrap();
        let mut ledger = InMemoryLedger::new();
        block.apply(&mut ledger, &chain).unwrap();
        assert_eq!(ledger.balance(forger.account_id()), 3 * ONE_COIN);
        assert_eq!(ledger.forged_balance(forger.account_id()), 3 * ONE_COIN);
        assert_eq!(ledger.public_key(forger.account_id()), Some(forger.public_key()));
    }
}
