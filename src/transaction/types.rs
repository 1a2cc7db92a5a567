/// Transaction envelope for ForgeChain
use super::attachment::Attachment;
use super::kind::{self, TransactionKind};
use crate::codec::{ByteReader, ByteWriter};
use crate::crypto::{
    account_id, full_hash_to_id, parse_hex_array, parse_unsigned_id, sha256, verify_signature,
    AccountId, KeyPair, PublicKeyBytes, Sha256Hash, SignatureBytes,
};
use crate::error::ChainError;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum encoded transaction size in bytes.
pub const MAX_TRANSACTION_SIZE: usize = 16 * 1024;

/// Default lifetime of an unconfirmed transaction, in minutes.
pub const DEFAULT_DEADLINE: i16 = 1440;

const FLAG_PHASED: u32 = 1;

/// Where an envelope sits in the reserve → apply / release protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LifecycleState {
    /// Fresh, or released back after a reservation.
    #[default]
    Unvalidated,
    Reserved,
    /// Terminal.
    Applied,
}

/// Position of a confirmed transaction in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockLinkage {
    pub block_id: u64,
    pub height: u32,
    pub index: u16,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    timestamp: i32,
    deadline: i16,
    sender_public_key: PublicKeyBytes,
    recipient_id: Option<AccountId>,
    amount_nqt: i64,
    fee_nqt: i64,
    referenced_transaction_full_hash: Option<Sha256Hash>,
    signature: Option<SignatureBytes>,
    phasing_finish_height: Option<i32>,
    attachment: Attachment,
    /// Encoded once at construction; an attachment that cannot be encoded never becomes a transaction.
    attachment_bytes: Vec<u8>,

    pub(crate) state: LifecycleState,
    linkage: Option<BlockLinkage>,

    bytes: OnceCell<Vec<u8>>,
    full_hash: OnceCell<Sha256Hash>,
    sender_id: OnceCell<AccountId>,
}

/// Fluent constructor for unsigned transactions.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    timestamp: i32,
    deadline: i16,
    sender_public_key: PublicKeyBytes,
    recipient_id: Option<AccountId>,
    amount_nqt: i64,
    fee_nqt: i64,
    referenced_transaction_full_hash: Option<Sha256Hash>,
    phasing_finish_height: Option<i32>,
    attachment: Attachment,
}

impl TransactionBuilder {
    pub fn new(sender_public_key: PublicKeyBytes, attachment: Attachment, timestamp: i32) -> Self {
        Self {
            timestamp,
            deadline: DEFAULT_DEADLINE,
            sender_public_key,
            recipient_id: None,
            amount_nqt: 0,
            fee_nqt: 0,
            referenced_transaction_full_hash: None,
            phasing_finish_height: None,
            attachment,
        }
    }

    pub fn recipient(mut self, recipient_id: AccountId) -> Self {
        self.recipient_id = Some(recipient_id);
        self
    }

    pub fn amount(mut self, amount_nqt: i64) -> Self {
        self.amount_nqt = amount_nqt;
        self
    }

    pub fn fee(mut self, fee_nqt: i64) -> Self {
        self.fee_nqt = fee_nqt;
        self
    }

    pub fn deadline(mut self, deadline: i16) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn referenced_transaction(mut self, full_hash: Sha256Hash) -> Self {
        // An all-zero hash encodes as "no reference".
        self.referenced_transaction_full_hash = Some(full_hash).filter(|h| *h != [0u8; 32]);
        self
    }

    pub fn phased(mut self, finish_height: i32) -> Self {
        self.phasing_finish_height = Some(finish_height);
        self
    }

    /// Fails with `NotValid` when a string in the attachment does not fit its length prefix.
    pub fn build(self) -> Result<Transaction, ChainError> {
        let mut w = ByteWriter::new();
        self.attachment.write_bytes(&mut w)?;
        Ok(Transaction {
            timestamp: self.timestamp,
            deadline: self.deadline,
            sender_public_key: self.sender_public_key,
            recipient_id: self.recipient_id,
            amount_nqt: self.amount_nqt,
            fee_nqt: self.fee_nqt,
            referenced_transaction_full_hash: self.referenced_transaction_full_hash,
            signature: None,
            phasing_finish_height: self.phasing_finish_height,
            attachment: self.attachment,
            attachment_bytes: w.into_bytes(),
            state: LifecycleState::Unvalidated,
            linkage: None,
            bytes: OnceCell::new(),
            full_hash: OnceCell::new(),
            sender_id: OnceCell::new(),
        })
    }

    pub fn sign(self, keypair: &KeyPair) -> Result<Transaction, ChainError> {
        let mut tx = self.build()?;
        tx.sign(keypair)?;
        Ok(tx)
    }
}

/// Structured representation. Read-only fields are emitted but ignored on input.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionJson {
    #[serde(rename = "type")]
    type_: u8,
    subtype: u8,
    timestamp: i32,
    deadline: i16,
    sender_public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recipient: Option<String>,
    #[serde(rename = "amountNQT")]
    amount_nqt: i64,
    #[serde(rename = "feeNQT")]
    fee_nqt: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    referenced_transaction_full_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phasing_finish_height: Option<i32>,
    #[serde(default)]
    attachment: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    full_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
}

impl Transaction {
    pub fn kind(&self) -> TransactionKind {
        self.attachment.kind()
    }

    pub fn timestamp(&self) -> i32 {
        self.timestamp
    }

    pub fn deadline(&self) -> i16 {
        self.deadline
    }

    /// Last second (in chain epoch time) at which this transaction may be included.
    pub fn expiration(&self) -> i32 {
        self.timestamp.saturating_add(i32::from(self.deadline) * 60)
    }

    pub fn sender_public_key(&self) -> &PublicKeyBytes {
        &self.sender_public_key
    }

    pub fn sender_id(&self) -> AccountId {
        *self
            .sender_id
            .get_or_init(|| account_id(&self.sender_public_key))
    }

    pub fn recipient_id(&self) -> Option<AccountId> {
        self.recipient_id
    }

    pub fn amount_nqt(&self) -> i64 {
        self.amount_nqt
    }

    pub fn fee_nqt(&self) -> i64 {
        self.fee_nqt
    }

    pub fn referenced_transaction_full_hash(&self) -> Option<&Sha256Hash> {
        self.referenced_transaction_full_hash.as_ref()
    }

    pub fn signature(&self) -> Option<&SignatureBytes> {
        self.signature.as_ref()
    }

    pub fn is_phased(&self) -> bool {
        self.phasing_finish_height.is_some()
    }

    pub fn phasing_finish_height(&self) -> Option<i32> {
        self.phasing_finish_height
    }

    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.state
    }

    pub fn linkage(&self) -> Option<BlockLinkage> {
        self.linkage
    }

    pub fn block_id(&self) -> Option<u64> {
        self.linkage.map(|l| l.block_id)
    }

    pub fn height(&self) -> Option<u32> {
        self.linkage.map(|l| l.height)
    }

    /// Records the including block. Frozen once the transaction has been applied.
    pub fn set_block(&mut self, block_id: u64, height: u32, index: u16) -> Result<(), ChainError> {
        if self.state == LifecycleState::Applied {
            return Err(ChainError::IllegalState(format!(
                "Block linkage of applied transaction {} is immutable",
                self.string_id_or_unsigned()
            )));
        }
        self.linkage = Some(BlockLinkage {
            block_id,
            height,
            index,
        });
        Ok(())
    }

    fn write_header(&self, w: &mut ByteWriter, signature: Option<&SignatureBytes>) {
        let kind = self.kind();
        w.put_u8(kind.type_())
            .put_u8(kind.subtype())
            .put_i32(self.timestamp)
            .put_i16(self.deadline)
            .put_bytes(&self.sender_public_key)
            .put_u64(self.recipient_id.unwrap_or(0))
            .put_i64(self.amount_nqt)
            .put_i64(self.fee_nqt)
            .put_bytes(&self.referenced_transaction_full_hash.unwrap_or([0u8; 32]))
            .put_bytes(signature.unwrap_or(&[0u8; 64]));
        match self.phasing_finish_height {
            Some(finish) => {
                w.put_u32(FLAG_PHASED).put_i32(finish);
            }
            None => {
                w.put_u32(0);
            }
        }
    }

    fn encode(&self, signature: Option<&SignatureBytes>) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(256);
        self.write_header(&mut w, signature);
        w.put_bytes(&self.attachment_bytes);
        w.into_bytes()
    }

    /// Wire encoding, with a zeroed signature field while unsigned.
    pub fn bytes(&self) -> &[u8] {
        self.bytes.get_or_init(|| self.encode(self.signature.as_ref()))
    }

    /// The encoding that is signed: the signature field is always zeroed.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        self.encode(None)
    }

    pub fn size(&self) -> usize {
        self.bytes().len()
    }

    pub fn validate_size(&self) -> Result<(), ChainError> {
        if self.size() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::NotValid(format!(
                "Transaction too large: {} bytes (max: {})",
                self.size(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }

    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), ChainError> {
        if keypair.public_key() != self.sender_public_key {
            return Err(ChainError::CryptoError(
                "Signing key does not match the sender public key".to_string(),
            ));
        }
        let signature = keypair.sign(&self.unsigned_bytes())?;
        self.signature = Some(signature);
        self.bytes = OnceCell::new();
        self.full_hash = OnceCell::new();
        Ok(())
    }

    pub fn verify_signature(&self) -> bool {
        match &self.signature {
            Some(signature) => {
                verify_signature(&self.sender_public_key, &self.unsigned_bytes(), signature).is_ok()
            }
            None => false,
        }
    }

    /// SHA-256 of the signed encoding.
    pub fn full_hash(&self) -> Result<Sha256Hash, ChainError> {
        if self.signature.is_none() {
            return Err(ChainError::IllegalState(
                "Transaction is not signed yet".to_string(),
            ));
        }
        Ok(*self.full_hash.get_or_init(|| sha256(self.bytes())))
    }

    pub fn id(&self) -> Result<u64, ChainError> {
        Ok(full_hash_to_id(&self.full_hash()?))
    }

    pub fn string_id(&self) -> Result<String, ChainError> {
        Ok(self.id()?.to_string())
    }

    /// For log lines about transactions that may not be signed.
    pub(crate) fn string_id_or_unsigned(&self) -> String {
        self.string_id().unwrap_or_else(|_| "<unsigned>".to_string())
    }

    /// Decodes one transaction from the reader, leaving any following bytes unread.
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, ChainError> {
        let type_ = r.u8()?;
        let subtype = r.u8()?;
        let kind = kind::require(type_, subtype)?;
        let timestamp = r.i32()?;
        let deadline = r.i16()?;
        let sender_public_key: PublicKeyBytes = r.array()?;
        let recipient_id = Some(r.u64()?).filter(|id| *id != 0);
        let amount_nqt = r.i64()?;
        let fee_nqt = r.i64()?;
        let referenced: Sha256Hash = r.array()?;
        let signature: SignatureBytes = r.array()?;
        let flags = r.u32()?;
        if flags & !FLAG_PHASED != 0 {
            return Err(ChainError::NotValid(format!("Unknown transaction flags {:#x}", flags)));
        }
        let phasing_finish_height = if flags & FLAG_PHASED != 0 {
            Some(r.i32()?)
        } else {
            None
        };
        let attachment = Attachment::parse_bytes(kind, r)?;

        let mut builder = TransactionBuilder::new(sender_public_key, attachment, timestamp)
            .deadline(deadline)
            .amount(amount_nqt)
            .fee(fee_nqt);
        builder.recipient_id = recipient_id;
        builder.phasing_finish_height = phasing_finish_height;
        if referenced != [0u8; 32] {
            builder.referenced_transaction_full_hash = Some(referenced);
        }
        let mut tx = builder.build()?;
        if signature != [0u8; 64] {
            tx.signature = Some(signature);
        }
        Ok(tx)
    }

    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let mut r = ByteReader::new(bytes);
        let tx = Self::read(&mut r)?;
        r.finish()?;
        Ok(tx)
    }

    pub fn to_json(&self) -> Result<Value, ChainError> {
        let kind = self.kind();
        let json = TransactionJson {
            type_: kind.type_(),
            subtype: kind.subtype(),
            timestamp: self.timestamp,
            deadline: self.deadline,
            sender_public_key: hex::encode(self.sender_public_key),
            recipient: self.recipient_id.map(|id| id.to_string()),
            amount_nqt: self.amount_nqt,
            fee_nqt: self.fee_nqt,
            referenced_transaction_full_hash: self.referenced_transaction_full_hash.map(hex::encode),
            signature: self.signature.map(hex::encode),
            phasing_finish_height: self.phasing_finish_height,
            attachment: self.attachment.to_json()?,
            transaction: self.string_id().ok(),
            full_hash: self.full_hash().ok().map(hex::encode),
            sender: Some(self.sender_id().to_string()),
            block: self.linkage.map(|l| l.block_id.to_string()),
            height: self.linkage.map(|l| l.height),
        };
        Ok(serde_json::to_value(json)?)
    }

    pub fn parse_json(value: &Value) -> Result<Self, ChainError> {
        let json = TransactionJson::deserialize(value)
            .map_err(|e| ChainError::NotValid(format!("Invalid transaction JSON: {}", e)))?;
        let kind = kind::require(json.type_, json.subtype)?;
        let attachment = Attachment::parse_json(kind, &json.attachment)?;
        let sender_public_key = parse_hex_array::<32>("senderPublicKey", &json.sender_public_key)?;

        let mut builder = TransactionBuilder::new(sender_public_key, attachment, json.timestamp)
            .deadline(json.deadline)
            .amount(json.amount_nqt)
            .fee(json.fee_nqt);
        if let Some(recipient) = json.recipient.as_deref() {
            builder.recipient_id =
                Some(parse_unsigned_id(recipient)?).filter(|id| *id != 0);
        }
        if let Some(hash) = json.referenced_transaction_full_hash.as_deref() {
            let hash = parse_hex_array::<32>("referencedTransactionFullHash", hash)?;
            builder.referenced_transaction_full_hash = Some(hash).filter(|h| *h != [0u8; 32]);
        }
        builder.phasing_finish_height = json.phasing_finish_height;
        let mut tx = builder.build()?;
        if let Some(signature) = json.signature.as_deref() {
            tx.signature = Some(parse_hex_array::<64>("signature", signature)?);
        }
        if let (Some(declared), Ok(actual)) = (json.transaction.as_deref(), tx.id()) {
            if parse_unsigned_id(declared)? != actual {
                return Err(ChainError::NotValid(format!(
                    "Transaction id {} does not match its content ({})",
                    declared, actual
                )));
            }
        }
        Ok(tx)
    }
}
