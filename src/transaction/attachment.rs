//! Variant-specific transaction payloads.
//!
//! Each payload has a compact binary form (part of the signed transaction bytes) and a structured
//! JSON form. Both parsers are total: malformed input is a `NotValid` error, never a partially
//! built attachment.

use super::kind::TransactionKind;
use crate::codec::{ByteReader, ByteWriter};
use crate::crypto::{sha256, Sha256Hash};
use crate::error::ChainError;
use crate::config::MAX_BALANCE_NQT;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// Field limits.
pub const MAX_ALIAS_LENGTH: usize = 100;
pub const MAX_ALIAS_URI_LENGTH: usize = 1000;
pub const ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

pub const MAX_POLL_NAME_LENGTH: usize = 100;
pub const MAX_POLL_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_POLL_OPTION_LENGTH: usize = 100;
pub const MAX_POLL_OPTION_COUNT: usize = 100;
pub const MAX_POLL_DURATION: i32 = 14 * 1440;
pub const MIN_VOTE_VALUE: i8 = -92;
pub const MAX_VOTE_VALUE: i8 = 92;
pub const NO_VOTE_VALUE: i8 = i8::MIN;

pub const MAX_ACCOUNT_NAME_LENGTH: usize = 100;
pub const MAX_ACCOUNT_DESCRIPTION_LENGTH: usize = 1000;

pub const MIN_ASSET_NAME_LENGTH: usize = 3;
pub const MAX_ASSET_NAME_LENGTH: usize = 10;
pub const MAX_ASSET_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_SINGLETON_ASSET_DESCRIPTION_LENGTH: usize = 160;
pub const MAX_ASSET_QUANTITY_QNT: i64 = MAX_BALANCE_NQT;

pub const MAX_DGS_LISTING_NAME_LENGTH: usize = 100;
pub const MAX_DGS_LISTING_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_DGS_LISTING_TAGS_LENGTH: usize = 100;
pub const MAX_DGS_LISTING_QUANTITY: i32 = 1_000_000_000;

pub const MAX_PHASING_DURATION: i16 = 14 * 1440;
pub const MAX_PHASING_WHITELIST_SIZE: usize = 10;

pub const MAX_TAGGED_DATA_NAME_LENGTH: usize = 100;
pub const MAX_TAGGED_DATA_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_TAGGED_DATA_TAGS_LENGTH: usize = 100;
pub const MAX_TAGGED_DATA_TYPE_LENGTH: usize = 100;
pub const MAX_TAGGED_DATA_CHANNEL_LENGTH: usize = 100;
pub const MAX_TAGGED_DATA_FILENAME_LENGTH: usize = 100;
pub const MAX_TAGGED_DATA_DATA_LENGTH: usize = 42 * 1024;
/// Seconds a prunable payload must be retained after its transaction timestamp.
pub const MIN_PRUNABLE_LIFETIME: i32 = 14 * 1440 * 60;

/// Unsigned 64-bit ids travel as decimal strings in structured form.
pub(crate) mod unsigned_id {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>().map_err(D::Error::custom)
    }

    pub mod vec {
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(ids: &[u64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(ids.iter().map(|id| id.to_string()))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
            Vec::<String>::deserialize(deserializer)?
                .iter()
                .map(|s| s.parse::<u64>().map_err(D::Error::custom))
                .collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasAssignment {
    #[serde(rename = "alias")]
    pub alias_name: String,
    #[serde(rename = "uri")]
    pub alias_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollCreation {
    pub name: String,
    pub description: String,
    pub options: Vec<String>,
    pub finish_height: i32,
    pub min_number_of_options: u8,
    pub max_number_of_options: u8,
    pub min_range_value: i8,
    pub max_range_value: i8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCasting {
    #[serde(rename = "poll", with = "unsigned_id")]
    pub poll_id: u64,
    #[serde(rename = "vote")]
    pub votes: Vec<i8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasSell {
    #[serde(rename = "alias")]
    pub alias_name: String,
    #[serde(rename = "priceNQT")]
    pub price_nqt: i64,
}

/// Accepts an open [`AliasSell`] offer; the amount pays the seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasBuy {
    #[serde(rename = "alias")]
    pub alias_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasDelete {
    #[serde(rename = "alias")]
    pub alias_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIssuance {
    pub name: String,
    pub description: String,
    #[serde(rename = "quantityQNT")]
    pub quantity_qnt: i64,
    pub decimals: u8,
}

impl AssetIssuance {
    /// A single indivisible unit with a short description; exempt from the issuance surcharge.
    pub fn is_singleton(&self) -> bool {
        self.quantity_qnt == 1
            && self.decimals == 0
            && self.description.chars().count() <= MAX_SINGLETON_ASSET_DESCRIPTION_LENGTH
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTransfer {
    #[serde(rename = "asset", with = "unsigned_id")]
    pub asset_id: u64,
    #[serde(rename = "quantityQNT")]
    pub quantity_qnt: i64,
}

/// Shared by ask and bid placements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacement {
    #[serde(rename = "asset", with = "unsigned_id")]
    pub asset_id: u64,
    #[serde(rename = "quantityQNT")]
    pub quantity_qnt: i64,
    #[serde(rename = "priceNQT")]
    pub price_nqt: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancellation {
    #[serde(rename = "order", with = "unsigned_id")]
    pub order_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsListing {
    pub name: String,
    pub description: String,
    pub tags: String,
    pub quantity: i32,
    #[serde(rename = "priceNQT")]
    pub price_nqt: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsDelisting {
    #[serde(rename = "goods", with = "unsigned_id")]
    pub goods_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsPurchase {
    #[serde(rename = "goods", with = "unsigned_id")]
    pub goods_id: u64,
    pub quantity: i32,
    #[serde(rename = "priceNQT")]
    pub price_nqt: i64,
    pub delivery_deadline_timestamp: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingModel {
    None,
    Account,
    Nqt,
    Asset,
    Currency,
    Transaction,
    Hash,
}

impl VotingModel {
    pub fn from_code(code: i8) -> Result<Self, ChainError> {
        Ok(match code {
            -1 => VotingModel::None,
            0 => VotingModel::Account,
            1 => VotingModel::Nqt,
            2 => VotingModel::Asset,
            3 => VotingModel::Currency,
            4 => VotingModel::Transaction,
            5 => VotingModel::Hash,
            other => {
                return Err(ChainError::NotValid(format!("Invalid voting model {}", other)))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasingParams {
    #[serde(rename = "phasingVotingModel")]
    pub voting_model: i8,
    #[serde(rename = "phasingQuorum")]
    pub quorum: i64,
    #[serde(rename = "phasingMinBalance")]
    pub min_balance: i64,
    #[serde(rename = "phasingHolding", with = "unsigned_id")]
    pub holding_id: u64,
    #[serde(rename = "phasingWhitelist", with = "unsigned_id::vec")]
    pub whitelist: Vec<u64>,
}

impl PhasingParams {
    pub fn voting_model(&self) -> Result<VotingModel, ChainError> {
        VotingModel::from_code(self.voting_model)
    }

    /// Votes count the same regardless of the voters' balances.
    pub fn is_balance_independent(&self) -> bool {
        matches!(
            VotingModel::from_code(self.voting_model),
            Ok(VotingModel::None) | Ok(VotingModel::Account)
        ) && self.min_balance == 0
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        let model = self.voting_model()?;
        if self.whitelist.len() > MAX_PHASING_WHITELIST_SIZE {
            return Err(ChainError::NotValid(format!(
                "Whitelist is too big: {}",
                self.whitelist.len()
            )));
        }
        if self.whitelist.contains(&0) {
            return Err(ChainError::NotValid("Invalid whitelisted account id 0".to_string()));
        }
        if self.min_balance < 0 {
            return Err(ChainError::NotValid(format!("Invalid min balance {}", self.min_balance)));
        }
        match model {
            VotingModel::None => {
                if self.quorum != 0 || !self.whitelist.is_empty() || self.min_balance != 0 {
                    return Err(ChainError::NotValid(
                        "Quorum, whitelist and min balance must be empty when voting model is NONE"
                            .to_string(),
                    ));
                }
            }
            _ => {
                if self.quorum <= 0 {
                    return Err(ChainError::NotValid(format!("Invalid quorum {}", self.quorum)));
                }
                if model == VotingModel::Account
                    && !self.whitelist.is_empty()
                    && self.quorum > self.whitelist.len() as i64
                {
                    return Err(ChainError::NotValid(format!(
                        "Quorum of {} cannot be achieved by a whitelist of {}",
                        self.quorum,
                        self.whitelist.len()
                    )));
                }
                if matches!(model, VotingModel::Asset | VotingModel::Currency) && self.holding_id == 0 {
                    return Err(ChainError::NotValid("Missing holding id".to_string()));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPhasingOnly {
    #[serde(flatten)]
    pub phasing_params: PhasingParams,
    #[serde(rename = "controlMaxFees")]
    pub max_fees: i64,
    #[serde(rename = "controlMinDuration")]
    pub min_duration: i16,
    #[serde(rename = "controlMaxDuration")]
    pub max_duration: i16,
}

/// Full content of an uploaded data item; absent once pruned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedDataPayload {
    pub name: String,
    pub description: String,
    pub tags: String,
    pub data_type: String,
    pub channel: String,
    pub is_text: bool,
    pub filename: String,
    pub data: Vec<u8>,
}

impl TaggedDataPayload {
    pub fn hash(&self) -> Sha256Hash {
        let mut w = ByteWriter::new();
        w.put_bytes(self.name.as_bytes())
            .put_bytes(self.description.as_bytes())
            .put_bytes(self.tags.as_bytes())
            .put_bytes(self.data_type.as_bytes())
            .put_bytes(self.channel.as_bytes())
            .put_u8(self.is_text as u8)
            .put_bytes(self.filename.as_bytes())
            .put_bytes(&self.data);
        sha256(&w.into_bytes())
    }

    fn full_size(&self) -> usize {
        self.name.len()
            + self.description.len()
            + self.tags.len()
            + self.data_type.len()
            + self.channel.len()
            + self.filename.len()
            + self.data.len()
    }
}

/// Prunable upload: only the content hash is part of the signed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedDataUpload {
    payload: Option<TaggedDataPayload>,
    hash: Sha256Hash,
}

impl TaggedDataUpload {
    pub fn new(payload: TaggedDataPayload) -> Self {
        let hash = payload.hash();
        Self {
            payload: Some(payload),
            hash,
        }
    }

    pub fn pruned(hash: Sha256Hash) -> Self {
        Self {
            payload: None,
            hash,
        }
    }

    pub fn payload(&self) -> Option<&TaggedDataPayload> {
        self.payload.as_ref()
    }

    pub fn hash(&self) -> &Sha256Hash {
        &self.hash
    }

    /// Bytes charged for by the size-based fee; zero once pruned.
    pub fn full_size(&self) -> usize {
        self.payload.as_ref().map_or(0, TaggedDataPayload::full_size)
    }

    fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("hash".into(), Value::String(hex::encode(self.hash)));
        if let Some(p) = &self.payload {
            obj.insert("name".into(), json!(p.name));
            obj.insert("description".into(), json!(p.description));
            obj.insert("tags".into(), json!(p.tags));
            obj.insert("type".into(), json!(p.data_type));
            obj.insert("channel".into(), json!(p.channel));
            obj.insert("isText".into(), json!(p.is_text));
            obj.insert("filename".into(), json!(p.filename));
            let data = if p.is_text {
                String::from_utf8_lossy(&p.data).into_owned()
            } else {
                hex::encode(&p.data)
            };
            obj.insert("data".into(), Value::String(data));
        }
        Value::Object(obj)
    }

    fn from_json(value: &Value) -> Result<Self, ChainError> {
        let str_field = |key: &str| -> Result<String, ChainError> {
            match value.get(key) {
                None | Some(Value::Null) => Ok(String::new()),
                Some(Value::String(s)) => Ok(s.clone()),
                Some(other) => Err(ChainError::NotValid(format!(
                    "Tagged data field '{}' must be a string, got {}",
                    key, other
                ))),
            }
        };
        let declared_hash = match value.get("hash").and_then(Value::as_str) {
            Some(h) => Some(crate::crypto::parse_hex_array::<32>("hash", h)?),
            None => None,
        };
        let Some(data) = value.get("data").and_then(Value::as_str) else {
            return declared_hash.map(Self::pruned).ok_or_else(|| {
                ChainError::NotValid("Tagged data carries neither data nor hash".to_string())
            });
        };
        let is_text = value.get("isText").and_then(Value::as_bool).unwrap_or(true);
        let data = if is_text {
            data.as_bytes().to_vec()
        } else {
            hex::decode(data)?
        };
        let upload = Self::new(TaggedDataPayload {
            name: str_field("name")?,
            description: str_field("description")?,
            tags: str_field("tags")?,
            data_type: str_field("type")?,
            channel: str_field("channel")?,
            is_text,
            filename: str_field("filename")?,
            data,
        });
        if let Some(h) = declared_hash {
            if h != upload.hash {
                return Err(ChainError::NotValid(
                    "Tagged data hash does not match its content".to_string(),
                ));
            }
        }
        Ok(upload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    OrdinaryPayment,
    ArbitraryMessage,
    AliasAssignment(AliasAssignment),
    PollCreation(PollCreation),
    VoteCasting(VoteCasting),
    AccountInfo(AccountInfo),
    AliasSell(AliasSell),
    AliasBuy(AliasBuy),
    AliasDelete(AliasDelete),
    AssetIssuance(AssetIssuance),
    AssetTransfer(AssetTransfer),
    AskOrderPlacement(OrderPlacement),
    BidOrderPlacement(OrderPlacement),
    AskOrderCancellation(OrderCancellation),
    BidOrderCancellation(OrderCancellation),
    DigitalGoodsListing(GoodsListing),
    DigitalGoodsDelisting(GoodsDelisting),
    DigitalGoodsPurchase(GoodsPurchase),
    SetPhasingOnly(SetPhasingOnly),
    TaggedDataUpload(TaggedDataUpload),
    MetisMetadata,
    MetisData,
}

fn read_phasing_params(r: &mut ByteReader<'_>) -> Result<PhasingParams, ChainError> {
    let voting_model = r.i8()?;
    let quorum = r.i64()?;
    let min_balance = r.i64()?;
    let holding_id = r.u64()?;
    let count = r.u8()? as usize;
    if count > MAX_PHASING_WHITELIST_SIZE {
        return Err(ChainError::NotValid(format!("Whitelist is too big: {}", count)));
    }
    let whitelist = (0..count).map(|_| r.u64()).collect::<Result<Vec<_>, _>>()?;
    Ok(PhasingParams {
        voting_model,
        quorum,
        min_balance,
        holding_id,
        whitelist,
    })
}

impl Attachment {
    pub fn kind(&self) -> TransactionKind {
        use TransactionKind as K;
        match self {
            Attachment::OrdinaryPayment => K::OrdinaryPayment,
            Attachment::ArbitraryMessage => K::ArbitraryMessage,
            Attachment::AliasAssignment(_) => K::AliasAssignment,
            Attachment::PollCreation(_) => K::PollCreation,
            Attachment::VoteCasting(_) => K::VoteCasting,
            Attachment::AccountInfo(_) => K::AccountInfo,
            Attachment::AliasSell(_) => K::AliasSell,
            Attachment::AliasBuy(_) => K::AliasBuy,
            Attachment::AliasDelete(_) => K::AliasDelete,
            Attachment::AssetIssuance(_) => K::AssetIssuance,
            Attachment::AssetTransfer(_) => K::AssetTransfer,
            Attachment::AskOrderPlacement(_) => K::AskOrderPlacement,
            Attachment::BidOrderPlacement(_) => K::BidOrderPlacement,
            Attachment::AskOrderCancellation(_) => K::AskOrderCancellation,
            Attachment::BidOrderCancellation(_) => K::BidOrderCancellation,
            Attachment::DigitalGoodsListing(_) => K::DigitalGoodsListing,
            Attachment::DigitalGoodsDelisting(_) => K::DigitalGoodsDelisting,
            Attachment::DigitalGoodsPurchase(_) => K::DigitalGoodsPurchase,
            Attachment::SetPhasingOnly(_) => K::SetPhasingOnly,
            Attachment::TaggedDataUpload(_) => K::TaggedDataUpload,
            Attachment::MetisMetadata => K::MetisMetadata,
            Attachment::MetisData => K::MetisData,
        }
    }

    pub fn parse_bytes(kind: TransactionKind, r: &mut ByteReader<'_>) -> Result<Self, ChainError> {
        use TransactionKind as K;
        Ok(match kind {
            K::OrdinaryPayment => Attachment::OrdinaryPayment,
            K::ArbitraryMessage => Attachment::ArbitraryMessage,
            K::MetisMetadata => Attachment::MetisMetadata,
            K::MetisData => Attachment::MetisData,
            K::AliasAssignment => Attachment::AliasAssignment(AliasAssignment {
                alias_name: r.short_str(MAX_ALIAS_LENGTH)?,
                alias_uri: r.str(MAX_ALIAS_URI_LENGTH)?,
            }),
            K::PollCreation => {
                let name = r.str(MAX_POLL_NAME_LENGTH)?;
                let description = r.str(MAX_POLL_DESCRIPTION_LENGTH)?;
                let finish_height = r.i32()?;
                let count = r.u8()? as usize;
                if count > MAX_POLL_OPTION_COUNT {
                    return Err(ChainError::NotValid(format!("Too many poll options: {}", count)));
                }
                let options = (0..count)
                    .map(|_| r.str(MAX_POLL_OPTION_LENGTH))
                    .collect::<Result<Vec<_>, _>>()?;
                Attachment::PollCreation(PollCreation {
                    name,
                    description,
                    options,
                    finish_height,
                    min_number_of_options: r.u8()?,
                    max_number_of_options: r.u8()?,
                    min_range_value: r.i8()?,
                    max_range_value: r.i8()?,
                })
            }
            K::VoteCasting => {
                let poll_id = r.u64()?;
                let count = r.u8()? as usize;
                if count > MAX_POLL_OPTION_COUNT {
                    return Err(ChainError::NotValid(format!("Too many votes: {}", count)));
                }
                let votes = (0..count).map(|_| r.i8()).collect::<Result<Vec<_>, _>>()?;
                Attachment::VoteCasting(VoteCasting { poll_id, votes })
            }
            K::AccountInfo => Attachment::AccountInfo(AccountInfo {
                name: r.short_str(MAX_ACCOUNT_NAME_LENGTH)?,
                description: r.str(MAX_ACCOUNT_DESCRIPTION_LENGTH)?,
            }),
            K::AliasSell => Attachment::AliasSell(AliasSell {
                alias_name: r.short_str(MAX_ALIAS_LENGTH)?,
                price_nqt: r.i64()?,
            }),
            K::AliasBuy => Attachment::AliasBuy(AliasBuy {
                alias_name: r.short_str(MAX_ALIAS_LENGTH)?,
            }),
            K::AliasDelete => Attachment::AliasDelete(AliasDelete {
                alias_name: r.short_str(MAX_ALIAS_LENGTH)?,
            }),
            K::AssetIssuance => Attachment::AssetIssuance(AssetIssuance {
                name: r.short_str(MAX_ASSET_NAME_LENGTH)?,
                description: r.str(MAX_ASSET_DESCRIPTION_LENGTH)?,
                quantity_qnt: r.i64()?,
                decimals: r.u8()?,
            }),
            K::AssetTransfer => Attachment::AssetTransfer(AssetTransfer {
                asset_id: r.u64()?,
                quantity_qnt: r.i64()?,
            }),
            K::AskOrderPlacement | K::BidOrderPlacement => {
                let order = OrderPlacement {
                    asset_id: r.u64()?,
                    quantity_qnt: r.i64()?,
                    price_nqt: r.i64()?,
                };
                if kind == K::AskOrderPlacement {
                    Attachment::AskOrderPlacement(order)
                } else {
                    Attachment::BidOrderPlacement(order)
                }
            }
            K::AskOrderCancellation => Attachment::AskOrderCancellation(OrderCancellation {
                order_id: r.u64()?,
            }),
            K::BidOrderCancellation => Attachment::BidOrderCancellation(OrderCancellation {
                order_id: r.u64()?,
            }),
            K::DigitalGoodsListing => Attachment::DigitalGoodsListing(GoodsListing {
                name: r.str(MAX_DGS_LISTING_NAME_LENGTH)?,
                description: r.str(MAX_DGS_LISTING_DESCRIPTION_LENGTH)?,
                tags: r.str(MAX_DGS_LISTING_TAGS_LENGTH)?,
                quantity: r.i32()?,
                price_nqt: r.i64()?,
            }),
            K::DigitalGoodsDelisting => Attachment::DigitalGoodsDelisting(GoodsDelisting {
                goods_id: r.u64()?,
            }),
            K::DigitalGoodsPurchase => Attachment::DigitalGoodsPurchase(GoodsPurchase {
                goods_id: r.u64()?,
                quantity: r.i32()?,
                price_nqt: r.i64()?,
                delivery_deadline_timestamp: r.i32()?,
            }),
            K::SetPhasingOnly => Attachment::SetPhasingOnly(SetPhasingOnly {
                phasing_params: read_phasing_params(r)?,
                max_fees: r.i64()?,
                min_duration: r.i16()?,
                max_duration: r.i16()?,
            }),
            K::TaggedDataUpload => Attachment::TaggedDataUpload(TaggedDataUpload::pruned(r.array()?)),
        })
    }

    pub fn write_bytes(&self, w: &mut ByteWriter) -> Result<(), ChainError> {
        match self {
            Attachment::OrdinaryPayment
            | Attachment::ArbitraryMessage
            | Attachment::MetisMetadata
            | Attachment::MetisData => {}
            Attachment::AliasAssignment(a) => {
                w.put_short_str(&a.alias_name)?.put_str(&a.alias_uri)?;
            }
            Attachment::PollCreation(p) => {
                w.put_str(&p.name)?
                    .put_str(&p.description)?
                    .put_i32(p.finish_height)
                    .put_u8(p.options.len() as u8);
                for option in &p.options {
                    w.put_str(option)?;
                }
                w.put_u8(p.min_number_of_options)
                    .put_u8(p.max_number_of_options)
                    .put_i8(p.min_range_value)
                    .put_i8(p.max_range_value);
            }
            Attachment::VoteCasting(v) => {
                w.put_u64(v.poll_id).put_u8(v.votes.len() as u8);
                for vote in &v.votes {
                    w.put_i8(*vote);
                }
            }
            Attachment::AccountInfo(a) => {
                w.put_short_str(&a.name)?.put_str(&a.description)?;
            }
            Attachment::AliasSell(a) => {
                w.put_short_str(&a.alias_name)?.put_i64(a.price_nqt);
            }
            Attachment::AliasBuy(a) => {
                w.put_short_str(&a.alias_name)?;
            }
            Attachment::AliasDelete(a) => {
                w.put_short_str(&a.alias_name)?;
            }
            Attachment::AssetIssuance(a) => {
                w.put_short_str(&a.name)?
                    .put_str(&a.description)?
                    .put_i64(a.quantity_qnt)
                    .put_u8(a.decimals);
            }
            Attachment::AssetTransfer(a) => {
                w.put_u64(a.asset_id).put_i64(a.quantity_qnt);
            }
            Attachment::AskOrderPlacement(o) | Attachment::BidOrderPlacement(o) => {
                w.put_u64(o.asset_id).put_i64(o.quantity_qnt).put_i64(o.price_nqt);
            }
            Attachment::AskOrderCancellation(c) | Attachment::BidOrderCancellation(c) => {
                w.put_u64(c.order_id);
            }
            Attachment::DigitalGoodsListing(g) => {
                w.put_str(&g.name)?
                    .put_str(&g.description)?
                    .put_str(&g.tags)?
                    .put_i32(g.quantity)
                    .put_i64(g.price_nqt);
            }
            Attachment::DigitalGoodsDelisting(d) => {
                w.put_u64(d.goods_id);
            }
            Attachment::DigitalGoodsPurchase(p) => {
                w.put_u64(p.goods_id)
                    .put_i32(p.quantity)
                    .put_i64(p.price_nqt)
                    .put_i32(p.delivery_deadline_timestamp);
            }
            Attachment::SetPhasingOnly(s) => {
                let p = &s.phasing_params;
                w.put_i8(p.voting_model)
                    .put_i64(p.quorum)
                    .put_i64(p.min_balance)
                    .put_u64(p.holding_id)
                    .put_u8(p.whitelist.len() as u8);
                for id in &p.whitelist {
                    w.put_u64(*id);
                }
                w.put_i64(s.max_fees)
                    .put_i16(s.min_duration)
                    .put_i16(s.max_duration);
            }
            Attachment::TaggedDataUpload(t) => {
                w.put_bytes(&t.hash);
            }
        }
        Ok(())
    }

    /// Length of the binary form.
    pub fn size(&self) -> Result<usize, ChainError> {
        let mut w = ByteWriter::new();
        self.write_bytes(&mut w)?;
        Ok(w.len())
    }

    pub fn to_json(&self) -> Result<Value, ChainError> {
        let value = match self {
            Attachment::OrdinaryPayment
            | Attachment::ArbitraryMessage
            | Attachment::MetisMetadata
            | Attachment::MetisData => Value::Object(Map::new()),
            Attachment::AliasAssignment(a) => serde_json::to_value(a)?,
            Attachment::PollCreation(p) => serde_json::to_value(p)?,
            Attachment::VoteCasting(v) => serde_json::to_value(v)?,
            Attachment::AccountInfo(a) => serde_json::to_value(a)?,
            Attachment::AliasSell(a) => serde_json::to_value(a)?,
            Attachment::AliasBuy(a) => serde_json::to_value(a)?,
            Attachment::AliasDelete(a) => serde_json::to_value(a)?,
            Attachment::AssetIssuance(a) => serde_json::to_value(a)?,
            Attachment::AssetTransfer(a) => serde_json::to_value(a)?,
            Attachment::AskOrderPlacement(o) | Attachment::BidOrderPlacement(o) => {
                serde_json::to_value(o)?
            }
            Attachment::AskOrderCancellation(c) | Attachment::BidOrderCancellation(c) => {
                serde_json::to_value(c)?
            }
            Attachment::DigitalGoodsListing(g) => serde_json::to_value(g)?,
            Attachment::DigitalGoodsDelisting(d) => serde_json::to_value(d)?,
            Attachment::DigitalGoodsPurchase(p) => serde_json::to_value(p)?,
            Attachment::SetPhasingOnly(s) => serde_json::to_value(s)?,
            Attachment::TaggedDataUpload(t) => t.to_json(),
        };
        Ok(value)
    }

    pub fn parse_json(kind: TransactionKind, value: &Value) -> Result<Self, ChainError> {
        use TransactionKind as K;
        fn field<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, ChainError> {
            T::deserialize(value)
                .map_err(|e| ChainError::NotValid(format!("Invalid attachment: {}", e)))
        }
        Ok(match kind {
            K::OrdinaryPayment => Attachment::OrdinaryPayment,
            K::ArbitraryMessage => Attachment::ArbitraryMessage,
            K::MetisMetadata => Attachment::MetisMetadata,
            K::MetisData => Attachment::MetisData,
            K::AliasAssignment => Attachment::AliasAssignment(field(value)?),
            K::PollCreation => Attachment::PollCreation(field(value)?),
            K::VoteCasting => Attachment::VoteCasting(field(value)?),
            K::AccountInfo => Attachment::AccountInfo(field(value)?),
            K::AliasSell => Attachment::AliasSell(field(value)?),
            K::AliasBuy => Attachment::AliasBuy(field(value)?),
            K::AliasDelete => Attachment::AliasDelete(field(value)?),
            K::AssetIssuance => Attachment::AssetIssuance(field(value)?),
            K::AssetTransfer => Attachment::AssetTransfer(field(value)?),
            K::AskOrderPlacement => Attachment::AskOrderPlacement(field(value)?),
            K::BidOrderPlacement => Attachment::BidOrderPlacement(field(value)?),
            K::AskOrderCancellation => Attachment::AskOrderCancellation(field(value)?),
            K::BidOrderCancellation => Attachment::BidOrderCancellation(field(value)?),
            K::DigitalGoodsListing => Attachment::DigitalGoodsListing(field(value)?),
            K::DigitalGoodsDelisting => Attachment::DigitalGoodsDelisting(field(value)?),
            K::DigitalGoodsPurchase => Attachment::DigitalGoodsPurchase(field(value)?),
            K::SetPhasingOnly => Attachment::SetPhasingOnly(field(value)?),
            K::TaggedDataUpload => Attachment::TaggedDataUpload(TaggedDataUpload::from_json(value)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_round_trip(attachment: &Attachment) -> Attachment {
        let mut w = ByteWriter::new();
        attachment.write_bytes(&mut w).unwrap();
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        let parsed = Attachment::parse_bytes(attachment.kind(), &mut r).unwrap();
        r.finish().unwrap();
        parsed
    }

    #[test]
    fn test_alias_assignment_binary_and_json() {
        let a = Attachment::AliasAssignment(AliasAssignment {
            alias_name: "foo".into(),
            alias_uri: "https://example.org".into(),
        });
        assert_eq!(binary_round_trip(&a), a);
        let json = a.to_json().unwrap();
        assert_eq!(json["alias"], "foo");
        assert_eq!(Attachment::parse_json(a.kind(), &json).unwrap(), a);
    }

    #[test]
    fn test_ids_are_decimal_strings_in_json() {
        let a = Attachment::AssetTransfer(AssetTransfer {
            asset_id: u64::MAX,
            quantity_qnt: 5,
        });
        let json = a.to_json().unwrap();
        assert_eq!(json["asset"], "18446744073709551615");
        assert_eq!(json["quantityQNT"], 5);
    }

    #[test]
    fn test_truncated_attachment_rejected() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        let err = Attachment::parse_bytes(TransactionKind::AssetTransfer, &mut r).unwrap_err();
        assert!(matches!(err, ChainError::NotValid(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let value = json!({ "alias": 7 });
        assert!(Attachment::parse_json(TransactionKind::AliasDelete, &value).is_err());
    }

    #[test]
    fn test_goods_listing_binary_and_json() {
        let a = Attachment::DigitalGoodsListing(GoodsListing {
            name: "lamp".into(),
            description: "brass, working".into(),
            tags: "light,brass".into(),
            quantity: 3,
            price_nqt: 25 * crate::config::ONE_COIN,
        });
        assert_eq!(binary_round_trip(&a), a);
        let json = a.to_json().unwrap();
        assert_eq!(json["priceNQT"], 25 * crate::config::ONE_COIN);
        assert_eq!(json["tags"], "light,brass");
        assert_eq!(Attachment::parse_json(a.kind(), &json).unwrap(), a);
    }

    #[test]
    fn test_poll_round_trip() {
        let a = Attachment::PollCreation(PollCreation {
            name: "colour".into(),
            description: "favourite colour".into(),
            options: vec!["red".into(), "green".into()],
            finish_height: 5_000,
            min_number_of_options: 1,
            max_number_of_options: 1,
            min_range_value: 0,
            max_range_value: 1,
        });
        assert_eq!(binary_round_trip(&a), a);
    }

    #[test]
    fn test_tagged_data_binary_form_is_hash_only() {
        let upload = TaggedDataUpload::new(TaggedDataPayload {
            name: "notes".into(),
            description: String::new(),
            tags: "a,b".into(),
            data_type: "text/plain".into(),
            channel: String::new(),
            is_text: true,
            filename: "notes.txt".into(),
            data: b"hello".to_vec(),
        });
        let a = Attachment::TaggedDataUpload(upload.clone());
        assert_eq!(a.size().unwrap(), 32);
        match binary_round_trip(&a) {
            Attachment::TaggedDataUpload(parsed) => {
                assert!(parsed.payload().is_none());
                assert_eq!(parsed.hash(), upload.hash());
            }
            other => panic!("unexpected {:?}", other),
        }
        let json = a.to_json().unwrap();
        assert_eq!(Attachment::parse_json(a.kind(), &json).unwrap(), a);
    }

    #[test]
    fn test_tagged_data_hash_mismatch() {
        let value = json!({ "hash": hex::encode([0u8; 32]), "name": "x", "data": "y" });
        assert!(Attachment::parse_json(TransactionKind::TaggedDataUpload, &value).is_err());
    }

    #[test]
    fn test_singleton_issuance() {
        let mut issuance = AssetIssuance {
            name: "deed".into(),
            description: "one".into(),
            quantity_qnt: 1,
            decimals: 0,
        };
        assert!(issuance.is_singleton());
        issuance.quantity_qnt = 2;
        assert!(!issuance.is_singleton());
    }

    #[test]
    fn test_phasing_params_validation() {
        let mut p = PhasingParams {
            voting_model: -1,
            quorum: 0,
            min_balance: 0,
            holding_id: 0,
            whitelist: vec![],
        };
        assert!(p.validate().is_ok());
        assert!(p.is_balance_independent());
        p.quorum = 1;
        assert!(p.validate().is_err());
        p.voting_model = 0;
        p.whitelist = vec![1];
        assert!(p.validate().is_ok());
        p.quorum = 2;
        assert!(p.validate().is_err());
        p.voting_model = 9;
        assert!(p.validate().is_err());
    }
}
