//! Transaction variant registry.
//!
//! Every variant the core understands is a [`TransactionKind`]; its static properties live in one
//! immutable table so lookups by wire byte pair and by name go through the same rows.

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TYPE_PAYMENT: u8 = 0;
pub const TYPE_MESSAGING: u8 = 1;
pub const TYPE_COLORED_COINS: u8 = 2;
pub const TYPE_DIGITAL_GOODS: u8 = 3;
pub const TYPE_ACCOUNT_CONTROL: u8 = 4;
pub const TYPE_MONETARY_SYSTEM: u8 = 5;
pub const TYPE_DATA: u8 = 6;
pub const TYPE_SHUFFLING: u8 = 7;
pub const TYPE_DATA_FS: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransactionKind {
    OrdinaryPayment,
    ArbitraryMessage,
    AliasAssignment,
    PollCreation,
    VoteCasting,
    AccountInfo,
    AliasSell,
    AliasBuy,
    AliasDelete,
    AssetIssuance,
    AssetTransfer,
    AskOrderPlacement,
    BidOrderPlacement,
    AskOrderCancellation,
    BidOrderCancellation,
    DigitalGoodsListing,
    DigitalGoodsDelisting,
    DigitalGoodsPurchase,
    SetPhasingOnly,
    TaggedDataUpload,
    MetisMetadata,
    MetisData,
}

/// Static properties of one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantInfo {
    pub kind: TransactionKind,
    pub type_: u8,
    pub subtype: u8,
    pub name: &'static str,
    pub can_have_recipient: bool,
    pub must_have_recipient: bool,
    pub is_phasing_safe: bool,
    pub is_phasable: bool,
    pub is_prunable: bool,
}

const fn variant(
    kind: TransactionKind,
    type_: u8,
    subtype: u8,
    name: &'static str,
    recipient: Recipient,
    is_phasing_safe: bool,
) -> VariantInfo {
    let (can_have_recipient, must_have_recipient) = match recipient {
        Recipient::None => (false, false),
        Recipient::Optional => (true, false),
        Recipient::Required => (true, true),
    };
    VariantInfo {
        kind,
        type_,
        subtype,
        name,
        can_have_recipient,
        must_have_recipient,
        is_phasing_safe,
        is_phasable: true,
        is_prunable: false,
    }
}

#[derive(Clone, Copy)]
enum Recipient {
    None,
    Optional,
    Required,
}

use Recipient::{None as NoRecipient, Optional, Required};
use TransactionKind as K;

pub static VARIANTS: [VariantInfo; 22] = [
    variant(K::OrdinaryPayment, TYPE_PAYMENT, 0, "OrdinaryPayment", Required, true),
    variant(K::ArbitraryMessage, TYPE_MESSAGING, 0, "ArbitraryMessage", Optional, false),
    variant(K::AliasAssignment, TYPE_MESSAGING, 1, "AliasAssignment", NoRecipient, false),
    variant(K::PollCreation, TYPE_MESSAGING, 2, "PollCreation", NoRecipient, false),
    variant(K::VoteCasting, TYPE_MESSAGING, 3, "VoteCasting", NoRecipient, false),
    variant(K::AccountInfo, TYPE_MESSAGING, 5, "AccountInfo", NoRecipient, true),
    variant(K::AliasSell, TYPE_MESSAGING, 6, "AliasSell", Optional, false),
    variant(K::AliasBuy, TYPE_MESSAGING, 7, "AliasBuy", Required, false),
    variant(K::AliasDelete, TYPE_MESSAGING, 8, "AliasDelete", NoRecipient, false),
    variant(K::AssetIssuance, TYPE_COLORED_COINS, 0, "AssetIssuance", NoRecipient, true),
    variant(K::AssetTransfer, TYPE_COLORED_COINS, 1, "AssetTransfer", Required, true),
    variant(K::AskOrderPlacement, TYPE_COLORED_COINS, 2, "AskOrderPlacement", NoRecipient, true),
    variant(K::BidOrderPlacement, TYPE_COLORED_COINS, 3, "BidOrderPlacement", NoRecipient, true),
    variant(K::AskOrderCancellation, TYPE_COLORED_COINS, 4, "AskOrderCancellation", NoRecipient, true),
    variant(K::BidOrderCancellation, TYPE_COLORED_COINS, 5, "BidOrderCancellation", NoRecipient, true),
    variant(K::DigitalGoodsListing, TYPE_DIGITAL_GOODS, 0, "DigitalGoodsListing", NoRecipient, true),
    variant(K::DigitalGoodsDelisting, TYPE_DIGITAL_GOODS, 1, "DigitalGoodsDelisting", NoRecipient, true),
    variant(K::DigitalGoodsPurchase, TYPE_DIGITAL_GOODS, 4, "DigitalGoodsPurchase", Required, false),
    variant(K::SetPhasingOnly, TYPE_ACCOUNT_CONTROL, 1, "SetPhasingOnly", NoRecipient, false),
    VariantInfo {
        is_phasable: false,
        is_prunable: true,
        ..variant(K::TaggedDataUpload, TYPE_DATA, 0, "TaggedDataUpload", NoRecipient, false)
    },
    variant(K::MetisMetadata, TYPE_DATA_FS, 0, "MetisMetaData", Optional, false),
    variant(K::MetisData, TYPE_DATA_FS, 1, "MetisData", Optional, false),
];

/// Byte pairs of retired variants. Looking one up is a hard error, never "no such variant".
pub static RETIRED: [(u8, u8, &str); 1] = [(TYPE_MESSAGING, 4, "HubAnnouncement")];

/// Resolves a wire byte pair.
///
/// `Ok(None)` means no variant is registered for the pair (including the monetary-system and
/// shuffling families, which are handled outside this core).
pub fn find(type_: u8, subtype: u8) -> Result<Option<TransactionKind>, ChainError> {
    if let Some(&(_, _, name)) = RETIRED
        .iter()
        .find(|(t, s, _)| *t == type_ && *s == subtype)
    {
        return Err(ChainError::RetiredVariant {
            type_,
            subtype,
            name,
        });
    }
    Ok(VARIANTS
        .iter()
        .find(|v| v.type_ == type_ && v.subtype == subtype)
        .map(|v| v.kind))
}

/// Like [`find`], but an unknown pair is an error.
pub fn require(type_: u8, subtype: u8) -> Result<TransactionKind, ChainError> {
    find(type_, subtype)?.ok_or(ChainError::UnknownVariant { type_, subtype })
}

impl TransactionKind {
    pub fn info(self) -> &'static VariantInfo {
        // VARIANTS is declared in enum order.
        &VARIANTS[self as usize]
    }

    pub fn type_(self) -> u8 {
        self.info().type_
    }

    pub fn subtype(self) -> u8 {
        self.info().subtype
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn can_have_recipient(self) -> bool {
        self.info().can_have_recipient
    }

    pub fn must_have_recipient(self) -> bool {
        self.info().must_have_recipient
    }

    pub fn is_phasing_safe(self) -> bool {
        self.info().is_phasing_safe
    }

    pub fn is_phasable(self) -> bool {
        self.info().is_phasable
    }

    pub fn is_prunable(self) -> bool {
        self.info().is_prunable
    }

    pub fn from_name(name: &str) -> Option<TransactionKind> {
        VARIANTS.iter().find(|v| v.name == name).map(|v| v.kind)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name(), self.type_(), self.subtype())
    }
}
