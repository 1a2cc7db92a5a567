//! Per-pass duplicate detection.
//!
//! A [`DuplicateTracker`] lives for one validation pass (a candidate block, or one sweep of the
//! unconfirmed pool). Entries are keyed by the variant namespace plus a variant-specific string.
//! Count semantics for a key:
//!
//! * absent: not seen yet; the first occurrence is always allowed
//! * `0`: exhausted, every further occurrence is a duplicate
//! * `n > 0`: seen `n` times under a finite allowance

use super::attachment::Attachment;
use super::kind::TransactionKind;
use super::types::Transaction;
use crate::blockchain::ChainState;
use std::collections::HashMap;

/// Allowance used for non-exclusive keys.
pub const UNLIMITED: u32 = i32::MAX as u32;

#[derive(Debug, Clone, Default)]
pub struct DuplicateTracker {
    seen: HashMap<TransactionKind, HashMap<String, u32>>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive keys allow one occurrence; non-exclusive keys allow up to [`UNLIMITED`].
    pub fn is_duplicate(&mut self, namespace: TransactionKind, key: &str, exclusive: bool) -> bool {
        self.is_duplicate_max(namespace, key, if exclusive { 0 } else { UNLIMITED })
    }

    /// Records an occurrence of `key` and reports whether it exceeds `max_count`.
    ///
    /// `max_count == 0` marks the key exclusive. Exactly `max_count` occurrences are allowed
    /// otherwise.
    pub fn is_duplicate_max(&mut self, namespace: TransactionKind, key: &str, max_count: u32) -> bool {
        let counts = self.seen.entry(namespace).or_default();
        match counts.get_mut(key) {
            None => {
                counts.insert(key.to_string(), if max_count > 0 { 1 } else { 0 });
                false
            }
            Some(0) => true,
            Some(count) if *count < max_count => {
                *count += 1;
                false
            }
            Some(_) => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.seen.values().all(HashMap::is_empty)
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

impl Transaction {
    /// Checked once per candidate block, before [`Transaction::is_duplicate`].
    pub fn is_block_duplicate(&self, tracker: &mut DuplicateTracker, state: &dyn ChainState) -> bool {
        let kind = self.kind();
        match self.attachment() {
            // One new alias per block; updates to existing aliases are not limited here.
            Attachment::AliasAssignment(a) => {
                state.alias(&a.alias_name).is_none() && tracker.is_duplicate(kind, "", true)
            }
            Attachment::PollCreation(_)
            | Attachment::AccountInfo(_)
            | Attachment::DigitalGoodsListing(_) => {
                tracker.is_duplicate(kind, kind.name(), true)
            }
            Attachment::AssetIssuance(a) => {
                !a.is_singleton() && tracker.is_duplicate(kind, kind.name(), true)
            }
            _ => false,
        }
    }

    /// Conflicts between transactions validated together, in a block or in the pool.
    pub fn is_duplicate(&self, tracker: &mut DuplicateTracker) -> bool {
        use TransactionKind as K;
        match self.attachment() {
            Attachment::AliasAssignment(a) => {
                tracker.is_duplicate(K::AliasAssignment, &a.alias_name.to_lowercase(), true)
            }
            Attachment::AliasSell(a) => {
                tracker.is_duplicate(K::AliasAssignment, &a.alias_name.to_lowercase(), true)
            }
            Attachment::AliasBuy(a) => {
                tracker.is_duplicate(K::AliasAssignment, &a.alias_name.to_lowercase(), true)
            }
            Attachment::AliasDelete(a) => {
                tracker.is_duplicate(K::AliasAssignment, &a.alias_name.to_lowercase(), true)
            }
            Attachment::VoteCasting(v) => tracker.is_duplicate(
                K::VoteCasting,
                &format!("{}:{}", v.poll_id, self.sender_id()),
                true,
            ),
            Attachment::DigitalGoodsDelisting(d) => {
                tracker.is_duplicate(K::DigitalGoodsDelisting, &d.goods_id.to_string(), true)
            }
            Attachment::DigitalGoodsPurchase(p) => {
                tracker.is_duplicate(K::DigitalGoodsDelisting, &p.goods_id.to_string(), false)
            }
            Attachment::SetPhasingOnly(_) => {
                tracker.is_duplicate(K::SetPhasingOnly, &self.sender_id().to_string(), true)
            }
            _ => false,
        }
    }

    /// Conflicts that only matter among unconfirmed transactions.
    pub fn is_unconfirmed_duplicate(&self, tracker: &mut DuplicateTracker) -> bool {
        match self.attachment() {
            Attachment::AskOrderCancellation(c) | Attachment::BidOrderCancellation(c) => tracker
                .is_duplicate(
                    TransactionKind::AskOrderCancellation,
                    &c.order_id.to_string(),
                    true,
                ),
            _ => false,
        }
    }
}
