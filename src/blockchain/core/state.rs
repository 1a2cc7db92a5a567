use crate::crypto::AccountId;
use crate::transaction::attachment::{PhasingParams, TaggedDataPayload};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alias {
    pub name: String,
    pub uri: String,
    pub account_id: AccountId,
    pub timestamp: i32,
}

/// Standing offer to sell an alias, optionally to one buyer only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasOffer {
    pub price_nqt: i64,
    pub buyer_id: Option<AccountId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub asset_id: u64,
    pub account_id: AccountId,
    pub name: String,
    pub description: String,
    pub initial_quantity_qnt: i64,
    pub quantity_qnt: i64,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Poll {
    pub poll_id: u64,
    pub account_id: AccountId,
    pub name: String,
    pub option_count: usize,
    pub finish_height: i32,
    pub min_number_of_options: u8,
    pub max_number_of_options: u8,
    pub min_range_value: i8,
    pub max_range_value: i8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub order_id: u64,
    pub account_id: AccountId,
    pub asset_id: u64,
    pub quantity_qnt: i64,
    pub price_nqt: i64,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Goods {
    pub goods_id: u64,
    pub seller_id: AccountId,
    pub name: String,
    pub description: String,
    pub tags: String,
    pub quantity: i32,
    pub price_nqt: i64,
    pub delisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Purchase {
    pub purchase_id: u64,
    pub buyer_id: AccountId,
    pub goods_id: u64,
    pub seller_id: AccountId,
    pub quantity: i32,
    pub price_nqt: i64,
    pub delivery_deadline_timestamp: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasingOnlyControl {
    pub params: PhasingParams,
    pub max_fees: i64,
    pub min_duration: i16,
    pub max_duration: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedData {
    pub transaction_id: u64,
    pub account_id: AccountId,
    pub transaction_timestamp: i32,
    pub payload: Option<TaggedDataPayload>,
}

/// State owned by the attachment handlers (aliases, assets, polls, orders, goods and so on).
///
/// Validation reads it, apply hooks write it. Storage and indexing are the implementor's concern.
pub trait ChainState {
    fn alias(&self, name: &str) -> Option<&Alias>;
    fn alias_offer(&self, name: &str) -> Option<&AliasOffer>;
    fn asset(&self, asset_id: u64) -> Option<&Asset>;
    fn poll(&self, poll_id: u64) -> Option<&Poll>;
    fn has_voted(&self, poll_id: u64, voter: AccountId) -> bool;
    fn ask_order(&self, order_id: u64) -> Option<&Order>;
    fn bid_order(&self, order_id: u64) -> Option<&Order>;
    fn goods(&self, goods_id: u64) -> Option<&Goods>;
    fn account_info(&self, account: AccountId) -> Option<&AccountInfo>;
    fn phasing_only(&self, account: AccountId) -> Option<&PhasingOnlyControl>;
    fn tagged_data(&self, transaction_id: u64) -> Option<&TaggedData>;
    fn is_tagged_data_pruned(&self, transaction_id: u64) -> bool;

    fn put_alias(&mut self, alias: Alias);
    fn set_alias_offer(&mut self, name: &str, offer: Option<AliasOffer>);
    fn delete_alias(&mut self, name: &str);
    fn add_asset(&mut self, asset: Asset);
    /// Removes `quantity_qnt` units from circulation.
    fn burn_asset(&mut self, asset_id: u64, quantity_qnt: i64);
    fn add_poll(&mut self, poll: Poll);
    fn add_vote(&mut self, poll_id: u64, voter: AccountId, votes: Vec<i8>);
    fn add_ask_order(&mut self, order: Order);
    fn add_bid_order(&mut self, order: Order);
    fn remove_ask_order(&mut self, order_id: u64) -> Option<Order>;
    fn remove_bid_order(&mut self, order_id: u64) -> Option<Order>;
    fn list_goods(&mut self, goods: Goods);
    fn delist_goods(&mut self, goods_id: u64);
    fn add_purchase(&mut self, purchase: Purchase);
    fn set_account_info(&mut self, account: AccountId, info: AccountInfo);
    fn set_phasing_only(&mut self, account: AccountId, control: Option<PhasingOnlyControl>);
    fn add_tagged_data(&mut self, data: TaggedData);
}

fn alias_key(name: &str) -> String {
    name.to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryChainState {
    aliases: HashMap<String, Alias>,
    alias_offers: HashMap<String, AliasOffer>,
    assets: HashMap<u64, Asset>,
    polls: HashMap<u64, Poll>,
    votes: HashMap<(u64, AccountId), Vec<i8>>,
    ask_orders: HashMap<u64, Order>,
    bid_orders: HashMap<u64, Order>,
    goods: HashMap<u64, Goods>,
    purchases: HashMap<u64, Purchase>,
    account_info: HashMap<AccountId, AccountInfo>,
    phasing_only: HashMap<AccountId, PhasingOnlyControl>,
    tagged_data: HashMap<u64, TaggedData>,
    pruned: HashSet<u64>,
}

impl InMemoryChainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the payload of a prunable upload, keeping its metadata.
    pub fn prune_tagged_data(&mut self, transaction_id: u64) -> bool {
        match self.tagged_data.get_mut(&transaction_id) {
            Some(data) => {
                data.payload = None;
                self.pruned.insert(transaction_id);
                true
            }
            None => false,
        }
    }

    pub fn purchase(&self, purchase_id: u64) -> Option<&Purchase> {
        self.purchases.get(&purchase_id)
    }

    pub fn vote(&self, poll_id: u64, voter: AccountId) -> Option<&Vec<i8>> {
        self.votes.get(&(poll_id, voter))
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }
}

impl ChainState for InMemoryChainState {
    fn alias(&self, name: &str) -> Option<&Alias> {
        self.aliases.get(&alias_key(name))
    }

    fn alias_offer(&self, name: &str) -> Option<&AliasOffer> {
        self.alias_offers.get(&alias_key(name))
    }

    fn asset(&self, asset_id: u64) -> Option<&Asset> {
        self.assets.get(&asset_id)
    }

    fn poll(&self, poll_id: u64) -> Option<&Poll> {
        self.polls.get(&poll_id)
    }

    fn has_voted(&self, poll_id: u64, voter: AccountId) -> bool {
        self.votes.contains_key(&(poll_id, voter))
    }

    fn ask_order(&self, order_id: u64) -> Option<&Order> {
        self.ask_orders.get(&order_id)
    }

    fn bid_order(&self, order_id: u64) -> Option<&Order> {
        self.bid_orders.get(&order_id)
    }

    fn goods(&self, goods_id: u64) -> Option<&Goods> {
        self.goods.get(&goods_id)
    }

    fn account_info(&self, account: AccountId) -> Option<&AccountInfo> {
        self.account_info.get(&account)
    }

    fn phasing_only(&self, account: AccountId) -> Option<&PhasingOnlyControl> {
        self.phasing_only.get(&account)
    }

    fn tagged_data(&self, transaction_id: u64) -> Option<&TaggedData> {
        self.tagged_data.get(&transaction_id)
    }

    fn is_tagged_data_pruned(&self, transaction_id: u64) -> bool {
        self.pruned.contains(&transaction_id)
    }

    fn put_alias(&mut self, alias: Alias) {
        let key = alias_key(&alias.name);
        self.alias_offers.remove(&key);
        self.aliases.insert(key, alias);
    }

    fn set_alias_offer(&mut self, name: &str, offer: Option<AliasOffer>) {
        let key = alias_key(name);
        match offer {
            Some(offer) => {
                self.alias_offers.insert(key, offer);
            }
            None => {
                self.alias_offers.remove(&key);
            }
        }
    }

    fn delete_alias(&mut self, name: &str) {
        let key = alias_key(name);
        self.aliases.remove(&key);
        self.alias_offers.remove(&key);
    }

    fn add_asset(&mut self, asset: Asset) {
        self.assets.insert(asset.asset_id, asset);
    }

    fn burn_asset(&mut self, asset_id: u64, quantity_qnt: i64) {
        if let Some(asset) = self.assets.get_mut(&asset_id) {
            asset.quantity_qnt = asset.quantity_qnt.saturating_sub(quantity_qnt).max(0);
        }
    }

    fn add_poll(&mut self, poll: Poll) {
        self.polls.insert(poll.poll_id, poll);
    }

    fn add_vote(&mut self, poll_id: u64, voter: AccountId, votes: Vec<i8>) {
        self.votes.insert((poll_id, voter), votes);
    }

    fn add_ask_order(&mut self, order: Order) {
        self.ask_orders.insert(order.order_id, order);
    }

    fn add_bid_order(&mut self, order: Order) {
        self.bid_orders.insert(order.order_id, order);
    }

    fn remove_ask_order(&mut self, order_id: u64) -> Option<Order> {
        self.ask_orders.remove(&order_id)
    }

    fn remove_bid_order(&mut self, order_id: u64) -> Option<Order> {
        self.bid_orders.remove(&order_id)
    }

    fn list_goods(&mut self, goods: Goods) {
        self.goods.insert(goods.goods_id, goods);
    }

    fn delist_goods(&mut self, goods_id: u64) {
        if let Some(goods) = self.goods.get_mut(&goods_id) {
            goods.delisted = true;
        }
    }

    fn add_purchase(&mut self, purchase: Purchase) {
        if let Some(goods) = self.goods.get_mut(&purchase.goods_id) {
            goods.quantity -= purchase.quantity;
        }
        self.purchases.insert(purchase.purchase_id, purchase);
    }

    fn set_account_info(&mut self, account: AccountId, info: AccountInfo) {
        self.account_info.insert(account, info);
    }

    fn set_phasing_only(&mut self, account: AccountId, control: Option<PhasingOnlyControl>) {
        match control {
            Some(control) => {
                self.phasing_only.insert(account, control);
            }
            None => {
                self.phasing_only.remove(&account);
            }
        }
    }

    fn add_tagged_data(&mut self, data: TaggedData) {
        self.pruned.remove(&data.transaction_id);
        self.tagged_data.insert(data.transaction_id, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_lookup_is_case_insensitive() {
        let mut state = InMemoryChainState::new();
        state.put_alias(Alias {
            name: "Foo".into(),
            uri: String::new(),
            account_id: 1,
            timestamp: 0,
        });
        assert!(state.alias("foo").is_some());
        assert!(state.alias("FOO").is_some());
        state.delete_alias("fOo");
        assert!(state.alias("foo").is_none());
    }

    #[test]
    fn test_purchase_reduces_goods_quantity() {
        let mut state = InMemoryChainState::new();
        state.list_goods(Goods {
            goods_id: 9,
            seller_id: 2,
            name: "ebook".into(),
            description: String::new(),
            tags: "books".into(),
            quantity: 5,
            price_nqt: 100,
            delisted: false,
        });
        state.add_purchase(Purchase {
            purchase_id: 1,
            buyer_id: 3,
            goods_id: 9,
            seller_id: 2,
            quantity: 2,
            price_nqt: 100,
            delivery_deadline_timestamp: 1_000,
        });
        assert_eq!(state.goods(9).map(|g| g.quantity), Some(3));
    }

    #[test]
    fn test_pruning_keeps_metadata() {
        let mut state = InMemoryChainState::new();
        state.add_tagged_data(TaggedData {
            transaction_id: 4,
            account_id: 1,
            transaction_timestamp: 10,
            payload: None,
        });
        assert!(!state.is_tagged_data_pruned(4));
        assert!(state.prune_tagged_data(4));
        assert!(state.is_tagged_data_pruned(4));
        assert!(state.tagged_data(4).is_some());
        assert!(!state.prune_tagged_data(5));
    }
}
