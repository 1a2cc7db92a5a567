//! Reserve → apply / release orchestration.
//!
//! `reserve` holds funds against the sender's unconfirmed balance, `apply` commits the confirmed
//! effects once a block is accepted, and `release` hands a reservation back. Every variant hook
//! runs after the generic balance step it belongs to, and a failed reservation hook rolls the
//! generic debit back before reporting failure.

use super::attachment::{Attachment, VotingModel};
use super::types::{LifecycleState, Transaction};
use crate::blockchain::{
    AccountInfo, Alias, AliasOffer, Asset, ChainState, Goods, Order, PhasingOnlyControl, Poll,
    Purchase, TaggedData,
};
use crate::config::ProtocolParams;
use crate::error::ChainError;
use crate::ledger::Ledger;
use tracing::{debug, warn};

impl Transaction {
    /// Total held against the unconfirmed balance, deposit included.
    pub fn reserved_amount(&self, params: &ProtocolParams) -> Result<i64, ChainError> {
        let mut total = self
            .amount_nqt()
            .checked_add(self.fee_nqt())
            .ok_or_else(|| ChainError::NotValid("Amount plus fee overflows".to_string()))?;
        if self.referenced_transaction_full_hash().is_some() {
            total = total
                .checked_add(params.unconfirmed_pool_deposit_nqt)
                .ok_or_else(|| ChainError::NotValid("Reserved amount overflows".to_string()))?;
        }
        Ok(total)
    }

    /// Holds this transaction's funds against the sender's unconfirmed balance.
    ///
    /// `Ok(false)` means the sender cannot cover it right now: a double spend, exclude it.
    /// The caller must hold exclusive access to `ledger` for the whole call.
    pub fn reserve(&mut self, ledger: &mut dyn Ledger, params: &ProtocolParams) -> Result<bool, ChainError> {
        if self.state != LifecycleState::Unvalidated {
            return Err(ChainError::IllegalState(format!(
                "Cannot reserve transaction {} in state {:?}",
                self.string_id_or_unsigned(),
                self.state
            )));
        }
        let sender = self.sender_id();
        let total = self.reserved_amount(params)?;
        let is_genesis = self.timestamp() == 0
            && *self.sender_public_key() == params.genesis_creator_public_key;
        if ledger.unconfirmed_balance(sender) < total && !is_genesis {
            debug!(
                "Double spending transaction {}: sender {} has {} unconfirmed, needs {}",
                self.string_id_or_unsigned(),
                sender,
                ledger.unconfirmed_balance(sender),
                total
            );
            return Ok(false);
        }
        match ledger.add_to_unconfirmed_balance(sender, -total) {
            Ok(()) => {}
            Err(ChainError::DoubleSpend(msg)) => {
                debug!("Reservation of {} refused by ledger: {}", self.string_id_or_unsigned(), msg);
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        let reserved = match self.reserve_attachment(ledger) {
            Ok(reserved) => reserved,
            Err(e) => {
                ledger.add_to_unconfirmed_balance(sender, total)?;
                return Err(e);
            }
        };
        if !reserved {
            warn!(
                "{} reservation hook refused transaction {}, rolling back",
                self.kind().name(),
                self.string_id_or_unsigned()
            );
            ledger.add_to_unconfirmed_balance(sender, total)?;
            return Ok(false);
        }
        self.state = LifecycleState::Reserved;
        Ok(true)
    }

    /// Inverse of [`Transaction::reserve`].
    pub fn release(&mut self, ledger: &mut dyn Ledger, params: &ProtocolParams) -> Result<(), ChainError> {
        if self.state != LifecycleState::Reserved {
            return Err(ChainError::IllegalState(format!(
                "Cannot release transaction {} in state {:?}",
                self.string_id_or_unsigned(),
                self.state
            )));
        }
        let sender = self.sender_id();
        ledger.add_to_unconfirmed_balance(sender, self.amount_nqt() + self.fee_nqt())?;
        if self.referenced_transaction_full_hash().is_some() {
            ledger.add_to_unconfirmed_balance(sender, params.unconfirmed_pool_deposit_nqt)?;
        }
        self.release_attachment(ledger)?;
        self.state = LifecycleState::Unvalidated;
        Ok(())
    }

    /// Commits the confirmed-balance and attachment effects. Runs once per transaction.
    pub fn apply(
        &mut self,
        ledger: &mut dyn Ledger,
        state: &mut dyn ChainState,
        params: &ProtocolParams,
    ) -> Result<(), ChainError> {
        match self.state {
            LifecycleState::Reserved => {}
            LifecycleState::Applied => {
                return Err(ChainError::IllegalState(format!(
                    "Transaction {} has already been applied",
                    self.string_id_or_unsigned()
                )))
            }
            LifecycleState::Unvalidated => {
                return Err(ChainError::IllegalState(format!(
                    "Transaction {} must be reserved before it is applied",
                    self.string_id_or_unsigned()
                )))
            }
        }
        let id = self.id()?;
        let sender = self.sender_id();
        ledger.apply_public_key(sender, self.sender_public_key())?;
        if self.referenced_transaction_full_hash().is_some() {
            ledger.add_to_unconfirmed_balance(sender, params.unconfirmed_pool_deposit_nqt)?;
        }
        let debit = if self.is_phased() {
            self.amount_nqt()
        } else {
            self.amount_nqt() + self.fee_nqt()
        };
        ledger.add_to_balance(sender, -debit)?;
        if let Some(recipient) = self.recipient_id() {
            ledger.add_to_balance_and_unconfirmed_balance(recipient, self.amount_nqt())?;
        }
        self.apply_attachment(id, ledger, state, params)?;
        self.state = LifecycleState::Applied;
        Ok(())
    }

    /// Fee shares owed to the generators of the three preceding blocks, most recent first.
    pub fn back_fees(&self) -> Vec<i64> {
        match self.attachment() {
            Attachment::AssetIssuance(a) if !a.is_singleton() => {
                let fee = self.fee_nqt();
                vec![fee * 3 / 10, fee * 2 / 10, fee / 10]
            }
            _ => Vec::new(),
        }
    }

    fn reserve_attachment(&self, ledger: &mut dyn Ledger) -> Result<bool, ChainError> {
        let sender = self.sender_id();
        match self.attachment() {
            Attachment::AssetTransfer(a) => {
                reserve_asset(ledger, sender, a.asset_id, a.quantity_qnt)
            }
            Attachment::AskOrderPlacement(o) => {
                reserve_asset(ledger, sender, o.asset_id, o.quantity_qnt)
            }
            Attachment::BidOrderPlacement(o) => match o.quantity_qnt.checked_mul(o.price_nqt) {
                Some(cost) => reserve_balance(ledger, sender, cost),
                None => Ok(false),
            },
            Attachment::DigitalGoodsPurchase(p) => {
                match i64::from(p.quantity).checked_mul(p.price_nqt) {
                    Some(cost) => reserve_balance(ledger, sender, cost),
                    None => Ok(false),
                }
            }
            _ => Ok(true),
        }
    }

    fn release_attachment(&self, ledger: &mut dyn Ledger) -> Result<(), ChainError> {
        let sender = self.sender_id();
        match self.attachment() {
            Attachment::AssetTransfer(a) => {
                ledger.add_to_unconfirmed_asset_balance(sender, a.asset_id, a.quantity_qnt)
            }
            Attachment::AskOrderPlacement(o) => {
                ledger.add_to_unconfirmed_asset_balance(sender, o.asset_id, o.quantity_qnt)
            }
            Attachment::BidOrderPlacement(o) => {
                ledger.add_to_unconfirmed_balance(sender, o.quantity_qnt * o.price_nqt)
            }
            Attachment::DigitalGoodsPurchase(p) => {
                ledger.add_to_unconfirmed_balance(sender, i64::from(p.quantity) * p.price_nqt)
            }
            _ => Ok(()),
        }
    }

    fn apply_attachment(
        &self,
        id: u64,
        ledger: &mut dyn Ledger,
        state: &mut dyn ChainState,
        params: &ProtocolParams,
    ) -> Result<(), ChainError> {
        let sender = self.sender_id();
        let height = self.height().unwrap_or(0);
        match self.attachment() {
            Attachment::OrdinaryPayment
            | Attachment::ArbitraryMessage
            | Attachment::MetisMetadata
            | Attachment::MetisData => {}
            Attachment::AliasAssignment(a) => state.put_alias(Alias {
                name: a.alias_name.clone(),
                uri: a.alias_uri.clone(),
                account_id: sender,
                timestamp: self.timestamp(),
            }),
            Attachment::AliasSell(a) => {
                if a.price_nqt == 0 {
                    let (Some(alias), Some(buyer)) = (state.alias(&a.alias_name).cloned(), self.recipient_id())
                    else {
                        return Err(ChainError::IllegalState(format!(
                            "Alias {} vanished before its transfer was applied",
                            a.alias_name
                        )));
                    };
                    state.put_alias(Alias {
                        account_id: buyer,
                        timestamp: self.timestamp(),
                        ..alias
                    });
                    state.set_alias_offer(&a.alias_name, None);
                } else {
                    state.set_alias_offer(
                        &a.alias_name,
                        Some(AliasOffer {
                            price_nqt: a.price_nqt,
                            buyer_id: self.recipient_id(),
                        }),
                    );
                }
            }
            Attachment::AliasBuy(a) => {
                let Some(alias) = state.alias(&a.alias_name).cloned() else {
                    return Err(ChainError::IllegalState(format!(
                        "Alias {} vanished before its sale was applied",
                        a.alias_name
                    )));
                };
                state.put_alias(Alias {
                    account_id: sender,
                    timestamp: self.timestamp(),
                    ..alias
                });
                state.set_alias_offer(&a.alias_name, None);
            }
            Attachment::AliasDelete(a) => state.delete_alias(&a.alias_name),
            Attachment::PollCreation(p) => state.add_poll(Poll {
                poll_id: id,
                account_id: sender,
                name: p.name.clone(),
                option_count: p.options.len(),
                finish_height: p.finish_height,
                min_number_of_options: p.min_number_of_options,
                max_number_of_options: p.max_number_of_options,
                min_range_value: p.min_range_value,
                max_range_value: p.max_range_value,
            }),
            Attachment::VoteCasting(v) => state.add_vote(v.poll_id, sender, v.votes.clone()),
            Attachment::AccountInfo(a) => state.set_account_info(
                sender,
                AccountInfo {
                    name: a.name.clone(),
                    description: a.description.clone(),
                },
            ),
            Attachment::AssetIssuance(a) => {
                state.add_asset(Asset {
                    asset_id: id,
                    account_id: sender,
                    name: a.name.clone(),
                    description: a.description.clone(),
                    initial_quantity_qnt: a.quantity_qnt,
                    quantity_qnt: a.quantity_qnt,
                    decimals: a.decimals,
                });
                ledger.add_to_asset_and_unconfirmed_asset_balance(sender, id, a.quantity_qnt)?;
            }
            Attachment::AssetTransfer(a) => {
                ledger.add_to_asset_balance(sender, a.asset_id, -a.quantity_qnt)?;
                match self.recipient_id() {
                    Some(recipient) if recipient != params.genesis_creator_id() => {
                        ledger.add_to_asset_and_unconfirmed_asset_balance(
                            recipient,
                            a.asset_id,
                            a.quantity_qnt,
                        )?;
                    }
                    _ => state.burn_asset(a.asset_id, a.quantity_qnt),
                }
            }
            Attachment::AskOrderPlacement(o) | Attachment::BidOrderPlacement(o) => {
                let order = Order {
                    order_id: id,
                    account_id: sender,
                    asset_id: o.asset_id,
                    quantity_qnt: o.quantity_qnt,
                    price_nqt: o.price_nqt,
                    height,
                };
                if matches!(self.attachment(), Attachment::AskOrderPlacement(_)) {
                    state.add_ask_order(order);
                } else {
                    state.add_bid_order(order);
                }
            }
            Attachment::AskOrderCancellation(c) => {
                if let Some(order) = state.remove_ask_order(c.order_id) {
                    ledger.add_to_unconfirmed_asset_balance(sender, order.asset_id, order.quantity_qnt)?;
                }
            }
            Attachment::BidOrderCancellation(c) => {
                if let Some(order) = state.remove_bid_order(c.order_id) {
                    let refund = order
                        .quantity_qnt
                        .checked_mul(order.price_nqt)
                        .ok_or_else(|| ChainError::IllegalState(format!("Bid order {} value overflows", order.order_id)))?;
                    ledger.add_to_unconfirmed_balance(sender, refund)?;
                }
            }
            Attachment::DigitalGoodsListing(g) => state.list_goods(Goods {
                goods_id: id,
                seller_id: sender,
                name: g.name.clone(),
                description: g.description.clone(),
                tags: g.tags.clone(),
                quantity: g.quantity,
                price_nqt: g.price_nqt,
                delisted: false,
            }),
            Attachment::DigitalGoodsDelisting(d) => state.delist_goods(d.goods_id),
            Attachment::DigitalGoodsPurchase(p) => {
                let seller_id = self.recipient_id().ok_or_else(|| {
                    ChainError::IllegalState("Purchase applied without a seller".to_string())
                })?;
                ledger.add_to_balance(sender, -(i64::from(p.quantity) * p.price_nqt))?;
                state.add_purchase(Purchase {
                    purchase_id: id,
                    buyer_id: sender,
                    goods_id: p.goods_id,
                    seller_id,
                    quantity: p.quantity,
                    price_nqt: p.price_nqt,
                    delivery_deadline_timestamp: p.delivery_deadline_timestamp,
                });
            }
            Attachment::SetPhasingOnly(s) => {
                let control = match s.phasing_params.voting_model()? {
                    VotingModel::None => None,
                    _ => Some(PhasingOnlyControl {
                        params: s.phasing_params.clone(),
                        max_fees: s.max_fees,
                        min_duration: s.min_duration,
                        max_duration: s.max_duration,
                    }),
                };
                state.set_phasing_only(sender, control);
            }
            Attachment::TaggedDataUpload(t) => state.add_tagged_data(TaggedData {
                transaction_id: id,
                account_id: sender,
                transaction_timestamp: self.timestamp(),
                payload: t.payload().cloned(),
            }),
        }
        Ok(())
    }
}

fn reserve_asset(
    ledger: &mut dyn Ledger,
    account: u64,
    asset_id: u64,
    quantity_qnt: i64,
) -> Result<bool, ChainError> {
    if ledger.unconfirmed_asset_balance(account, asset_id) < quantity_qnt {
        return Ok(false);
    }
    ledger.add_to_unconfirmed_asset_balance(account, asset_id, -quantity_qnt)?;
    Ok(true)
}

fn reserve_balance(ledger: &mut dyn Ledger, account: u64, amount_nqt: i64) -> Result<bool, ChainError> {
    if ledger.unconfirmed_balance(account) < amount_nqt {
        return Ok(false);
    }
    ledger.add_to_unconfirmed_balance(account, -amount_nqt)?;
    Ok(true)
}
