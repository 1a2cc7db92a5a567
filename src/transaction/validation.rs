/// Validation logic for transactions separated from type definitions
use super::attachment::*;
use super::types::Transaction;
use crate::blockchain::ChainState;
use crate::config::{FeeEra, ProtocolParams, MAX_BALANCE_NQT, ONE_COIN};
use crate::error::ChainError;
use crate::fees::{
    composite, Fee, FeeSchedule, MIN_FEE, MIN_PRUNABLE_FEE, NEW_MIN_FEE, NEW_MIN_MESSAGE_FEE,
    NEW_MIN_PRUNABLE_FEE,
};

/// Chain position a transaction is validated against.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Height of the block the transaction would be included in.
    pub height: u32,
    /// Timestamp of the last block, in seconds since the genesis epoch.
    pub timestamp: i32,
    pub params: &'a ProtocolParams,
}

impl<'a> ValidationContext<'a> {
    pub fn new(height: u32, timestamp: i32, params: &'a ProtocolParams) -> Self {
        Self {
            height,
            timestamp,
            params,
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn size_of(s: &str) -> i32 {
    char_len(s) as i32
}

fn in_alphabet(s: &str) -> bool {
    s.to_lowercase().chars().all(|c| ALPHABET.contains(c))
}

fn not_valid(msg: impl Into<String>) -> ChainError {
    ChainError::NotValid(msg.into())
}

fn not_currently_valid(msg: impl Into<String>) -> ChainError {
    ChainError::NotCurrentlyValid(msg.into())
}

impl Transaction {
    fn fee_for(&self, era: FeeEra) -> i64 {
        let next = era == FeeEra::Next;
        let default = if next { Fee::NEW_DEFAULT } else { Fee::DEFAULT };
        match self.attachment() {
            Attachment::AliasAssignment(a) => {
                let size = size_of(&a.alias_name) + size_of(&a.alias_uri);
                let fee = if next {
                    Fee::size_based(2 * NEW_MIN_FEE, 2 * NEW_MIN_FEE, 32)
                } else {
                    Fee::size_based(2 * MIN_FEE, 2 * MIN_FEE, 32)
                };
                fee.charge(size)
            }
            Attachment::PollCreation(p) => {
                // Both eras charge the same poll fee.
                let options = p.options.len() as i32;
                let size = size_of(&p.name)
                    + size_of(&p.description)
                    + p.options.iter().map(|o| size_of(o)).sum::<i32>();
                composite(&[
                    (
                        Fee::size_based(10 * MIN_FEE, MIN_FEE, 1),
                        if options <= 19 { 0 } else { options - 19 },
                    ),
                    (
                        Fee::size_based(0, 2 * MIN_FEE, 32),
                        if size <= 288 { 0 } else { size - 288 },
                    ),
                ])
            }
            Attachment::DigitalGoodsListing(g) => {
                let size = size_of(&g.name) + size_of(&g.description);
                let fee = if next {
                    Fee::size_based(2 * NEW_MIN_FEE, 2 * NEW_MIN_FEE, 32)
                } else {
                    Fee::size_based(2 * MIN_FEE, 2 * MIN_FEE, 32)
                };
                fee.charge(size)
            }
            Attachment::AccountInfo(a) => {
                let size = size_of(&a.name) + size_of(&a.description);
                let fee = if next {
                    Fee::size_based(NEW_MIN_MESSAGE_FEE, 2 * NEW_MIN_MESSAGE_FEE, 32)
                } else {
                    Fee::size_based(MIN_FEE, 2 * MIN_FEE, 32)
                };
                fee.charge(size)
            }
            Attachment::AssetIssuance(a) => {
                if a.is_singleton() {
                    let fee = if next {
                        Fee::size_based(NEW_MIN_FEE, NEW_MIN_FEE, 32)
                    } else {
                        Fee::size_based(MIN_FEE, MIN_FEE, 32)
                    };
                    fee.charge(size_of(&a.description))
                } else if next {
                    50 * ONE_COIN
                } else {
                    1000 * MIN_FEE
                }
            }
            Attachment::TaggedDataUpload(t) => {
                let fee = if next {
                    Fee::per_kilobyte(NEW_MIN_FEE, NEW_MIN_PRUNABLE_FEE)
                } else {
                    Fee::per_kilobyte(MIN_FEE, MIN_PRUNABLE_FEE)
                };
                fee.charge(t.full_size() as i32)
            }
            _ => default.charge(0),
        }
    }

    /// Validates just the signature, without access to chain state.
    pub fn validate_signature(&self) -> Result<(), ChainError> {
        if self.signature().is_none() {
            return Err(not_valid("Transaction not signed"));
        }
        if !self.verify_signature() {
            return Err(not_valid(format!(
                "Invalid signature for transaction {}",
                self.string_id_or_unsigned()
            )));
        }
        Ok(())
    }

    /// Checks that hold regardless of variant or chain state.
    pub fn validate_envelope(&self) -> Result<(), ChainError> {
        let kind = self.kind();
        let fee = self.fee_nqt();
        let amount = self.amount_nqt();
        let bad_window = if self.timestamp() == 0 {
            self.deadline() != 0 || fee != 0
        } else {
            self.deadline() < 1 || fee <= 0
        };
        if bad_window || fee > MAX_BALANCE_NQT || amount < 0 || amount > MAX_BALANCE_NQT {
            return Err(not_valid(format!(
                "Invalid transaction parameters: timestamp {}, deadline {}, fee {}, amount {}",
                self.timestamp(),
                self.deadline(),
                fee,
                amount
            )));
        }
        if !kind.can_have_recipient() && (self.recipient_id().is_some() || amount != 0) {
            return Err(not_valid(format!(
                "{} cannot have a recipient or an amount",
                kind.name()
            )));
        }
        if kind.must_have_recipient() && self.recipient_id().is_none() {
            return Err(not_valid(format!("{} requires a recipient", kind.name())));
        }
        if self.is_phased() && !(kind.is_phasable() && kind.is_phasing_safe()) {
            return Err(not_valid(format!("{} cannot be phased", kind.name())));
        }
        self.validate_size()
    }

    /// Full validation against the current chain state.
    ///
    /// Pure: nothing in `state` is modified.
    pub fn validate(&self, state: &dyn ChainState, ctx: &ValidationContext<'_>) -> Result<(), ChainError> {
        self.validate_signature()?;
        self.validate_envelope()?;
        self.validate_attachment(state, ctx)?;
        self.validate_account_control(state)?;
        if self.timestamp() != 0 {
            let minimum = self.minimum_fee(ctx.height, ctx.params);
            if self.fee_nqt() < minimum {
                return Err(not_currently_valid(format!(
                    "Transaction fee {} less than minimum fee {} at height {}",
                    self.fee_nqt(),
                    minimum,
                    ctx.height
                )));
            }
        }
        Ok(())
    }

    fn validate_account_control(&self, state: &dyn ChainState) -> Result<(), ChainError> {
        let Some(control) = state.phasing_only(self.sender_id()) else {
            return Ok(());
        };
        if matches!(self.attachment(), Attachment::SetPhasingOnly(_)) {
            return Ok(());
        }
        if !self.is_phased() {
            return Err(not_currently_valid(
                "Non-phased transaction when phasing account control is enabled",
            ));
        }
        if control.max_fees > 0 && self.fee_nqt() > control.max_fees {
            return Err(not_currently_valid(format!(
                "Transaction fee {} exceeds the phasing control limit {}",
                self.fee_nqt(),
                control.max_fees
            )));
        }
        Ok(())
    }

    fn validate_attachment(
        &self,
        state: &dyn ChainState,
        ctx: &ValidationContext<'_>,
    ) -> Result<(), ChainError> {
        let genesis = ctx.params.genesis_creator_id();
        let validation_height = self
            .phasing_finish_height()
            .unwrap_or(ctx.height as i32);
        match self.attachment() {
            Attachment::OrdinaryPayment => {
                if self.amount_nqt() <= 0 || self.amount_nqt() >= MAX_BALANCE_NQT {
                    return Err(not_valid(format!("Invalid payment amount {}", self.amount_nqt())));
                }
            }
            Attachment::ArbitraryMessage | Attachment::MetisMetadata | Attachment::MetisData => {
                if self.amount_nqt() != 0 {
                    return Err(not_valid(format!(
                        "Invalid {} amount {}",
                        self.kind().name(),
                        self.amount_nqt()
                    )));
                }
                if self.recipient_id() == Some(genesis) {
                    return Err(not_valid("Sending messages to Genesis not allowed."));
                }
            }
            Attachment::AliasAssignment(a) => {
                let name_len = char_len(&a.alias_name);
                if name_len == 0
                    || name_len > MAX_ALIAS_LENGTH
                    || char_len(&a.alias_uri) > MAX_ALIAS_URI_LENGTH
                {
                    return Err(not_valid(format!("Invalid alias assignment {:?}", a)));
                }
                if !in_alphabet(&a.alias_name) {
                    return Err(not_valid(format!("Invalid alias name: {}", a.alias_name)));
                }
                if let Some(alias) = state.alias(&a.alias_name) {
                    if alias.account_id != self.sender_id() {
                        return Err(not_currently_valid(format!(
                            "Alias already owned by another account: {}",
                            a.alias_name
                        )));
                    }
                }
            }
            Attachment::AliasSell(a) => {
                if self.amount_nqt() != 0 {
                    return Err(not_valid(format!("Invalid sell alias amount {}", self.amount_nqt())));
                }
                if a.alias_name.is_empty() {
                    return Err(not_valid("Missing alias name"));
                }
                if a.price_nqt < 0 || a.price_nqt > MAX_BALANCE_NQT {
                    return Err(not_valid(format!("Invalid alias sell price {}", a.price_nqt)));
                }
                if a.price_nqt == 0 {
                    match self.recipient_id() {
                        Some(r) if r == genesis => {
                            return Err(not_valid("Transferring aliases to Genesis account not allowed"))
                        }
                        None => return Err(not_valid("Missing alias transfer recipient")),
                        Some(_) => {}
                    }
                }
                if self.recipient_id() == Some(genesis) {
                    return Err(not_valid("Selling alias to Genesis not allowed"));
                }
                self.require_alias_owner(state, &a.alias_name)?;
            }
            Attachment::AliasBuy(a) => self.validate_alias_buy(a, state)?,
            Attachment::AliasDelete(a) => {
                if a.alias_name.is_empty() {
                    return Err(not_valid("Missing alias name"));
                }
                self.require_alias_owner(state, &a.alias_name)?;
            }
            Attachment::PollCreation(p) => validate_poll(p, validation_height)?,
            Attachment::VoteCasting(v) => self.validate_vote(v, state, validation_height)?,
            Attachment::AccountInfo(a) => {
                if char_len(&a.name) > MAX_ACCOUNT_NAME_LENGTH
                    || char_len(&a.description) > MAX_ACCOUNT_DESCRIPTION_LENGTH
                {
                    return Err(not_valid(format!("Invalid account info issuance: {:?}", a)));
                }
            }
            Attachment::AssetIssuance(a) => {
                let name_len = char_len(&a.name);
                if !(MIN_ASSET_NAME_LENGTH..=MAX_ASSET_NAME_LENGTH).contains(&name_len)
                    || char_len(&a.description) > MAX_ASSET_DESCRIPTION_LENGTH
                    || a.decimals > 8
                    || a.quantity_qnt <= 0
                    || a.quantity_qnt > MAX_ASSET_QUANTITY_QNT
                {
                    return Err(not_valid(format!("Invalid asset issuance: {:?}", a)));
                }
                if !in_alphabet(&a.name) {
                    return Err(not_valid(format!("Invalid asset name: {}", a.name)));
                }
            }
            Attachment::AssetTransfer(a) => {
                if self.amount_nqt() != 0 || a.asset_id == 0 {
                    return Err(not_valid(format!("Invalid asset transfer amount or asset: {:?}", a)));
                }
                if self.recipient_id() == Some(genesis) {
                    return Err(not_valid("Asset transfer to Genesis not allowed, use asset delete attachment instead"));
                }
                let asset = state.asset(a.asset_id);
                if a.quantity_qnt <= 0
                    || asset.map_or(false, |asset| a.quantity_qnt > asset.initial_quantity_qnt)
                {
                    return Err(not_valid(format!("Invalid asset transfer quantity: {}", a.quantity_qnt)));
                }
                if asset.is_none() {
                    return Err(not_currently_valid(format!(
                        "Asset {} does not exist yet",
                        a.asset_id
                    )));
                }
            }
            Attachment::AskOrderPlacement(o) | Attachment::BidOrderPlacement(o) => {
                if o.price_nqt <= 0 || o.price_nqt > MAX_BALANCE_NQT || o.asset_id == 0 {
                    return Err(not_valid(format!("Invalid asset order placement: {:?}", o)));
                }
                let asset = state.asset(o.asset_id);
                if o.quantity_qnt <= 0
                    || asset.map_or(false, |asset| o.quantity_qnt > asset.initial_quantity_qnt)
                {
                    return Err(not_valid(format!("Invalid asset order quantity: {}", o.quantity_qnt)));
                }
                if asset.is_none() {
                    return Err(not_currently_valid(format!(
                        "Asset {} does not exist yet",
                        o.asset_id
                    )));
                }
            }
            Attachment::AskOrderCancellation(c) | Attachment::BidOrderCancellation(c) => {
                let order = if matches!(self.attachment(), Attachment::AskOrderCancellation(_)) {
                    state.ask_order(c.order_id)
                } else {
                    state.bid_order(c.order_id)
                };
                let Some(order) = order else {
                    return Err(not_currently_valid(format!(
                        "Invalid order: {}",
                        c.order_id
                    )));
                };
                if order.account_id != self.sender_id() {
                    return Err(not_valid(format!(
                        "Order {} was created by account {}",
                        c.order_id, order.account_id
                    )));
                }
            }
            Attachment::DigitalGoodsListing(g) => {
                let name_len = char_len(&g.name);
                if name_len == 0
                    || name_len > MAX_DGS_LISTING_NAME_LENGTH
                    || char_len(&g.description) > MAX_DGS_LISTING_DESCRIPTION_LENGTH
                    || char_len(&g.tags) > MAX_DGS_LISTING_TAGS_LENGTH
                    || g.quantity < 0
                    || g.quantity > MAX_DGS_LISTING_QUANTITY
                    || g.price_nqt <= 0
                    || g.price_nqt > MAX_BALANCE_NQT
                {
                    return Err(not_valid(format!("Invalid digital goods listing: {:?}", g)));
                }
            }
            Attachment::DigitalGoodsDelisting(d) => {
                let goods = state.goods(d.goods_id);
                if let Some(goods) = goods {
                    if goods.seller_id != self.sender_id() {
                        return Err(not_valid(format!("Invalid digital goods delisting: {:?}", d)));
                    }
                }
                if goods.map_or(true, |g| g.delisted) {
                    return Err(not_currently_valid(format!(
                        "Goods {} not yet listed or already delisted",
                        d.goods_id
                    )));
                }
            }
            Attachment::DigitalGoodsPurchase(p) => {
                let goods = state.goods(p.goods_id);
                if p.quantity <= 0
                    || p.quantity > MAX_DGS_LISTING_QUANTITY
                    || p.price_nqt <= 0
                    || p.price_nqt > MAX_BALANCE_NQT
                    || goods.map_or(false, |g| Some(g.seller_id) != self.recipient_id())
                {
                    return Err(not_valid(format!("Invalid digital goods purchase: {:?}", p)));
                }
                let Some(goods) = goods.filter(|g| !g.delisted) else {
                    return Err(not_currently_valid(format!(
                        "Goods {} not yet listed or already delisted",
                        p.goods_id
                    )));
                };
                if p.quantity > goods.quantity || p.price_nqt != goods.price_nqt {
                    return Err(not_currently_valid(format!(
                        "Goods price or quantity changed: {:?}",
                        p
                    )));
                }
                if p.delivery_deadline_timestamp <= ctx.timestamp {
                    return Err(not_currently_valid(format!(
                        "Delivery deadline has already expired: {}",
                        p.delivery_deadline_timestamp
                    )));
                }
            }
            Attachment::SetPhasingOnly(s) => self.validate_phasing_only(s, state)?,
            Attachment::TaggedDataUpload(t) => validate_tagged_data(t, self.timestamp(), ctx.timestamp)?,
        }
        Ok(())
    }

    fn require_alias_owner(&self, state: &dyn ChainState, name: &str) -> Result<(), ChainError> {
        match state.alias(name) {
            None => Err(not_currently_valid(format!("No such alias yet: {}", name))),
            Some(alias) if alias.account_id != self.sender_id() => Err(not_currently_valid(format!(
                "Alias doesn't belong to sender: {}",
                name
            ))),
            Some(_) => Ok(()),
        }
    }

    fn validate_alias_buy(&self, a: &AliasBuy, state: &dyn ChainState) -> Result<(), ChainError> {
        let Some(alias) = state.alias(&a.alias_name) else {
            return Err(not_currently_valid(format!("No such alias: {}", a.alias_name)));
        };
        if Some(alias.account_id) != self.recipient_id() {
            return Err(not_currently_valid(format!(
                "Alias is owned by account other than recipient: {}",
                alias.account_id
            )));
        }
        let Some(offer) = state.alias_offer(&a.alias_name) else {
            return Err(not_currently_valid(format!("Alias is not for sale: {}", a.alias_name)));
        };
        if self.amount_nqt() < offer.price_nqt {
            return Err(not_currently_valid(format!(
                "Price is too low for: {} ({} < {})",
                a.alias_name,
                self.amount_nqt(),
                offer.price_nqt
            )));
        }
        if let Some(buyer) = offer.buyer_id {
            if buyer != self.sender_id() {
                return Err(not_currently_valid(format!(
                    "Wrong buyer for {}: {} expected: {}",
                    a.alias_name,
                    self.sender_id(),
                    buyer
                )));
            }
        }
        Ok(())
    }

    fn validate_vote(
        &self,
        v: &VoteCasting,
        state: &dyn ChainState,
        validation_height: i32,
    ) -> Result<(), ChainError> {
        if v.poll_id == 0 || v.votes.len() > MAX_POLL_OPTION_COUNT {
            return Err(not_valid(format!("Invalid vote casting attachment: {:?}", v)));
        }
        let Some(poll) = state.poll(v.poll_id) else {
            return Err(not_currently_valid(format!("Invalid poll: {}", v.poll_id)));
        };
        if state.has_voted(v.poll_id, self.sender_id()) {
            return Err(not_currently_valid(format!(
                "Double voting attempt by {} in poll {}",
                self.sender_id(),
                v.poll_id
            )));
        }
        if poll.finish_height <= validation_height {
            return Err(not_currently_valid(format!("Voting for poll {} has finished", v.poll_id)));
        }
        if v.votes.len() != poll.option_count {
            return Err(not_valid(format!(
                "Number of votes {} does not match the {} poll options",
                v.votes.len(),
                poll.option_count
            )));
        }
        let mut positive = 0usize;
        for &vote in &v.votes {
            if vote == NO_VOTE_VALUE {
                continue;
            }
            if vote < poll.min_range_value || vote > poll.max_range_value {
                return Err(not_valid(format!(
                    "Invalid vote {}, vote must be between {} and {}",
                    vote, poll.min_range_value, poll.max_range_value
                )));
            }
            positive += 1;
        }
        if positive < usize::from(poll.min_number_of_options)
            || positive > usize::from(poll.max_number_of_options)
        {
            return Err(not_valid(format!(
                "Invalid num of choices {}, number of choices must be between {} and {}",
                positive, poll.min_number_of_options, poll.max_number_of_options
            )));
        }
        Ok(())
    }

    fn validate_phasing_only(&self, s: &SetPhasingOnly, state: &dyn ChainState) -> Result<(), ChainError> {
        let params = &s.phasing_params;
        params.validate()?;
        match params.voting_model()? {
            VotingModel::None => {
                if state.phasing_only(self.sender_id()).is_none() {
                    return Err(not_currently_valid(
                        "Phasing only account control is not currently enabled",
                    ));
                }
            }
            VotingModel::Transaction | VotingModel::Hash => {
                return Err(not_valid("Invalid voting model for phasing only control"));
            }
            _ => {}
        }
        let max_fees_limit = (if params.is_balance_independent() { 3 } else { 22 }) * ONE_COIN;
        if s.max_fees < 0
            || (s.max_fees > 0 && s.max_fees < max_fees_limit)
            || s.max_fees > MAX_BALANCE_NQT
        {
            return Err(not_valid(format!("Invalid max fees {}", s.max_fees)));
        }
        for duration in [s.min_duration, s.max_duration] {
            if duration < 0 || (duration > 0 && duration < 3) || duration >= MAX_PHASING_DURATION {
                return Err(not_valid(format!("Invalid phasing duration {}", duration)));
            }
        }
        if s.min_duration > s.max_duration {
            return Err(not_valid(format!(
                "Min duration {} cannot exceed max duration {}",
                s.min_duration, s.max_duration
            )));
        }
        Ok(())
    }

    /// True when this carries a prunable payload that is no longer available.
    pub fn is_pruned(&self, state: &dyn ChainState) -> bool {
        match self.attachment() {
            Attachment::TaggedDataUpload(t) => {
                t.payload().is_none()
                    && self
                        .id()
                        .map_or(true, |id| state.is_tagged_data_pruned(id))
            }
            _ => false,
        }
    }
}

fn validate_poll(p: &PollCreation, validation_height: i32) -> Result<(), ChainError> {
    let option_count = p.options.len();
    let name_len = char_len(&p.name);
    if name_len == 0
        || name_len > MAX_POLL_NAME_LENGTH
        || char_len(&p.description) > MAX_POLL_DESCRIPTION_LENGTH
        || option_count == 0
        || option_count > MAX_POLL_OPTION_COUNT
    {
        return Err(not_valid(format!("Invalid poll attachment: {:?}", p)));
    }
    let min_options = usize::from(p.min_number_of_options);
    let max_options = usize::from(p.max_number_of_options);
    if min_options < 1 || min_options > option_count {
        return Err(not_valid(format!("Invalid min number of options: {}", min_options)));
    }
    if max_options < 1 || max_options < min_options || max_options > option_count {
        return Err(not_valid(format!("Invalid max number of options: {}", max_options)));
    }
    if p
        .options
        .iter()
        .any(|o| o.is_empty() || char_len(o) > MAX_POLL_OPTION_LENGTH)
    {
        return Err(not_valid("Invalid poll option"));
    }
    if p.min_range_value < MIN_VOTE_VALUE
        || p.max_range_value > MAX_VOTE_VALUE
        || p.max_range_value < p.min_range_value
    {
        return Err(not_valid(format!(
            "Invalid range: min {}, max {}",
            p.min_range_value, p.max_range_value
        )));
    }
    if p.finish_height <= validation_height + 1
        || p.finish_height >= validation_height + MAX_POLL_DURATION
    {
        return Err(not_currently_valid(format!(
            "Invalid finishing height {}",
            p.finish_height
        )));
    }
    Ok(())
}

fn validate_tagged_data(t: &TaggedDataUpload, tx_timestamp: i32, now: i32) -> Result<(), ChainError> {
    let Some(p) = t.payload() else {
        if now.saturating_sub(tx_timestamp) < MIN_PRUNABLE_LIFETIME {
            return Err(not_currently_valid("Data has been pruned prematurely"));
        }
        return Ok(());
    };
    let name_len = char_len(&p.name);
    if name_len == 0 || name_len > MAX_TAGGED_DATA_NAME_LENGTH {
        return Err(not_valid(format!("Invalid name length: {}", name_len)));
    }
    let limits = [
        ("description", &p.description, MAX_TAGGED_DATA_DESCRIPTION_LENGTH),
        ("tags", &p.tags, MAX_TAGGED_DATA_TAGS_LENGTH),
        ("type", &p.data_type, MAX_TAGGED_DATA_TYPE_LENGTH),
        ("channel", &p.channel, MAX_TAGGED_DATA_CHANNEL_LENGTH),
        ("filename", &p.filename, MAX_TAGGED_DATA_FILENAME_LENGTH),
    ];
    for (field, value, max) in limits {
        if char_len(value) > max {
            return Err(not_valid(format!("Invalid {} length: {}", field, char_len(value))));
        }
    }
    if p.data.is_empty() || p.data.len() > MAX_TAGGED_DATA_DATA_LENGTH {
        return Err(not_valid(format!("Invalid data length: {}", p.data.len())));
    }
    Ok(())
}

impl FeeSchedule for Transaction {
    fn baseline_fee(&self) -> i64 {
        self.fee_for(FeeEra::Baseline)
    }

    fn next_fee(&self) -> i64 {
        self.fee_for(FeeEra::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{Alias, InMemoryChainState, Poll};
    use crate::crypto::KeyPair;
    use crate::transaction::TransactionBuilder;

    fn keypair(name: &str) -> KeyPair {
        KeyPair::from_passphrase(name).unwrap()
    }

    fn signed(builder: TransactionBuilder, kp: &KeyPair) -> Transaction {
        builder.sign(kp).unwrap()
    }

    fn alias_tx(kp: &KeyPair, name: &str) -> Transaction {
        let attachment = Attachment::AliasAssignment(AliasAssignment {
            alias_name: name.into(),
            alias_uri: "https://example.org".into(),
        });
        signed(TransactionBuilder::new(kp.public_key(), attachment, 100).fee(3 * ONE_COIN), kp)
    }

    #[test]
    fn test_payment_validation() {
        let params = ProtocolParams::default();
        let state = InMemoryChainState::new();
        let ctx = ValidationContext::new(10, 200, &params);
        let alice = keypair("alice");
        let bob = keypair("bob");
        let ok = signed(
            TransactionBuilder::new(alice.public_key(), Attachment::OrdinaryPayment, 100)
                .recipient(bob.account_id())
                .amount(100)
                .fee(ONE_COIN),
            &alice,
        );
        assert!(ok.validate(&state, &ctx).is_ok());

        let no_recipient = signed(
            TransactionBuilder::new(alice.public_key(), Attachment::OrdinaryPayment, 100)
                .amount(100)
                .fee(ONE_COIN),
            &alice,
        );
        assert!(matches!(no_recipient.validate(&state, &ctx), Err(ChainError::NotValid(_))));

        let low_fee = signed(
            TransactionBuilder::new(alice.public_key(), Attachment::OrdinaryPayment, 100)
                .recipient(bob.account_id())
                .amount(100)
                .fee(1),
            &alice,
        );
        assert!(matches!(
            low_fee.validate(&state, &ctx),
            Err(ChainError::NotCurrentlyValid(_))
        ));
    }

    #[test]
    fn test_unsigned_transaction_is_not_valid() {
        let params = ProtocolParams::default();
        let state = InMemoryChainState::new();
        let alice = keypair("alice");
        let tx = TransactionBuilder::new(alice.public_key(), Attachment::OrdinaryPayment, 100)
            .recipient(1)
            .amount(1)
            .fee(ONE_COIN)
            .build()
            .unwrap();
        let err = tx.validate(&state, &ValidationContext::new(1, 0, &params)).unwrap_err();
        assert!(err.is_permanent());
    }

    #[test]
    fn test_alias_ownership() {
        let params = ProtocolParams::default();
        let mut state = InMemoryChainState::new();
        let alice = keypair("alice");
        let bob = keypair("bob");
        state.put_alias(Alias {
            name: "foo".into(),
            uri: String::new(),
            account_id: bob.account_id(),
            timestamp: 1,
        });
        let ctx = ValidationContext::new(10, 200, &params);
        assert!(matches!(
            alias_tx(&alice, "FOO").validate(&state, &ctx),
            Err(ChainError::NotCurrentlyValid(_))
        ));
        assert!(alias_tx(&bob, "foo").validate(&state, &ctx).is_ok());
        assert!(matches!(
            alias_tx(&alice, "foo!").validate(&state, &ctx),
            Err(ChainError::NotValid(_))
        ));
    }

    #[test]
    fn test_alias_fee_grows_with_size() {
        let alice = keypair("alice");
        let short = alias_tx(&alice, "foo");
        assert_eq!(short.baseline_fee(), 2 * MIN_FEE);
        let long = alias_tx(&alice, &"a".repeat(40));
        assert_eq!(long.baseline_fee(), 4 * MIN_FEE);
        assert_eq!(short.next_fee(), 2 * NEW_MIN_FEE);
    }

    #[test]
    fn test_issuance_fees() {
        let alice = keypair("alice");
        let issuance = |quantity_qnt| {
            let attachment = Attachment::AssetIssuance(AssetIssuance {
                name: "gold".into(),
                description: "bars".into(),
                quantity_qnt,
                decimals: 0,
            });
            TransactionBuilder::new(alice.public_key(), attachment, 1).build().unwrap()
        };
        assert_eq!(issuance(1).baseline_fee(), MIN_FEE);
        assert_eq!(issuance(1000).baseline_fee(), 1000 * MIN_FEE);
        assert_eq!(issuance(1000).next_fee(), 50 * ONE_COIN);
    }

    #[test]
    fn test_vote_rules() {
        let params = ProtocolParams::default();
        let mut state = InMemoryChainState::new();
        let alice = keypair("alice");
        state.add_poll(Poll {
            poll_id: 7,
            account_id: 1,
            name: "p".into(),
            option_count: 2,
            finish_height: 100,
            min_number_of_options: 1,
            max_number_of_options: 1,
            min_range_value: 0,
            max_range_value: 1,
        });
        let vote = |votes: Vec<i8>| {
            signed(
                TransactionBuilder::new(
                    alice.public_key(),
                    Attachment::VoteCasting(VoteCasting { poll_id: 7, votes }),
                    1,
                )
                .fee(ONE_COIN),
                &alice,
            )
        };
        let ctx = ValidationContext::new(50, 10, &params);
        assert!(vote(vec![1, NO_VOTE_VALUE]).validate(&state, &ctx).is_ok());
        assert!(matches!(vote(vec![1, 1]).validate(&state, &ctx), Err(ChainError::NotValid(_))));
        assert!(matches!(vote(vec![5, NO_VOTE_VALUE]).validate(&state, &ctx), Err(ChainError::NotValid(_))));

        let late = ValidationContext::new(100, 10, &params);
        assert!(matches!(
            vote(vec![1, NO_VOTE_VALUE]).validate(&state, &late),
            Err(ChainError::NotCurrentlyValid(_))
        ));

        state.add_vote(7, alice.account_id(), vec![1, NO_VOTE_VALUE]);
        assert!(matches!(
            vote(vec![0, NO_VOTE_VALUE]).validate(&state, &ctx),
            Err(ChainError::NotCurrentlyValid(_))
        ));
    }

    #[test]
    fn test_poll_finish_height_window() {
        let poll = PollCreation {
            name: "colour".into(),
            description: String::new(),
            options: vec!["red".into(), "blue".into()],
            finish_height: 12,
            min_number_of_options: 1,
            max_number_of_options: 2,
            min_range_value: 0,
            max_range_value: 1,
        };
        assert!(validate_poll(&poll, 10).is_ok());
        assert!(matches!(validate_poll(&poll, 11), Err(ChainError::NotCurrentlyValid(_))));
        let mut bad = poll.clone();
        bad.max_number_of_options = 3;
        assert!(matches!(validate_poll(&bad, 10), Err(ChainError::NotValid(_))));
    }

    #[test]
    fn test_phased_unsafe_variant_rejected() {
        let params = ProtocolParams::default();
        let alice = keypair("alice");
        let tx = signed(
            TransactionBuilder::new(alice.public_key(), Attachment::ArbitraryMessage, 1)
                .fee(ONE_COIN)
                .phased(500),
            &alice,
        );
        assert!(matches!(tx.validate_envelope(), Err(ChainError::NotValid(_))));
    }

    #[test]
    fn test_pruned_tagged_data_too_early() {
        let hash = [9u8; 32];
        let upload = TaggedDataUpload::pruned(hash);
        assert!(matches!(
            validate_tagged_data(&upload, 0, 10),
            Err(ChainError::NotCurrentlyValid(_))
        ));
        assert!(validate_tagged_data(&upload, 0, MIN_PRUNABLE_LIFETIME).is_ok());
    }
}
