//! Integration tests for reservation, application and duplicate handling of transactions

use forgechain::blockchain::{ChainState, InMemoryChainState};
use forgechain::config::{ProtocolParams, ONE_COIN};
use forgechain::crypto::KeyPair;
use forgechain::error::ChainError;
use forgechain::ledger::{InMemoryLedger, Ledger, SharedLedger};
use forgechain::transaction::attachment::{
    AliasAssignment, AliasBuy, AliasSell, GoodsDelisting, GoodsListing, GoodsPurchase,
};
use forgechain::transaction::{
    kind, Attachment, DuplicateTracker, LifecycleState, Transaction, TransactionBuilder,
    ValidationContext,
};
use std::sync::atomic::{AtomicUsize, Ordering};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Helper to build a signed payment
fn payment(from: &KeyPair, to: u64, amount: i64, fee: i64) -> Result<Transaction, ChainError> {
    TransactionBuilder::new(from.public_key(), Attachment::OrdinaryPayment, 100)
        .recipient(to)
        .amount(amount)
        .fee(fee)
        .sign(from)
}

fn alias(from: &KeyPair, name: &str) -> Result<Transaction, ChainError> {
    TransactionBuilder::new(
        from.public_key(),
        Attachment::AliasAssignment(AliasAssignment {
            alias_name: name.to_string(),
            alias_uri: format!("acct:{}", name),
        }),
        100,
    )
    .fee(2 * ONE_COIN)
    .sign(from)
}

/// Reserves and applies `tx` as if it were confirmed in block 1.
fn confirm(
    mut tx: Transaction,
    ledger: &mut InMemoryLedger,
    state: &mut InMemoryChainState,
    params: &ProtocolParams,
) -> TestResult {
    tx.set_block(1, 1, 0)?;
    assert!(tx.reserve(ledger, params)?);
    tx.apply(ledger, state, params)?;
    Ok(())
}

#[test]
fn test_payment_end_to_end() -> TestResult {
    let params = ProtocolParams::default();
    let alice = KeyPair::from_passphrase("alice")?;
    let bob = KeyPair::from_passphrase("bob")?;
    let mut ledger = InMemoryLedger::new();
    ledger.credit(alice.account_id(), 200)?;
    let mut state = InMemoryChainState::new();

    let mut tx = payment(&alice, bob.account_id(), 100, 1)?;
    tx.set_block(9, 1, 0)?;
    assert!(tx.reserve(&mut ledger, &params)?);
    assert_eq!(ledger.unconfirmed_balance(alice.account_id()), 99);
    assert_eq!(ledger.balance(alice.account_id()), 200);

    tx.apply(&mut ledger, &mut state, &params)?;
    assert_eq!(tx.lifecycle_state(), LifecycleState::Applied);
    assert_eq!(ledger.balance(alice.account_id()), 99);
    assert_eq!(ledger.unconfirmed_balance(alice.account_id()), 99);
    assert_eq!(ledger.balance(bob.account_id()), 100);
    assert_eq!(ledger.unconfirmed_balance(bob.account_id()), 100);
    assert_eq!(ledger.public_key(alice.account_id()), Some(alice.public_key()));
    Ok(())
}

#[test]
fn test_reserve_release_round_trip_with_deposit() -> TestResult {
    let params = ProtocolParams::default();
    let alice = KeyPair::from_passphrase("alice")?;
    let mut ledger = InMemoryLedger::new();
    ledger.credit(alice.account_id(), 1_000 * ONE_COIN)?;

    let mut tx = TransactionBuilder::new(alice.public_key(), Attachment::OrdinaryPayment, 100)
        .recipient(5)
        .amount(10 * ONE_COIN)
        .fee(ONE_COIN)
        .referenced_transaction([7u8; 32])
        .sign(&alice)?;
    let before = ledger.unconfirmed_balance(alice.account_id());
    assert!(tx.reserve(&mut ledger, &params)?);
    assert_eq!(
        ledger.unconfirmed_balance(alice.account_id()),
        before - 11 * ONE_COIN - params.unconfirmed_pool_deposit_nqt
    );
    tx.release(&mut ledger, &params)?;
    assert_eq!(ledger.unconfirmed_balance(alice.account_id()), before);
    assert_eq!(tx.lifecycle_state(), LifecycleState::Unvalidated);
    Ok(())
}

#[test]
fn test_double_spend_in_submission_order() -> TestResult {
    let params = ProtocolParams::default();
    let alice = KeyPair::from_passphrase("alice")?;
    let mut ledger = InMemoryLedger::new();
    ledger.credit(alice.account_id(), 150)?;

    let mut first = payment(&alice, 1, 80, 1)?;
    let mut second = payment(&alice, 2, 80, 1)?;
    assert!(first.reserve(&mut ledger, &params)?);
    assert!(!second.reserve(&mut ledger, &params)?);
    assert_eq!(second.lifecycle_state(), LifecycleState::Unvalidated);
    assert_eq!(ledger.unconfirmed_balance(alice.account_id()), 69);
    Ok(())
}

#[test]
fn test_concurrent_reservations_never_both_succeed() -> TestResult {
    let params = ProtocolParams::default();
    let alice = KeyPair::from_passphrase("alice")?;
    let mut seed = InMemoryLedger::new();
    seed.credit(alice.account_id(), 150)?;
    let ledger = SharedLedger::new(seed);

    // Winners keep their reservation, so the second thread sees the first one's hold.
    let held = std::sync::Mutex::new(Vec::new());
    let successes = AtomicUsize::new(0);
    let candidates = vec![payment(&alice, 1, 80, 1)?, payment(&alice, 2, 80, 1)?];
    std::thread::scope(|scope| {
        for mut tx in candidates {
            let ledger = ledger.clone();
            let params = &params;
            let successes = &successes;
            let held = &held;
            scope.spawn(move || {
                let reserved = tx.reserve(&mut *ledger.lock(), params).unwrap();
                if reserved {
                    successes.fetch_add(1, Ordering::SeqCst);
                    held.lock().unwrap().push(tx);
                }
            });
        }
    });
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.lock().unconfirmed_balance(alice.account_id()), 69);
    Ok(())
}

#[test]
fn test_lifecycle_guards() -> TestResult {
    let params = ProtocolParams::default();
    let alice = KeyPair::from_passphrase("alice")?;
    let mut ledger = InMemoryLedger::new();
    ledger.credit(alice.account_id(), 1_000)?;
    let mut state = InMemoryChainState::new();

    let mut tx = payment(&alice, 3, 10, 1)?;
    assert!(matches!(
        tx.apply(&mut ledger, &mut state, &params),
        Err(ChainError::IllegalState(_))
    ));
    assert!(matches!(tx.release(&mut ledger, &params), Err(ChainError::IllegalState(_))));
    assert!(tx.reserve(&mut ledger, &params)?);
    assert!(matches!(tx.reserve(&mut ledger, &params), Err(ChainError::IllegalState(_))));
    tx.apply(&mut ledger, &mut state, &params)?;
    assert!(matches!(
        tx.apply(&mut ledger, &mut state, &params),
        Err(ChainError::IllegalState(_))
    ));
    assert!(matches!(tx.release(&mut ledger, &params), Err(ChainError::IllegalState(_))));
    assert!(matches!(tx.set_block(1, 1, 0), Err(ChainError::IllegalState(_))));
    Ok(())
}

#[test]
fn test_same_alias_twice_in_one_block() -> TestResult {
    let params = ProtocolParams::default();
    let alice = KeyPair::from_passphrase("alice")?;
    let bob = KeyPair::from_passphrase("bob")?;
    let state = InMemoryChainState::new();
    let ctx = ValidationContext::new(10, 200, &params);

    let first = alias(&alice, "foo")?;
    let second = alias(&bob, "foo")?;
    first.validate(&state, &ctx)?;
    second.validate(&state, &ctx)?;

    let mut tracker = DuplicateTracker::new();
    assert!(!first.is_block_duplicate(&mut tracker, &state));
    assert!(!first.is_duplicate(&mut tracker));
    assert!(second.is_block_duplicate(&mut tracker, &state) || second.is_duplicate(&mut tracker));
    Ok(())
}

#[test]
fn test_alias_updates_are_keyed_by_name() -> TestResult {
    let params = ProtocolParams::default();
    let alice = KeyPair::from_passphrase("alice")?;
    let mut ledger = InMemoryLedger::new();
    ledger.credit(alice.account_id(), 100 * ONE_COIN)?;
    let mut state = InMemoryChainState::new();

    let mut tx = alias(&alice, "Forge")?;
    tx.set_block(1, 1, 0)?;
    assert!(tx.reserve(&mut ledger, &params)?);
    tx.apply(&mut ledger, &mut state, &params)?;
    let stored = state.alias("forge").ok_or("alias missing")?;
    assert_eq!(stored.account_id, alice.account_id());

    // An existing alias is not limited at block level, only by name.
    let update = alias(&alice, "FORGE")?;
    let mut tracker = DuplicateTracker::new();
    assert!(!update.is_block_duplicate(&mut tracker, &state));
    assert!(!update.is_duplicate(&mut tracker));
    assert!(alias(&alice, "forge")?.is_duplicate(&mut tracker));
    Ok(())
}

#[test]
fn test_listed_goods_can_be_bought_until_delisted() -> TestResult {
    let params = ProtocolParams::default();
    let ctx = ValidationContext::new(10, 200, &params);
    let seller = KeyPair::from_passphrase("seller")?;
    let buyer = KeyPair::from_passphrase("buyer")?;
    let mut ledger = InMemoryLedger::new();
    ledger.credit(seller.account_id(), 100 * ONE_COIN)?;
    ledger.credit(buyer.account_id(), 100 * ONE_COIN)?;
    let mut state = InMemoryChainState::new();

    let listing = TransactionBuilder::new(
        seller.public_key(),
        Attachment::DigitalGoodsListing(GoodsListing {
            name: "lamp".into(),
            description: "brass".into(),
            tags: "light".into(),
            quantity: 2,
            price_nqt: 5 * ONE_COIN,
        }),
        100,
    )
    .fee(2 * ONE_COIN)
    .sign(&seller)?;
    listing.validate(&state, &ctx)?;
    let goods_id = listing.id()?;
    confirm(listing, &mut ledger, &mut state, &params)?;
    let goods = state.goods(goods_id).ok_or("goods missing")?;
    assert_eq!(goods.seller_id, seller.account_id());
    assert_eq!(goods.quantity, 2);

    let purchase = |quantity| {
        TransactionBuilder::new(
            buyer.public_key(),
            Attachment::DigitalGoodsPurchase(GoodsPurchase {
                goods_id,
                quantity,
                price_nqt: 5 * ONE_COIN,
                delivery_deadline_timestamp: 10_000,
            }),
            100,
        )
        .recipient(seller.account_id())
        .fee(ONE_COIN)
        .sign(&buyer)
    };
    assert!(matches!(
        purchase(3)?.validate(&state, &ctx),
        Err(ChainError::NotCurrentlyValid(_))
    ));
    let first = purchase(1)?;
    first.validate(&state, &ctx)?;
    confirm(first, &mut ledger, &mut state, &params)?;
    assert_eq!(state.goods(goods_id).map(|g| g.quantity), Some(1));
    assert_eq!(ledger.balance(buyer.account_id()), 94 * ONE_COIN);

    let delisting = TransactionBuilder::new(
        seller.public_key(),
        Attachment::DigitalGoodsDelisting(GoodsDelisting { goods_id }),
        100,
    )
    .fee(ONE_COIN)
    .sign(&seller)?;
    delisting.validate(&state, &ctx)?;
    confirm(delisting, &mut ledger, &mut state, &params)?;
    assert!(matches!(
        purchase(1)?.validate(&state, &ctx),
        Err(ChainError::NotCurrentlyValid(_))
    ));
    Ok(())
}

#[test]
fn test_alias_offer_is_taken_by_the_named_buyer() -> TestResult {
    let params = ProtocolParams::default();
    let ctx = ValidationContext::new(10, 200, &params);
    let alice = KeyPair::from_passphrase("alice")?;
    let bob = KeyPair::from_passphrase("bob")?;
    let carol = KeyPair::from_passphrase("carol")?;
    let mut ledger = InMemoryLedger::new();
    for account in [&alice, &bob, &carol] {
        ledger.credit(account.account_id(), 100 * ONE_COIN)?;
    }
    let mut state = InMemoryChainState::new();
    confirm(alias(&alice, "forge")?, &mut ledger, &mut state, &params)?;

    let sell = TransactionBuilder::new(
        alice.public_key(),
        Attachment::AliasSell(AliasSell {
            alias_name: "forge".into(),
            price_nqt: 5 * ONE_COIN,
        }),
        100,
    )
    .recipient(bob.account_id())
    .fee(ONE_COIN)
    .sign(&alice)?;
    sell.validate(&state, &ctx)?;
    confirm(sell, &mut ledger, &mut state, &params)?;
    assert_eq!(state.alias_offer("forge").map(|o| o.price_nqt), Some(5 * ONE_COIN));

    let buy = |from: &KeyPair, amount: i64| {
        TransactionBuilder::new(
            from.public_key(),
            Attachment::AliasBuy(AliasBuy {
                alias_name: "Forge".into(),
            }),
            100,
        )
        .recipient(alice.account_id())
        .amount(amount)
        .fee(ONE_COIN)
        .sign(from)
    };
    assert!(matches!(
        buy(&carol, 5 * ONE_COIN)?.validate(&state, &ctx),
        Err(ChainError::NotCurrentlyValid(_))
    ));
    assert!(matches!(
        buy(&bob, 4 * ONE_COIN)?.validate(&state, &ctx),
        Err(ChainError::NotCurrentlyValid(_))
    ));

    let accepted = buy(&bob, 5 * ONE_COIN)?;
    accepted.validate(&state, &ctx)?;
    confirm(accepted, &mut ledger, &mut state, &params)?;
    let stored = state.alias("forge").ok_or("alias missing")?;
    assert_eq!(stored.account_id, bob.account_id());
    assert!(state.alias_offer("forge").is_none());
    // Assignment fee 2, sell fee 1, sale proceeds 5.
    assert_eq!(ledger.balance(alice.account_id()), 102 * ONE_COIN);
    assert_eq!(ledger.balance(bob.account_id()), 94 * ONE_COIN);

    // The offer is gone, so a repeat purchase has nothing to buy.
    assert!(matches!(
        buy(&bob, 5 * ONE_COIN)?.validate(&state, &ctx),
        Err(ChainError::NotCurrentlyValid(_))
    ));
    Ok(())
}

#[test]
fn test_retired_and_unknown_variants() {
    assert!(matches!(
        kind::find(1, 4),
        Err(ChainError::RetiredVariant { type_: 1, subtype: 4, .. })
    ));
    assert!(matches!(kind::find(5, 0), Ok(None)));
    assert!(matches!(kind::find(7, 1), Ok(None)));
    assert!(matches!(kind::find(1, 9), Ok(None)));
    assert!(matches!(
        kind::require(9, 0),
        Err(ChainError::UnknownVariant { type_: 9, subtype: 0 })
    ));
    assert!(matches!(kind::find(0, 0), Ok(Some(_))));
}
