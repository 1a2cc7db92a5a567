//! Account balance store consumed by the state-transition core.
//!
//! The core never owns balances: it mutates them through [`Ledger`]. Two implementations are
//! provided, a plain [`InMemoryLedger`] and a [`SharedLedger`] that serializes whole
//! reserve/release operations behind one lock so concurrent submitters cannot both observe the
//! same funds.

use crate::crypto::{AccountId, PublicKeyBytes};
use crate::error::ChainError;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub trait Ledger {
    fn balance(&self, account: AccountId) -> i64;
    fn unconfirmed_balance(&self, account: AccountId) -> i64;
    fn forged_balance(&self, account: AccountId) -> i64;
    fn asset_balance(&self, account: AccountId, asset_id: u64) -> i64;
    fn unconfirmed_asset_balance(&self, account: AccountId, asset_id: u64) -> i64;
    fn public_key(&self, account: AccountId) -> Option<PublicKeyBytes>;

    /// Binds `public_key` to `account`, creating the account on first appearance.
    /// Rebinding a different key is rejected.
    fn apply_public_key(
        &mut self,
        account: AccountId,
        public_key: &PublicKeyBytes,
    ) -> Result<(), ChainError>;

    // All mutators fail with `DoubleSpend` if the resulting balance would go negative.
    fn add_to_balance(&mut self, account: AccountId, delta: i64) -> Result<(), ChainError>;
    fn add_to_unconfirmed_balance(&mut self, account: AccountId, delta: i64)
        -> Result<(), ChainError>;
    fn add_to_forged_balance(&mut self, account: AccountId, delta: i64) -> Result<(), ChainError>;
    fn add_to_asset_balance(
        &mut self,
        account: AccountId,
        asset_id: u64,
        delta: i64,
    ) -> Result<(), ChainError>;
    fn add_to_unconfirmed_asset_balance(
        &mut self,
        account: AccountId,
        asset_id: u64,
        delta: i64,
    ) -> Result<(), ChainError>;

    fn add_to_balance_and_unconfirmed_balance(
        &mut self,
        account: AccountId,
        delta: i64,
    ) -> Result<(), ChainError> {
        self.add_to_balance(account, delta)?;
        self.add_to_unconfirmed_balance(account, delta)
    }

    fn add_to_asset_and_unconfirmed_asset_balance(
        &mut self,
        account: AccountId,
        asset_id: u64,
        delta: i64,
    ) -> Result<(), ChainError> {
        self.add_to_asset_balance(account, asset_id, delta)?;
        self.add_to_unconfirmed_asset_balance(account, asset_id, delta)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub balance_nqt: i64,
    pub unconfirmed_balance_nqt: i64,
    pub forged_balance_nqt: i64,
    #[serde(skip_serializing_if = "Option::is_none", with = "opt_hex")]
    pub public_key: Option<PublicKeyBytes>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssetBalance {
    pub quantity_qnt: i64,
    pub unconfirmed_quantity_qnt: i64,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    accounts: HashMap<AccountId, AccountBalance>,
    assets: HashMap<(AccountId, u64), AssetBalance>,
    /// The genesis creator funds the initial distribution and may run negative.
    genesis_account: Option<AccountId>,
}

fn checked_add(account: AccountId, what: &str, current: i64, delta: i64) -> Result<i64, ChainError> {
    current.checked_add(delta).ok_or_else(|| {
        ChainError::DoubleSpend(format!(
            "{} of account {} overflows: {} + {}",
            what, account, current, delta
        ))
    })
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_genesis_account(genesis_account: AccountId) -> Self {
        Self {
            genesis_account: Some(genesis_account),
            ..Self::default()
        }
    }

    /// Seeds an account with equal confirmed and unconfirmed balances.
    pub fn credit(&mut self, account: AccountId, amount_nqt: i64) -> Result<(), ChainError> {
        self.add_to_balance_and_unconfirmed_balance(account, amount_nqt)
    }

    pub fn account(&self, account: AccountId) -> Option<&AccountBalance> {
        self.accounts.get(&account)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &AccountBalance)> {
        self.accounts.iter()
    }

    fn guard(&self, account: AccountId, what: &str, value: i64) -> Result<i64, ChainError> {
        if value < 0 && self.genesis_account != Some(account) {
            return Err(ChainError::DoubleSpend(format!(
                "{} of account {} would become negative ({})",
                what, account, value
            )));
        }
        Ok(value)
    }

    fn update<F>(&mut self, account: AccountId, what: &str, delta: i64, field: F) -> Result<(), ChainError>
    where
        F: Fn(&mut AccountBalance) -> &mut i64,
    {
        if delta == 0 {
            return Ok(());
        }
        let mut current = self.accounts.get(&account).cloned().unwrap_or_default();
        let value = checked_add(account, what, *field(&mut current), delta)?;
        let value = self.guard(account, what, value)?;
        *field(self.accounts.entry(account).or_default()) = value;
        Ok(())
    }

    fn update_asset<F>(
        &mut self,
        account: AccountId,
        asset_id: u64,
        what: &str,
        delta: i64,
        field: F,
    ) -> Result<(), ChainError>
    where
        F: Fn(&mut AssetBalance) -> &mut i64,
    {
        if delta == 0 {
            return Ok(());
        }
        let mut current = self.assets.get(&(account, asset_id)).copied().unwrap_or_default();
        let value = checked_add(account, what, *field(&mut current), delta)?;
        if value < 0 {
            return Err(ChainError::DoubleSpend(format!(
                "{} of asset {} for account {} would become negative ({})",
                what, asset_id, account, value
            )));
        }
        *field(self.assets.entry((account, asset_id)).or_default()) = value;
        Ok(())
    }
}

impl Ledger for InMemoryLedger {
    fn balance(&self, account: AccountId) -> i64 {
        self.accounts.get(&account).map_or(0, |a| a.balance_nqt)
    }

    fn unconfirmed_balance(&self, account: AccountId) -> i64 {
        self.accounts
            .get(&account)
            .map_or(0, |a| a.unconfirmed_balance_nqt)
    }

    fn forged_balance(&self, account: AccountId) -> i64 {
        self.accounts.get(&account).map_or(0, |a| a.forged_balance_nqt)
    }

    fn asset_balance(&self, account: AccountId, asset_id: u64) -> i64 {
        self.assets
            .get(&(account, asset_id))
            .map_or(0, |a| a.quantity_qnt)
    }

    fn unconfirmed_asset_balance(&self, account: AccountId, asset_id: u64) -> i64 {
        self.assets
            .get(&(account, asset_id))
            .map_or(0, |a| a.unconfirmed_quantity_qnt)
    }

    fn public_key(&self, account: AccountId) -> Option<PublicKeyBytes> {
        self.accounts.get(&account).and_then(|a| a.public_key)
    }

    fn apply_public_key(
        &mut self,
        account: AccountId,
        public_key: &PublicKeyBytes,
    ) -> Result<(), ChainError> {
        let entry = self.accounts.entry(account).or_default();
        match entry.public_key {
            Some(existing) if existing != *public_key => Err(ChainError::NotValid(format!(
                "Account {} is already bound to public key {}",
                account,
                hex::encode(existing)
            ))),
            Some(_) => Ok(()),
            None => {
                entry.public_key = Some(*public_key);
                Ok(())
            }
        }
    }

    fn add_to_balance(&mut self, account: AccountId, delta: i64) -> Result<(), ChainError> {
        self.update(account, "Balance", delta, |a| &mut a.balance_nqt)
    }

    fn add_to_unconfirmed_balance(
        &mut self,
        account: AccountId,
        delta: i64,
    ) -> Result<(), ChainError> {
        self.update(account, "Unconfirmed balance", delta, |a| {
            &mut a.unconfirmed_balance_nqt
        })
    }

    fn add_to_forged_balance(&mut self, account: AccountId, delta: i64) -> Result<(), ChainError> {
        self.update(account, "Forged balance", delta, |a| &mut a.forged_balance_nqt)
    }

    fn add_to_asset_balance(
        &mut self,
        account: AccountId,
        asset_id: u64,
        delta: i64,
    ) -> Result<(), ChainError> {
        self.update_asset(account, asset_id, "Asset balance", delta, |a| {
            &mut a.quantity_qnt
        })
    }

    fn add_to_unconfirmed_asset_balance(
        &mut self,
        account: AccountId,
        asset_id: u64,
        delta: i64,
    ) -> Result<(), ChainError> {
        self.update_asset(account, asset_id, "Unconfirmed asset balance", delta, |a| {
            &mut a.unconfirmed_quantity_qnt
        })
    }
}

/// Cloneable handle over one [`InMemoryLedger`].
///
/// Hold the guard from [`SharedLedger::lock`] for the whole reserve or release of a
/// transaction; the check-then-debit inside a reservation is only atomic under that guard.
#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<InMemoryLedger>>,
}

impl SharedLedger {
    pub fn new(ledger: InMemoryLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, InMemoryLedger> {
        self.inner.lock()
    }

    /// Runs `f` with exclusive access to the ledger.
    pub fn transact<R>(&self, f: impl FnOnce(&mut InMemoryLedger) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    pub fn snapshot(&self) -> InMemoryLedger {
        self.inner.lock().clone()
    }
}

mod opt_hex {
    use crate::crypto::PublicKeyBytes;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(
        key: &Option<PublicKeyBytes>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match key {
            Some(k) => serializer.serialize_str(&hex::encode(k)),
            None => serializer.serialize_none(),
        }
    }
}
