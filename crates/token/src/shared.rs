use crate::{AiToken, Result, TokenLedger};
use aioracle_types::{Address, U256};
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable handle onto one ledger.
///
/// The oracle engine owns one clone while tests and tooling keep another to
/// mint, approve and inspect balances.
#[derive(Debug, Clone)]
pub struct SharedToken {
    inner: Arc<RwLock<AiToken>>,
}

impl SharedToken {
    pub fn new(token: AiToken) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token)),
        }
    }

    /// Run `f` with exclusive access, e.g. for pause or role changes.
    pub fn with<R>(&self, f: impl FnOnce(&mut AiToken) -> R) -> R {
        f(&mut self.inner.write())
    }
}

impl TokenLedger for SharedToken {
    fn balance_of(&self, account: &Address) -> U256 {
        self.inner.read().balance_of(account)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.inner.read().allowance(owner, spender)
    }

    fn total_supply(&self) -> U256 {
        self.inner.read().total_supply()
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: U256) -> Result<()> {
        self.inner.write().approve(owner, spender, amount)
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        self.inner.write().transfer(from, to, amount)
    }

    fn transfer_from(&mut self, spender: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        self.inner.write().transfer_from(spender, from, to, amount)
    }

    fn mint(&mut self, caller: Address, to: Address, amount: U256) -> Result<()> {
        self.inner.write().mint(caller, to, amount)
    }

    fn burn(&mut self, caller: Address, amount: U256) -> Result<()> {
        self.inner.write().burn(caller, amount)
    }
}
