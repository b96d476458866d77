use crate::error::{OracleError, OracleResult};
use aioracle_types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tokens one owner holds in oracle custody.
///
/// `reserved` is the part earmarked for open requests; `reserved <= balance`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowAccount {
    pub balance: U256,
    pub reserved: U256,
}

impl EscrowAccount {
    pub fn available(&self) -> U256 {
        self.balance - self.reserved
    }
}

/// Per-owner escrow balances, separate from the ledger's own balances.
///
/// Entries are created on first deposit and never removed.
#[derive(Debug, Clone, Default)]
pub struct EscrowStore {
    accounts: BTreeMap<Address, EscrowAccount>,
}

impl EscrowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, owner: &Address) -> EscrowAccount {
        self.accounts.get(owner).copied().unwrap_or_default()
    }

    pub fn balance_of(&self, owner: &Address) -> U256 {
        self.account(owner).balance
    }

    pub fn reserved_of(&self, owner: &Address) -> U256 {
        self.account(owner).reserved
    }

    pub fn available_of(&self, owner: &Address) -> U256 {
        self.account(owner).available()
    }

    /// Fail unless `amount` of unreserved funds is present.
    pub fn ensure_available(&self, owner: &Address, amount: U256) -> OracleResult<()> {
        let available = self.available_of(owner);
        if available < amount {
            return Err(OracleError::InsufficientBalance {
                available,
                required: amount,
            });
        }
        Ok(())
    }

    /// Fail if crediting `amount` would overflow.
    pub fn ensure_creditable(&self, owner: &Address, amount: U256) -> OracleResult<()> {
        self.balance_of(owner)
            .checked_add(amount)
            .map(|_| ())
            .ok_or(OracleError::ArithmeticOverflow)
    }

    pub fn credit(&mut self, owner: Address, amount: U256) -> OracleResult<U256> {
        self.ensure_creditable(&owner, amount)?;
        let account = self.accounts.entry(owner).or_default();
        account.balance += amount;
        Ok(account.balance)
    }

    /// Remove unreserved funds, e.g. on withdrawal.
    pub fn debit(&mut self, owner: Address, amount: U256) -> OracleResult<U256> {
        self.ensure_available(&owner, amount)?;
        let account = self.accounts.entry(owner).or_default();
        account.balance -= amount;
        Ok(account.balance)
    }

    /// Earmark `amount` for an open request.
    pub fn reserve(&mut self, owner: Address, amount: U256) -> OracleResult<()> {
        self.ensure_available(&owner, amount)?;
        self.accounts.entry(owner).or_default().reserved += amount;
        Ok(())
    }

    /// Release a request's reservation and charge what it consumed.
    pub fn settle(&mut self, owner: Address, reserved: U256, consumed: U256) -> OracleResult<()> {
        let account = self.account(&owner);
        if account.reserved < reserved || reserved < consumed {
            return Err(OracleError::InsufficientBalance {
                available: account.reserved,
                required: reserved.max(consumed),
            });
        }

        let entry = self.accounts.entry(owner).or_default();
        entry.reserved -= reserved;
        entry.balance -= consumed;
        Ok(())
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &EscrowAccount)> {
        self.accounts.iter()
    }

    pub(crate) fn restore(&mut self, owner: Address, account: EscrowAccount) {
        self.accounts.insert(owner, account);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user() -> Address {
        Address::from_low_u64_be(42)
    }

    #[test]
    fn test_unknown_owner_reads_zero() {
        let store = EscrowStore::new();
        assert_eq!(store.balance_of(&user()), U256::zero());
        assert_eq!(store.accounts().count(), 0);
    }

    #[test]
    fn test_reserve_limits_debit() {
        let mut store = EscrowStore::new();
        store.credit(user(), U256::from(100)).unwrap();
        store.reserve(user(), U256::from(70)).unwrap();

        assert_eq!(store.balance_of(&user()), U256::from(100));
        assert_eq!(store.available_of(&user()), U256::from(30));
        assert!(matches!(
            store.debit(user(), U256::from(31)),
            Err(OracleError::InsufficientBalance { .. })
        ));
        assert!(store.reserve(user(), U256::from(31)).is_err());
    }

    #[test]
    fn test_settle_releases_and_charges() {
        let mut store = EscrowStore::new();
        store.credit(user(), U256::from(1000)).unwrap();
        store.reserve(user(), U256::from(100)).unwrap();
        store.settle(user(), U256::from(100), U256::from(50)).unwrap();

        let account = store.account(&user());
        assert_eq!(account.balance, U256::from(950));
        assert_eq!(account.reserved, U256::zero());
    }

    #[test]
    fn test_settle_rejects_unbacked_amounts() {
        let mut store = EscrowStore::new();
        store.credit(user(), U256::from(10)).unwrap();
        store.reserve(user(), U256::from(5)).unwrap();

        assert!(store.settle(user(), U256::from(6), U256::from(1)).is_err());
        assert!(store.settle(user(), U256::from(5), U256::from(6)).is_err());
        assert_eq!(store.account(&user()).reserved, U256::from(5));
    }

    #[test]
    fn test_credit_overflow() {
        let mut store = EscrowStore::new();
        store.credit(user(), U256::MAX).unwrap();
        assert!(matches!(
            store.credit(user(), U256::one()),
            Err(OracleError::ArithmeticOverflow)
        ));
    }

    proptest! {
        #[test]
        fn credit_then_debit_roundtrips(start in any::<u64>(), amount in 1u64..u64::MAX) {
            let mut store = EscrowStore::new();
            store.credit(user(), U256::from(start)).unwrap();
            store.credit(user(), U256::from(amount)).unwrap();
            store.debit(user(), U256::from(amount)).unwrap();
            prop_assert_eq!(store.balance_of(&user()), U256::from(start));
        }
    }
}
