use crate::{Result, TokenError, TokenLedger};
use aioracle_types::{Address, U256, DEFAULT_DECIMALS};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenRole {
    /// Grants and revokes the other roles
    Admin,
    /// May pause and unpause transfers
    Pauser,
    /// May create new supply
    Minter,
}

/// The oracle's payment token: `AIToken` / `AIT`, 18 decimals.
#[derive(Debug, Clone)]
pub struct AiToken {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    total_supply: U256,
    roles: HashMap<TokenRole, HashSet<Address>>,
    paused: bool,
}

impl AiToken {
    pub const NAME: &'static str = "AIToken";
    pub const SYMBOL: &'static str = "AIT";

    /// Create the token with its three bootstrap role holders and no supply.
    pub fn new(default_admin: Address, pauser: Address, minter: Address) -> Self {
        let mut token = Self {
            balances: HashMap::new(),
            allowances: HashMap::new(),
            total_supply: U256::zero(),
            roles: HashMap::new(),
            paused: false,
        };
        token.insert_role(TokenRole::Admin, default_admin);
        token.insert_role(TokenRole::Pauser, pauser);
        token.insert_role(TokenRole::Minter, minter);
        token
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn symbol(&self) -> &'static str {
        Self::SYMBOL
    }

    pub fn decimals(&self) -> u32 {
        DEFAULT_DECIMALS
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_role(&self, role: TokenRole, account: &Address) -> bool {
        self.roles.get(&role).map_or(false, |members| members.contains(account))
    }

    pub fn grant_role(&mut self, caller: Address, role: TokenRole, account: Address) -> Result<()> {
        self.require_role(TokenRole::Admin, &caller)?;
        self.insert_role(role, account);
        Ok(())
    }

    pub fn revoke_role(&mut self, caller: Address, role: TokenRole, account: Address) -> Result<()> {
        self.require_role(TokenRole::Admin, &caller)?;
        if let Some(members) = self.roles.get_mut(&role) {
            members.remove(&account);
        }
        Ok(())
    }

    pub fn pause(&mut self, caller: Address) -> Result<()> {
        self.require_role(TokenRole::Pauser, &caller)?;
        self.paused = true;
        debug!(%caller, "Token paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: Address) -> Result<()> {
        self.require_role(TokenRole::Pauser, &caller)?;
        self.paused = false;
        debug!(%caller, "Token unpaused");
        Ok(())
    }

    fn insert_role(&mut self, role: TokenRole, account: Address) {
        self.roles.entry(role).or_default().insert(account);
    }

    fn require_role(&self, role: TokenRole, account: &Address) -> Result<()> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(TokenError::Unauthorized { account: *account, role })
        }
    }

    fn ensure_not_paused(&self) -> Result<()> {
        if self.paused {
            Err(TokenError::Paused)
        } else {
            Ok(())
        }
    }

    /// Move a balance; all checks run before either side is touched.
    fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        self.ensure_not_paused()?;
        if to.is_zero() {
            return Err(TokenError::ZeroAddress("recipient"));
        }

        let available = self.balance_of(&from);
        if available < amount {
            return Err(TokenError::InsufficientBalance { available, required: amount });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow)?;

        self.balances.insert(from, available - amount);
        self.balances.insert(to, credited);
        Ok(())
    }
}

impl TokenLedger for AiToken {
    fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or_default()
    }

    fn total_supply(&self) -> U256 {
        self.total_supply
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: U256) -> Result<()> {
        if spender.is_zero() {
            return Err(TokenError::ZeroAddress("spender"));
        }
        self.allowances.insert((owner, spender), amount);
        Ok(())
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        self.move_balance(from, to, amount)?;
        debug!(%from, %to, %amount, "Token transfer");
        Ok(())
    }

    fn transfer_from(&mut self, spender: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        let allowed = self.allowance(&from, &spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                available: allowed,
                required: amount,
            });
        }

        self.move_balance(from, to, amount)?;

        // An allowance of U256::MAX is treated as unlimited.
        if allowed != U256::MAX {
            self.allowances.insert((from, spender), allowed - amount);
        }
        debug!(%spender, %from, %to, %amount, "Token transfer_from");
        Ok(())
    }

    fn mint(&mut self, caller: Address, to: Address, amount: U256) -> Result<()> {
        self.require_role(TokenRole::Minter, &caller)?;
        self.ensure_not_paused()?;
        if to.is_zero() {
            return Err(TokenError::ZeroAddress("recipient"));
        }

        let supply = self.total_supply.checked_add(amount).ok_or(TokenError::Overflow)?;
        let balance = self.balance_of(&to).checked_add(amount).ok_or(TokenError::Overflow)?;
        self.total_supply = supply;
        self.balances.insert(to, balance);
        debug!(%to, %amount, "Token mint");
        Ok(())
    }

    fn burn(&mut self, caller: Address, amount: U256) -> Result<()> {
        self.ensure_not_paused()?;
        let available = self.balance_of(&caller);
        if available < amount {
            return Err(TokenError::InsufficientBalance { available, required: amount });
        }

        self.balances.insert(caller, available - amount);
        self.total_supply -= amount;
        debug!(%caller, %amount, "Token burn");
        Ok(())
    }
}
