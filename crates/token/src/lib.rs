//! Fungible token ledger the oracle escrows against.
//!
//! The oracle engine only talks to the ledger through [`TokenLedger`]; the
//! in-process [`AiToken`] implementation backs tests, simulation and the CLI.

use aioracle_types::{Address, U256};
use thiserror::Error;

pub mod ledger;
pub mod shared;

pub use aioracle_types::{format_units, parse_units, DEFAULT_DECIMALS};
pub use ledger::{AiToken, TokenRole};
pub use shared::SharedToken;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: U256, required: U256 },

    #[error("Insufficient allowance: available {available}, required {required}")]
    InsufficientAllowance { available: U256, required: U256 },

    #[error("Account {account} lacks role {role:?}")]
    Unauthorized { account: Address, role: TokenRole },

    #[error("Token transfers are paused")]
    Paused,

    #[error("Zero address is not a valid {0}")]
    ZeroAddress(&'static str),

    #[error("Token supply overflow")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, TokenError>;

/// ERC-20 style ledger operations.
///
/// Every method names its caller explicitly; there is no ambient sender.
pub trait TokenLedger: Send {
    fn balance_of(&self, account: &Address) -> U256;

    fn allowance(&self, owner: &Address, spender: &Address) -> U256;

    fn total_supply(&self) -> U256;

    fn approve(&mut self, owner: Address, spender: Address, amount: U256) -> Result<()>;

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    fn transfer_from(&mut self, spender: Address, from: Address, to: Address, amount: U256) -> Result<()>;

    fn mint(&mut self, caller: Address, to: Address, amount: U256) -> Result<()>;

    /// Destroy `amount` of the caller's own tokens.
    fn burn(&mut self, caller: Address, amount: U256) -> Result<()>;
}
