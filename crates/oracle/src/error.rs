use crate::access::Role;
use aioracle_storage::StorageError;
use aioracle_token::TokenError;
use aioracle_types::{Address, FormatPair, ModelId, RequestId, U256};
use thiserror::Error;

pub type OracleResult<T> = Result<T, OracleError>;

/// Every rejection is a synchronous precondition failure; the rejected
/// operation leaves no state behind.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Account {account} lacks role {role}")]
    Unauthorized { account: Address, role: Role },

    #[error("Unknown model: {0}")]
    UnknownModel(ModelId),

    #[error("Model {model} does not support {pair}")]
    UnsupportedFormatPair { model: ModelId, pair: FormatPair },

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: U256, required: U256 },

    #[error("Token ledger rejected the deposit: {0}")]
    InsufficientAllowance(#[source] TokenError),

    #[error("Request {0} not found")]
    RequestNotFound(RequestId),

    #[error("Request {0} is already finalized")]
    RequestAlreadyFinalized(RequestId),

    #[error("Token consumed {consumed} exceeds limit {limit}")]
    TokenConsumedExceedsLimit { consumed: U256, limit: U256 },

    #[error("Invalid amount: {0} must be greater than zero")]
    InvalidAmount(&'static str),

    #[error("Request would exceed {limit} response segments")]
    TooManySegments { limit: usize },

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Token ledger error: {0}")]
    Ledger(#[from] TokenError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl OracleError {
    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OracleError::Unauthorized { .. } => "unauthorized",
            OracleError::UnknownModel(_) => "unknown_model",
            OracleError::UnsupportedFormatPair { .. } => "unsupported_format_pair",
            OracleError::InsufficientBalance { .. } => "insufficient_balance",
            OracleError::InsufficientAllowance(_) => "insufficient_allowance",
            OracleError::RequestNotFound(_) => "request_not_found",
            OracleError::RequestAlreadyFinalized(_) => "request_already_finalized",
            OracleError::TokenConsumedExceedsLimit { .. } => "token_consumed_exceeds_limit",
            OracleError::InvalidAmount(_) => "invalid_amount",
            OracleError::TooManySegments { .. } => "too_many_segments",
            OracleError::ArithmeticOverflow => "arithmetic_overflow",
            OracleError::Ledger(_) => "ledger",
            OracleError::Storage(_) => "storage",
        }
    }
}
