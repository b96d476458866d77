//! Finalization callbacks.
//!
//! A callback is a deferred, fallible delivery of the full response to a
//! consumer address. Its outcome is reported next to the committed
//! finalization and never changes it.

use aioracle_types::{Address, Bytes, RequestId, U256};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("Out of gas: limit {limit}")]
    OutOfGas { limit: u64 },

    #[error("No callback target registered at {0}")]
    NoTarget(Address),

    #[error("Callback reverted: {0}")]
    Reverted(String),

    #[error("Callback panicked")]
    Panicked,
}

/// Gas meter bounding one callback invocation.
#[derive(Debug, Clone, Copy)]
pub struct Gas {
    limit: u64,
    used: u64,
}

impl Gas {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    pub fn consume(&mut self, amount: u64) -> Result<(), CallbackError> {
        let new_used = self.used.saturating_add(amount);
        if new_used > self.limit {
            Err(CallbackError::OutOfGas { limit: self.limit })
        } else {
            self.used = new_used;
            Ok(())
        }
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

pub struct GasCost;

impl GasCost {
    /// Cold account access for the call itself
    pub const CALL: u64 = 2600;
    pub const CALLDATA_ZERO_BYTE: u64 = 4;
    pub const CALLDATA_NONZERO_BYTE: u64 = 16;
    /// Storage write charged per segment by [`RecordingTarget`]
    pub const SSTORE: u64 = 20000;
}

/// What a callback target receives at finalization.
#[derive(Debug, Clone, Copy)]
pub struct ResponsePayload<'a> {
    pub request_id: RequestId,
    pub requester: Address,
    pub token_consumed: U256,
    pub segments: &'a [Bytes],
}

impl ResponsePayload<'_> {
    /// Calldata price of delivering every segment.
    pub fn calldata_cost(&self) -> u64 {
        self.segments
            .iter()
            .map(|segment| {
                let zeros = segment.zero_count() as u64;
                let nonzero = segment.len() as u64 - zeros;
                zeros * GasCost::CALLDATA_ZERO_BYTE + nonzero * GasCost::CALLDATA_NONZERO_BYTE
            })
            .fold(0u64, u64::saturating_add)
    }
}

/// A consumer of finalized responses.
pub trait CallbackTarget: Send + Sync {
    /// Charge any work against `gas`; an error or panic counts as a revert.
    fn on_response(&self, payload: &ResponsePayload<'_>, gas: &mut Gas) -> Result<(), CallbackError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackOutcome {
    /// The request named no callback address
    Skipped,
    Delivered { gas_used: u64 },
    Failed { reason: String },
}

impl CallbackOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CallbackOutcome::Failed { .. })
    }
}

/// Address-indexed callback targets.
#[derive(Default, Clone)]
pub struct CallbackRouter {
    targets: HashMap<Address, Arc<dyn CallbackTarget>>,
}

impl CallbackRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, address: Address, target: Arc<dyn CallbackTarget>) {
        self.targets.insert(address, target);
    }

    pub fn unregister(&mut self, address: &Address) -> bool {
        self.targets.remove(address).is_some()
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.targets.contains_key(address)
    }

    /// Deliver `payload` to `address` within `gas_limit`.
    pub fn dispatch(&self, address: Address, payload: &ResponsePayload<'_>, gas_limit: u64) -> CallbackOutcome {
        if address.is_zero() {
            return CallbackOutcome::Skipped;
        }

        match self.invoke(address, payload, gas_limit) {
            Ok(gas_used) => CallbackOutcome::Delivered { gas_used },
            Err(e) => CallbackOutcome::Failed { reason: e.to_string() },
        }
    }

    fn invoke(&self, address: Address, payload: &ResponsePayload<'_>, gas_limit: u64) -> Result<u64, CallbackError> {
        let target = self
            .targets
            .get(&address)
            .ok_or(CallbackError::NoTarget(address))?;

        let mut gas = Gas::new(gas_limit);
        gas.consume(GasCost::CALL)?;
        gas.consume(payload.calldata_cost())?;

        panic::catch_unwind(AssertUnwindSafe(|| target.on_response(payload, &mut gas)))
            .map_err(|_| CallbackError::Panicked)??;

        Ok(gas.used())
    }
}

impl std::fmt::Debug for CallbackRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRouter")
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Callback target that keeps every delivered response.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    received: Mutex<Vec<(RequestId, Vec<Bytes>)>>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<(RequestId, Vec<Bytes>)> {
        self.received.lock().clone()
    }
}

impl CallbackTarget for RecordingTarget {
    fn on_response(&self, payload: &ResponsePayload<'_>, gas: &mut Gas) -> Result<(), CallbackError> {
        for _ in payload.segments {
            gas.consume(GasCost::SSTORE)?;
        }
        self.received
            .lock()
            .push((payload.request_id, payload.segments.to_vec()));
        Ok(())
    }
}
