use crate::engine::{OracleEngine, SubmitReceipt};
use crate::error::OracleResult;
use crate::events::OracleEvent;
use crate::request::{Request, RequestParams};
use aioracle_token::TokenLedger;
use aioracle_types::{Address, Bytes, RequestId, U256};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Cloneable handle serializing every engine call behind one lock.
///
/// Calls from any number of threads are applied one at a time, so each
/// operation sees the complete effect of every operation before it.
pub struct SharedOracle<L: TokenLedger> {
    inner: Arc<Mutex<OracleEngine<L>>>,
}

impl<L: TokenLedger> Clone for SharedOracle<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: TokenLedger> SharedOracle<L> {
    pub fn new(engine: OracleEngine<L>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` as one atomic step.
    pub fn with<R>(&self, f: impl FnOnce(&mut OracleEngine<L>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn deposit(&self, owner: Address, amount: U256) -> OracleResult<U256> {
        self.inner.lock().deposit(owner, amount)
    }

    pub fn withdraw(&self, owner: Address, amount: U256) -> OracleResult<U256> {
        self.inner.lock().withdraw(owner, amount)
    }

    pub fn create_request(&self, requester: Address, params: RequestParams) -> OracleResult<RequestId> {
        self.inner.lock().create_request(requester, params)
    }

    pub fn submit_response_segments(
        &self,
        caller: Address,
        id: RequestId,
        segments: Vec<Bytes>,
        is_final: bool,
        token_consumed: U256,
        callback_gas_limit: u64,
    ) -> OracleResult<SubmitReceipt> {
        self.inner
            .lock()
            .submit_response_segments(caller, id, segments, is_final, token_consumed, callback_gas_limit)
    }

    /// Snapshot of a request at the time of the call.
    pub fn get_request(&self, id: RequestId) -> OracleResult<Request> {
        self.inner.lock().get_request(id).cloned()
    }

    pub fn balance_of(&self, owner: &Address) -> U256 {
        self.inner.lock().balance_of(owner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OracleEvent> {
        self.inner.lock().subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::error::OracleError;
    use crate::registry::FormatSupport;
    use aioracle_token::{AiToken, SharedToken};
    use aioracle_types::{FormatPair, FormatTag, ModelId};
    use std::thread;

    #[test]
    fn test_only_one_finalization_wins() {
        let admin = Address::from_low_u64_be(1);
        let user = Address::from_low_u64_be(2);
        let engine_address = Address::from_low_u64_be(0xa1);

        let mut token = SharedToken::new(AiToken::new(admin, admin, admin));
        token.mint(admin, user, U256::from(1000)).unwrap();
        token.approve(user, engine_address, U256::MAX).unwrap();

        let model = ModelId::new("gpt-4o").unwrap();
        let mut engine = OracleEngine::initialize(
            engine_address,
            token,
            admin,
            [(model.clone(), FormatSupport::new([FormatPair::parse("plain:text", "plain:text").unwrap()]))],
        );
        let responders: Vec<Address> = (10..18).map(Address::from_low_u64_be).collect();
        for responder in &responders {
            engine.grant_role(admin, Role::Responder, *responder).unwrap();
        }

        let oracle = SharedOracle::new(engine);
        oracle.deposit(user, U256::from(1000)).unwrap();
        let id = oracle
            .create_request(
                user,
                RequestParams {
                    data: Bytes::from("prompt"),
                    model,
                    input_format: FormatTag::new("plain:text").unwrap(),
                    output_format: FormatTag::new("plain:text").unwrap(),
                    callback_address: Address::ZERO,
                    callback_gas_limit: 0,
                    token_limit: U256::from(100),
                },
            )
            .unwrap();

        let handles: Vec<_> = responders
            .into_iter()
            .map(|responder| {
                let oracle = oracle.clone();
                thread::spawn(move || {
                    oracle.submit_response_segments(responder, id, vec![Bytes::from("done")], true, U256::from(40), 0)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, OracleError::RequestAlreadyFinalized(_))));

        let request = oracle.get_request(id).unwrap();
        assert_eq!(request.segments.len(), 1);
        assert_eq!(oracle.balance_of(&user), U256::from(960));
    }
}
