use crate::error::{OracleError, OracleResult};
use aioracle_types::{Address, Bytes, FormatTag, ModelId, RequestId, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Accepting response segments
    Open,
    /// Terminal; the record is read-only from here on
    Finalized,
}

/// Caller-supplied fields of a new inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    pub data: Bytes,
    pub model: ModelId,
    pub input_format: FormatTag,
    pub output_format: FormatTag,
    /// `Address::ZERO` disables the finalization callback
    pub callback_address: Address,
    pub callback_gas_limit: u64,
    pub token_limit: U256,
}

/// One inference request and its accumulated response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub requester: Address,
    pub data: Bytes,
    pub model: ModelId,
    pub input_format: FormatTag,
    pub output_format: FormatTag,
    pub token_limit: U256,
    pub token_consumed: U256,
    pub callback_address: Address,
    pub callback_gas_limit: u64,
    pub segments: Vec<Bytes>,
    pub is_finalized: bool,
}

impl Request {
    pub fn new(id: RequestId, requester: Address, params: RequestParams) -> Self {
        Self {
            id,
            requester,
            data: params.data,
            model: params.model,
            input_format: params.input_format,
            output_format: params.output_format,
            token_limit: params.token_limit,
            token_consumed: U256::zero(),
            callback_address: params.callback_address,
            callback_gas_limit: params.callback_gas_limit,
            segments: Vec::new(),
            is_finalized: false,
        }
    }

    pub fn status(&self) -> RequestStatus {
        if self.is_finalized {
            RequestStatus::Finalized
        } else {
            RequestStatus::Open
        }
    }

    pub fn has_callback(&self) -> bool {
        !self.callback_address.is_zero()
    }

    /// Concatenation of all segments in delivery order.
    pub fn response(&self) -> Vec<u8> {
        self.segments.iter().flat_map(|s| s.iter().copied()).collect()
    }

    pub(crate) fn ensure_open(&self) -> OracleResult<()> {
        if self.is_finalized {
            Err(OracleError::RequestAlreadyFinalized(self.id))
        } else {
            Ok(())
        }
    }

    pub(crate) fn ensure_within_limit(&self, consumed: U256) -> OracleResult<()> {
        if consumed > self.token_limit {
            Err(OracleError::TokenConsumedExceedsLimit {
                consumed,
                limit: self.token_limit,
            })
        } else {
            Ok(())
        }
    }

    /// Append in call order; returns the index of the first new segment.
    pub(crate) fn append(&mut self, segments: Vec<Bytes>) -> usize {
        let first = self.segments.len();
        self.segments.extend(segments);
        first
    }

    pub(crate) fn finalize(&mut self, consumed: U256) {
        self.token_consumed = consumed;
        self.is_finalized = true;
    }
}

/// Requests keyed by id, with the id allocator.
#[derive(Debug, Clone)]
pub struct RequestStore {
    requests: BTreeMap<RequestId, Request>,
    next_id: RequestId,
}

impl Default for RequestStore {
    fn default() -> Self {
        Self {
            requests: BTreeMap::new(),
            next_id: RequestId::FIRST,
        }
    }
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next inserted request will receive.
    pub fn next_id(&self) -> RequestId {
        self.next_id
    }

    /// Fail if the id space is exhausted.
    pub fn ensure_capacity(&self) -> OracleResult<()> {
        self.next_id.next().map(|_| ()).ok_or(OracleError::ArithmeticOverflow)
    }

    /// Store a new request under the next id.
    pub(crate) fn insert(&mut self, requester: Address, params: RequestParams) -> OracleResult<RequestId> {
        let id = self.next_id;
        let following = id.next().ok_or(OracleError::ArithmeticOverflow)?;
        self.requests.insert(id, Request::new(id, requester, params));
        self.next_id = following;
        Ok(id)
    }

    pub fn get(&self, id: RequestId) -> OracleResult<&Request> {
        self.requests.get(&id).ok_or(OracleError::RequestNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: RequestId) -> OracleResult<&mut Request> {
        self.requests.get_mut(&id).ok_or(OracleError::RequestNotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.requests.values()
    }

    pub fn open_count(&self) -> usize {
        self.requests.values().filter(|r| !r.is_finalized).count()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub(crate) fn restore(requests: Vec<Request>, next_id: RequestId) -> Self {
        Self {
            requests: requests.into_iter().map(|r| (r.id, r)).collect(),
            next_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(limit: u64) -> RequestParams {
        RequestParams {
            data: Bytes::from("Test Data"),
            model: ModelId::new("gpt-3.5").unwrap(),
            input_format: FormatTag::new("plain:text").unwrap(),
            output_format: FormatTag::new("plain:text").unwrap(),
            callback_address: Address::ZERO,
            callback_gas_limit: 0,
            token_limit: U256::from(limit),
        }
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let mut store = RequestStore::new();
        let requester = Address::from_low_u64_be(1);

        let a = store.insert(requester, params(10)).unwrap();
        let b = store.insert(requester, params(10)).unwrap();
        assert_eq!(a, RequestId::new(1));
        assert_eq!(b, RequestId::new(2));
        assert_eq!(store.next_id(), RequestId::new(3));
        assert_eq!(store.open_count(), 2);
    }

    #[test]
    fn test_missing_request() {
        let store = RequestStore::new();
        assert!(matches!(
            store.get(RequestId::new(9)),
            Err(OracleError::RequestNotFound(id)) if id == RequestId::new(9)
        ));
    }

    #[test]
    fn test_request_lifecycle_guards() {
        let mut request = Request::new(RequestId::FIRST, Address::from_low_u64_be(1), params(10));
        assert_eq!(request.status(), RequestStatus::Open);
        assert!(!request.has_callback());

        assert_eq!(request.append(vec![Bytes::from("ab"), Bytes::from("c")]), 0);
        assert_eq!(request.append(vec![Bytes::from("d")]), 2);
        assert_eq!(request.response(), b"abcd".to_vec());

        assert!(request.ensure_within_limit(U256::from(10)).is_ok());
        assert!(request.ensure_within_limit(U256::from(11)).is_err());

        request.finalize(U256::from(4));
        assert_eq!(request.status(), RequestStatus::Finalized);
        assert!(matches!(request.ensure_open(), Err(OracleError::RequestAlreadyFinalized(_))));
    }

    #[test]
    fn test_exhausted_id_space() {
        let store = RequestStore::restore(Vec::new(), RequestId::new(u64::MAX));
        assert!(matches!(store.ensure_capacity(), Err(OracleError::ArithmeticOverflow)));
    }
}
