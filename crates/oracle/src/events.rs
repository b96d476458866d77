use crate::access::Role;
use crate::callback::CallbackOutcome;
use aioracle_types::{Address, ModelId, RequestId, U256};

/// Broadcast after every committed state change, in commit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleEvent {
    TokensDeposited {
        owner: Address,
        amount: U256,
    },
    TokensWithdrawn {
        owner: Address,
        amount: U256,
    },
    FeesWithdrawn {
        to: Address,
        amount: U256,
    },
    RequestCreated {
        request_id: RequestId,
        requester: Address,
        model: ModelId,
        token_limit: U256,
    },
    ResponseSegmentsAppended {
        request_id: RequestId,
        responder: Address,
        first_index: usize,
        count: usize,
    },
    RequestFinalized {
        request_id: RequestId,
        token_consumed: U256,
        callback: CallbackOutcome,
    },
    ModelRegistered(ModelId),
    ModelRemoved(ModelId),
    RoleGranted {
        role: Role,
        account: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
    },
}
