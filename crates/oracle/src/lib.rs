//! AI oracle engine.
//!
//! Requesters escrow tokens, open requests against a registered model and
//! format pair, and role-holding responders stream the answer back in
//! segments. The final segment settles the consumed tokens and runs the
//! request's callback.

pub mod access;
pub mod callback;
pub mod engine;
pub mod error;
pub mod escrow;
pub mod events;
pub mod metrics;
pub mod registry;
pub mod request;
pub mod shared;
pub mod state;

pub use access::{AccessControl, Role};
pub use callback::{
    CallbackError, CallbackOutcome, CallbackRouter, CallbackTarget, Gas, GasCost, RecordingTarget, ResponsePayload,
};
pub use engine::{EngineConfig, OracleEngine, SubmitReceipt};
pub use error::{OracleError, OracleResult};
pub use escrow::{EscrowAccount, EscrowStore};
pub use events::OracleEvent;
pub use metrics::OracleMetrics;
pub use registry::{FormatSupport, ModelRegistry};
pub use request::{Request, RequestParams, RequestStatus, RequestStore};
pub use shared::SharedOracle;
pub use state::{OracleState, STATE_VERSION};
