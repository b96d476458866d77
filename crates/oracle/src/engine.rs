//! The oracle engine: escrow, request lifecycle and settlement.
//!
//! Every public mutation runs all of its checks before touching state, so a
//! rejected call leaves the engine and the ledger exactly as they were.

use crate::access::Role;
use crate::callback::{CallbackOutcome, CallbackRouter, ResponsePayload};
use crate::error::{OracleError, OracleResult};
use crate::events::OracleEvent;
use crate::metrics::OracleMetrics;
use crate::registry::FormatSupport;
use crate::request::{Request, RequestParams};
use crate::state::OracleState;
use aioracle_storage::Database;
use aioracle_token::{TokenError, TokenLedger};
use aioracle_types::{Address, Bytes, FormatTag, ModelId, RequestId, U256};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on segments per request; `None` is unbounded
    pub max_segments: Option<usize>,
    /// Callback gas cap for requests created with a zero limit
    pub default_callback_gas_limit: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_segments: None,
            default_callback_gas_limit: 500_000,
        }
    }
}

/// Result of a committed segment submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub request_id: RequestId,
    pub segments_total: usize,
    pub finalized: bool,
    /// Set exactly when this call finalized the request
    pub callback: Option<CallbackOutcome>,
}

pub struct OracleEngine<L: TokenLedger> {
    address: Address,
    ledger: L,
    state: OracleState,
    callbacks: CallbackRouter,
    config: EngineConfig,
    events: broadcast::Sender<OracleEvent>,
    metrics: Option<Arc<OracleMetrics>>,
}

impl<L: TokenLedger> OracleEngine<L> {
    /// Engine holding custody at `address`, with `admin` as the only role holder.
    pub fn new(address: Address, ledger: L, admin: Address) -> Self {
        Self::from_state(address, ledger, OracleState::new(admin))
    }

    /// Like [`OracleEngine::new`], with an initial model registry.
    pub fn initialize(
        address: Address,
        ledger: L,
        admin: Address,
        models: impl IntoIterator<Item = (ModelId, FormatSupport)>,
    ) -> Self {
        let mut state = OracleState::new(admin);
        for (model, support) in models {
            state.registry.register(model, support);
        }
        info!(%address, %admin, models = state.registry.len(), "Oracle initialized");
        Self::from_state(address, ledger, state)
    }

    pub fn from_state(address: Address, ledger: L, state: OracleState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            address,
            ledger,
            state,
            callbacks: CallbackRouter::new(),
            config: EngineConfig::default(),
            events,
            metrics: None,
        }
    }

    /// Rebuild an engine from a persisted state; `None` when `db` is empty.
    pub fn restore(address: Address, ledger: L, db: &dyn Database) -> OracleResult<Option<Self>> {
        Ok(OracleState::load(db)?.map(|state| Self::from_state(address, ledger, state)))
    }

    pub fn save(&self, db: &dyn Database) -> OracleResult<()> {
        self.state.save(db)?;
        Ok(())
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<OracleMetrics>) -> Self {
        metrics.requests_open.set(self.state.requests.open_count() as i64);
        self.metrics = Some(metrics);
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &OracleState {
        &self.state
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackRouter {
        &mut self.callbacks
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OracleEvent> {
        self.events.subscribe()
    }

    // ---- Escrow ----

    /// Pull `amount` from `owner` on the ledger into escrow.
    ///
    /// `owner` must have approved the engine address as spender.
    pub fn deposit(&mut self, owner: Address, amount: U256) -> OracleResult<U256> {
        let result = self.try_deposit(owner, amount);
        self.observe(result)
    }

    fn try_deposit(&mut self, owner: Address, amount: U256) -> OracleResult<U256> {
        if amount.is_zero() {
            return Err(OracleError::InvalidAmount("deposit amount"));
        }
        self.state.escrow.ensure_creditable(&owner, amount)?;

        self.ledger
            .transfer_from(self.address, owner, self.address, amount)
            .map_err(deposit_error)?;
        let balance = self.state.escrow.credit(owner, amount)?;

        info!(%owner, %amount, %balance, "Tokens deposited");
        if let Some(metrics) = &self.metrics {
            metrics.deposits.inc();
        }
        self.emit(OracleEvent::TokensDeposited { owner, amount });
        Ok(balance)
    }

    /// Return unreserved escrow to `owner` on the ledger.
    pub fn withdraw(&mut self, owner: Address, amount: U256) -> OracleResult<U256> {
        let result = self.try_withdraw(owner, amount);
        self.observe(result)
    }

    fn try_withdraw(&mut self, owner: Address, amount: U256) -> OracleResult<U256> {
        if amount.is_zero() {
            return Err(OracleError::InvalidAmount("withdrawal amount"));
        }
        self.state.escrow.ensure_available(&owner, amount)?;

        self.ledger.transfer(self.address, owner, amount)?;
        let balance = self.state.escrow.debit(owner, amount)?;

        info!(%owner, %amount, %balance, "Tokens withdrawn");
        if let Some(metrics) = &self.metrics {
            metrics.withdrawals.inc();
        }
        self.emit(OracleEvent::TokensWithdrawn { owner, amount });
        Ok(balance)
    }

    /// Escrow balance including funds reserved by open requests.
    pub fn balance_of(&self, owner: &Address) -> U256 {
        self.state.escrow.balance_of(owner)
    }

    pub fn available_balance_of(&self, owner: &Address) -> U256 {
        self.state.escrow.available_of(owner)
    }

    pub fn reserved_of(&self, owner: &Address) -> U256 {
        self.state.escrow.reserved_of(owner)
    }

    /// Tokens consumed by finalized requests and not yet paid out.
    pub fn accrued_fees(&self) -> U256 {
        self.state.accrued_fees
    }

    pub fn withdraw_fees(&mut self, caller: Address, to: Address, amount: U256) -> OracleResult<()> {
        let result = self.try_withdraw_fees(caller, to, amount);
        self.observe(result)
    }

    fn try_withdraw_fees(&mut self, caller: Address, to: Address, amount: U256) -> OracleResult<()> {
        self.state.access.require_role(Role::Admin, &caller)?;
        if amount.is_zero() {
            return Err(OracleError::InvalidAmount("fee withdrawal amount"));
        }
        if amount > self.state.accrued_fees {
            return Err(OracleError::InsufficientBalance {
                available: self.state.accrued_fees,
                required: amount,
            });
        }

        self.ledger.transfer(self.address, to, amount)?;
        self.state.accrued_fees -= amount;

        info!(%to, %amount, remaining = %self.state.accrued_fees, "Fees withdrawn");
        self.emit(OracleEvent::FeesWithdrawn { to, amount });
        Ok(())
    }

    // ---- Registry ----

    pub fn register_model(&mut self, caller: Address, model: ModelId, support: FormatSupport) -> OracleResult<()> {
        let result = self.state.access.require_role(Role::Admin, &caller);
        self.observe(result)?;

        let pairs = support.len();
        let replaced = self.state.registry.register(model.clone(), support).is_some();
        info!(%model, pairs, replaced, "Model registered");
        self.emit(OracleEvent::ModelRegistered(model));
        Ok(())
    }

    pub fn remove_model(&mut self, caller: Address, model: &ModelId) -> OracleResult<FormatSupport> {
        let result = self.try_remove_model(caller, model);
        self.observe(result)
    }

    fn try_remove_model(&mut self, caller: Address, model: &ModelId) -> OracleResult<FormatSupport> {
        self.state.access.require_role(Role::Admin, &caller)?;
        let support = self
            .state
            .registry
            .remove(model)
            .ok_or_else(|| OracleError::UnknownModel(model.clone()))?;

        info!(%model, "Model removed");
        self.emit(OracleEvent::ModelRemoved(model.clone()));
        Ok(support)
    }

    pub fn is_valid_combination(&self, model: &ModelId, input: &FormatTag, output: &FormatTag) -> bool {
        self.state.registry.is_valid_combination(model, input, output)
    }

    pub fn formats_of(&self, model: &ModelId) -> Option<&FormatSupport> {
        self.state.registry.formats_of(model)
    }

    // ---- Access control ----

    /// Returns false when `account` already held `role`.
    pub fn grant_role(&mut self, caller: Address, role: Role, account: Address) -> OracleResult<bool> {
        let result = self.state.access.require_role(Role::Admin, &caller);
        self.observe(result)?;

        let granted = self.state.access.grant(role, account);
        if granted {
            info!(%role, %account, "Role granted");
            self.emit(OracleEvent::RoleGranted { role, account });
        }
        Ok(granted)
    }

    /// Returns false when `account` did not hold `role`.
    pub fn revoke_role(&mut self, caller: Address, role: Role, account: Address) -> OracleResult<bool> {
        let result = self.state.access.require_role(Role::Admin, &caller);
        self.observe(result)?;
        Ok(self.drop_role(role, account))
    }

    /// Drop one of the caller's own roles.
    pub fn renounce_role(&mut self, caller: Address, role: Role) -> bool {
        self.drop_role(role, caller)
    }

    fn drop_role(&mut self, role: Role, account: Address) -> bool {
        let revoked = self.state.access.revoke(role, &account);
        if revoked {
            info!(%role, %account, "Role revoked");
            self.emit(OracleEvent::RoleRevoked { role, account });
        }
        revoked
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.state.access.has_role(role, account)
    }

    pub fn role_members(&self, role: Role) -> Vec<Address> {
        self.state.access.members(role)
    }

    // ---- Requests ----

    /// Open a request, reserving `token_limit` of the requester's escrow.
    pub fn create_request(&mut self, requester: Address, params: RequestParams) -> OracleResult<RequestId> {
        let result = self.try_create_request(requester, params);
        self.observe(result)
    }

    fn try_create_request(&mut self, requester: Address, params: RequestParams) -> OracleResult<RequestId> {
        self.state
            .registry
            .check(&params.model, &params.input_format, &params.output_format)?;
        if params.token_limit.is_zero() {
            return Err(OracleError::InvalidAmount("token limit"));
        }
        self.state.requests.ensure_capacity()?;
        self.state.escrow.ensure_available(&requester, params.token_limit)?;

        let model = params.model.clone();
        let token_limit = params.token_limit;
        self.state.escrow.reserve(requester, token_limit)?;
        let request_id = self.state.requests.insert(requester, params)?;

        info!(%request_id, %requester, %model, %token_limit, "Request created");
        if let Some(metrics) = &self.metrics {
            metrics.requests_created.inc();
            metrics.requests_open.inc();
        }
        self.emit(OracleEvent::RequestCreated {
            request_id,
            requester,
            model,
            token_limit,
        });
        Ok(request_id)
    }

    pub fn get_request(&self, id: RequestId) -> OracleResult<&Request> {
        self.state.requests.get(id)
    }

    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.state.requests.iter()
    }

    /// Single-segment form of [`OracleEngine::submit_response_segments`].
    pub fn submit_response_segment(
        &mut self,
        caller: Address,
        id: RequestId,
        segment: Bytes,
        is_final: bool,
        token_consumed: U256,
        callback_gas_limit: u64,
    ) -> OracleResult<SubmitReceipt> {
        self.submit_response_segments(caller, id, vec![segment], is_final, token_consumed, callback_gas_limit)
    }

    /// Append `segments` to an open request, finalizing it when `is_final`.
    ///
    /// On finalization the reservation is released, `token_consumed` moves
    /// from the requester's escrow to the fee pool and the callback (if any)
    /// runs. A failed callback is reported in the receipt only.
    pub fn submit_response_segments(
        &mut self,
        caller: Address,
        id: RequestId,
        segments: Vec<Bytes>,
        is_final: bool,
        token_consumed: U256,
        callback_gas_limit: u64,
    ) -> OracleResult<SubmitReceipt> {
        let result = self.try_submit(caller, id, segments, is_final, token_consumed, callback_gas_limit);
        self.observe(result)
    }

    fn try_submit(
        &mut self,
        caller: Address,
        id: RequestId,
        segments: Vec<Bytes>,
        is_final: bool,
        token_consumed: U256,
        callback_gas_limit: u64,
    ) -> OracleResult<SubmitReceipt> {
        self.state.access.require_role(Role::Responder, &caller)?;

        let request = self.state.requests.get(id)?;
        request.ensure_open()?;
        request.ensure_within_limit(token_consumed)?;
        if let Some(limit) = self.config.max_segments {
            if request.segments.len().saturating_add(segments.len()) > limit {
                return Err(OracleError::TooManySegments { limit });
            }
        }

        let count = segments.len();
        if is_final {
            let fees = self
                .state
                .accrued_fees
                .checked_add(token_consumed)
                .ok_or(OracleError::ArithmeticOverflow)?;
            let (requester, token_limit) = (request.requester, request.token_limit);
            self.state.escrow.settle(requester, token_limit, token_consumed)?;
            self.state.accrued_fees = fees;
        }

        let request = self.state.requests.get_mut(id)?;
        let first_index = request.append(segments);
        if is_final {
            request.finalize(token_consumed);
        }
        let segments_total = request.segments.len();

        debug!(request_id = %id, responder = %caller, first_index, count, "Response segments appended");
        if let Some(metrics) = &self.metrics {
            metrics.segments_received.inc_by(count as u64);
        }
        self.emit(OracleEvent::ResponseSegmentsAppended {
            request_id: id,
            responder: caller,
            first_index,
            count,
        });

        if !is_final {
            return Ok(SubmitReceipt {
                request_id: id,
                segments_total,
                finalized: false,
                callback: None,
            });
        }

        let outcome = self.run_callback(id, callback_gas_limit)?;
        info!(request_id = %id, %token_consumed, segments_total, "Request finalized");
        if let Some(metrics) = &self.metrics {
            metrics.requests_finalized.inc();
            metrics.requests_open.dec();
        }
        self.emit(OracleEvent::RequestFinalized {
            request_id: id,
            token_consumed,
            callback: outcome.clone(),
        });

        Ok(SubmitReceipt {
            request_id: id,
            segments_total,
            finalized: true,
            callback: Some(outcome),
        })
    }

    /// Gas bound: the submitted limit clamped to the request's cap, where a
    /// zero on either side falls back to the other.
    fn callback_gas(&self, request: &Request, submitted: u64) -> u64 {
        let cap = if request.callback_gas_limit > 0 {
            request.callback_gas_limit
        } else {
            self.config.default_callback_gas_limit
        };
        if submitted == 0 {
            cap
        } else {
            submitted.min(cap)
        }
    }

    fn run_callback(&self, id: RequestId, submitted_gas: u64) -> OracleResult<CallbackOutcome> {
        let request = self.state.requests.get(id)?;
        if !request.has_callback() {
            return Ok(CallbackOutcome::Skipped);
        }

        let gas_limit = self.callback_gas(request, submitted_gas);
        let payload = ResponsePayload {
            request_id: id,
            requester: request.requester,
            token_consumed: request.token_consumed,
            segments: &request.segments,
        };
        let outcome = self.callbacks.dispatch(request.callback_address, &payload, gas_limit);

        match &outcome {
            CallbackOutcome::Failed { reason } => {
                warn!(request_id = %id, target = %request.callback_address, gas_limit, %reason, "Callback failed");
                if let Some(metrics) = &self.metrics {
                    metrics.callback_failures.inc();
                }
            }
            CallbackOutcome::Delivered { gas_used } => {
                debug!(request_id = %id, target = %request.callback_address, gas_used, "Callback delivered");
            }
            CallbackOutcome::Skipped => {}
        }
        Ok(outcome)
    }

    fn emit(&self, event: OracleEvent) {
        let _ = self.events.send(event);
    }

    fn observe<T>(&self, result: OracleResult<T>) -> OracleResult<T> {
        if let Err(e) = &result {
            debug!(kind = e.kind(), error = %e, "Operation rejected");
            if let Some(metrics) = &self.metrics {
                metrics.record_rejection(e.kind());
            }
        }
        result
    }
}

fn deposit_error(e: TokenError) -> OracleError {
    match e {
        TokenError::InsufficientAllowance { .. } | TokenError::InsufficientBalance { .. } => {
            OracleError::InsufficientAllowance(e)
        }
        other => OracleError::Ledger(other),
    }
}
