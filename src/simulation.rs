//! In-process oracle session against a local token ledger.

use crate::config::Config;
use crate::genesis::Genesis;
use aioracle_engine::{CallbackOutcome, OracleEvent, OracleMetrics, RecordingTarget, RequestParams, Role};
use aioracle_token::{format_units, parse_units, SharedToken, TokenLedger, DEFAULT_DECIMALS};
use aioracle_types::{Address, Bytes, RequestId, U256};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Consumer address that receives the finalization callback
pub fn callback_address() -> Address {
    Address::from_low_u64_be(0xcb)
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub request_id: RequestId,
    pub requester: Address,
    pub segments: Vec<Bytes>,
    pub token_consumed: U256,
    pub callback: Option<CallbackOutcome>,
    /// Requester's ledger balance after withdrawing everything
    pub requester_tokens: U256,
    /// Fees paid out to the administrator
    pub fees_paid: U256,
    pub events: Vec<OracleEvent>,
}

fn units(amount: &str) -> Result<U256> {
    parse_units(amount, DEFAULT_DECIMALS).with_context(|| format!("Invalid token amount {}", amount))
}

/// Deposit, request, stream three segments, finalize and pay out.
pub fn run(genesis: &Genesis, config: &Config, metrics: Option<Arc<OracleMetrics>>) -> Result<SimulationReport> {
    let admin = genesis.admin();
    let mut token = SharedToken::new(genesis.build_token()?);
    let oracle_address = config.oracle.address;

    let mut engine = genesis
        .build_engine(oracle_address, token.clone())?
        .with_config(config.oracle.engine_config());
    if let Some(metrics) = metrics {
        engine = engine.with_metrics(metrics);
    }
    let mut events = engine.subscribe();

    let target = Arc::new(RecordingTarget::new());
    engine.callbacks_mut().register(callback_address(), target.clone());

    let responder = match genesis.config().responders.first() {
        Some(responder) => *responder,
        None => {
            engine.grant_role(admin, Role::Responder, admin)?;
            admin
        }
    };
    let (model, support) = genesis
        .models()
        .into_iter()
        .next()
        .context("Genesis registers no model")?;
    let pair = support.pairs().next().cloned().context("Model accepts no format pair")?;

    let deposit = units("100")?;
    let requester = genesis
        .config()
        .allocations
        .first()
        .map(|a| a.account)
        .unwrap_or_else(|| Address::from_low_u64_be(0x0c));
    if token.balance_of(&requester) < deposit {
        token.mint(admin, requester, deposit)?;
    }
    token.approve(requester, oracle_address, deposit)?;

    engine.deposit(requester, deposit)?;
    let request_id = engine.create_request(
        requester,
        RequestParams {
            data: Bytes::from("Describe the Rust borrow checker in one sentence."),
            model: model.clone(),
            input_format: pair.input.clone(),
            output_format: pair.output.clone(),
            callback_address: callback_address(),
            callback_gas_limit: config.oracle.default_callback_gas_limit,
            token_limit: units("10")?,
        },
    )?;
    info!(%request_id, %model, %pair, "Simulated request created");

    let segments = ["Segment 1", "Segment 2"]
        .iter()
        .map(|s| Bytes::bytes32_string(s))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for segment in segments {
        engine.submit_response_segment(responder, request_id, segment, false, U256::zero(), 0)?;
    }
    let token_consumed = units("4.2")?;
    let receipt = engine.submit_response_segment(
        responder,
        request_id,
        Bytes::bytes32_string("Final")?,
        true,
        token_consumed,
        0,
    )?;

    let remaining = engine.available_balance_of(&requester);
    if !remaining.is_zero() {
        engine.withdraw(requester, remaining)?;
    }
    let fees_paid = engine.accrued_fees();
    if !fees_paid.is_zero() {
        engine.withdraw_fees(admin, admin, fees_paid)?;
    }

    let request = engine.get_request(request_id)?.clone();
    let requester_tokens = token.balance_of(&requester);
    info!(
        %request_id,
        consumed = %format_units(token_consumed, DEFAULT_DECIMALS),
        balance = %format_units(requester_tokens, DEFAULT_DECIMALS),
        callbacks = target.received().len(),
        "Simulation finished"
    );

    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }

    Ok(SimulationReport {
        request_id,
        requester,
        segments: request.segments,
        token_consumed: request.token_consumed,
        callback: receipt.callback,
        requester_tokens,
        fees_paid,
        events: collected,
    })
}
