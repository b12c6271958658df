// src/wsproto.rs
//
// Transport protocol for the WebSocket server, kept free of any socket
// code so the whole surface is unit-testable:
//
//  - text command parsing (run/stop/overlap toggles + set_<param>:<value>
//    setters for the simulation config),
//  - the per-session overlap-guard state machine,
//  - the single-writer outbound queue state machine,
//  - typed outbound JSON payloads (status / error / simulation_update).

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::SimulationConfig;
use crate::mm::MakerReport;
use crate::types::MarketDataEvent;

/// Version stamped on every outbound message.
pub const SCHEMA_VERSION: u32 = 1;

/// Simulation parameters adjustable over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimParam {
    Instrument,
    InitialPrice,
    Spread,
    Volatility,
    LatencyMs,
    Iterations,
    Seed,
    Quiet,
}

impl SimParam {
    fn parse(name: &str) -> Option<SimParam> {
        match name {
            "instrument" => Some(SimParam::Instrument),
            "initial_price" => Some(SimParam::InitialPrice),
            "spread" => Some(SimParam::Spread),
            "volatility" => Some(SimParam::Volatility),
            "latency_ms" => Some(SimParam::LatencyMs),
            "iterations" => Some(SimParam::Iterations),
            "seed" => Some(SimParam::Seed),
            "quiet" => Some(SimParam::Quiet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimParam::Instrument => "instrument",
            SimParam::InitialPrice => "initial_price",
            SimParam::Spread => "spread",
            SimParam::Volatility => "volatility",
            SimParam::LatencyMs => "latency_ms",
            SimParam::Iterations => "iterations",
            SimParam::Seed => "seed",
            SimParam::Quiet => "quiet",
        }
    }
}

/// Parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    RunSimulation,
    StopSimulation,
    EnableOverlap,
    DisableOverlap,
    SetParam { param: SimParam, value: String },
    Unknown,
}

/// Parse one inbound text frame into a command.
pub fn parse_command(message: &str) -> ClientCommand {
    let command = message.trim();
    match command {
        "run_simulation" => return ClientCommand::RunSimulation,
        "stop_simulation" => return ClientCommand::StopSimulation,
        "enable_overlap" | "set_allow_overlap:true" => return ClientCommand::EnableOverlap,
        "disable_overlap" | "set_allow_overlap:false" => return ClientCommand::DisableOverlap,
        _ => {}
    }

    if let Some(rest) = command.strip_prefix("set_") {
        if let Some((name, value)) = rest.split_once(':') {
            if let Some(param) = SimParam::parse(name) {
                return ClientCommand::SetParam {
                    param,
                    value: value.to_string(),
                };
            }
        }
    }

    ClientCommand::Unknown
}

/// Apply a `set_<param>:<value>` update to the session's pending config.
/// Returns the parameter name on success for the acknowledgement message.
pub fn apply_setter(
    cfg: &mut SimulationConfig,
    param: SimParam,
    value: &str,
) -> Result<&'static str, String> {
    fn parse<T: std::str::FromStr>(param: SimParam, value: &str) -> Result<T, String> {
        value
            .parse()
            .map_err(|_| format!("invalid value for {}: {}", param.as_str(), value))
    }

    match param {
        SimParam::Instrument => {
            if value.is_empty() || value.contains('|') {
                return Err("invalid value for instrument".to_string());
            }
            cfg.instrument = value.to_string();
        }
        SimParam::InitialPrice => {
            let v: f64 = parse(param, value)?;
            if !v.is_finite() || v <= 0.0 {
                return Err("initial_price must be positive".to_string());
            }
            cfg.initial_price = v;
        }
        SimParam::Spread => {
            let v: f64 = parse(param, value)?;
            if !v.is_finite() || v <= 0.0 {
                return Err("spread must be positive".to_string());
            }
            cfg.spread = v;
        }
        SimParam::Volatility => {
            let v: f64 = parse(param, value)?;
            if !v.is_finite() || v < 0.0 {
                return Err("volatility must be non-negative".to_string());
            }
            cfg.volatility = v;
        }
        SimParam::LatencyMs => cfg.latency_ms = parse(param, value)?,
        SimParam::Iterations => {
            let v: u64 = parse(param, value)?;
            if v == 0 {
                return Err("iterations must be > 0".to_string());
            }
            cfg.iterations = v;
        }
        SimParam::Seed => cfg.seed = parse(param, value)?,
        SimParam::Quiet => cfg.quiet = parse(param, value)?,
    }
    Ok(param.as_str())
}

// ---------------------------------------------------------------------
// Session state machines
// ---------------------------------------------------------------------

/// What the session should do in response to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    StartSimulation,
    StopSimulation,
    RejectOverlap,
    Noop,
}

/// Overlap-guard state for one session.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionProtocolState {
    pub simulation_active: bool,
    pub allow_overlap: bool,
}

pub fn apply_command(state: &mut SessionProtocolState, command: &ClientCommand) -> CommandAction {
    match command {
        ClientCommand::RunSimulation => {
            if state.simulation_active && !state.allow_overlap {
                return CommandAction::RejectOverlap;
            }
            state.simulation_active = true;
            CommandAction::StartSimulation
        }
        ClientCommand::StopSimulation => {
            if !state.simulation_active {
                return CommandAction::Noop;
            }
            state.simulation_active = false;
            CommandAction::StopSimulation
        }
        ClientCommand::EnableOverlap => {
            state.allow_overlap = true;
            CommandAction::Noop
        }
        ClientCommand::DisableOverlap => {
            state.allow_overlap = false;
            CommandAction::Noop
        }
        ClientCommand::SetParam { .. } | ClientCommand::Unknown => CommandAction::Noop,
    }
}

/// Single-writer outbound queue: at most one write may be in flight, the
/// rest of the queue drains as each write completes.
#[derive(Debug, Default)]
pub struct OutboundQueueState {
    pub queue: VecDeque<String>,
    pub write_in_progress: bool,
}

/// Enqueue a message; returns true when the caller should start a write.
pub fn enqueue_outbound(state: &mut OutboundQueueState, message: String) -> bool {
    state.queue.push_back(message);
    if state.write_in_progress {
        return false;
    }
    state.write_in_progress = true;
    true
}

/// Mark the in-flight write complete; returns true when another write
/// should start immediately.
pub fn complete_outbound_write(state: &mut OutboundQueueState) -> bool {
    state.queue.pop_front();
    if state.queue.is_empty() {
        state.write_in_progress = false;
        return false;
    }
    true
}

// ---------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct StatusMsg<'a> {
    schema_version: u32,
    r#type: &'static str,
    status: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ErrorMsg<'a> {
    schema_version: u32,
    r#type: &'static str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct TradeMsg {
    price: f64,
    size: i64,
    side: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UpdateMetrics {
    pub total_iterations: u64,
    pub total_runtime_ms: f64,
    pub average_iteration_ms: f64,
    pub throughput_eps: f64,
    pub inventory: i64,
    pub cash: f64,
    pub mark_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_pnl: f64,
    pub net_pnl: f64,
    pub fees: f64,
    pub rebates: f64,
    pub avg_entry_price: f64,
    pub gross_exposure: f64,
    pub net_exposure: f64,
    pub inventory_skew: f64,
    pub risk_state: &'static str,
    pub total_fills: u64,
}

impl UpdateMetrics {
    pub fn from_report(
        report: &MakerReport,
        total_iterations: u64,
        runtime_ms: f64,
        avg_ms: f64,
        eps: f64,
    ) -> Self {
        Self {
            total_iterations,
            total_runtime_ms: runtime_ms,
            average_iteration_ms: avg_ms,
            throughput_eps: eps,
            inventory: report.position,
            cash: report.cash,
            mark_price: report.mark_price,
            realized_pnl: report.realized_pnl,
            unrealized_pnl: report.unrealized_pnl,
            total_pnl: report.total_pnl,
            net_pnl: report.net_pnl,
            fees: report.fees,
            rebates: report.rebates,
            avg_entry_price: report.avg_entry_price,
            gross_exposure: report.gross_exposure,
            net_exposure: report.net_exposure,
            inventory_skew: report.inventory_skew,
            risk_state: report.risk_state.as_str(),
            total_fills: report.total_fills,
        }
    }
}

#[derive(Debug, Serialize)]
struct UpdateMsg<'a> {
    schema_version: u32,
    r#type: &'static str,
    run_id: i64,
    iteration: u64,
    trades: Vec<TradeMsg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<&'a UpdateMetrics>,
}

pub fn make_status_json(status: &str, message: &str, run_id: Option<i64>) -> String {
    serde_json::to_string(&StatusMsg {
        schema_version: SCHEMA_VERSION,
        r#type: "status",
        status,
        message,
        run_id,
    })
    .expect("status message serializes")
}

pub fn make_error_json(message: &str) -> String {
    serde_json::to_string(&ErrorMsg {
        schema_version: SCHEMA_VERSION,
        r#type: "error",
        message,
    })
    .expect("error message serializes")
}

pub fn make_update_json(
    md: &MarketDataEvent,
    iteration: u64,
    run_id: i64,
    metrics: Option<&UpdateMetrics>,
) -> String {
    let trades = md
        .trades
        .iter()
        .map(|t| TradeMsg {
            price: t.price,
            size: t.size,
            side: t.aggressor_side.as_str(),
        })
        .collect();

    serde_json::to_string(&UpdateMsg {
        schema_version: SCHEMA_VERSION,
        r#type: "simulation_update",
        run_id,
        iteration,
        trades,
        metrics,
    })
    .expect("update message serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parsing() {
        assert_eq!(parse_command("run_simulation"), ClientCommand::RunSimulation);
        assert_eq!(parse_command(" stop_simulation "), ClientCommand::StopSimulation);
        assert_eq!(parse_command("enable_overlap"), ClientCommand::EnableOverlap);
        assert_eq!(
            parse_command("set_allow_overlap:false"),
            ClientCommand::DisableOverlap
        );
        assert_eq!(
            parse_command("set_seed:12345"),
            ClientCommand::SetParam {
                param: SimParam::Seed,
                value: "12345".to_string()
            }
        );
        assert_eq!(parse_command("set_bogus:1"), ClientCommand::Unknown);
        assert_eq!(parse_command("hello"), ClientCommand::Unknown);
    }

    #[test]
    fn setters_apply_and_validate() {
        let mut cfg = SimulationConfig::default();

        assert!(apply_setter(&mut cfg, SimParam::Seed, "7").is_ok());
        assert_eq!(cfg.seed, 7);

        assert!(apply_setter(&mut cfg, SimParam::Iterations, "50").is_ok());
        assert_eq!(cfg.iterations, 50);
        assert!(apply_setter(&mut cfg, SimParam::Iterations, "0").is_err());

        assert!(apply_setter(&mut cfg, SimParam::Volatility, "0.25").is_ok());
        assert!(apply_setter(&mut cfg, SimParam::Volatility, "-1").is_err());

        assert!(apply_setter(&mut cfg, SimParam::InitialPrice, "abc").is_err());
        assert!(apply_setter(&mut cfg, SimParam::Quiet, "true").is_ok());
        assert!(cfg.quiet);

        assert!(apply_setter(&mut cfg, SimParam::Instrument, "ABC").is_ok());
        assert_eq!(cfg.instrument, "ABC");
        assert!(apply_setter(&mut cfg, SimParam::Instrument, "A|B").is_err());
    }

    #[test]
    fn overlap_guard_behavior() {
        let mut state = SessionProtocolState {
            simulation_active: true,
            allow_overlap: false,
        };

        let action = apply_command(&mut state, &ClientCommand::RunSimulation);
        assert_eq!(action, CommandAction::RejectOverlap);
        assert!(state.simulation_active);

        let action = apply_command(&mut state, &ClientCommand::EnableOverlap);
        assert_eq!(action, CommandAction::Noop);
        assert!(state.allow_overlap);

        let action = apply_command(&mut state, &ClientCommand::RunSimulation);
        assert_eq!(action, CommandAction::StartSimulation);

        let action = apply_command(&mut state, &ClientCommand::StopSimulation);
        assert_eq!(action, CommandAction::StopSimulation);
        assert!(!state.simulation_active);

        // Stopping again is a no-op.
        let action = apply_command(&mut state, &ClientCommand::StopSimulation);
        assert_eq!(action, CommandAction::Noop);
    }

    #[test]
    fn outbound_queue_single_writer() {
        let mut state = OutboundQueueState::default();

        assert!(enqueue_outbound(&mut state, "{\"msg\":1}".to_string()));
        assert!(state.write_in_progress);
        assert_eq!(state.queue.len(), 1);

        assert!(!enqueue_outbound(&mut state, "{\"msg\":2}".to_string()));
        assert_eq!(state.queue.len(), 2);

        assert!(complete_outbound_write(&mut state));
        assert!(state.write_in_progress);
        assert_eq!(state.queue.len(), 1);

        assert!(!complete_outbound_write(&mut state));
        assert!(!state.write_in_progress);
        assert!(state.queue.is_empty());
    }

    #[test]
    fn outbound_payloads_are_versioned_json() {
        let status = make_status_json("started", "simulation_started", Some(3));
        let v: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(v["schema_version"], 1);
        assert_eq!(v["type"], "status");
        assert_eq!(v["run_id"], 3);

        let err = make_error_json("unknown_command");
        let v: serde_json::Value = serde_json::from_str(&err).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["message"], "unknown_command");
    }

    #[test]
    fn update_payload_carries_trades_and_metrics() {
        use crate::types::{Side, Trade};

        let mut md = MarketDataEvent {
            instrument: "XYZ".to_string(),
            best_bid_price: 99.9,
            best_ask_price: 100.1,
            best_bid_size: 5,
            best_ask_size: 5,
            bid_levels: Vec::new(),
            ask_levels: Vec::new(),
            trades: Vec::new(),
            partial_fills: Vec::new(),
            mm_fills: Vec::new(),
            timestamp: 1_000,
            sequence_number: 1,
        };
        md.trades.push(Trade {
            aggressor_side: Side::Buy,
            price: 100.1,
            size: 2,
            trade_id: 5,
            timestamp: 1_000,
        });

        let without = make_update_json(&md, 4, 2, None);
        let v: serde_json::Value = serde_json::from_str(&without).unwrap();
        assert_eq!(v["type"], "simulation_update");
        assert_eq!(v["iteration"], 4);
        assert_eq!(v["trades"][0]["side"], "BUY");
        assert!(v.get("metrics").is_none());
    }
}
