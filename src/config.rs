// src/config.rs
//
// Central configuration for the Passiva simulator.
//
// Four independent sections: the simulation environment (instrument,
// diffusion, run length, seed, logs, mode), the risk limits enforced by
// the risk manager, the reservation-price quoter parameters, and the fee
// schedule applied by accounting. Every field has a default so a bare
// `RiskConfig::default()` run is meaningful.

use std::path::PathBuf;

/// Whether the simulator synthesizes events or replays a recorded log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationMode {
    Simulate,
    Replay,
}

impl SimulationMode {
    /// Stable lowercase name for the mode (used in logs / run summaries).
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationMode::Simulate => "simulate",
            SimulationMode::Replay => "replay",
        }
    }
}

/// Simulation environment parameters.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Instrument tag carried on every event.
    pub instrument: String,
    /// Initial mid price for the synthetic book.
    pub initial_price: f64,
    /// Nominal book spread; level i rests at mid +/- i * spread / 2.
    pub spread: f64,
    /// Per-event Gaussian mid-price step standard deviation.
    pub volatility: f64,
    /// Wall-clock sleep per event in ms. Does not move the logical clock.
    pub latency_ms: u64,
    /// Number of events to generate / process.
    pub iterations: u64,
    /// Seed for the per-instance ChaCha stream.
    pub seed: u32,
    /// Optional path to write the text event log (simulate mode only).
    pub event_log_path: Option<PathBuf>,
    /// Path of the log to replay (replay mode only).
    pub replay_log_path: Option<PathBuf>,
    pub mode: SimulationMode,
    /// Suppress per-event output in the CLI driver.
    pub quiet: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            instrument: "XYZ".to_string(),
            initial_price: 100.0,
            spread: 0.1,
            volatility: 0.5,
            latency_ms: 10,
            iterations: 1000,
            seed: 42,
            event_log_path: None,
            replay_log_path: None,
            mode: SimulationMode::Simulate,
            quiet: false,
        }
    }
}

/// Risk limits evaluated every tick by the risk manager.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Hard cap on |position| in shares.
    pub max_net_position: i64,
    /// Hard cap on |position| * mark in currency.
    pub max_notional_exposure: f64,
    /// Hard cap on high-water-mark drawdown of net P&L.
    pub max_drawdown: f64,
    /// Quote submissions per second over the rate window.
    pub max_quotes_per_second: f64,
    /// Cancels per second over the rate window.
    pub max_cancels_per_second: f64,
    /// Sliding window for both rate rules, in seconds.
    pub rate_window_seconds: f64,
    /// Max tolerated gap between consecutive event timestamps, in ms.
    pub max_stale_data_ms: f64,
    /// Fraction of a limit at which a rule turns Warning (0..1).
    pub warning_threshold_pct: f64,
    /// Minimum dwell in Breached before a Normal tick can recover.
    pub cooldown_seconds: f64,
    /// Hard cap on the displayed best_ask - best_bid spread.
    pub max_quote_spread: f64,
    /// Submitted quote sizes are clamped into [min, max].
    pub min_quote_size: i64,
    pub max_quote_size: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_net_position: 1000,
            max_notional_exposure: 500_000.0,
            max_drawdown: 10_000.0,
            max_quotes_per_second: 50.0,
            max_cancels_per_second: 50.0,
            rate_window_seconds: 1.0,
            max_stale_data_ms: 5000.0,
            warning_threshold_pct: 0.80,
            cooldown_seconds: 5.0,
            max_quote_spread: 0.5,
            min_quote_size: 1,
            max_quote_size: 100,
        }
    }
}

/// Parameters of the inventory-aware reservation-price quoter.
#[derive(Debug, Clone)]
pub struct ReservationQuoterConfig {
    /// Risk aversion gamma.
    pub gamma: f64,
    /// Fill-rate decay kappa.
    pub kappa: f64,
    /// Quoting horizon T.
    pub horizon: f64,
    /// Spread floor in basis points of mid.
    pub min_spread_bps: f64,
    /// Spread ceiling in basis points of mid.
    pub max_spread_bps: f64,
    /// Spread widening per unit of |OFI|.
    pub ofi_spread_factor: f64,
    /// Base quote size in shares before inventory scaling.
    pub base_size: i64,
    /// Strength of the asymmetric inventory size adjustment.
    pub size_inventory_scale: f64,
    /// |OFI| above this is treated as toxic flow.
    pub toxic_ofi_threshold: f64,
    /// Pull both quotes instead of quoting into toxic flow.
    pub pull_on_toxic: bool,
    /// Return-sample window of the volatility estimator.
    pub vol_window: usize,
    /// Trade window of the order-flow-imbalance estimator.
    pub ofi_window: usize,
}

impl Default for ReservationQuoterConfig {
    fn default() -> Self {
        Self {
            gamma: 0.1,
            kappa: 1.5,
            horizon: 1.0,
            min_spread_bps: 5.0,
            max_spread_bps: 200.0,
            ofi_spread_factor: 0.5,
            base_size: 5,
            size_inventory_scale: 1.0,
            toxic_ofi_threshold: 0.7,
            pull_on_toxic: false,
            vol_window: 100,
            ofi_window: 50,
        }
    }
}

/// Per-fill fee schedule applied by accounting.
///
/// The basis-point component applies to notional on every fill; the
/// per-share components split by liquidity role.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeSchedule {
    /// Rebate per share credited on maker fills.
    pub maker_rebate_per_share: f64,
    /// Fee per share charged on taker fills.
    pub taker_fee_per_share: f64,
    /// Basis-point fee on notional, both roles.
    pub fee_bps: f64,
}
