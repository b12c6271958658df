// src/strategy.rs
//
// Quoting strategies.
//
// A strategy is a transform from one immutable market snapshot plus
// position state to a quote decision. Two concrete strategies:
//
//  - HeuristicStrategy: fixed spread, linear inventory skew, depth-scaled
//    sizes. Always quotes.
//  - ReservationQuoter: inventory-aware reservation price and optimal
//    spread driven by the rolling volatility and OFI estimators, with
//    OFI spread widening, a toxic-flow pullback, and asymmetric sizes.
//
// The orchestrator owns one strategy by exclusive ownership; swapping
// strategies means reconstructing the orchestrator.

use crate::config::ReservationQuoterConfig;
use crate::estimators::{RollingOfi, RollingVolatility};
use crate::types::{OrderLevel, TimestampMs, Trade};

/// Immutable inputs for one strategy call.
#[derive(Debug, Clone)]
pub struct StrategySnapshot {
    pub best_bid: f64,
    pub best_ask: f64,
    pub mid_price: f64,
    pub bid_levels: Vec<OrderLevel>,
    pub ask_levels: Vec<OrderLevel>,
    pub trades: Vec<Trade>,
    pub position: i64,
    pub max_position: i64,
    pub timestamp: TimestampMs,
    pub sequence_number: i64,
}

/// Strategy output: where and how much to quote, or not at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteDecision {
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: i64,
    pub ask_size: i64,
    pub should_quote: bool,
}

impl QuoteDecision {
    fn pulled() -> Self {
        Self {
            bid_price: 0.0,
            ask_price: 0.0,
            bid_size: 0,
            ask_size: 0,
            should_quote: false,
        }
    }
}

/// Anything that can turn a snapshot into a quote decision. The receiver
/// is mutable because inventory-aware strategies feed their estimators
/// on every call.
pub trait Strategy {
    fn compute_quotes(&mut self, snapshot: &StrategySnapshot) -> QuoteDecision;
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------
// Heuristic strategy
// ---------------------------------------------------------------------

const HEURISTIC_BASE_SPREAD: f64 = 0.02;
const HEURISTIC_SKEW_FACTOR: f64 = 0.001;
const HEURISTIC_MAX_SKEW: f64 = 0.01;
const HEURISTIC_BASE_SIZE: i64 = 5;
const HEURISTIC_SIZE_FACTOR: f64 = 0.1;

/// Fixed-spread quoter with a clamped linear inventory skew and
/// depth-scaled sizes.
#[derive(Debug, Default)]
pub struct HeuristicStrategy;

impl HeuristicStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Inventory skew applied to both quotes: leaning against the
    /// position, clamped to +/- HEURISTIC_MAX_SKEW.
    pub fn inventory_skew(position: i64) -> f64 {
        (-(position as f64) * HEURISTIC_SKEW_FACTOR).clamp(-HEURISTIC_MAX_SKEW, HEURISTIC_MAX_SKEW)
    }
}

fn heuristic_size(depth: i64, position: i64, max_position: i64) -> i64 {
    let inv_factor = (1.0 - position.unsigned_abs() as f64 / max_position as f64).max(0.1);
    let size =
        (HEURISTIC_BASE_SIZE as f64 * (1.0 + depth as f64 * HEURISTIC_SIZE_FACTOR) * inv_factor)
            as i64;
    size.max(1)
}

impl Strategy for HeuristicStrategy {
    fn compute_quotes(&mut self, snap: &StrategySnapshot) -> QuoteDecision {
        let skew = Self::inventory_skew(snap.position);

        let bid_price = snap.mid_price - HEURISTIC_BASE_SPREAD / 2.0 + skew;
        let ask_price = snap.mid_price + HEURISTIC_BASE_SPREAD / 2.0 + skew;

        let bid_depth = snap.bid_levels.first().map_or(0, |l| l.size);
        let ask_depth = snap.ask_levels.first().map_or(0, |l| l.size);

        QuoteDecision {
            bid_price,
            ask_price,
            bid_size: heuristic_size(bid_depth, snap.position, snap.max_position),
            ask_size: heuristic_size(ask_depth, snap.position, snap.max_position),
            should_quote: true,
        }
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

// ---------------------------------------------------------------------
// Reservation-price quoter
// ---------------------------------------------------------------------

/// Inventory-aware quoter centered on the reservation price
/// r = mid - q * gamma * sigma^2 * T with the optimal half-spread from
/// the fill-rate model, widened by order-flow imbalance.
#[derive(Debug)]
pub struct ReservationQuoter {
    config: ReservationQuoterConfig,
    vol_estimator: RollingVolatility,
    ofi_estimator: RollingOfi,
}

impl ReservationQuoter {
    pub fn new(config: ReservationQuoterConfig) -> Self {
        let vol_estimator = RollingVolatility::new(config.vol_window);
        let ofi_estimator = RollingOfi::new(config.ofi_window);
        Self {
            config,
            vol_estimator,
            ofi_estimator,
        }
    }

    pub fn config(&self) -> &ReservationQuoterConfig {
        &self.config
    }

    pub fn last_sigma(&self) -> f64 {
        self.vol_estimator.sigma()
    }

    pub fn last_ofi(&self) -> f64 {
        self.ofi_estimator.normalized_ofi()
    }
}

impl Strategy for ReservationQuoter {
    fn compute_quotes(&mut self, snap: &StrategySnapshot) -> QuoteDecision {
        self.vol_estimator.on_mid(snap.mid_price);
        self.ofi_estimator.on_trades(&snap.trades);

        let sigma = self.vol_estimator.sigma();
        let ofi = self.ofi_estimator.normalized_ofi();

        let q = snap.position as f64;
        let q_max = snap.max_position as f64;
        let gamma = self.config.gamma;
        let kappa = self.config.kappa;
        let horizon = self.config.horizon;

        let sigma2 = sigma * sigma;
        let reservation = snap.mid_price - q * gamma * sigma2 * horizon;

        // Optimal spread; with sigma = 0 this degenerates to the pure
        // fill-rate log term.
        let mut spread = gamma * sigma2 * horizon + (2.0 / gamma) * (1.0 + gamma / kappa).ln();

        // Widen into imbalanced flow.
        spread *= 1.0 + self.config.ofi_spread_factor * ofi.abs();

        // Clamp to the configured band, expressed in bps of mid.
        let min_spread = self.config.min_spread_bps * snap.mid_price / 10_000.0;
        let max_spread = self.config.max_spread_bps * snap.mid_price / 10_000.0;
        spread = spread.clamp(min_spread, max_spread);

        let bid_price = reservation - spread / 2.0;
        let ask_price = reservation + spread / 2.0;

        // Toxic flow: step away entirely rather than get run over.
        if ofi.abs() > self.config.toxic_ofi_threshold && self.config.pull_on_toxic {
            return QuoteDecision::pulled();
        }

        // Asymmetric sizing: shrink the side that would grow the
        // inventory, grow the side that would shed it.
        let inv_ratio = if q_max > 0.0 { (q / q_max).clamp(-1.0, 1.0) } else { 0.0 };
        let bid_size =
            (self.config.base_size as f64 * (1.0 - inv_ratio * self.config.size_inventory_scale))
                as i64;
        let ask_size =
            (self.config.base_size as f64 * (1.0 + inv_ratio * self.config.size_inventory_scale))
                as i64;

        QuoteDecision {
            bid_price,
            ask_price,
            bid_size: bid_size.max(1),
            ask_size: ask_size.max(1),
            should_quote: true,
        }
    }

    fn name(&self) -> &'static str {
        "reservation"
    }
}
