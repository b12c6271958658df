// src/estimators.rs
//
// Windowed rolling statistics feeding the reservation-price quoter:
//
//  - RollingVolatility: sample stddev of simple returns over the last N
//    mid prints.
//  - RollingOfi: normalized order-flow imbalance over the last M trades.
//
// Both are bounded deques at steady state and fully deterministic; the
// only way to restart one is to reconstruct it.

use std::collections::VecDeque;

use crate::types::{Side, Trade};

/// Realized return volatility over a bounded window of mid prices.
#[derive(Debug, Clone)]
pub struct RollingVolatility {
    window: usize,
    mids: VecDeque<f64>,
    returns: VecDeque<f64>,
}

impl RollingVolatility {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            mids: VecDeque::new(),
            returns: VecDeque::new(),
        }
    }

    /// Ingest a new mid print. A simple return is appended only when a
    /// positive prior mid exists; the return window evicts FIFO beyond
    /// the configured size and at most window + 1 mids are retained.
    pub fn on_mid(&mut self, mid: f64) {
        if let Some(&prev) = self.mids.back() {
            if prev > 0.0 {
                self.returns.push_back((mid - prev) / prev);
                if self.returns.len() > self.window {
                    self.returns.pop_front();
                }
            }
        }
        self.mids.push_back(mid);
        if self.mids.len() > self.window + 1 {
            self.mids.pop_front();
        }
    }

    /// Sample standard deviation (denominator n-1) of the windowed
    /// returns; 0.0 with fewer than two samples.
    pub fn sigma(&self) -> f64 {
        let n = self.returns.len();
        if n < 2 {
            return 0.0;
        }
        let mean: f64 = self.returns.iter().sum::<f64>() / n as f64;
        let sq_sum: f64 = self.returns.iter().map(|r| (r - mean) * (r - mean)).sum();
        (sq_sum / (n as f64 - 1.0)).sqrt()
    }

    pub fn count(&self) -> usize {
        self.returns.len()
    }
}

/// Normalized order-flow imbalance over a bounded window of trades.
///
/// Buy-aggressor volume counts positive, sell-aggressor negative; the
/// statistic is net signed volume over total absolute volume, in [-1, 1].
#[derive(Debug, Clone)]
pub struct RollingOfi {
    window: usize,
    signed_volumes: VecDeque<f64>,
}

impl RollingOfi {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            signed_volumes: VecDeque::new(),
        }
    }

    pub fn on_trades(&mut self, trades: &[Trade]) {
        for t in trades {
            let signed = match t.aggressor_side {
                Side::Buy => t.size as f64,
                Side::Sell => -(t.size as f64),
            };
            self.signed_volumes.push_back(signed);
            if self.signed_volumes.len() > self.window {
                self.signed_volumes.pop_front();
            }
        }
    }

    /// Net over gross signed volume; 0.0 when the window is empty or all
    /// sampled sizes are zero.
    pub fn normalized_ofi(&self) -> f64 {
        if self.signed_volumes.is_empty() {
            return 0.0;
        }
        let mut net = 0.0;
        let mut total = 0.0;
        for v in &self.signed_volumes {
            net += v;
            total += v.abs();
        }
        if total == 0.0 {
            return 0.0;
        }
        net / total
    }

    pub fn count(&self) -> usize {
        self.signed_volumes.len()
    }
}
