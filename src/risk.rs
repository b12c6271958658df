// src/risk.rs
//
// Rule-based risk engine gating quoting activity.
//
// Seven rules are evaluated on every tick, each classified against its
// limit into Normal / Warning / Breached by a shared ratio classifier.
// The worst severity drives a four-state machine:
//
//   Normal/Warning  -> follow the worst rule; entering Breached latches
//                      the breach timestamp.
//   Breached        -> recovers to Normal only on a fully Normal tick
//                      after the cooldown has elapsed. Warning is not a
//                      recovery target.
//   KillSwitch      -> sticky; evaluate() is a no-op until an operator
//                      calls reset_kill_switch().
//
// The high-water mark of net P&L lives inside the drawdown rule and is
// initialized on first evaluation.

use std::collections::VecDeque;

use crate::accounting::Accounting;
use crate::config::RiskConfig;
use crate::types::{MarketDataEvent, TimestampMs};

/// Aggregate risk state. Ordering is the severity ordering used by the
/// rule aggregator: Normal < Warning < Breached < KillSwitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskState {
    Normal,
    Warning,
    Breached,
    KillSwitch,
}

impl RiskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskState::Normal => "Normal",
            RiskState::Warning => "Warning",
            RiskState::Breached => "Breached",
            RiskState::KillSwitch => "KillSwitch",
        }
    }
}

/// Identity of an individual risk rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskRuleId {
    MaxNetPosition,
    MaxNotionalExposure,
    MaxDrawdown,
    MaxQuoteRate,
    MaxCancelRate,
    StaleMarketData,
    MaxQuoteSpread,
}

/// Outcome of one rule evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RiskRuleResult {
    pub rule_id: RiskRuleId,
    pub level: RiskState,
    pub current_value: f64,
    pub limit_value: f64,
    pub tag: &'static str,
}

#[derive(Debug)]
pub struct RiskManager {
    config: RiskConfig,
    state: RiskState,
    last_results: Vec<RiskRuleResult>,

    high_water_mark: f64,
    drawdown: f64,
    hwm_initialized: bool,

    quote_timestamps: VecDeque<TimestampMs>,
    cancel_timestamps: VecDeque<TimestampMs>,

    breach_timestamp: TimestampMs,
    breach_timestamp_set: bool,

    last_md_timestamp: TimestampMs,
    last_md_timestamp_set: bool,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            state: RiskState::Normal,
            last_results: Vec::with_capacity(7),
            high_water_mark: 0.0,
            drawdown: 0.0,
            hwm_initialized: false,
            quote_timestamps: VecDeque::new(),
            cancel_timestamps: VecDeque::new(),
            breach_timestamp: 0,
            breach_timestamp_set: false,
            last_md_timestamp: 0,
            last_md_timestamp_set: false,
        }
    }

    /// Ratio-based severity: >= 1 breached, >= warning threshold warning.
    fn classify(&self, ratio: f64) -> RiskState {
        if ratio >= 1.0 {
            RiskState::Breached
        } else if ratio >= self.config.warning_threshold_pct {
            RiskState::Warning
        } else {
            RiskState::Normal
        }
    }

    fn eval_max_net_position(&self, acct: &Accounting) -> RiskRuleResult {
        let current = acct.position().unsigned_abs() as f64;
        let limit = self.config.max_net_position as f64;
        RiskRuleResult {
            rule_id: RiskRuleId::MaxNetPosition,
            level: self.classify(current / limit),
            current_value: current,
            limit_value: limit,
            tag: "net_position",
        }
    }

    fn eval_max_notional_exposure(&self, acct: &Accounting, mark_price: f64) -> RiskRuleResult {
        let current = acct.gross_exposure(mark_price);
        let limit = self.config.max_notional_exposure;
        RiskRuleResult {
            rule_id: RiskRuleId::MaxNotionalExposure,
            level: self.classify(current / limit),
            current_value: current,
            limit_value: limit,
            tag: "gross_exposure",
        }
    }

    fn eval_max_drawdown(&mut self, acct: &Accounting) -> RiskRuleResult {
        let pnl = acct.net_pnl();

        if !self.hwm_initialized {
            self.high_water_mark = pnl;
            self.hwm_initialized = true;
        } else if pnl > self.high_water_mark {
            self.high_water_mark = pnl;
        }

        self.drawdown = self.high_water_mark - pnl;
        let limit = self.config.max_drawdown;
        RiskRuleResult {
            rule_id: RiskRuleId::MaxDrawdown,
            level: self.classify(self.drawdown / limit),
            current_value: self.drawdown,
            limit_value: limit,
            tag: "drawdown",
        }
    }

    fn eval_max_quote_rate(&mut self, now: TimestampMs) -> RiskRuleResult {
        let cutoff = now - (self.config.rate_window_seconds * 1000.0) as TimestampMs;
        while self
            .quote_timestamps
            .front()
            .is_some_and(|&ts| ts < cutoff)
        {
            self.quote_timestamps.pop_front();
        }

        let current = self.quote_timestamps.len() as f64 / self.config.rate_window_seconds;
        let limit = self.config.max_quotes_per_second;
        RiskRuleResult {
            rule_id: RiskRuleId::MaxQuoteRate,
            level: self.classify(current / limit),
            current_value: current,
            limit_value: limit,
            tag: "quote_rate",
        }
    }

    fn eval_max_cancel_rate(&mut self, now: TimestampMs) -> RiskRuleResult {
        let cutoff = now - (self.config.rate_window_seconds * 1000.0) as TimestampMs;
        while self
            .cancel_timestamps
            .front()
            .is_some_and(|&ts| ts < cutoff)
        {
            self.cancel_timestamps.pop_front();
        }

        let current = self.cancel_timestamps.len() as f64 / self.config.rate_window_seconds;
        let limit = self.config.max_cancels_per_second;
        RiskRuleResult {
            rule_id: RiskRuleId::MaxCancelRate,
            level: self.classify(current / limit),
            current_value: current,
            limit_value: limit,
            tag: "cancel_rate",
        }
    }

    fn eval_stale_market_data(&mut self, md_ts: TimestampMs) -> RiskRuleResult {
        if !self.last_md_timestamp_set {
            self.last_md_timestamp = md_ts;
            self.last_md_timestamp_set = true;
            return RiskRuleResult {
                rule_id: RiskRuleId::StaleMarketData,
                level: RiskState::Normal,
                current_value: 0.0,
                limit_value: self.config.max_stale_data_ms,
                tag: "first_tick",
            };
        }

        let gap_ms = (md_ts - self.last_md_timestamp) as f64;
        self.last_md_timestamp = md_ts;

        let limit = self.config.max_stale_data_ms;
        RiskRuleResult {
            rule_id: RiskRuleId::StaleMarketData,
            level: self.classify(gap_ms / limit),
            current_value: gap_ms,
            limit_value: limit,
            tag: "stale_ms",
        }
    }

    fn eval_max_quote_spread(&self, md: &MarketDataEvent) -> RiskRuleResult {
        let spread = md.best_ask_price - md.best_bid_price;
        let limit = self.config.max_quote_spread;
        RiskRuleResult {
            rule_id: RiskRuleId::MaxQuoteSpread,
            level: self.classify(spread / limit),
            current_value: spread,
            limit_value: limit,
            tag: "spread",
        }
    }

    /// Evaluate all rules and advance the state machine.
    ///
    /// A no-op while the kill switch is engaged: cached rule results and
    /// state stay untouched.
    pub fn evaluate(
        &mut self,
        acct: &Accounting,
        md: &MarketDataEvent,
        mark_price: f64,
    ) -> RiskState {
        if self.state == RiskState::KillSwitch {
            return self.state;
        }

        let results = [
            self.eval_max_net_position(acct),
            self.eval_max_notional_exposure(acct, mark_price),
            self.eval_max_drawdown(acct),
            self.eval_max_quote_rate(md.timestamp),
            self.eval_max_cancel_rate(md.timestamp),
            self.eval_stale_market_data(md.timestamp),
            self.eval_max_quote_spread(md),
        ];
        self.last_results.clear();
        self.last_results.extend_from_slice(&results);

        let worst = self
            .last_results
            .iter()
            .map(|r| r.level)
            .max()
            .unwrap_or(RiskState::Normal);

        match self.state {
            RiskState::Normal | RiskState::Warning => {
                if worst == RiskState::Breached {
                    self.state = RiskState::Breached;
                    self.breach_timestamp = md.timestamp;
                    self.breach_timestamp_set = true;
                } else {
                    self.state = worst;
                }
            }
            RiskState::Breached => {
                // Recovery needs a fully Normal tick after the cooldown.
                if worst == RiskState::Normal && self.breach_timestamp_set {
                    let elapsed_s = (md.timestamp - self.breach_timestamp) as f64 / 1000.0;
                    if elapsed_s >= self.config.cooldown_seconds {
                        self.state = RiskState::Normal;
                    }
                }
            }
            RiskState::KillSwitch => unreachable!("handled above"),
        }

        self.state
    }

    /// Force the sticky halt state from anywhere.
    pub fn engage_kill_switch(&mut self) {
        self.state = RiskState::KillSwitch;
    }

    /// Operator exit from KillSwitch. Re-examines the cached rule results:
    /// all Normal goes back to Normal, anything else lands in Breached
    /// without refreshing the breach timestamp (the next evaluate sets it
    /// when it observes a breach).
    pub fn reset_kill_switch(&mut self) {
        if self.state != RiskState::KillSwitch {
            return;
        }

        let worst = self
            .last_results
            .iter()
            .map(|r| r.level)
            .max()
            .unwrap_or(RiskState::Normal);

        self.state = if worst == RiskState::Normal {
            RiskState::Normal
        } else {
            RiskState::Breached
        };
    }

    pub fn record_quote(&mut self, ts: TimestampMs) {
        self.quote_timestamps.push_back(ts);
    }

    pub fn record_cancel(&mut self, ts: TimestampMs) {
        self.cancel_timestamps.push_back(ts);
    }

    /// Quoting proceeds only in the two benign states.
    pub fn is_quoting_allowed(&self) -> bool {
        matches!(self.state, RiskState::Normal | RiskState::Warning)
    }

    pub fn current_state(&self) -> RiskState {
        self.state
    }

    pub fn last_results(&self) -> &[RiskRuleResult] {
        &self.last_results
    }

    pub fn current_drawdown(&self) -> f64 {
        self.drawdown
    }

    pub fn high_water_mark(&self) -> f64 {
        self.high_water_mark
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}
